//! Hit accounting and the experiment result log.
//!
//! Every engine owns one [`RunCounters`] (reset between runs) and one
//! [`LifetimeTotals`] (never reset). [`HitStats`] is the snapshot that
//! `report_hits` renders into the result log, one line per report:
//!
//! ```text
//! LFU CacheSize 2 calls 4 hits 1 hitRatio 0.25 readHits 1 readHitRatio 0.25 writeHits 0 writeHitRatio 0 evictedDirtyPage 0
//! ```
//!
//! [`ResultLog`] is the file sink for those lines. It re-opens its file in
//! append mode for every line and never truncates it.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::traits::AccessType;

/// Default result log file name.
pub const DEFAULT_RESULT_LOG: &str = "ExperimentalResult.txt";

/// Bytes of data moved per migration unit.
pub const MIGRATION_UNIT_BYTES: u64 = 16;

/// Per-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunCounters {
    pub calls: u64,
    pub hits: u64,
    pub read_hits: u64,
    pub write_hits: u64,
    pub evicted_dirty_pages: u64,
    /// Never incremented: engines do not move data.
    pub migration: u64,
}

impl RunCounters {
    #[inline]
    pub(crate) fn record_call(&mut self) {
        self.calls += 1;
    }

    #[inline]
    pub(crate) fn record_hit(&mut self, access: AccessType) {
        self.hits += 1;
        match access {
            AccessType::Read => self.read_hits += 1,
            AccessType::Write => self.write_hits += 1,
        }
    }

    #[inline]
    pub(crate) fn record_dirty_eviction(&mut self) {
        self.evicted_dirty_pages += 1;
    }

    /// Zeroes `calls`, `hits` and `migration`. The read/write split and the
    /// dirty eviction count keep accumulating.
    pub(crate) fn reset_run(&mut self) {
        self.calls = 0;
        self.hits = 0;
        self.migration = 0;
    }
}

/// Totals accumulated over the whole lifetime of an engine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifetimeTotals {
    pub hits: u64,
    pub calls: u64,
    pub migration: u64,
}

impl LifetimeTotals {
    #[inline]
    pub(crate) fn record_call(&mut self) {
        self.calls += 1;
    }

    #[inline]
    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Migration volume in gigabytes.
    pub fn migration_gb(&self) -> f64 {
        (self.migration * MIGRATION_UNIT_BYTES) as f64 / 1024.0 / 1024.0
    }

    pub fn write_summary(&self, sink: &mut dyn Write) -> io::Result<()> {
        writeln!(sink, "total hits: {}", self.hits)?;
        writeln!(sink, "total calls: {}", self.calls)?;
        writeln!(sink, "total migration: {}GB", format_ratio(self.migration_gb()))
    }
}

/// Counter bookkeeping shared by every engine: one call per reference, hits
/// counted both per run and over the lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Accounting {
    pub(crate) run: RunCounters,
    pub(crate) lifetime: LifetimeTotals,
}

impl Accounting {
    #[inline]
    pub(crate) fn call(&mut self) {
        self.run.record_call();
        self.lifetime.record_call();
    }

    #[inline]
    pub(crate) fn hit(&mut self, access: AccessType) {
        self.run.record_hit(access);
        self.lifetime.record_hit();
    }

    #[inline]
    pub(crate) fn dirty_eviction(&mut self) {
        self.run.record_dirty_eviction();
    }
}

/// Snapshot of one engine's hit statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitStats {
    pub policy: &'static str,
    pub capacity: usize,
    pub calls: u64,
    pub hits: u64,
    pub hit_ratio: f64,
    pub read_hits: u64,
    pub read_hit_ratio: f64,
    pub write_hits: u64,
    pub write_hit_ratio: f64,
    pub evicted_dirty_pages: u64,
}

impl HitStats {
    pub fn new(policy: &'static str, capacity: usize, counters: &RunCounters) -> Self {
        let ratio = |n: u64| {
            if counters.calls == 0 {
                0.0
            } else {
                n as f64 / counters.calls as f64
            }
        };
        Self {
            policy,
            capacity,
            calls: counters.calls,
            hits: counters.hits,
            hit_ratio: ratio(counters.hits),
            read_hits: counters.read_hits,
            read_hit_ratio: ratio(counters.read_hits),
            write_hits: counters.write_hits,
            write_hit_ratio: ratio(counters.write_hits),
            evicted_dirty_pages: counters.evicted_dirty_pages,
        }
    }

    /// Writes the result-log line, newline included.
    pub fn write_line(&self, sink: &mut dyn Write) -> io::Result<()> {
        writeln!(sink, "{self}")
    }
}

impl fmt::Display for HitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} CacheSize {} calls {} hits {} hitRatio {} readHits {} readHitRatio {} \
             writeHits {} writeHitRatio {} evictedDirtyPage {}",
            self.policy,
            self.capacity,
            self.calls,
            self.hits,
            format_ratio(self.hit_ratio),
            self.read_hits,
            format_ratio(self.read_hit_ratio),
            self.write_hits,
            format_ratio(self.write_hit_ratio),
            self.evicted_dirty_pages,
        )
    }
}

/// Formats `value` with six significant digits, trailing zeros removed, and
/// scientific notation for exponents below -4 or above 5.
pub fn format_ratio(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value.is_infinite() {
            "inf".to_string()
        } else {
            "0".to_string()
        };
    }

    let sci = format!("{value:.5e}");
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs());
    }

    let decimals = (5 - exp) as usize;
    trim_zeros(&format!("{value:.decimals$}")).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Append-only result log file.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line for `stats`, creating the file if needed.
    pub fn append(&self, stats: &HitStats) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        stats.write_line(&mut file)
    }
}

impl Default for ResultLog {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_LOG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_ratio_matches_six_significant_digits() {
        assert_eq!(format_ratio(0.0), "0");
        assert_eq!(format_ratio(1.0), "1");
        assert_eq!(format_ratio(0.5), "0.5");
        assert_eq!(format_ratio(0.25), "0.25");
        assert_eq!(format_ratio(1.0 / 3.0), "0.333333");
        assert_eq!(format_ratio(2.0 / 3.0), "0.666667");
        assert_eq!(format_ratio(0.0001), "0.0001");
        assert_eq!(format_ratio(0.00001), "1e-05");
        assert_eq!(format_ratio(0.9999999), "1");
        assert_eq!(format_ratio(1234567.0), "1.23457e+06");
    }

    #[test]
    fn counters_split_hits_by_access() {
        let mut acct = Accounting::default();
        acct.call();
        acct.hit(AccessType::Read);
        acct.call();
        acct.hit(AccessType::Write);
        acct.call();
        acct.dirty_eviction();

        assert_eq!(acct.run.calls, 3);
        assert_eq!(acct.run.hits, 2);
        assert_eq!(acct.run.read_hits, 1);
        assert_eq!(acct.run.write_hits, 1);
        assert_eq!(acct.run.evicted_dirty_pages, 1);
        assert_eq!(acct.lifetime.calls, 3);
        assert_eq!(acct.lifetime.hits, 2);
    }

    #[test]
    fn reset_run_keeps_split_and_lifetime() {
        let mut acct = Accounting::default();
        acct.call();
        acct.hit(AccessType::Write);
        acct.run.reset_run();

        assert_eq!(acct.run.calls, 0);
        assert_eq!(acct.run.hits, 0);
        assert_eq!(acct.run.migration, 0);
        assert_eq!(acct.run.write_hits, 1);
        assert_eq!(acct.lifetime.calls, 1);
    }

    #[test]
    fn hit_stats_line_layout() {
        let counters = RunCounters {
            calls: 4,
            hits: 1,
            read_hits: 1,
            write_hits: 0,
            evicted_dirty_pages: 0,
            migration: 0,
        };
        let stats = HitStats::new("LFU", 2, &counters);
        let mut out = Vec::new();
        stats.write_line(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "LFU CacheSize 2 calls 4 hits 1 hitRatio 0.25 readHits 1 readHitRatio 0.25 \
             writeHits 0 writeHitRatio 0 evictedDirtyPage 0\n"
        );
    }

    #[test]
    fn hit_stats_zero_calls_has_zero_ratios() {
        let stats = HitStats::new("ARC", 8, &RunCounters::default());
        assert_eq!(stats.hit_ratio, 0.0);
        assert_eq!(stats.read_hit_ratio, 0.0);
        assert_eq!(stats.write_hit_ratio, 0.0);
    }

    #[test]
    fn lifetime_summary_reports_gigabytes() {
        let totals = LifetimeTotals {
            hits: 3,
            calls: 5,
            migration: 65536,
        };
        assert_eq!(totals.migration_gb(), 1.0);
        let mut out = Vec::new();
        totals.write_summary(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "total hits: 3\ntotal calls: 5\ntotal migration: 1GB\n");
    }

    #[test]
    fn result_log_appends_without_truncating() {
        let path = std::env::temp_dir().join(format!(
            "evictsim-result-log-{}.txt",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let log = ResultLog::new(&path);
        let stats = HitStats::new("LIRS", 1, &RunCounters::default());

        log.append(&stats).unwrap();
        log.append(&stats).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("LIRS CacheSize 1 ")));
        let _ = std::fs::remove_file(&path);
    }
}
