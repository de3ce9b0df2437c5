//! evictsim: trace-driven cache replacement policy engines.
//!
//! Four independent engines share one capability contract,
//! [`ReplacementPolicy`](crate::traits::ReplacementPolicy):
//!
//! - [`ArcPolicy`](crate::policy::arc::ArcPolicy): adaptive recency/frequency hybrid
//! - [`CacheusPolicy`](crate::policy::cacheus::CacheusPolicy): read/write segmented recency
//! - [`LfuPolicy`](crate::policy::lfu::LfuPolicy): frequency buckets with recency tie-break
//! - [`LirsPolicy`](crate::policy::lirs::LirsPolicy): recency / inter-reference recency hybrid

pub mod builder;
pub mod ds;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod stats;
pub mod traits;

pub use crate::ds::{FrequencyBuckets, GhostList, IntrusiveList, SlotArena, SlotId};
pub use crate::stats::{HitStats, LifetimeTotals, ResultLog, RunCounters};
pub use crate::traits::{AccessType, BlockKey, ReplacementPolicy, replay};
