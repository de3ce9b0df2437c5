//! Replacement policy engines.
//!
//! | Module      | Engine          | Resident structures             | History            |
//! |-------------|-----------------|---------------------------------|--------------------|
//! | [`arc`]     | `ArcPolicy`     | L1 (seen once), L2 (seen twice) | T1, T2 ghost lists |
//! | [`cacheus`] | `CacheusPolicy` | Read and Write LRU segments     | none               |
//! | [`lfu`]     | `LfuPolicy`     | frequency buckets               | none               |
//! | [`lirs`]    | `LirsPolicy`    | high-value set + candidates     | non-resident list  |

pub mod arc;
pub mod cacheus;
pub mod lfu;
pub mod lirs;
