pub use crate::ds::{FrequencyBuckets, GhostList, IntrusiveList, SlotArena, SlotId};
pub use crate::builder::{Policy, PolicyBuilder, PolicyKind};
pub use crate::error::{ConfigError, InvariantError};
pub use crate::policy::arc::{ArcList, ArcPolicy};
pub use crate::policy::cacheus::{CacheusPolicy, Segment};
pub use crate::policy::lfu::LfuPolicy;
pub use crate::policy::lirs::{LirDemotion, LirsPolicy, LirsStatus};
pub use crate::stats::{HitStats, ResultLog};
pub use crate::traits::{AccessType, BlockKey, ReplacementPolicy, replay};
