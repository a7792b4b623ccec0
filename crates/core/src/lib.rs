pub mod builder;
pub mod classify;
pub mod host;
pub mod skills;
pub mod snapshot;
pub mod state;
pub mod tiers;

pub use builder::{ProgressClamp, SnapshotBuilder};
pub use classify::{GainKind, classify};
pub use host::{Host, NoRates, RateSource, SkillStat};
pub use skills::{IgnoreSet, Skill};
pub use snapshot::{SessionSnapshot, SkillRecord, SkillSnapshot, SnapshotCache};
pub use state::{SkillState, StateStore};
pub use tiers::{ExperienceTable, TierTable};
