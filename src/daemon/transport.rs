pub mod push;

use xpbridge_core::SkillSnapshot;

/// Outbound delivery of single-skill snapshots.
pub trait SnapshotSink: Send {
    /// Never blocks and never reports failure to the caller.
    fn deliver(&self, snapshot: SkillSnapshot);
    fn shutdown(&self);
}
