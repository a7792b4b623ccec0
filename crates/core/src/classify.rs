use crate::skills::Skill;
use crate::state::StateStore;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainKind {
    /// No previous value this session.
    First,
    Increase,
    /// Same or lower value, e.g. a boost or drain that left experience alone.
    Transient,
}

impl GainKind {
    pub fn is_genuine(self) -> bool {
        matches!(self, GainKind::First | GainKind::Increase)
    }
}

/// Classifies one observation and folds it into the store.
///
/// Genuine gains set the baseline (once), stamp `last_gain_at` and move the
/// active pointer. The previous value is always replaced.
pub fn classify(
    store: &mut StateStore,
    skill: Skill,
    new_value: i64,
    now: DateTime<Utc>,
) -> GainKind {
    let kind = match store.observe(skill, new_value) {
        None => GainKind::First,
        Some(previous) if new_value > previous => GainKind::Increase,
        Some(_) => GainKind::Transient,
    };
    if kind.is_genuine() {
        store.record_gain(skill, new_value, now);
    }
    kind
}
