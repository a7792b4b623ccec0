use crate::skills::Skill;

/// Host values for one skill, taken from a single host update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillStat {
    pub xp: i64,
    pub level: u32,
    pub boosted_level: u32,
}

impl Default for SkillStat {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            boosted_level: 1,
        }
    }
}

/// Read-only view of the host's current per-skill values.
pub trait Host: Send + Sync {
    /// All three values must come from the same host update.
    fn stat(&self, skill: Skill) -> SkillStat;
    fn player_name(&self) -> Option<String>;
}

/// Rate/ETA collaborator. Every query may come back empty.
pub trait RateSource: Send + Sync {
    fn xp_per_hour(&self, skill: Skill) -> Option<i64>;
    fn actions_per_hour(&self, skill: Skill) -> Option<i64>;
    fn time_to_next_tier(&self, skill: Skill) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoRates;

impl RateSource for NoRates {
    fn xp_per_hour(&self, _skill: Skill) -> Option<i64> {
        None
    }

    fn actions_per_hour(&self, _skill: Skill) -> Option<i64> {
        None
    }

    fn time_to_next_tier(&self, _skill: Skill) -> Option<String> {
        None
    }
}
