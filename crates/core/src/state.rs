use crate::skills::Skill;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillState {
    /// Value at the first genuine gain this session; fixed until reset.
    pub baseline: Option<i64>,
    pub previous: i64,
    pub last_gain_at: Option<DateTime<Utc>>,
}

impl SkillState {
    fn observed(value: i64) -> Self {
        Self {
            baseline: None,
            previous: value,
            last_gain_at: None,
        }
    }
}

/// Session-scoped tracking state. Owned by a single thread.
#[derive(Debug, Default)]
pub struct StateStore {
    skills: HashMap<Skill, SkillState>,
    active: Option<Skill>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, skill: Skill) -> Option<&SkillState> {
        self.skills.get(&skill)
    }

    pub fn previous(&self, skill: Skill) -> Option<i64> {
        self.get(skill).map(|s| s.previous)
    }

    pub fn baseline(&self, skill: Skill) -> Option<i64> {
        self.get(skill).and_then(|s| s.baseline)
    }

    pub fn last_gain_at(&self, skill: Skill) -> Option<DateTime<Utc>> {
        self.get(skill).and_then(|s| s.last_gain_at)
    }

    pub fn active(&self) -> Option<Skill> {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Skills with state, in host order.
    pub fn tracked(&self) -> impl Iterator<Item = Skill> + '_ {
        Skill::TRACKED
            .iter()
            .copied()
            .filter(|skill| self.skills.contains_key(skill))
    }

    pub(crate) fn observe(&mut self, skill: Skill, value: i64) -> Option<i64> {
        match self.skills.get_mut(&skill) {
            Some(state) => Some(std::mem::replace(&mut state.previous, value)),
            None => {
                self.skills.insert(skill, SkillState::observed(value));
                None
            }
        }
    }

    pub(crate) fn record_gain(&mut self, skill: Skill, value: i64, now: DateTime<Utc>) {
        let state = self
            .skills
            .entry(skill)
            .or_insert_with(|| SkillState::observed(value));
        if state.baseline.is_none() {
            state.baseline = Some(value);
        }
        state.last_gain_at = Some(now);
        self.active = Some(skill);
    }

    /// Drops every per-skill record and the active pointer.
    pub fn reset(&mut self) {
        self.skills.clear();
        self.active = None;
    }
}
