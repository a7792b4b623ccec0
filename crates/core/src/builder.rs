use crate::host::{Host, RateSource, SkillStat};
use crate::skills::{IgnoreSet, Skill};
use crate::snapshot::{SessionSnapshot, SkillRecord, SkillSnapshot};
use crate::state::StateStore;
use crate::tiers::TierTable;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressClamp {
    /// Report the raw ratio, which can leave [0, 100] when host values lag.
    #[default]
    Off,
    On,
}

impl From<bool> for ProgressClamp {
    fn from(clamp: bool) -> Self {
        if clamp { Self::On } else { Self::Off }
    }
}

/// Percent of the way from `tier` to `tier + 1`.
pub fn progress_percent(table: &dyn TierTable, value: i64, tier: u32, clamp: ProgressClamp) -> f64 {
    if tier >= table.max_tier() {
        return 100.0;
    }
    let floor = table.threshold(tier);
    let width = table.threshold(tier + 1) - floor;
    if width <= 0 {
        return 100.0;
    }
    let percent = (value - floor) as f64 / width as f64 * 100.0;
    match clamp {
        ProgressClamp::Off => percent,
        ProgressClamp::On => percent.clamp(0.0, 100.0),
    }
}

/// Combines tracking state, host values and rates into snapshots.
/// Holds only borrowed collaborators; building never mutates anything.
pub struct SnapshotBuilder<'a> {
    host: &'a dyn Host,
    rates: &'a dyn RateSource,
    tiers: &'a dyn TierTable,
    clamp: ProgressClamp,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(
        host: &'a dyn Host,
        rates: &'a dyn RateSource,
        tiers: &'a dyn TierTable,
        clamp: ProgressClamp,
    ) -> Self {
        Self {
            host,
            rates,
            tiers,
            clamp,
        }
    }

    pub fn skill(&self, store: &StateStore, skill: Skill) -> SkillSnapshot {
        let SkillStat {
            xp,
            level,
            boosted_level,
        } = self.host.stat(skill);
        SkillSnapshot {
            skill,
            xp,
            level,
            boosted_level,
            xp_hr: self.rates.xp_per_hour(skill).unwrap_or(0),
            actions_hr: self.rates.actions_per_hour(skill).unwrap_or(0),
            xp_gained: gained(store, skill, xp),
            time_to_level: self.rates.time_to_next_tier(skill).unwrap_or_default(),
            progress_percent: progress_percent(self.tiers, xp, level, self.clamp),
        }
    }

    pub fn session(
        &self,
        store: &StateStore,
        ignore: &IgnoreSet,
        logged_in: bool,
        now: DateTime<Utc>,
    ) -> SessionSnapshot {
        let skills: BTreeMap<Skill, SkillRecord> = Skill::TRACKED
            .iter()
            .copied()
            .filter(|skill| ignore.admits(*skill))
            .map(|skill| (skill, self.record(store, skill)))
            .collect();

        SessionSnapshot {
            player: self.host.player_name().unwrap_or_default(),
            logged_in,
            active_skill: store.active(),
            timestamp: now,
            skills,
        }
    }

    fn record(&self, store: &StateStore, skill: Skill) -> SkillRecord {
        let snap = self.skill(store, skill);
        SkillRecord {
            xp: snap.xp,
            level: snap.level,
            boosted_level: snap.boosted_level,
            xp_hr: snap.xp_hr,
            actions_hr: snap.actions_hr,
            time_to_level: snap.time_to_level,
            xp_gained: snap.xp_gained,
            progress_percent: snap.progress_percent,
            last_gain: store.last_gain_at(skill),
        }
    }
}

fn gained(store: &StateStore, skill: Skill, current: i64) -> i64 {
    store.baseline(skill).map_or(0, |baseline| current - baseline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::host::NoRates;
    use crate::tiers::ExperienceTable;
    use chrono::TimeZone;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeHost {
        values: HashMap<Skill, SkillStat>,
        player: Option<String>,
    }

    impl FakeHost {
        fn set(&mut self, skill: Skill, xp: i64, level: u32, boosted_level: u32) {
            self.values.insert(
                skill,
                SkillStat {
                    xp,
                    level,
                    boosted_level,
                },
            );
        }
    }

    impl Host for FakeHost {
        fn stat(&self, skill: Skill) -> SkillStat {
            self.values.get(&skill).copied().unwrap_or_default()
        }
        fn player_name(&self) -> Option<String> {
            self.player.clone()
        }
    }

    struct FixedRates;

    impl RateSource for FixedRates {
        fn xp_per_hour(&self, _skill: Skill) -> Option<i64> {
            Some(30_000)
        }
        fn actions_per_hour(&self, _skill: Skill) -> Option<i64> {
            Some(900)
        }
        fn time_to_next_tier(&self, _skill: Skill) -> Option<String> {
            Some("1:02:03".into())
        }
    }

    struct FlatTable;

    impl TierTable for FlatTable {
        fn threshold(&self, _tier: u32) -> i64 {
            500
        }
        fn max_tier(&self) -> u32 {
            99
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn gained_is_relative_to_baseline() {
        let table = ExperienceTable::new();
        let mut host = FakeHost::default();
        let mut store = StateStore::new();

        host.set(Skill::Attack, 100, 10, 10);
        classify(&mut store, Skill::Attack, 100, now());
        host.set(Skill::Attack, 150, 10, 10);
        classify(&mut store, Skill::Attack, 150, now());

        let builder = SnapshotBuilder::new(&host, &NoRates, &table, ProgressClamp::Off);
        let snap = builder.skill(&store, Skill::Attack);
        assert_eq!(snap.xp_gained, 50);
        assert_eq!(snap.xp, 150);
        assert_eq!(builder.skill(&store, Skill::Magic).xp_gained, 0);
    }

    #[test]
    fn missing_rates_default_to_zero_and_empty() {
        let table = ExperienceTable::new();
        let host = FakeHost::default();
        let store = StateStore::new();
        let snap = SnapshotBuilder::new(&host, &NoRates, &table, ProgressClamp::Off)
            .skill(&store, Skill::Cooking);
        assert_eq!(snap.xp_hr, 0);
        assert_eq!(snap.actions_hr, 0);
        assert!(snap.time_to_level.is_empty());
    }

    #[test]
    fn rates_flow_into_snapshot() {
        let table = ExperienceTable::new();
        let host = FakeHost::default();
        let store = StateStore::new();
        let snap = SnapshotBuilder::new(&host, &FixedRates, &table, ProgressClamp::Off)
            .skill(&store, Skill::Hunter);
        assert_eq!(snap.xp_hr, 30_000);
        assert_eq!(snap.actions_hr, 900);
        assert_eq!(snap.time_to_level, "1:02:03");
    }

    #[test]
    fn progress_between_thresholds() {
        let table = ExperienceTable::new();
        // Level 10 spans 1154..1358.
        let mid = progress_percent(&table, 1_256, 10, ProgressClamp::Off);
        assert!((mid - 50.0).abs() < 1e-9);
        let near = progress_percent(&table, 1_155, 10, ProgressClamp::Off);
        assert!(near > 0.0 && near < 100.0);
    }

    #[test]
    fn max_tier_reports_full_progress() {
        let table = ExperienceTable::new();
        assert_eq!(progress_percent(&table, 13_034_431, 99, ProgressClamp::Off), 100.0);
        assert_eq!(progress_percent(&table, 50_000_000, 99, ProgressClamp::Off), 100.0);
    }

    #[test]
    fn zero_width_range_does_not_fault() {
        assert_eq!(progress_percent(&FlatTable, 700, 10, ProgressClamp::Off), 100.0);
    }

    #[test]
    fn clamp_only_applies_when_enabled() {
        let table = ExperienceTable::new();
        // Host reported the old level with new experience.
        let raw = progress_percent(&table, 1_500, 10, ProgressClamp::Off);
        assert!(raw > 100.0);
        assert_eq!(progress_percent(&table, 1_500, 10, ProgressClamp::On), 100.0);
        assert_eq!(progress_percent(&table, 1_000, 10, ProgressClamp::On), 0.0);
        assert_eq!(ProgressClamp::from(true), ProgressClamp::On);
    }

    #[test]
    fn session_excludes_ignored_skills() {
        let table = ExperienceTable::new();
        let mut host = FakeHost::default();
        host.player = Some("Zezima".into());
        host.set(Skill::Magic, 2_000, 13, 13);
        let mut store = StateStore::new();
        classify(&mut store, Skill::Attack, 0, now());

        let ignore = IgnoreSet::from_names(["Magic"]);
        let session = SnapshotBuilder::new(&host, &NoRates, &table, ProgressClamp::Off)
            .session(&store, &ignore, true, now());

        assert_eq!(session.skills.len(), 23);
        assert!(!session.skills.contains_key(&Skill::Magic));
        assert!(!session.skills.contains_key(&Skill::Overall));
        assert_eq!(session.player, "Zezima");
        assert_eq!(session.active_skill, Some(Skill::Attack));
        assert_eq!(session.skills[&Skill::Attack].last_gain, Some(now()));
        assert_eq!(session.skills[&Skill::Cooking].last_gain, None);
    }
}
