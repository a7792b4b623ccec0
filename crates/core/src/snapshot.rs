use crate::skills::Skill;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Body of a push update: one skill, flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSnapshot {
    pub skill: Skill,
    pub xp: i64,
    pub level: u32,
    pub boosted_level: u32,
    pub xp_hr: i64,
    pub actions_hr: i64,
    pub xp_gained: i64,
    pub time_to_level: String,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub xp: i64,
    pub level: u32,
    pub boosted_level: u32,
    pub xp_hr: i64,
    pub actions_hr: i64,
    pub time_to_level: String,
    pub xp_gained: i64,
    pub progress_percent: f64,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_gain: Option<DateTime<Utc>>,
}

/// Whole-session view served to pull clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub player: String,
    pub logged_in: bool,
    pub active_skill: Option<Skill>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub skills: BTreeMap<Skill, SkillRecord>,
}

/// Latest session snapshot, shared between the event thread and the pull
/// server. Readers only ever see a fully built value or nothing.
pub struct SnapshotCache {
    tx: watch::Sender<Option<Arc<SessionSnapshot>>>,
    rx: watch::Receiver<Option<Arc<SessionSnapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self { tx, rx }
    }

    pub fn publish(&self, snapshot: SessionSnapshot) {
        self.tx.send_replace(Some(Arc::new(snapshot)));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<Arc<SessionSnapshot>> {
        self.rx.borrow().clone()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_session() -> SessionSnapshot {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut skills = BTreeMap::new();
        skills.insert(
            Skill::Attack,
            SkillRecord {
                xp: 1_200,
                level: 10,
                boosted_level: 12,
                xp_hr: 42_000,
                actions_hr: 1_200,
                time_to_level: "0:41:12".into(),
                xp_gained: 46,
                progress_percent: 22.5,
                last_gain: Some(at),
            },
        );
        skills.insert(
            Skill::Magic,
            SkillRecord {
                xp: 0,
                level: 1,
                boosted_level: 1,
                xp_hr: 0,
                actions_hr: 0,
                time_to_level: String::new(),
                xp_gained: 0,
                progress_percent: 0.0,
                last_gain: None,
            },
        );
        SessionSnapshot {
            player: "Zezima".into(),
            logged_in: true,
            active_skill: Some(Skill::Attack),
            timestamp: at,
            skills,
        }
    }

    #[test]
    fn session_snapshot_uses_wire_field_names() {
        let value = serde_json::to_value(sample_session()).expect("serialize");
        assert_eq!(value["player"], "Zezima");
        assert_eq!(value["logged_in"], true);
        assert_eq!(value["active_skill"], "Attack");
        assert_eq!(value["timestamp"], 1_714_564_800_000_i64);

        let attack = &value["skills"]["Attack"];
        assert_eq!(attack["xp"], 1_200);
        assert_eq!(attack["boosted_level"], 12);
        assert_eq!(attack["time_to_level"], "0:41:12");
        assert_eq!(attack["last_gain"], 1_714_564_800_000_i64);
        assert!(value["skills"]["Magic"]["last_gain"].is_null());
    }

    #[test]
    fn skill_snapshot_is_flat() {
        let snap = SkillSnapshot {
            skill: Skill::Fishing,
            xp: 83,
            level: 2,
            boosted_level: 2,
            xp_hr: 0,
            actions_hr: 0,
            xp_gained: 0,
            time_to_level: String::new(),
            progress_percent: 0.0,
        };
        let value = serde_json::to_value(&snap).expect("serialize");
        let keys: Vec<&str> = value
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys.len(), 9);
        assert_eq!(value["skill"], "Fishing");
        assert_eq!(value["progress_percent"], 0.0);
    }

    #[test]
    fn cache_starts_empty_and_replaces_atomically() {
        let cache = SnapshotCache::new();
        assert!(cache.current().is_none());

        cache.publish(sample_session());
        let first = cache.current().expect("published");
        assert_eq!(first.player, "Zezima");

        let mut next = sample_session();
        next.player = "Lynx Titan".into();
        cache.publish(next);
        assert_eq!(first.player, "Zezima", "old readers keep their copy");
        assert_eq!(cache.current().expect("replaced").player, "Lynx Titan");

        cache.clear();
        assert!(cache.current().is_none());
    }
}
