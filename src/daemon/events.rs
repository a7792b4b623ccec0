use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Instant;
use xpbridge_core::Skill;

/// A skill's experience or level moved on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct StatChange {
    pub skill: Skill,
    pub xp: i64,
    pub level: u32,
    pub boosted_level: u32,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    LoggedIn,
    /// Ends the session: all tracking state is dropped.
    LoginScreen,
    /// World hops and region loads. State survives, but nothing is authenticated.
    Loading,
}

impl SessionState {
    pub fn is_authenticated(self) -> bool {
        self == SessionState::LoggedIn
    }
}

/// Everything the host-event thread consumes.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Stat(StatChange),
    Session(SessionState),
    Tick { mono: Instant, wall: DateTime<Utc> },
    Shutdown,
}

impl HostEvent {
    pub fn tick_now() -> Self {
        HostEvent::Tick {
            mono: Instant::now(),
            wall: Utc::now(),
        }
    }
}

/// Callbacks the host drives. Implementations run on one thread.
pub trait HostListener {
    fn on_category_changed(&mut self, change: StatChange);
    fn on_session_state_changed(&mut self, state: SessionState);
    fn on_tick(&mut self, mono: Instant, wall: DateTime<Utc>);
}
