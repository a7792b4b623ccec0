use std::time::{Duration, Instant};
use xpbridge_core::Skill;

pub const DEFAULT_MIN_SEND_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPhase {
    Idle,
    Pending,
    Sent,
}

/// Decides, once per host tick, whether a push goes out and for which skill.
///
/// A genuine gain marks its skill pending. Without a pending skill the active
/// one is re-sent so the remote rate display keeps decaying while idle. No two
/// sends are ever closer than `min_interval`.
#[derive(Debug)]
pub struct PushScheduler {
    min_interval: Duration,
    phase: PushPhase,
    pending: Option<Skill>,
    last_sent: Option<Instant>,
}

impl PushScheduler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            phase: PushPhase::Idle,
            pending: None,
            last_sent: None,
        }
    }

    pub fn phase(&self) -> PushPhase {
        self.phase
    }

    pub fn pending(&self) -> Option<Skill> {
        self.pending
    }

    pub fn on_gain(&mut self, skill: Skill) {
        self.pending = Some(skill);
        self.phase = PushPhase::Pending;
    }

    pub fn poll(&mut self, now: Instant, active: Option<Skill>) -> Option<Skill> {
        if self.phase == PushPhase::Sent {
            self.phase = PushPhase::Idle;
        }
        let skill = self.pending.or(active)?;

        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.min_interval {
                return None;
            }
        }

        self.last_sent = Some(now);
        self.pending = None;
        self.phase = PushPhase::Sent;
        Some(skill)
    }

    /// Forgets the pending skill. The throttle window survives so a
    /// logout/login pair cannot double-send.
    pub fn reset(&mut self) {
        self.pending = None;
        self.phase = PushPhase::Idle;
    }
}

impl Default for PushScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SEND_INTERVAL)
    }
}
