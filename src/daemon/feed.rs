use crate::daemon::events::{HostEvent, SessionState, StatChange};
use crate::util::logging::{debug, info, warn};
use crate::util::threading::{ThreadHandle, ThreadRegistry};
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use xpbridge_core::{Host, RateSource, Skill, SkillStat};

/// One line of the host feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedLine {
    Stat {
        skill: Skill,
        xp: i64,
        level: u32,
        boosted_level: u32,
    },
    Session {
        state: SessionState,
        #[serde(default)]
        player: Option<String>,
    },
    Rates {
        skill: Skill,
        #[serde(default)]
        xp_hr: Option<i64>,
        #[serde(default)]
        actions_hr: Option<i64>,
        #[serde(default)]
        time_to_level: Option<String>,
    },
    Tick,
}

#[derive(Debug, Clone, Default)]
struct RateValues {
    xp_hr: Option<i64>,
    actions_hr: Option<i64>,
    time_to_level: Option<String>,
}

#[derive(Debug, Default)]
struct FeedState {
    stats: HashMap<Skill, SkillStat>,
    rates: HashMap<Skill, RateValues>,
    player: Option<String>,
}

/// Host view backed by whatever the feed last reported.
///
/// Shared between the feed thread (writer) and the host-event thread (reader).
#[derive(Clone, Default)]
pub struct FeedHost {
    inner: Arc<RwLock<FeedState>>,
}

impl FeedHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, FeedState> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, FeedState> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records host values carried by `line` and returns the event the bridge
    /// should see, if any. Rates only update collaborator data.
    pub fn apply(&self, line: FeedLine, now: DateTime<Utc>) -> Option<HostEvent> {
        match line {
            FeedLine::Stat {
                skill,
                xp,
                level,
                boosted_level,
            } => {
                self.write().stats.insert(
                    skill,
                    SkillStat {
                        xp,
                        level,
                        boosted_level,
                    },
                );
                Some(HostEvent::Stat(StatChange {
                    skill,
                    xp,
                    level,
                    boosted_level,
                    observed_at: now,
                }))
            }
            FeedLine::Session { state, player } => {
                {
                    let mut guard = self.write();
                    match state {
                        SessionState::LoginScreen => guard.player = None,
                        _ => {
                            if player.is_some() {
                                guard.player = player;
                            }
                        }
                    }
                }
                Some(HostEvent::Session(state))
            }
            FeedLine::Rates {
                skill,
                xp_hr,
                actions_hr,
                time_to_level,
            } => {
                self.write().rates.insert(
                    skill,
                    RateValues {
                        xp_hr,
                        actions_hr,
                        time_to_level,
                    },
                );
                None
            }
            FeedLine::Tick => Some(HostEvent::tick_now()),
        }
    }
}

impl Host for FeedHost {
    fn stat(&self, skill: Skill) -> SkillStat {
        self.read().stats.get(&skill).copied().unwrap_or_default()
    }

    fn player_name(&self) -> Option<String> {
        self.read().player.clone()
    }
}

impl RateSource for FeedHost {
    fn xp_per_hour(&self, skill: Skill) -> Option<i64> {
        self.read().rates.get(&skill).and_then(|r| r.xp_hr)
    }

    fn actions_per_hour(&self, skill: Skill) -> Option<i64> {
        self.read().rates.get(&skill).and_then(|r| r.actions_hr)
    }

    fn time_to_next_tier(&self, skill: Skill) -> Option<String> {
        self.read()
            .rates
            .get(&skill)
            .and_then(|r| r.time_to_level.clone())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    pub lines: u64,
    pub forwarded: u64,
    pub skipped: u64,
}

/// Reads feed lines until EOF or until the event channel closes.
pub fn run_feed<R: BufRead>(reader: R, host: &FeedHost, event_tx: &Sender<HostEvent>) -> FeedSummary {
    let mut summary = FeedSummary::default();
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Host feed read failed: {}", e);
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        summary.lines += 1;
        let parsed: FeedLine = match serde_json::from_str(trimmed) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping malformed feed line ({}): {}", e, trimmed);
                summary.skipped += 1;
                continue;
            }
        };
        if let Some(event) = host.apply(parsed, Utc::now()) {
            if event_tx.send(event).is_err() {
                debug!("Host event channel closed; feed stopping");
                break;
            }
            summary.forwarded += 1;
        }
    }
    summary
}

/// Feeds `reader` on the `host-feed` thread. At EOF the daemon is asked to
/// shut down, since the host is gone.
pub fn spawn_feed<R>(
    threads: &ThreadRegistry,
    reader: R,
    host: FeedHost,
    event_tx: Sender<HostEvent>,
) -> Result<ThreadHandle>
where
    R: BufRead + Send + 'static,
{
    threads.spawn("host-feed", move || {
        info!("Host feed thread started");
        let summary = run_feed(reader, &host, &event_tx);
        info!(
            "Host feed ended (lines={}, forwarded={}, skipped={})",
            summary.lines, summary.forwarded, summary.skipped
        );
        let _ = event_tx.send(HostEvent::Shutdown);
    })
}

/// Emits a tick every `interval` on the `host-tick` thread until `stop_rx`
/// fires or the event channel closes.
pub fn spawn_ticker(
    threads: &ThreadRegistry,
    interval: Duration,
    event_tx: Sender<HostEvent>,
    stop_rx: Receiver<()>,
) -> Result<ThreadHandle> {
    threads.spawn("host-tick", move || {
        debug!("Host tick thread started ({:?})", interval);
        let ticker = crossbeam_channel::tick(interval);
        loop {
            crossbeam_channel::select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => {
                    if event_tx.send(HostEvent::tick_now()).is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Host tick thread exiting");
    })
}
