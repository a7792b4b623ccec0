use crate::daemon::events::{HostEvent, HostListener, SessionState, StatChange};
use crate::daemon::scheduler::PushScheduler;
use crate::daemon::transport::SnapshotSink;
use crate::util::logging::{debug, info, trace};
use crate::util::threading::{ThreadHandle, ThreadRegistry};
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Instant;
use xpbridge_core::{
    ExperienceTable, GainKind, Host, IgnoreSet, ProgressClamp, RateSource, SnapshotBuilder,
    SessionSnapshot, SnapshotCache, StateStore, TierTable, classify,
};

/// Where computed snapshots go.
pub enum Delivery {
    Push {
        scheduler: PushScheduler,
        sink: Box<dyn SnapshotSink>,
    },
    Pull {
        cache: Arc<SnapshotCache>,
    },
    /// Push mode with no target configured.
    Disabled,
}

impl Delivery {
    pub fn push(scheduler: PushScheduler, sink: impl SnapshotSink + 'static) -> Self {
        Delivery::Push {
            scheduler,
            sink: Box::new(sink),
        }
    }

    pub fn pull(cache: Arc<SnapshotCache>) -> Self {
        Delivery::Pull { cache }
    }
}

/// Counters for the host-event thread; logged at exit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeCounts {
    pub stats_seen: u64,
    pub genuine_gains: u64,
    pub pushes: u64,
    pub rebuilds: u64,
    pub resets: u64,
}

/// Owns all session state and turns host callbacks into deliveries.
pub struct Bridge {
    store: StateStore,
    ignore: IgnoreSet,
    logged_in: bool,
    host: Arc<dyn Host>,
    rates: Arc<dyn RateSource>,
    tiers: Box<dyn TierTable>,
    clamp: ProgressClamp,
    delivery: Delivery,
    counts: BridgeCounts,
}

impl Bridge {
    pub fn new(
        host: Arc<dyn Host>,
        rates: Arc<dyn RateSource>,
        ignore: IgnoreSet,
        clamp: ProgressClamp,
        delivery: Delivery,
    ) -> Self {
        Self {
            store: StateStore::new(),
            ignore,
            logged_in: false,
            host,
            rates,
            tiers: Box::new(ExperienceTable::new()),
            clamp,
            delivery,
            counts: BridgeCounts::default(),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn counts(&self) -> BridgeCounts {
        self.counts
    }

    /// Returns false once the loop should stop.
    pub fn handle(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::Stat(change) => self.on_category_changed(change),
            HostEvent::Session(state) => self.on_session_state_changed(state),
            HostEvent::Tick { mono, wall } => self.on_tick(mono, wall),
            HostEvent::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    pub fn shutdown(&mut self) {
        if let Delivery::Push { sink, .. } = &self.delivery {
            sink.shutdown();
        }
    }

    /// Rebuilds pause while unauthenticated, so the last cached snapshot
    /// would otherwise keep reporting an active session.
    fn mark_cached_logged_out(&self) {
        if let Delivery::Pull { cache } = &self.delivery {
            if let Some(current) = cache.current() {
                cache.publish(SessionSnapshot {
                    logged_in: false,
                    ..(*current).clone()
                });
            }
        }
    }

    fn reset_session(&mut self) {
        self.store.reset();
        self.counts.resets += 1;
        match &mut self.delivery {
            Delivery::Push { scheduler, .. } => scheduler.reset(),
            Delivery::Pull { cache } => cache.clear(),
            Delivery::Disabled => {}
        }
    }
}

impl HostListener for Bridge {
    fn on_category_changed(&mut self, change: StatChange) {
        if !self.ignore.admits(change.skill) {
            trace!("Skipping {} (ignored or aggregate)", change.skill);
            return;
        }
        self.counts.stats_seen += 1;
        let kind = classify(&mut self.store, change.skill, change.xp, change.observed_at);
        trace!(
            "{} -> {} (level {}, boosted {}) classified as {:?}",
            change.skill, change.xp, change.level, change.boosted_level, kind
        );
        if !kind.is_genuine() {
            return;
        }
        self.counts.genuine_gains += 1;
        if kind == GainKind::First {
            debug!("Tracking {} from baseline {}", change.skill, change.xp);
        }
        if let Delivery::Push { scheduler, .. } = &mut self.delivery {
            scheduler.on_gain(change.skill);
        }
    }

    fn on_session_state_changed(&mut self, state: SessionState) {
        debug!("Session state changed to {:?}", state);
        let was_logged_in = self.logged_in;
        self.logged_in = state.is_authenticated();
        if state == SessionState::LoginScreen {
            info!("Login screen reached; resetting session tracking");
            self.reset_session();
        } else if was_logged_in && !self.logged_in {
            self.mark_cached_logged_out();
        }
    }

    fn on_tick(&mut self, mono: Instant, wall: DateTime<Utc>) {
        let builder = SnapshotBuilder::new(
            self.host.as_ref(),
            self.rates.as_ref(),
            self.tiers.as_ref(),
            self.clamp,
        );
        match &mut self.delivery {
            Delivery::Push { scheduler, sink } => {
                let Some(skill) = scheduler.poll(mono, self.store.active()) else {
                    return;
                };
                sink.deliver(builder.skill(&self.store, skill));
                self.counts.pushes += 1;
            }
            Delivery::Pull { cache } => {
                if !self.logged_in {
                    return;
                }
                cache.publish(builder.session(&self.store, &self.ignore, true, wall));
                self.counts.rebuilds += 1;
            }
            Delivery::Disabled => {}
        }
    }
}

/// Runs the bridge on the `host-events` thread until shutdown or until every
/// sender is gone.
pub fn spawn_bridge(
    threads: &ThreadRegistry,
    mut bridge: Bridge,
    event_rx: Receiver<HostEvent>,
) -> Result<ThreadHandle> {
    threads.spawn("host-events", move || {
        info!("Host event thread started");
        loop {
            match event_rx.recv() {
                Ok(event) => {
                    if !bridge.handle(event) {
                        info!("Host event thread received shutdown");
                        break;
                    }
                }
                Err(_) => {
                    info!("Host event source disconnected; stopping");
                    bridge.shutdown();
                    break;
                }
            }
        }
        let counts = bridge.counts();
        info!(
            "Host event thread exiting (stats={}, gains={}, pushes={}, rebuilds={}, resets={})",
            counts.stats_seen, counts.genuine_gains, counts.pushes, counts.rebuilds, counts.resets
        );
    })
}
