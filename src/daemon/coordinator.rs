use crate::daemon::bridge::{Bridge, Delivery, spawn_bridge};
use crate::daemon::events::HostEvent;
use crate::daemon::feed::{FeedHost, spawn_feed, spawn_ticker};
use crate::daemon::scheduler::PushScheduler;
use crate::daemon::server::http::PullServer;
use crate::daemon::transport::push::PushClient;
use crate::util::config::{AppConfig, DeliveryMode};
use crate::util::logging::{error, info, warn};
use crate::util::threading::ThreadRegistry;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::io::BufRead;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use xpbridge_core::{IgnoreSet, ProgressClamp, SnapshotCache};

/// Wires configuration, transports and the host-event threads together.
pub struct Coordinator {
    config: AppConfig,
    threads: ThreadRegistry,
    event_tx: Sender<HostEvent>,
    event_rx: Receiver<HostEvent>,
}

impl Coordinator {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        Self {
            config: config.clone(),
            threads: ThreadRegistry::new(),
            event_tx,
            event_rx,
        }
    }

    pub fn thread_registry(&self) -> ThreadRegistry {
        self.threads.clone()
    }

    /// Sender into the host-event queue, e.g. for a signal handler.
    pub fn event_sender(&self) -> Sender<HostEvent> {
        self.event_tx.clone()
    }

    /// Runs until a shutdown event arrives or the feed reaches EOF.
    pub fn run<R>(self, feed: R) -> Result<()>
    where
        R: BufRead + Send + 'static,
    {
        let Coordinator {
            config,
            threads,
            event_tx,
            event_rx,
        } = self;

        let ignore = IgnoreSet::from_names(config.ignored_names());
        if !ignore.is_empty() {
            info!("Ignoring {} skill(s)", ignore.len());
        }
        let host = FeedHost::new();

        let mut pull_server = None;
        let delivery = match config.mode {
            DeliveryMode::Push if config.target_address.trim().is_empty() => {
                warn!("Push mode without target_address; deliveries disabled");
                Delivery::Disabled
            }
            DeliveryMode::Push => {
                let client = PushClient::new(
                    config.target_address.trim(),
                    Duration::from_secs(config.request_timeout_secs),
                )
                .context("create push client")?;
                info!("Pushing snapshots to http://{}/update", client.target());
                client.probe();
                Delivery::push(
                    PushScheduler::new(Duration::from_millis(config.min_send_interval_ms)),
                    client,
                )
            }
            DeliveryMode::Pull => {
                let cache = Arc::new(SnapshotCache::new());
                let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.listen_port));
                match PullServer::start(
                    addr,
                    Arc::clone(&cache),
                    &threads,
                    config.status_refresh_secs,
                ) {
                    Ok(server) => pull_server = Some(server),
                    Err(e) => error!("Pull server unavailable, continuing without it: {:#}", e),
                }
                Delivery::pull(cache)
            }
        };

        let bridge = Bridge::new(
            Arc::new(host.clone()),
            Arc::new(host.clone()),
            ignore,
            ProgressClamp::from(config.clamp_progress),
            delivery,
        );
        let bridge_handle = spawn_bridge(&threads, bridge, event_rx)?;

        let (tick_stop_tx, tick_stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker_handle = if config.tick_interval_ms > 0 {
            Some(spawn_ticker(
                &threads,
                Duration::from_millis(config.tick_interval_ms),
                event_tx.clone(),
                tick_stop_rx,
            )?)
        } else {
            info!("Internal ticker disabled; relying on feed ticks");
            None
        };

        // Not joined: a blocked read on stdin cannot be interrupted.
        let _feed_handle = spawn_feed(&threads, feed, host, event_tx)?;

        if bridge_handle.join().is_err() {
            error!("Host event thread panicked");
        }

        let _ = tick_stop_tx.send(());
        if let Some(handle) = ticker_handle {
            if handle.join().is_err() {
                error!("Host tick thread panicked");
            }
        }
        if let Some(mut server) = pull_server {
            server.stop();
        }

        info!(
            "Shutdown complete ({} thread(s) still detached)",
            threads.active_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::threading::ThreadStatus;
    use std::io::{BufReader, Cursor};
    use std::os::unix::net::UnixStream;

    fn config(mode: DeliveryMode) -> AppConfig {
        AppConfig {
            mode,
            listen_port: 0,
            tick_interval_ms: 5,
            ..AppConfig::default()
        }
    }

    #[test]
    fn push_without_target_runs_feed_to_completion() {
        let coordinator = Coordinator::from_app_config(&config(DeliveryMode::Push));
        let threads = coordinator.thread_registry();
        let feed = Cursor::new(
            "{\"type\":\"session\",\"state\":\"logged_in\"}\n{\"type\":\"stat\",\"skill\":\"Attack\",\"xp\":100,\"level\":2,\"boosted_level\":2}\n",
        );
        coordinator.run(feed).expect("run");
        let states = threads.snapshot();
        let bridge = states
            .iter()
            .find(|t| t.name == "host-events")
            .expect("bridge thread registered");
        assert_eq!(bridge.status, ThreadStatus::Joined);
    }

    #[test]
    fn pull_mode_stops_server_on_shutdown() {
        let coordinator = Coordinator::from_app_config(&config(DeliveryMode::Pull));
        let threads = coordinator.thread_registry();
        coordinator
            .run(Cursor::new("{\"type\":\"tick\"}\n"))
            .expect("run");
        let server = threads
            .snapshot()
            .into_iter()
            .find(|t| t.name == "pull-server")
            .expect("pull server registered");
        assert_eq!(server.status, ThreadStatus::Joined);
    }

    #[test]
    fn pull_mode_keeps_running_when_port_is_taken() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).expect("hold port");
        let mut cfg = config(DeliveryMode::Pull);
        cfg.listen_port = taken.local_addr().expect("held addr").port();

        let coordinator = Coordinator::from_app_config(&cfg);
        let threads = coordinator.thread_registry();
        let feed = Cursor::new(concat!(
            "{\"type\":\"session\",\"state\":\"logged_in\"}\n",
            "{\"type\":\"stat\",\"skill\":\"Attack\",\"xp\":100,\"level\":2,\"boosted_level\":2}\n",
            "{\"type\":\"tick\"}\n",
        ));
        coordinator.run(feed).expect("run without a pull server");

        let states = threads.snapshot();
        assert!(states.iter().all(|t| t.name != "pull-server"));
        let bridge = states
            .iter()
            .find(|t| t.name == "host-events")
            .expect("bridge thread registered");
        assert_eq!(bridge.status, ThreadStatus::Joined);
    }

    #[test]
    fn shutdown_sender_stops_run() {
        let mut cfg = config(DeliveryMode::Push);
        cfg.tick_interval_ms = 0;
        let coordinator = Coordinator::from_app_config(&cfg);
        let tx = coordinator.event_sender();
        tx.send(HostEvent::Shutdown).expect("queue shutdown");
        // A reader that never reaches EOF on its own.
        let (_keep_open, reader) = blocking_reader();
        coordinator.run(reader).expect("run");
    }

    fn blocking_reader() -> (UnixStream, BufReader<UnixStream>) {
        let (a, b) = UnixStream::pair().expect("socket pair");
        (a, BufReader::new(b))
    }
}
