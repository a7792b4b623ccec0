use crate::daemon::transport::SnapshotSink;
use crate::util::logging::{debug, info, trace};
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Runtime;
use xpbridge_core::SkillSnapshot;

/// Fire-and-forget HTTP client for the display device.
///
/// Requests run on a private single-worker runtime and are never awaited by
/// the caller. Failures are logged at debug level and dropped.
pub struct PushClient {
    target: String,
    client: Client,
    runtime: Mutex<Option<Runtime>>,
    attempted: AtomicU64,
}

impl PushClient {
    pub fn new(target: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .context("build push HTTP client")?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("push-client")
            .enable_all()
            .build()
            .context("build push runtime")?;
        Ok(Self {
            target: target.into(),
            client,
            runtime: Mutex::new(Some(runtime)),
            attempted: AtomicU64::new(0),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Requests handed to the runtime so far.
    pub fn attempted(&self) -> u64 {
        self.attempted.load(Ordering::Relaxed)
    }

    /// Startup reachability check against `GET /`.
    pub fn probe(&self) {
        let url = format!("http://{}/", self.target);
        let request = self.client.get(&url);
        self.spawn(async move {
            match request.send().await {
                Ok(resp) => info!("Display reachable at {} ({})", url, resp.status()),
                Err(e) => debug!("Display probe to {} failed: {}", url, e),
            }
        });
    }

    fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let guard = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            Some(rt) => {
                self.attempted.fetch_add(1, Ordering::Relaxed);
                rt.spawn(fut);
            }
            None => trace!("Push client shut down; dropping request"),
        }
    }
}

impl SnapshotSink for PushClient {
    fn deliver(&self, snapshot: SkillSnapshot) {
        let url = format!("http://{}/update", self.target);
        let skill = snapshot.skill;
        let request = self.client.post(url).json(&snapshot);
        self.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    trace!("Pushed {} snapshot ({})", skill, resp.status())
                }
                Ok(resp) => debug!("Display rejected {} snapshot: {}", skill, resp.status()),
                Err(e) => debug!("Push of {} snapshot failed: {}", skill, e),
            }
        });
    }

    fn shutdown(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(rt) = runtime {
            debug!("Shutting down push client runtime");
            rt.shutdown_background();
        }
    }
}

impl Drop for PushClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xpbridge_core::Skill;

    fn sample() -> SkillSnapshot {
        SkillSnapshot {
            skill: Skill::Attack,
            xp: 1_154,
            level: 10,
            boosted_level: 10,
            xp_hr: 0,
            actions_hr: 0,
            xp_gained: 0,
            time_to_level: String::new(),
            progress_percent: 0.0,
        }
    }

    #[test]
    fn deliver_after_shutdown_is_dropped() {
        let client = PushClient::new("127.0.0.1:9", Duration::from_millis(200)).expect("client");
        client.deliver(sample());
        assert_eq!(client.attempted(), 1);

        client.shutdown();
        client.shutdown();
        client.deliver(sample());
        client.probe();
        assert_eq!(client.attempted(), 1);
    }

    #[test]
    fn unreachable_target_never_blocks_caller() {
        // TEST-NET-1 is not routable; the connect timeout bounds the background task.
        let client = PushClient::new("192.0.2.1:80", Duration::from_millis(100)).expect("client");
        let started = std::time::Instant::now();
        for _ in 0..20 {
            client.deliver(sample());
        }
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(client.target(), "192.0.2.1:80");
    }
}
