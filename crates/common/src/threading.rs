use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Running,
    Joined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEntry {
    pub name: String,
    pub status: ThreadStatus,
}

#[derive(Default)]
struct ThreadRegistryInner {
    next_id: AtomicUsize,
    threads: Mutex<HashMap<usize, ThreadEntry>>,
}

/// Names every long-lived thread the bridge starts so shutdown can tell
/// which ones are still alive.
#[derive(Clone, Default)]
pub struct ThreadRegistry {
    inner: Arc<ThreadRegistryInner>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: impl Into<String>, f: F) -> Result<ThreadHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let join_handle = thread::Builder::new()
            .name(name.clone())
            .spawn(f)
            .map_err(|e| anyhow!("failed to spawn thread '{name}': {e}"))?;

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(
            id,
            ThreadEntry {
                name: name.clone(),
                status: ThreadStatus::Running,
            },
        );

        Ok(ThreadHandle {
            name,
            id,
            handle: Some(join_handle),
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn snapshot(&self) -> Vec<ThreadEntry> {
        let mut entries: Vec<ThreadEntry> = self.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|entry| entry.status == ThreadStatus::Running)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<usize, ThreadEntry>> {
        self.inner
            .threads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct ThreadHandle {
    name: String,
    id: usize,
    handle: Option<JoinHandle<()>>,
    inner: Arc<ThreadRegistryInner>,
}

impl ThreadHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    pub fn join(mut self) -> thread::Result<()> {
        let result = match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        };
        self.mark_joined();
        result
    }

    fn mark_joined(&self) {
        let mut threads = self
            .inner
            .threads
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = threads.get_mut(&self.id) {
            entry.status = ThreadStatus::Joined;
        }
    }
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        // Dropping the JoinHandle detaches the thread; only joined threads change status.
        if self.handle.is_none() {
            self.mark_joined();
        }
    }
}
