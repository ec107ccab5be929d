//! Named-Job Scheduler
//!
//! Generic delayed/repeating task primitive. Jobs are identified by a
//! caller-supplied key and can be looked up and cancelled by that key.
//!
//! Two invariants matter for the membership gate built on top:
//!
//! - Dequeue-for-execution is atomic with respect to cancellation: `due`
//!   removes (or re-arms) entries under the same lock `cancel` takes, so a
//!   single occurrence can either fire or be cancelled, never both.
//! - Scheduling under a key already in use does NOT remove the prior job.
//!   Callers that want exactly one live job per key must cancel first,
//!   otherwise duplicate timers leak.
//!
//! Execution happens in the caller's event loop: it drains `due` entries and
//! dispatches their payloads, isolating and logging per-job failures so one
//! bad payload never takes down sibling jobs or the loop itself.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Opaque handle for a single scheduled occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

/// When a job should fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    /// Fire once after the delay, then forget the job.
    Once(Duration),
    /// Fire after `first`, then re-arm every `interval`.
    Every { first: Duration, interval: Duration },
}

struct Entry<K, P> {
    id: JobId,
    key: K,
    due: Instant,
    repeat: Option<Duration>,
    payload: P,
}

struct Inner<K, P> {
    next_id: u64,
    entries: Vec<Entry<K, P>>,
}

/// Cloneable scheduler handle; clones share the same job table.
pub struct JobScheduler<K, P> {
    inner: Arc<Mutex<Inner<K, P>>>,
}

impl<K, P> Clone for JobScheduler<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, P> Default for JobScheduler<K, P>
where
    K: PartialEq + Clone + fmt::Debug + Send + 'static,
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, P> JobScheduler<K, P>
where
    K: PartialEq + Clone + fmt::Debug + Send + 'static,
    P: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Schedule a job under `key`. Existing jobs under the same key are left
    /// alone; cancel first if only one may be live.
    pub fn schedule(&self, key: K, when: When, payload: P) -> JobId {
        let (delay, repeat) = match when {
            When::Once(delay) => (delay, None),
            When::Every { first, interval } => (first, Some(interval)),
        };
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = JobId(inner.next_id);
        debug!(job = ?key, ?delay, repeating = repeat.is_some(), "job scheduled");
        inner.entries.push(Entry {
            id,
            key,
            due: Instant::now() + delay,
            repeat,
            payload,
        });
        id
    }

    /// Remove every job under `key`. True iff at least one existed.
    pub fn cancel(&self, key: &K) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.key != *key);
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(job = ?key, removed, "job cancelled");
        }
        removed > 0
    }

    /// Atomically take every job due at `now`. One-shot jobs are removed,
    /// repeating jobs re-armed, all under the lock; a concurrent `cancel`
    /// either sees the occurrence gone or prevents it from firing.
    pub fn due(&self, now: Instant) -> Vec<(JobId, K, P)> {
        let mut inner = self.inner.lock().unwrap();
        let mut fired = Vec::new();
        let mut remaining = Vec::with_capacity(inner.entries.len());
        for mut entry in std::mem::take(&mut inner.entries) {
            if entry.due > now {
                remaining.push(entry);
                continue;
            }
            fired.push((entry.id, entry.key.clone(), entry.payload.clone()));
            if let Some(interval) = entry.repeat {
                entry.due = now + interval;
                remaining.push(entry);
            }
        }
        inner.entries = remaining;
        fired
    }

    /// Earliest deadline across all pending jobs.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.due)
            .min()
    }

    /// Number of pending jobs under `key`.
    pub fn pending(&self, key: &K) -> usize {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.key == *key)
            .count()
    }

    /// Total pending jobs.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().entries.is_empty()
    }
}
