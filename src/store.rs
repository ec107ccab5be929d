//! Persisted per-chat and per-user state.
//!
//! Everything the bot must remember across restarts lives here: display
//! names, the reverse handle map used by admin commands, welcome/warn
//! message ids, the pinned announcement id, the event cache snapshot, and
//! which users still owe an introduction. The whole table is checkpointed
//! to a JSON snapshot (atomic temp-file rename) after every mutation.
//!
//! Scheduled jobs are NOT part of the snapshot: a pending warn/kick timer
//! does not survive a restart unless reconstructed by the deployment. Known
//! gap, deliberately not papered over here.

use crate::announce::events::CacheSnapshot;
use crate::chat::{ChatId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Which ephemeral gate message a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Welcome,
    Warn,
}

/// Store errors (snapshot load only; checkpoint failures are logged).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt state snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ChatState {
    /// Display names recorded at join time.
    names: HashMap<UserId, String>,
    /// Reverse handle map: `@handle` -> user id.
    handles: HashMap<String, UserId>,
    welcome_messages: HashMap<UserId, MessageId>,
    warn_messages: HashMap<UserId, MessageId>,
    /// Pinned announcement, if one was ever published.
    announcement: Option<MessageId>,
    cache: Option<CacheSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedState {
    chats: HashMap<ChatId, ChatState>,
    /// Users who joined and have not yet introduced themselves.
    pending: HashSet<UserId>,
}

/// Cloneable handle to the persisted state table.
#[derive(Clone)]
pub struct StateStore {
    path: Option<PathBuf>,
    state: Arc<Mutex<PersistedState>>,
}

fn normalize_handle(handle: &str) -> String {
    if handle.starts_with('@') {
        handle.to_string()
    } else {
        format!("@{handle}")
    }
}

impl StateStore {
    /// Volatile store for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(Mutex::new(PersistedState::default())),
        }
    }

    /// Open a snapshot-backed store, loading existing state if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            PersistedState::default()
        };
        Ok(Self {
            path: Some(path),
            state: Arc::new(Mutex::new(state)),
        })
    }

    /// Serialize the table next to the snapshot and rename into place.
    /// Failure is logged, never propagated: losing one checkpoint is
    /// recoverable, crashing the handler that mutated state is not.
    fn checkpoint(&self, state: &PersistedState) {
        let Some(path) = &self.path else { return };
        if let Err(e) = write_snapshot(path, state) {
            warn!(path = %path.display(), error = %e, "state checkpoint failed");
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut PersistedState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        let result = f(&mut state);
        self.checkpoint(&state);
        result
    }

    fn read<R>(&self, f: impl FnOnce(&PersistedState) -> R) -> R {
        f(&self.state.lock().unwrap())
    }

    // --- membership bookkeeping ---

    /// Record a joining member's display name and reverse handle mapping.
    pub fn record_member(&self, chat: ChatId, user: UserId, name: &str, handle: Option<&str>) {
        self.mutate(|state| {
            let entry = state.chats.entry(chat).or_default();
            entry.names.insert(user, name.to_string());
            if let Some(handle) = handle {
                entry.handles.insert(normalize_handle(handle), user);
            }
        });
    }

    pub fn display_name(&self, chat: ChatId, user: UserId) -> Option<String> {
        self.read(|state| state.chats.get(&chat)?.names.get(&user).cloned())
    }

    /// Resolve `@handle` (leading `@` optional) to the id recorded at join.
    pub fn resolve_handle(&self, chat: ChatId, handle: &str) -> Option<UserId> {
        let handle = normalize_handle(handle);
        self.read(|state| state.chats.get(&chat)?.handles.get(&handle).copied())
    }

    /// Drop every trace of a member: name, handle mapping, pending flag.
    pub fn forget_member(&self, chat: ChatId, user: UserId) {
        self.mutate(|state| {
            if let Some(entry) = state.chats.get_mut(&chat) {
                entry.names.remove(&user);
                entry.handles.retain(|_, id| *id != user);
            }
            state.pending.remove(&user);
        });
    }

    pub fn mark_pending(&self, user: UserId) {
        self.mutate(|state| {
            state.pending.insert(user);
        });
    }

    pub fn is_pending(&self, user: UserId) -> bool {
        self.read(|state| state.pending.contains(&user))
    }

    pub fn clear_pending(&self, user: UserId) {
        self.mutate(|state| {
            state.pending.remove(&user);
        });
    }

    // --- ephemeral gate messages ---

    pub fn set_gate_message(&self, chat: ChatId, kind: MessageKind, user: UserId, id: MessageId) {
        self.mutate(|state| {
            let entry = state.chats.entry(chat).or_default();
            match kind {
                MessageKind::Welcome => entry.welcome_messages.insert(user, id),
                MessageKind::Warn => entry.warn_messages.insert(user, id),
            };
        });
    }

    /// Consume a recorded gate message id; the ref never outlives cleanup.
    pub fn take_gate_message(
        &self,
        chat: ChatId,
        kind: MessageKind,
        user: UserId,
    ) -> Option<MessageId> {
        self.mutate(|state| {
            let entry = state.chats.get_mut(&chat)?;
            match kind {
                MessageKind::Welcome => entry.welcome_messages.remove(&user),
                MessageKind::Warn => entry.warn_messages.remove(&user),
            }
        })
    }

    // --- announcements ---

    pub fn pinned_announcement(&self, chat: ChatId) -> Option<MessageId> {
        self.read(|state| state.chats.get(&chat)?.announcement)
    }

    pub fn set_pinned_announcement(&self, chat: ChatId, id: MessageId) {
        self.mutate(|state| {
            state.chats.entry(chat).or_default().announcement = Some(id);
        });
    }

    pub fn cache_snapshot(&self, chat: ChatId) -> Option<CacheSnapshot> {
        self.read(|state| state.chats.get(&chat)?.cache.clone())
    }

    /// Replace the cached event list atomically (single locked write).
    pub fn replace_cache(&self, chat: ChatId, snapshot: CacheSnapshot) {
        self.mutate(|state| {
            state.chats.entry(chat).or_default().cache = Some(snapshot);
        });
    }

    pub fn clear_cache(&self, chat: ChatId) {
        self.mutate(|state| {
            if let Some(entry) = state.chats.get_mut(&chat) {
                entry.cache = None;
            }
        });
    }
}

fn write_snapshot(path: &Path, state: &PersistedState) -> Result<(), StoreError> {
    let raw = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp, raw)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
