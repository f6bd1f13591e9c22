//! Per-user personalization signals: decayed feedback, view counters and a
//! free-form preference bag, optionally mirrored to a [`SignalBackend`].

use crate::book::Book;
use crate::persist::SignalBackend;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use ulid::Ulid;

/// Weight kept from the previous feedback value on each new rating.
pub const FEEDBACK_DECAY: f64 = 0.85;
/// Stored feedback is clamped to `[-FEEDBACK_BOUND, FEEDBACK_BOUND]`.
pub const FEEDBACK_BOUND: f64 = 2.0;
pub const SNAPSHOT_VERSION: &str = "2.1";

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("rating must be a number between -1 and 1, got {rating}")]
    InvalidRating { rating: f64 },
    #[error("signal key must not be empty")]
    EmptyKey,
    #[error("malformed signal snapshot")]
    MalformedSnapshot {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode signal data")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

/// Outcome of mirroring a mutation to the backend. Failures are soft: the
/// in-memory state is already updated and stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved,
    NoBackend,
    Failed(String),
}

impl SaveStatus {
    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Which book attribute keys the feedback and view maps.
///
/// `Title` merges signal across same-titled editions and matches snapshots
/// written by older clients; `Id` keeps editions apart. A book without an id
/// falls back to its title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKey {
    #[default]
    Title,
    Id,
}

impl SignalKey {
    pub fn key_for<'a>(&self, book: &'a Book) -> &'a str {
        match self {
            Self::Id if !book.id.is_empty() => &book.id,
            _ => &book.title,
        }
    }
}

/// Stable per-device user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    /// `user_<unix millis>_<random suffix>`.
    pub fn generate() -> Self {
        let suffix: String = Ulid::new().to_string().to_lowercase().chars().skip(17).collect();
        Self(format!("user_{}_{}", now_millis(), suffix))
    }

    /// Read the id stored at `path`, creating and persisting a new one when
    /// the file is missing or empty.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if let Ok(existing) = std::fs::read_to_string(path) {
            let trimmed = existing.trim();
            if !trimmed.is_empty() {
                return Ok(Self(trimmed.to_string()));
            }
        }
        let id = Self::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &id.0)?;
        tracing::info!(user_id = %id, "created user id");
        Ok(id)
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Export/import shape shared with every persistence backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignalSnapshot {
    #[serde(deserialize_with = "null_as_empty")]
    pub feedback: BTreeMap<String, f64>,
    #[serde(deserialize_with = "null_as_empty")]
    pub view_history: BTreeMap<String, u64>,
    #[serde(deserialize_with = "null_as_empty")]
    pub preferences: Map<String, Value>,
    pub user_id: Option<String>,
    /// Unix milliseconds at export.
    pub timestamp: Option<i64>,
    pub version: Option<String>,
}

/// An explicit `null` map reads as an empty one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalStats {
    pub feedback_entries: usize,
    pub view_history: usize,
    pub preferences: usize,
    pub user_id: String,
    pub total_views: u64,
}

pub struct SignalStore {
    user_id: UserId,
    feedback: BTreeMap<String, f64>,
    views: BTreeMap<String, u64>,
    preferences: Map<String, Value>,
    backend: Option<Box<dyn SignalBackend>>,
    revision: u64,
}

impl fmt::Debug for SignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalStore")
            .field("user_id", &self.user_id)
            .field("feedback", &self.feedback.len())
            .field("views", &self.views.len())
            .field("preferences", &self.preferences.len())
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("revision", &self.revision)
            .finish()
    }
}

impl SignalStore {
    /// In-memory store; nothing is persisted.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            feedback: BTreeMap::new(),
            views: BTreeMap::new(),
            preferences: Map::new(),
            backend: None,
            revision: 0,
        }
    }

    pub fn with_backend(user_id: UserId, backend: Box<dyn SignalBackend>) -> Self {
        Self { backend: Some(backend), ..Self::new(user_id) }
    }

    pub fn user_id(&self) -> &UserId { &self.user_id }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 { self.revision }

    /// Replace in-memory state with the persisted snapshot, if any.
    ///
    /// Returns `Ok(false)` when nothing is stored. On error the current state
    /// is left untouched so callers can keep recommending with it.
    pub fn load(&mut self) -> Result<bool, SignalError> {
        let Some(backend) = self.backend.as_ref() else { return Ok(false) };
        match backend.load(self.user_id.as_str()) {
            Ok(Some(snapshot)) => {
                self.adopt(snapshot);
                tracing::info!(
                    feedback = self.feedback.len(),
                    views = self.views.len(),
                    preferences = self.preferences.len(),
                    "signals loaded"
                );
                Ok(true)
            }
            Ok(None) => {
                tracing::info!(user_id = %self.user_id, "no stored signals, starting empty");
                Ok(false)
            }
            Err(err) => {
                tracing::warn!(error = %err, backend = backend.name(), "failed to load signals");
                Err(SignalError::Persistence(err))
            }
        }
    }

    /// Write the current state to the backend.
    pub fn save(&self) -> SaveStatus {
        let Some(backend) = self.backend.as_ref() else { return SaveStatus::NoBackend };
        match backend.save(self.user_id.as_str(), &self.export_all()) {
            Ok(()) => SaveStatus::Saved,
            Err(err) => {
                tracing::warn!(error = %err, backend = backend.name(), "failed to save signals");
                SaveStatus::Failed(err.to_string())
            }
        }
    }

    /// Pull the persisted state, then push it back so every mirror agrees.
    pub fn sync(&mut self) -> SaveStatus {
        if let Err(err) = self.load() {
            return SaveStatus::Failed(err.to_string());
        }
        self.save()
    }

    pub fn record_view(&mut self, key: &str) -> SaveStatus {
        *self.views.entry(key.to_string()).or_insert(0) += 1;
        self.touch();
        self.save()
    }

    /// Fold `rating` into the stored value: `new = old * 0.85 + rating`,
    /// clamped to `[-2, 2]`. Ratings outside `[-1, 1]` are rejected and leave
    /// the store unchanged.
    pub fn record_feedback(&mut self, key: &str, rating: f64) -> Result<SaveStatus, SignalError> {
        if key.trim().is_empty() {
            return Err(SignalError::EmptyKey);
        }
        if !rating.is_finite() || !(-1.0..=1.0).contains(&rating) {
            return Err(SignalError::InvalidRating { rating });
        }
        let entry = self.feedback.entry(key.to_string()).or_insert(0.0);
        *entry = (*entry * FEEDBACK_DECAY + rating).clamp(-FEEDBACK_BOUND, FEEDBACK_BOUND);
        tracing::info!(key, value = *entry, "feedback updated");
        self.touch();
        Ok(self.save())
    }

    pub fn feedback(&self, key: &str) -> f64 { self.feedback.get(key).copied().unwrap_or(0.0) }

    pub fn views(&self, key: &str) -> u64 { self.views.get(key).copied().unwrap_or(0) }

    pub fn feedback_entries(&self) -> impl Iterator<Item = (&str, f64)> {
        self.feedback.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn view_entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.views.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn preference(&self, key: &str) -> Option<&Value> { self.preferences.get(key) }

    pub fn preference_or(&self, key: &str, default: Value) -> Value {
        self.preferences.get(key).cloned().unwrap_or(default)
    }

    pub fn set_preference(&mut self, key: &str, value: Value) -> Result<SaveStatus, SignalError> {
        if key.trim().is_empty() {
            return Err(SignalError::EmptyKey);
        }
        self.preferences.insert(key.to_string(), value);
        tracing::debug!(key, "preference saved");
        self.touch();
        Ok(self.save())
    }

    pub fn remove_preference(&mut self, key: &str) -> SaveStatus {
        if self.preferences.remove(key).is_some() {
            tracing::debug!(key, "preference removed");
            self.touch();
        }
        self.save()
    }

    pub fn export_all(&self) -> SignalSnapshot {
        SignalSnapshot {
            feedback: self.feedback.clone(),
            view_history: self.views.clone(),
            preferences: self.preferences.clone(),
            user_id: Some(self.user_id.to_string()),
            timestamp: Some(now_millis()),
            version: Some(SNAPSHOT_VERSION.to_string()),
        }
    }

    /// Replace all three maps with the snapshot's; missing maps become empty.
    pub fn import_all(&mut self, snapshot: SignalSnapshot) -> SaveStatus {
        self.adopt(snapshot);
        tracing::info!(feedback = self.feedback.len(), views = self.views.len(), "signals imported");
        self.save()
    }

    /// Parse and import a JSON snapshot. A snapshot that fails to parse is
    /// rejected as a whole and the current state is kept.
    pub fn import_json(&mut self, json: &str) -> Result<SaveStatus, SignalError> {
        let snapshot: SignalSnapshot =
            serde_json::from_str(json).map_err(|source| SignalError::MalformedSnapshot { source })?;
        Ok(self.import_all(snapshot))
    }

    /// Clear every map and delete the persisted snapshot.
    pub fn reset(&mut self) -> SaveStatus {
        self.feedback.clear();
        self.views.clear();
        self.preferences.clear();
        self.touch();
        tracing::info!(user_id = %self.user_id, "signals reset");
        let Some(backend) = self.backend.as_ref() else { return SaveStatus::NoBackend };
        match backend.remove(self.user_id.as_str()) {
            Ok(()) => SaveStatus::Saved,
            Err(err) => {
                tracing::warn!(error = %err, "failed to remove persisted signals");
                SaveStatus::Failed(err.to_string())
            }
        }
    }

    pub fn stats(&self) -> SignalStats {
        SignalStats {
            feedback_entries: self.feedback.len(),
            view_history: self.views.len(),
            preferences: self.preferences.len(),
            user_id: self.user_id.to_string(),
            total_views: self.views.values().sum(),
        }
    }

    fn adopt(&mut self, snapshot: SignalSnapshot) {
        self.feedback = snapshot
            .feedback
            .into_iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| (k, v.clamp(-FEEDBACK_BOUND, FEEDBACK_BOUND)))
            .collect();
        self.views = snapshot.view_history;
        self.preferences = snapshot.preferences;
        self.touch();
    }

    fn touch(&mut self) { self.revision = self.revision.wrapping_add(1); }
}

pub(crate) fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}
