//! Namespaced local cache holding one [`CacheRecord`] per identity.
//!
//! Persistence failures never escape this module: writes report `false` and reads
//! report an absent record, so callers keep whatever they already hold in memory.

mod file;
mod memory;

use std::{fmt, sync::Arc};

use tracing::{error, warn};

use crate::dao::{
    models::{CachePatch, CacheRecord, Participant, Program, ProgramDraft},
    storage::StorageResult,
};

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

/// Prefix shared by every per-identity cache key.
pub const NAMESPACE_PREFIX: &str = "userData_";

/// Raw key/value persistence the cache writes through to.
pub trait RecordStore: Send + Sync {
    /// Record stored under `key`, if any.
    fn read(&self, key: &str) -> StorageResult<Option<CacheRecord>>;
    /// Replace the record stored under `key`.
    fn write(&self, key: &str, record: &CacheRecord) -> StorageResult<()>;
    /// Delete the record stored under `key`; absent keys are not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Partition key under which one identity's record lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Derive the namespace for an opaque identity.
    pub fn for_identity(identity: &str) -> Self {
        Self(format!("{NAMESPACE_PREFIX}{identity}"))
    }

    /// Storage key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Profile fields stored alongside the programs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedProfile {
    /// Backend id of the profile.
    pub profile_id: Option<String>,
    /// Profile display name.
    pub user_name: Option<String>,
}

/// Room the identity last entered, and the participant identity it used there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedRoom {
    /// Backend id of the room.
    pub room_id: Option<String>,
    /// Participant id assigned on join.
    pub user_id: Option<String>,
    /// Display name used in the room; may differ from the profile name.
    pub user_name: Option<String>,
    /// Study field used in the room.
    pub study_field: Option<String>,
}

/// Cache facade over an injectable [`RecordStore`].
#[derive(Clone)]
pub struct CacheStore {
    records: Arc<dyn RecordStore>,
}

impl CacheStore {
    /// Cache writing through to `records`.
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// In-memory cache, used when no durable location is configured.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRecordStore::new()))
    }

    /// Current record for `identity`, or `None` when absent or unreadable.
    pub fn get(&self, identity: &str) -> Option<CacheRecord> {
        let namespace = Namespace::for_identity(identity);
        match self.records.read(namespace.as_str()) {
            Ok(record) => record,
            Err(err) => {
                error!(namespace = %namespace, error = %err, "failed to read cached record");
                None
            }
        }
    }

    /// Shallow merge `patch` into the stored record, creating it when missing.
    ///
    /// Returns `false` when the write could not be made durable. The previous
    /// in-memory state of the caller stays valid in that case.
    pub fn merge(&self, identity: &str, patch: CachePatch) -> bool {
        let namespace = Namespace::for_identity(identity);
        let mut record = match self.records.read(namespace.as_str()) {
            Ok(existing) => existing.unwrap_or_default(),
            Err(err) => {
                // An unreadable record must not be silently replaced by a partial one.
                error!(namespace = %namespace, error = %err, "failed to read record before merge");
                return false;
            }
        };

        record.apply(patch);

        match self.records.write(namespace.as_str(), &record) {
            Ok(()) => true,
            Err(err) => {
                error!(namespace = %namespace, error = %err, "failed to write cached record");
                false
            }
        }
    }

    /// Drop the record for `identity` entirely (logout).
    pub fn clear(&self, identity: &str) {
        let namespace = Namespace::for_identity(identity);
        if let Err(err) = self.records.remove(namespace.as_str()) {
            warn!(namespace = %namespace, error = %err, "failed to clear cached record");
        }
    }

    /// Cached programs, empty when nothing is stored.
    pub fn programs(&self, identity: &str) -> Vec<Program> {
        self.get(identity)
            .map(|record| record.programs)
            .unwrap_or_default()
    }

    /// Replace the cached program list.
    pub fn save_programs(&self, identity: &str, programs: Vec<Program>) -> bool {
        self.merge(
            identity,
            CachePatch {
                programs: Some(programs),
                ..CachePatch::default()
            },
        )
    }

    /// Cached profile fields.
    pub fn profile(&self, identity: &str) -> CachedProfile {
        self.get(identity)
            .map(|record| CachedProfile {
                profile_id: record.profile_id,
                user_name: record.user_name,
            })
            .unwrap_or_default()
    }

    /// Store the profile id and display name.
    pub fn save_profile(&self, identity: &str, profile_id: &str, user_name: &str) -> bool {
        self.merge(
            identity,
            CachePatch {
                profile_id: Some(profile_id.to_owned()),
                user_name: Some(user_name.to_owned()),
                ..CachePatch::default()
            },
        )
    }

    /// Room last entered and the participant identity used there.
    pub fn room(&self, identity: &str) -> CachedRoom {
        self.get(identity)
            .map(|record| CachedRoom {
                room_id: record.current_room_id,
                user_id: record.current_user_id,
                user_name: record.current_user_name,
                study_field: record.current_user_field,
            })
            .unwrap_or_default()
    }

    /// Remember the room just entered together with the participant identity used there.
    ///
    /// The profile name is left untouched.
    pub fn save_room(&self, identity: &str, room_id: &str, participant: &Participant) -> bool {
        self.merge(
            identity,
            CachePatch {
                current_room_id: Some(room_id.to_owned()),
                current_user_id: Some(participant.id.clone()),
                current_user_name: Some(participant.name.clone()),
                current_user_field: Some(participant.study_field.clone()),
                ..CachePatch::default()
            },
        )
    }

    /// Unfinished onboarding form, if any.
    pub fn program_draft(&self, identity: &str) -> Option<ProgramDraft> {
        self.get(identity).and_then(|record| record.program_draft)
    }

    /// Store the unfinished onboarding form.
    pub fn save_program_draft(&self, identity: &str, draft: ProgramDraft) -> bool {
        self.merge(
            identity,
            CachePatch {
                program_draft: Some(Some(draft)),
                ..CachePatch::default()
            },
        )
    }

    /// Remove the stored draft. Returns `false` when there was nothing to clear
    /// or the write failed.
    pub fn clear_program_draft(&self, identity: &str) -> bool {
        let has_draft = self
            .get(identity)
            .is_some_and(|record| record.program_draft.is_some());
        if !has_draft {
            return false;
        }

        self.merge(
            identity,
            CachePatch {
                program_draft: Some(None),
                ..CachePatch::default()
            },
        )
    }

    /// Onboarding counts as done once a profile id is known or the flag was set.
    pub fn is_onboarding_completed(&self, identity: &str) -> bool {
        self.get(identity)
            .is_some_and(|record| record.profile_id.is_some() || record.onboarding_completed)
    }

    /// Mark onboarding as finished.
    pub fn set_onboarding_completed(&self, identity: &str) -> bool {
        self.merge(
            identity,
            CachePatch {
                onboarding_completed: Some(true),
                ..CachePatch::default()
            },
        )
    }
}
