//! Named save profiles, the active-profile pointer and migration of the
//! single-slot save format.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    ACTIVE_PROFILE_KEY, DEFAULT_AGENT_NAME, LEGACY_SAVE_KEY, PROFILE_ID_PREFIX, PROFILES_KEY,
};
use crate::state::PlayerState;
use crate::storage::{PersistentStore, StorageBackend, StorageError};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile name cannot be empty")]
    EmptyName,
    #[error("profile name {0:?} already exists")]
    DuplicateName(String),
    #[error("profile {0} not found")]
    NotFound(String),
    #[error("profile storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// One saved agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub created_date: DateTime<Utc>,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub game_data: PlayerState,
}

pub type Clock = fn() -> DateTime<Utc>;

/// Profile table stored under a single key, plus the active pointer.
pub struct ProfileRegistry<B> {
    store: PersistentStore<B>,
    clock: Clock,
}

impl<B: StorageBackend> ProfileRegistry<B> {
    #[must_use]
    pub fn new(store: PersistentStore<B>) -> Self {
        Self {
            store,
            clock: Utc::now,
        }
    }

    /// Use a fixed time source, mostly for reproducible ids in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &PersistentStore<B> {
        &self.store
    }

    /// All stored profiles keyed by id; empty when nothing is saved.
    #[must_use]
    pub fn list_profiles(&self) -> BTreeMap<String, Profile> {
        self.store.load(PROFILES_KEY).unwrap_or_default()
    }

    #[must_use]
    pub fn profile_count(&self) -> usize {
        self.list_profiles().len()
    }

    #[must_use]
    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.list_profiles().remove(id)
    }

    fn save_profiles(&self, profiles: &BTreeMap<String, Profile>) -> Result<(), ProfileError> {
        Ok(self.store.try_save(PROFILES_KEY, profiles)?)
    }

    fn allocate_id(&self, profiles: &BTreeMap<String, Profile>) -> String {
        let base = format!("{PROFILE_ID_PREFIX}{}", (self.clock)().timestamp_millis());
        if !profiles.contains_key(&base) {
            return base;
        }
        (2_u32..)
            .map(|suffix| format!("{base}_{suffix}"))
            .find(|candidate| !profiles.contains_key(candidate))
            .unwrap_or(base)
    }

    /// Create a profile with a fresh agent state.
    ///
    /// # Errors
    ///
    /// Returns `EmptyName` for a blank name, `DuplicateName` if another
    /// profile already uses the name (ignoring case), or `Storage` if the
    /// table cannot be written.
    pub fn create_profile(&self, name: &str) -> Result<(String, Profile), ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        let mut profiles = self.list_profiles();
        let lowered = name.to_lowercase();
        if profiles
            .values()
            .any(|profile| profile.name.trim().to_lowercase() == lowered)
        {
            return Err(ProfileError::DuplicateName(name.to_string()));
        }

        let id = self.allocate_id(&profiles);
        let profile = Profile {
            id: id.clone(),
            name: name.to_string(),
            created_date: (self.clock)(),
            last_played: None,
            game_data: PlayerState::new(name),
        };
        profiles.insert(id.clone(), profile.clone());
        self.save_profiles(&profiles)?;
        log::info!("created profile {id} ({name})");
        Ok((id, profile))
    }

    /// Remove a profile, clearing the active pointer if it referenced it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id or `Storage` on write failure.
    pub fn delete_profile(&self, id: &str) -> Result<(), ProfileError> {
        let mut profiles = self.list_profiles();
        if profiles.remove(id).is_none() {
            return Err(ProfileError::NotFound(id.to_string()));
        }
        self.save_profiles(&profiles)?;
        if self.active_profile_id().as_deref() == Some(id) {
            self.store.try_remove(ACTIVE_PROFILE_KEY)?;
        }
        log::info!("deleted profile {id}");
        Ok(())
    }

    /// Point the active slot at `id` and stamp its last-played time.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id or `Storage` on write failure.
    pub fn set_active_profile(&self, id: &str) -> Result<Profile, ProfileError> {
        let mut profiles = self.list_profiles();
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
        profile.last_played = Some((self.clock)());
        let activated = profile.clone();

        // Table first: a pointer must never name a profile the table lacks.
        self.save_profiles(&profiles)?;
        self.store.try_save(ACTIVE_PROFILE_KEY, &id)?;
        log::info!("activated profile {id}");
        Ok(activated)
    }

    #[must_use]
    pub fn active_profile_id(&self) -> Option<String> {
        self.store.load(ACTIVE_PROFILE_KEY)
    }

    /// The profile the active pointer references. A dangling pointer reads
    /// as no active profile.
    #[must_use]
    pub fn active_profile(&self) -> Option<Profile> {
        let id = self.active_profile_id()?;
        let profile = self.profile(&id);
        if profile.is_none() {
            log::warn!("active profile pointer {id} references a missing profile");
        }
        profile
    }

    /// Replace a profile's saved state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id or `Storage` on write failure.
    pub fn update_profile(&self, id: &str, state: &PlayerState) -> Result<(), ProfileError> {
        let mut profiles = self.list_profiles();
        let profile = profiles
            .get_mut(id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
        profile.game_data = state.clone();
        profile.last_played = Some((self.clock)());
        self.save_profiles(&profiles)
    }

    /// Move a single-slot save into its own profile.
    ///
    /// Runs only while no profiles exist and the legacy slot holds a
    /// readable state. Returns the new profile id when a migration happened.
    ///
    /// The profile lands in the table with a single write. The legacy slot is
    /// removed last, so a failure at any step leaves it for the next startup.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if any step of the move cannot be persisted.
    pub fn migrate_legacy_save(&self) -> Result<Option<String>, ProfileError> {
        let mut profiles = self.list_profiles();
        if !profiles.is_empty() {
            return Ok(None);
        }
        let Some(legacy) = self.store.load::<PlayerState>(LEGACY_SAVE_KEY) else {
            return Ok(None);
        };

        let name = match legacy.name.trim() {
            "" => DEFAULT_AGENT_NAME,
            trimmed => trimmed,
        }
        .to_string();
        let id = self.allocate_id(&profiles);
        let now = (self.clock)();
        let profile = Profile {
            id: id.clone(),
            name,
            created_date: now,
            last_played: Some(now),
            game_data: legacy,
        };
        profiles.insert(id.clone(), profile);
        self.save_profiles(&profiles)?;
        self.store.try_save(ACTIVE_PROFILE_KEY, &id)?;
        self.store.try_remove(LEGACY_SAVE_KEY)?;
        log::info!("migrated legacy save into profile {id}");
        Ok(Some(id))
    }
}
