use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::{
        cache_store::CacheStore,
        models::{Profile, Program, ProgramDraft},
        remote::Backend,
    },
    dto::program::OnboardingForm,
    error::SyncError,
};

/// Where a signed-in identity stands with respect to onboarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileResolution {
    /// The cache already knows the profile.
    Cached {
        /// Backend id of the cached profile.
        profile_id: String,
        /// Display name stored with it, if any.
        user_name: Option<String>,
    },
    /// The backend knew the external identity; the profile was written to the cache.
    Restored(Profile),
    /// No profile exists yet; the onboarding form must be filled.
    OnboardingRequired,
}

/// Profile bootstrap and the onboarding form lifecycle for one identity.
pub struct Onboarding {
    backend: Arc<dyn Backend>,
    cache: CacheStore,
    identity: String,
}

impl Onboarding {
    /// Onboarding flow for `identity`.
    pub fn new(backend: Arc<dyn Backend>, cache: CacheStore, identity: impl Into<String>) -> Self {
        Self {
            backend,
            cache,
            identity: identity.into(),
        }
    }

    /// Find the profile linked to `external_id`, preferring the cache.
    ///
    /// Lookup failures are returned as errors rather than as
    /// [`ProfileResolution::OnboardingRequired`], so a flaky connection never
    /// sends a known user back through onboarding.
    pub async fn resolve_profile(&self, external_id: &str) -> Result<ProfileResolution, SyncError> {
        let cached = self.cache.profile(&self.identity);
        if let Some(profile_id) = cached.profile_id {
            return Ok(ProfileResolution::Cached {
                profile_id,
                user_name: cached.user_name,
            });
        }

        let found = self
            .backend
            .find_profile_by_external_id(external_id)
            .await
            .map_err(|err| {
                warn!(identity = %self.identity, error = %err, "profile lookup failed");
                SyncError::from(err)
            })?;

        match found {
            Some(profile) => {
                if !self.cache.save_profile(&self.identity, &profile.id, &profile.name) {
                    warn!(identity = %self.identity, "restored profile not cached durably");
                }
                info!(identity = %self.identity, profile_id = %profile.id, "restored profile from backend");
                Ok(ProfileResolution::Restored(profile))
            }
            None => Ok(ProfileResolution::OnboardingRequired),
        }
    }

    /// Draft saved by a previous visit to the form, if any.
    pub fn draft(&self) -> Option<ProgramDraft> {
        self.cache.program_draft(&self.identity)
    }

    /// Autosave the partially filled form.
    pub fn save_draft(&self, draft: ProgramDraft) -> bool {
        self.cache.save_program_draft(&self.identity, draft)
    }

    /// Create the profile and its first program, then record onboarding as done.
    ///
    /// Nothing is cached unless both backend calls succeed.
    pub async fn complete(
        &self,
        form: OnboardingForm,
        external_id: Option<&str>,
    ) -> Result<(Profile, Program), SyncError> {
        form.validate()?;

        let profile = self.backend.create_profile(form.profile(external_id)).await?;
        let program = self
            .backend
            .create_program(form.program(&profile.id))
            .await
            .map_err(|err| {
                warn!(profile_id = %profile.id, error = %err, "profile created but program creation failed");
                SyncError::from(err)
            })?;

        let writes = [
            self.cache.save_profile(&self.identity, &profile.id, &profile.name),
            self.cache.save_programs(&self.identity, vec![program.clone()]),
            self.cache.set_onboarding_completed(&self.identity),
        ];
        if writes.contains(&false) {
            warn!(identity = %self.identity, "onboarding result not cached durably");
        }
        self.cache.clear_program_draft(&self.identity);

        info!(
            identity = %self.identity,
            profile_id = %profile.id,
            program_id = %program.id,
            tasks = program.tasks.len(),
            "onboarding completed"
        );
        Ok((profile, program))
    }
}
