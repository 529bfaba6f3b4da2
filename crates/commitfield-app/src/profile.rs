//! Profile view-model.
//!
//! Season statistics and the pet of the signed-in user, kept current by the
//! commit channel. Each pushed count adds to the season total and feeds the
//! pet, whose experience never passes the cap of its growth stage.

use commitfield_client::ApiError;
use commitfield_proto::payloads::stats::{PetDto, UserInfoDto};

use crate::AppAction;

/// Load state of the profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileState {
    /// Profile requested.
    Loading,
    /// Profile shown.
    Ready,
    /// Profile could not be loaded.
    Error(String),
}

/// Commit count looked up for any user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLookup {
    /// Looked-up user.
    pub username: String,
    /// Counted commits.
    pub count: u64,
}

/// Profile, pet listing and commit lookups.
#[derive(Debug, Clone)]
pub struct ProfileView {
    state: ProfileState,
    info: Option<UserInfoDto>,
    last_update: u64,
    pets: Vec<PetDto>,
    lookup: Option<CommitLookup>,
}

impl Default for ProfileView {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileView {
    /// Profile waiting for its first load.
    pub fn new() -> Self {
        Self {
            state: ProfileState::Loading,
            info: None,
            last_update: 0,
            pets: Vec::new(),
            lookup: None,
        }
    }

    /// Profile fetched. Follows the user's commit channel from now on.
    pub fn loaded(&mut self, info: UserInfoDto) -> Vec<AppAction> {
        let username = info.username.clone();
        tracing::debug!(%username, tier = %info.tier, "profile loaded");

        self.info = Some(info);
        self.state = ProfileState::Ready;
        if username.is_empty() {
            return vec![AppAction::Render];
        }
        vec![AppAction::WatchCommits { username }, AppAction::Render]
    }

    /// Profile fetch failed. A profile already shown stays.
    pub fn failed(&mut self, error: &ApiError) -> Vec<AppAction> {
        tracing::warn!(error = %error, "profile unavailable");
        if self.info.is_none() {
            self.state = ProfileState::Error(error.user_message());
        }
        vec![AppAction::Render]
    }

    /// `count` new commits pushed on the commit channel.
    pub fn commit_update(&mut self, count: u64) -> Vec<AppAction> {
        self.last_update = count;
        if let Some(info) = &mut self.info {
            info.season_commit_count += count;
            info.pet_exp = (info.pet_exp + count).min(info.pet_grow.max_exp());
        }
        vec![AppAction::Render]
    }

    /// Pet listing fetched.
    pub fn pets_loaded(&mut self, pets: Vec<PetDto>) -> Vec<AppAction> {
        self.pets = pets;
        vec![AppAction::Render]
    }

    /// Commit count lookup answered.
    pub fn lookup_loaded(&mut self, username: String, count: u64) -> Vec<AppAction> {
        self.lookup = Some(CommitLookup { username, count });
        vec![AppAction::Render]
    }

    /// Load state.
    pub fn state(&self) -> &ProfileState {
        &self.state
    }

    /// Profile, once loaded.
    pub fn info(&self) -> Option<&UserInfoDto> {
        self.info.as_ref()
    }

    /// Commits in the most recent push. Zero before the first.
    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    /// Experience cap of the pet's stage.
    pub fn max_exp(&self) -> Option<u64> {
        self.info.as_ref().map(|i| i.pet_grow.max_exp())
    }

    /// Pet experience as a percentage of the cap, 0 to 100.
    pub fn progress(&self) -> u8 {
        let Some(info) = &self.info else {
            return 0;
        };
        let max = info.pet_grow.max_exp().max(1);
        u8::try_from(info.pet_exp.min(max) * 100 / max).unwrap_or(100)
    }

    /// Known pets.
    pub fn pets(&self) -> &[PetDto] {
        &self.pets
    }

    /// Last lookup result.
    pub fn lookup(&self) -> Option<&CommitLookup> {
        self.lookup.as_ref()
    }
}
