//! Commit statistics payloads.
//!
//! The profile, the pet listing and the commit-count lookup are served under
//! `/api` without the [`crate::payloads::rest::ApiEnvelope`] wrapper. Live
//! commit counts arrive as `COMMIT_COUNT` frames on the user's commit channel.

use serde::{Deserialize, Serialize};

/// Pet experience needed to leave the egg stage.
pub const EGG_MAX_EXP: u64 = 150;

/// Pet experience cap for every later stage.
pub const GROWN_MAX_EXP: u64 = 300;

/// Growth stage of a pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PetGrow {
    /// Freshly hatched account.
    Egg,
    /// Hatched.
    Hatch,
    /// Fully grown.
    Grown,
    /// Stage added by a newer backend.
    #[serde(other)]
    Unknown,
}

impl PetGrow {
    /// Experience cap for this stage.
    pub fn max_exp(self) -> u64 {
        match self {
            Self::Egg => EGG_MAX_EXP,
            Self::Hatch | Self::Grown | Self::Unknown => GROWN_MAX_EXP,
        }
    }

    /// Wire name, used in pet image names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Egg => "EGG",
            Self::Hatch => "HATCH",
            Self::Grown => "GROWN",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoDto {
    /// GitHub login. Names the commit channel.
    pub username: String,
    /// Avatar image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Commits counted this season.
    #[serde(default)]
    pub season_commit_count: u64,
    /// Pet experience.
    #[serde(default)]
    pub pet_exp: u64,
    /// Pet stage.
    #[serde(default = "egg")]
    pub pet_grow: PetGrow,
    /// Season tier name, for example `SEED` or `TREE`. Computed server-side.
    #[serde(default)]
    pub tier: String,
    /// Time of the last counted commit, ISO-8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_committed: Option<String>,
}

fn egg() -> PetGrow {
    PetGrow::Egg
}

/// Pet in the public pet listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetDto {
    /// Pet stage.
    pub grow: PetGrow,
    /// Pet species number.
    #[serde(rename = "type", default)]
    pub kind: u32,
}

/// Commit count pushed on a user's commit channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitCountWire {
    /// User the count belongs to.
    #[serde(default)]
    pub username: String,
    /// Newly counted commits.
    pub count: u64,
}
