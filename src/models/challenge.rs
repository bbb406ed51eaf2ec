use rorm::fields::types::ForeignModel;
use rorm::{Model, Patch};
use uuid::Uuid;

use crate::models::{Account, Game};

/// A scored puzzle within a game, gated by a single correct flag.
#[derive(Model)]
pub struct Challenge {
    /// Primary key of the challenge
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The game this challenge belongs to
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub game: ForeignModel<Game>,

    /// Title of the challenge
    #[rorm(max_length = 255)]
    pub title: String,

    /// Optional description shown to participants
    #[rorm(max_length = 65535)]
    pub description: Option<String>,

    /// The secret string a participant must submit to solve the challenge.
    ///
    /// Only ever sent to the game admin and users that solved the challenge.
    #[rorm(max_length = 255)]
    pub flag: String,

    /// The score awarded for solving this challenge, always positive
    pub point_value: i64,

    /// The point in time the challenge was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Challenge")]
pub(crate) struct ChallengeInsert {
    pub(crate) uuid: Uuid,
    pub(crate) game: ForeignModel<Game>,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) flag: String,
    pub(crate) point_value: i64,
}

/// One attempt of a user against a challenge.
///
/// This is an append-only log: every attempt is recorded, correct or not,
/// and rows are never updated or deleted. Whether a submission is correct
/// is not stored anywhere; it is derived by comparing [Submission::flag]
/// against [Challenge::flag] at read time, so editing a challenge's flag
/// can never leave a stale verdict behind.
#[derive(Model)]
pub struct Submission {
    /// Primary key of the submission
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The challenge the flag was submitted for
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub challenge: ForeignModel<Challenge>,

    /// The account that submitted the flag
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub player: ForeignModel<Account>,

    /// The submitted guess
    #[rorm(max_length = 255)]
    pub flag: String,

    /// The point in time the guess was submitted
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Submission")]
pub(crate) struct SubmissionInsert {
    pub(crate) uuid: Uuid,
    pub(crate) challenge: ForeignModel<Challenge>,
    pub(crate) player: ForeignModel<Account>,
    pub(crate) flag: String,
}
