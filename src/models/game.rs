use rorm::fields::types::{BackRef, ForeignModel};
use rorm::{field, Model, Patch};
use uuid::Uuid;

use crate::models::Account;

/// A time-boxed competition containing challenges, owned by an admin user.
///
/// After `ending_time` has passed, the game is read-only: no new challenges,
/// submissions or participants are accepted. Games are never deleted.
#[derive(Model)]
pub struct Game {
    /// Primary key of the game
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// Title of the game
    #[rorm(max_length = 255)]
    pub title: String,

    /// Optional description shown to participants
    #[rorm(max_length = 65535)]
    pub description: Option<String>,

    /// The point in time the game ends
    pub ending_time: chrono::NaiveDateTime,

    /// Whether anyone may join, or access is invite-only
    pub is_public: bool,

    /// The user that administrates this game
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub admin: ForeignModel<Account>,

    /// The users that participate in this game
    pub participants: BackRef<field!(GameParticipant::F.game)>,

    /// The point in time the game was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "Game")]
pub(crate) struct GameInsert {
    pub(crate) uuid: Uuid,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) ending_time: chrono::NaiveDateTime,
    pub(crate) is_public: bool,
    pub(crate) admin: ForeignModel<Account>,
}

/// The m2m relation between games and accounts.
///
/// At most one row may exist per (player, game) pair,
/// which every insert path has to check beforehand.
#[derive(Model)]
pub struct GameParticipant {
    /// Primary key of a game participant
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The game
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub game: ForeignModel<Game>,

    /// The participating account
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub player: ForeignModel<Account>,

    /// The point in time the account joined the game
    #[rorm(auto_create_time)]
    pub joined_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "GameParticipant")]
pub(crate) struct GameParticipantInsert {
    pub(crate) uuid: Uuid,
    pub(crate) game: ForeignModel<Game>,
    pub(crate) player: ForeignModel<Account>,
}
