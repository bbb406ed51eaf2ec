use rorm::{Model, Patch};
use uuid::Uuid;

/// A user account
#[derive(Model)]
pub struct Account {
    /// The primary key of a user.
    ///
    /// This will be a uuid.
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The email address the account was registered with.
    ///
    /// Used as the login identifier.
    #[rorm(max_length = 255, unique)]
    pub email: String,

    /// The name that is displayed for this user
    #[rorm(max_length = 255)]
    pub display_name: String,

    /// The unique handle other players refer to this user by.
    ///
    /// Starts out unset and is claimed exactly once.
    /// Most gameplay endpoints are gated on it being present.
    #[rorm(max_length = 255, unique)]
    pub username: Option<String>,

    /// The password hash of the user.
    #[rorm(max_length = 1024)]
    pub password_hash: String,

    /// The last time the user has logged in
    pub last_login: Option<chrono::NaiveDateTime>,
}

#[derive(Patch)]
#[rorm(model = "Account")]
pub(crate) struct AccountInsert {
    pub(crate) uuid: Uuid,
    pub(crate) email: String,
    pub(crate) display_name: String,
    pub(crate) username: Option<String>,
    pub(crate) password_hash: String,
    pub(crate) last_login: Option<chrono::NaiveDateTime>,
}
