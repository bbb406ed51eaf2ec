//! This module holds the handler of flagforge

use std::fmt::{Display, Formatter};

use actix_toolbox::tb_middleware::actix_session::{SessionGetError, SessionInsertError};
use actix_toolbox::tb_middleware::Session;
use actix_web::body::BoxBody;
use actix_web::HttpResponse;
use log::{debug, error, trace};
use rorm::{query, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use serde_repr::Serialize_repr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::{Account, RedeemError};

pub use crate::server::handler::accounts::*;
pub use crate::server::handler::auth::*;
pub use crate::server::handler::challenges::*;
pub use crate::server::handler::games::*;
pub use crate::server::handler::health::*;
pub use crate::server::handler::invites::*;
pub use crate::server::handler::submissions::*;
pub use crate::server::handler::version::*;

pub mod accounts;
pub mod auth;
pub mod challenges;
pub mod games;
pub mod health;
pub mod invites;
pub mod submissions;
pub mod version;

/// The result that is used throughout the complete api.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize_repr, ToSchema, Copy, Clone, Debug)]
#[repr(u16)]
pub(crate) enum ApiStatusCode {
    Unauthenticated = 1000,
    LoginFailed = 1001,
    EmptyJson = 1002,
    InvalidJson = 1003,
    InvalidUuid = 1004,
    InvalidEmail = 1005,
    InvalidDisplayName = 1006,
    InvalidPassword = 1007,
    InvalidUsername = 1008,
    UsernameAlreadyOccupied = 1009,
    UsernameNotFound = 1010,
    UsernameRequired = 1011,
    UsernameAlreadySet = 1012,
    MissingPrivileges = 1013,
    GameNotFound = 1014,
    GameEnded = 1015,
    AlreadyParticipant = 1016,
    ChallengeNotFound = 1017,
    InvalidPointValue = 1018,
    AlreadySolved = 1019,
    DuplicateAttempt = 1020,
    IncorrectFlag = 1021,
    InviteNotFound = 1022,
    InviteAlreadyExists = 1023,
    InvalidInviteState = 1024,
    InviteExpired = 1025,
    InvalidTitle = 1026,
    InvalidFlag = 1027,
    EmailAlreadyOccupied = 1028,

    InternalServerError = 2000,
    DatabaseError = 2001,
    SessionError = 2002,
    SessionCorrupt = 2003,
}

/// The response that is sent in case of an error
#[derive(Serialize, ToSchema)]
pub struct ApiErrorResponse {
    #[schema(example = "Error message is here")]
    message: String,
    #[schema(example = 1000)]
    status_code: ApiStatusCode,
}

impl ApiErrorResponse {
    pub(crate) fn new(status_code: ApiStatusCode, message: String) -> Self {
        Self {
            message,
            status_code,
        }
    }
}

/// This enum holds all possible error types that can occur in the API
#[derive(Debug)]
pub enum ApiError {
    /// The user is not allowed to access the resource
    Unauthenticated,
    /// Login was not successful. Caused by incorrect email / password
    LoginFailed,
    /// Received an empty json, nothing to update
    EmptyJson,
    /// The email address is malformed
    InvalidEmail,
    /// The display name is malformed
    InvalidDisplayName,
    /// The password is malformed
    InvalidPassword,
    /// The username is malformed
    InvalidUsername,
    /// The username is already claimed by another account
    UsernameAlreadyOccupied,
    /// No account with the given username exists
    UsernameNotFound,
    /// The endpoint requires the account to have claimed a username first
    UsernameRequired,
    /// The account has already claimed its username, it can not be changed
    UsernameAlreadySet,
    /// The uuid in the request does not point to an existing entity
    InvalidUuid,
    /// The executing user is missing privileges for this action
    MissingPrivileges,
    /// The requested game does not exist
    GameNotFound,
    /// The game's ending time has passed
    GameEnded,
    /// The executing user is already a participant of the game
    AlreadyParticipant,
    /// The requested challenge does not exist
    ChallengeNotFound,
    /// Point values must be positive
    InvalidPointValue,
    /// The executing user has already solved this challenge
    AlreadySolved,
    /// The executing user has already submitted this exact flag
    DuplicateAttempt,
    /// The submitted flag does not match. The attempt was recorded anyway.
    IncorrectFlag,
    /// The requested invite does not exist
    InviteNotFound,
    /// There already is a pending invite for this user and game
    InviteAlreadyExists,
    /// The invite is not in the pending state
    InvalidInviteState,
    /// The invite's expiry time has passed
    InviteExpired,
    /// The title of a game or challenge is malformed
    InvalidTitle,
    /// The flag of a new challenge is malformed
    InvalidFlag,
    /// The email address is already registered
    EmailAlreadyOccupied,

    /// Unspecified internal error
    InternalServerError,
    /// All errors that are thrown by the database
    DatabaseError(rorm::Error),
    /// An invalid hash is retrieved from the database
    InvalidHash(argon2::password_hash::Error),
    /// Error inserting into a session
    SessionInsert(SessionInsertError),
    /// Error retrieving data from a session
    SessionGet(SessionGetError),
    /// A session is in an invalid state, e.g. the uuid key is missing
    SessionCorrupt,
}

impl ApiError {
    fn status(&self) -> ApiStatusCode {
        match self {
            ApiError::Unauthenticated => ApiStatusCode::Unauthenticated,
            ApiError::LoginFailed => ApiStatusCode::LoginFailed,
            ApiError::EmptyJson => ApiStatusCode::EmptyJson,
            ApiError::InvalidEmail => ApiStatusCode::InvalidEmail,
            ApiError::InvalidDisplayName => ApiStatusCode::InvalidDisplayName,
            ApiError::InvalidPassword => ApiStatusCode::InvalidPassword,
            ApiError::InvalidUsername => ApiStatusCode::InvalidUsername,
            ApiError::UsernameAlreadyOccupied => ApiStatusCode::UsernameAlreadyOccupied,
            ApiError::UsernameNotFound => ApiStatusCode::UsernameNotFound,
            ApiError::UsernameRequired => ApiStatusCode::UsernameRequired,
            ApiError::UsernameAlreadySet => ApiStatusCode::UsernameAlreadySet,
            ApiError::InvalidUuid => ApiStatusCode::InvalidUuid,
            ApiError::MissingPrivileges => ApiStatusCode::MissingPrivileges,
            ApiError::GameNotFound => ApiStatusCode::GameNotFound,
            ApiError::GameEnded => ApiStatusCode::GameEnded,
            ApiError::AlreadyParticipant => ApiStatusCode::AlreadyParticipant,
            ApiError::ChallengeNotFound => ApiStatusCode::ChallengeNotFound,
            ApiError::InvalidPointValue => ApiStatusCode::InvalidPointValue,
            ApiError::AlreadySolved => ApiStatusCode::AlreadySolved,
            ApiError::DuplicateAttempt => ApiStatusCode::DuplicateAttempt,
            ApiError::IncorrectFlag => ApiStatusCode::IncorrectFlag,
            ApiError::InviteNotFound => ApiStatusCode::InviteNotFound,
            ApiError::InviteAlreadyExists => ApiStatusCode::InviteAlreadyExists,
            ApiError::InvalidInviteState => ApiStatusCode::InvalidInviteState,
            ApiError::InviteExpired => ApiStatusCode::InviteExpired,
            ApiError::InvalidTitle => ApiStatusCode::InvalidTitle,
            ApiError::InvalidFlag => ApiStatusCode::InvalidFlag,
            ApiError::EmailAlreadyOccupied => ApiStatusCode::EmailAlreadyOccupied,
            ApiError::InternalServerError => ApiStatusCode::InternalServerError,
            ApiError::DatabaseError(_) => ApiStatusCode::DatabaseError,
            ApiError::InvalidHash(_) => ApiStatusCode::InternalServerError,
            ApiError::SessionInsert(_) | ApiError::SessionGet(_) => ApiStatusCode::SessionError,
            ApiError::SessionCorrupt => ApiStatusCode::SessionCorrupt,
        }
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthenticated => write!(f, "Unauthenticated"),
            ApiError::LoginFailed => write!(f, "The login was not successful"),
            ApiError::EmptyJson => write!(f, "The request body must not be empty"),
            ApiError::InvalidEmail => write!(f, "Invalid email address"),
            ApiError::InvalidDisplayName => write!(f, "Invalid display name"),
            ApiError::InvalidPassword => write!(f, "Invalid password"),
            ApiError::InvalidUsername => write!(
                f,
                "Usernames must be 3 to 20 characters, letters and digits only"
            ),
            ApiError::UsernameAlreadyOccupied => write!(f, "Username is already occupied"),
            ApiError::UsernameNotFound => write!(f, "No account with this username exists"),
            ApiError::UsernameRequired => write!(f, "A username must be claimed first"),
            ApiError::UsernameAlreadySet => write!(f, "The username has already been claimed"),
            ApiError::InvalidUuid => write!(f, "The given uuid does not exist"),
            ApiError::MissingPrivileges => write!(f, "Missing privileges for this action"),
            ApiError::GameNotFound => write!(f, "The game was not found"),
            ApiError::GameEnded => write!(f, "The game has already ended"),
            ApiError::AlreadyParticipant => {
                write!(f, "The user is already a participant of this game")
            }
            ApiError::ChallengeNotFound => write!(f, "The challenge was not found"),
            ApiError::InvalidPointValue => write!(f, "The point value must be positive"),
            ApiError::AlreadySolved => write!(f, "The challenge was already solved"),
            ApiError::DuplicateAttempt => write!(f, "This exact flag was already submitted"),
            ApiError::IncorrectFlag => write!(f, "The submitted flag is incorrect"),
            ApiError::InviteNotFound => write!(f, "The invite was not found"),
            ApiError::InviteAlreadyExists => {
                write!(f, "A pending invite for this user already exists")
            }
            ApiError::InvalidInviteState => write!(f, "The invite is no longer pending"),
            ApiError::InviteExpired => write!(f, "The invite has expired"),
            ApiError::InvalidTitle => write!(f, "The title must not be empty"),
            ApiError::InvalidFlag => write!(f, "The flag must not be empty"),
            ApiError::EmailAlreadyOccupied => write!(f, "The email address is already registered"),
            ApiError::InternalServerError => write!(f, "Internal server error"),
            ApiError::DatabaseError(_) => write!(f, "Database error occurred"),
            ApiError::InvalidHash(_) => write!(f, "Internal server error"),
            ApiError::SessionInsert(_) | ApiError::SessionGet(_) => {
                write!(f, "Session error occurred")
            }
            ApiError::SessionCorrupt => write!(f, "Corrupt session"),
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        let status_code = self.status();

        match self {
            ApiError::DatabaseError(err) => error!("Database error: {err}"),
            ApiError::InvalidHash(err) => error!("Got invalid password hash from db: {err}"),
            ApiError::SessionInsert(err) => error!("Session insert error: {err}"),
            ApiError::SessionGet(err) => error!("Session get error: {err}"),
            ApiError::InternalServerError => error!("Internal server error"),
            ApiError::SessionCorrupt => debug!("Corrupt session"),
            ApiError::Unauthenticated => trace!("Unauthenticated"),
            ApiError::LoginFailed => debug!("Login request failed"),
            err => trace!("Client error: {err}"),
        }

        match status_code {
            ApiStatusCode::InternalServerError
            | ApiStatusCode::DatabaseError
            | ApiStatusCode::SessionError => HttpResponse::InternalServerError()
                .json(ApiErrorResponse::new(status_code, self.to_string())),
            _ => HttpResponse::BadRequest()
                .json(ApiErrorResponse::new(status_code, self.to_string())),
        }
    }
}

impl From<rorm::Error> for ApiError {
    fn from(value: rorm::Error) -> Self {
        Self::DatabaseError(value)
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(value: argon2::password_hash::Error) -> Self {
        Self::InvalidHash(value)
    }
}

impl From<SessionInsertError> for ApiError {
    fn from(value: SessionInsertError) -> Self {
        Self::SessionInsert(value)
    }
}

impl From<SessionGetError> for ApiError {
    fn from(value: SessionGetError) -> Self {
        Self::SessionGet(value)
    }
}

impl From<RedeemError> for ApiError {
    fn from(value: RedeemError) -> Self {
        match value {
            RedeemError::NotPending(_) => Self::InvalidInviteState,
            RedeemError::Expired => Self::InviteExpired,
            RedeemError::GameEnded => Self::GameEnded,
        }
    }
}

/// Path parameter of a single uuid
#[derive(Deserialize, IntoParams)]
pub struct PathUuid {
    /// The uuid to query
    pub(crate) uuid: Uuid,
}

/// Path parameter of an invite code
#[derive(Deserialize, IntoParams)]
pub struct PathInviteCode {
    /// The invite code to query
    pub(crate) code: String,
}

/// The public data of an account
#[derive(Serialize, Deserialize, ToSchema, Eq, Ord, PartialOrd, PartialEq, Clone, Debug)]
pub struct AccountResponse {
    pub(crate) uuid: Uuid,
    #[schema(example = "user123")]
    pub(crate) username: Option<String>,
    #[schema(example = "Herbert")]
    pub(crate) display_name: String,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            uuid: account.uuid,
            username: account.username,
            display_name: account.display_name,
        }
    }
}

/// Retrieve the account of the executing user from its session.
///
/// Fails with [ApiError::SessionCorrupt] if the session holds no valid user.
pub(crate) async fn session_account(db: &Database, session: &Session) -> ApiResult<Account> {
    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;

    query!(db, Account)
        .condition(Account::F.uuid.equals(uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)
}

/// Retrieve the account of the executing user, requiring its username to be set.
///
/// Endpoints that make the user visible to other players are gated on the
/// one-time username claim and use this instead of [session_account].
pub(crate) async fn named_session_account(db: &Database, session: &Session) -> ApiResult<Account> {
    let account = session_account(db, session).await?;

    if account.username.is_none() {
        return Err(ApiError::UsernameRequired);
    }

    Ok(account)
}
