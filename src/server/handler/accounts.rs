//! All handlers for the account endpoints live in here

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json};
use actix_web::{get, post, put, HttpResponse};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use rand::thread_rng;
use rorm::{insert, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Account, AccountInsert, Game, GameParticipant};
use crate::server::handler::{session_account, ApiError, ApiErrorResponse, ApiResult};

/// Check whether a username is valid: 3 to 20 characters, ascii letters
/// and digits only.
pub(crate) fn valid_username(username: &str) -> bool {
    (3..=20).contains(&username.len()) && username.chars().all(|c| c.is_ascii_alphanumeric())
}

/// The content to register a new account
#[derive(Debug, Deserialize, ToSchema)]
pub struct AccountRegistrationRequest {
    #[schema(example = "herbert@example.com")]
    email: String,
    #[schema(example = "Herbert")]
    display_name: String,
    #[schema(example = "super-secure-password")]
    password: String,
}

/// Register a new account
///
/// The account starts out without a username. Claiming one through
/// `/accounts/me/username` is required before joining or playing games.
#[utoipa::path(
    tag = "Accounts",
    responses(
        (status = 200, description = "Account got created"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = AccountRegistrationRequest,
)]
#[post("/api/v1/accounts/register")]
pub async fn register_account(
    req: Json<AccountRegistrationRequest>,
    db: Data<Database>,
) -> ApiResult<HttpResponse> {
    if req.email.is_empty() || !req.email.contains('@') {
        return Err(ApiError::InvalidEmail);
    }

    if req.display_name.is_empty() {
        return Err(ApiError::InvalidDisplayName);
    }

    if req.password.is_empty() {
        return Err(ApiError::InvalidPassword);
    }

    let mut tx = db.start_transaction().await?;

    if query!(&mut tx, (Account::F.uuid,))
        .condition(Account::F.email.equals(&req.email))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::EmailAlreadyOccupied);
    }

    let salt = SaltString::generate(&mut thread_rng());
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)?
        .to_string();

    insert!(&mut tx, AccountInsert)
        .single(&AccountInsert {
            uuid: Uuid::new_v4(),
            email: req.email.clone(),
            display_name: req.display_name.clone(),
            username: None,
            password_hash,
            last_login: None,
        })
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// The private account data of the executing user
#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub(crate) uuid: Uuid,
    #[schema(example = "herbert@example.com")]
    pub(crate) email: String,
    #[schema(example = "user123")]
    pub(crate) username: Option<String>,
    #[schema(example = "Herbert")]
    pub(crate) display_name: String,
}

/// Returns the account that is currently logged-in
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the account data of the current user", body = MeResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/accounts/me")]
pub async fn get_me(db: Data<Database>, session: Session) -> ApiResult<Json<MeResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    Ok(Json(MeResponse {
        uuid: account.uuid,
        email: account.email,
        username: account.username,
        display_name: account.display_name,
    }))
}

/// Update account request data
#[derive(Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    #[schema(example = "Heeeerbeeeert")]
    display_name: Option<String>,
}

/// Updates the currently logged-in account
///
/// The username is not part of this endpoint, it is claimed once
/// through `/accounts/me/username` and fixed afterwards.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Account has been updated"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = UpdateAccountRequest,
    security(("session_cookie" = []))
)]
#[put("/accounts/me")]
pub async fn update_me(
    req: Json<UpdateAccountRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = session_account(db.as_ref(), &session).await?;

    let display_name = req.into_inner().display_name.ok_or(ApiError::EmptyJson)?;

    if display_name.is_empty() {
        return Err(ApiError::InvalidDisplayName);
    }

    update!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(account.uuid.as_ref()))
        .set(Account::F.display_name, display_name)
        .exec()
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// The request to check a username for availability
#[derive(Deserialize, ToSchema)]
pub struct CheckUsernameRequest {
    #[schema(example = "user123")]
    username: String,
}

/// The availability of a username
#[derive(Serialize, ToSchema)]
pub struct CheckUsernameResponse {
    #[schema(example = "user123")]
    username: String,
    available: bool,
}

/// Check whether a username is still available
///
/// Fails if the username is malformed. A `true` response is no
/// reservation, the claim can still lose a race.
#[utoipa::path(
    tag = "Accounts",
    responses(
        (status = 200, description = "Returns the availability of the username", body = CheckUsernameResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CheckUsernameRequest,
)]
#[post("/api/v1/accounts/checkUsername")]
pub async fn check_username(
    req: Json<CheckUsernameRequest>,
    db: Data<Database>,
) -> ApiResult<Json<CheckUsernameResponse>> {
    if !valid_username(&req.username) {
        return Err(ApiError::InvalidUsername);
    }

    let existing = query!(db.as_ref(), (Account::F.uuid,))
        .condition(Account::F.username.equals(&req.username))
        .optional()
        .await?;

    Ok(Json(CheckUsernameResponse {
        username: req.into_inner().username,
        available: existing.is_none(),
    }))
}

/// The request to claim a username
#[derive(Deserialize, ToSchema)]
pub struct SetUsernameRequest {
    #[schema(example = "user123")]
    username: String,
}

/// Claim the username of the currently logged-in account
///
/// This is a one-time step: once set, the username can not be changed.
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The username has been claimed"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = SetUsernameRequest,
    security(("session_cookie" = []))
)]
#[post("/accounts/me/username")]
pub async fn set_username(
    req: Json<SetUsernameRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    if !valid_username(&req.username) {
        return Err(ApiError::InvalidUsername);
    }

    let mut tx = db.start_transaction().await?;

    let uuid: Uuid = session.get("uuid")?.ok_or(ApiError::SessionCorrupt)?;
    let account = query!(&mut tx, Account)
        .condition(Account::F.uuid.equals(uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::SessionCorrupt)?;

    if account.username.is_some() {
        return Err(ApiError::UsernameAlreadySet);
    }

    if query!(&mut tx, (Account::F.uuid,))
        .condition(Account::F.username.equals(&req.username))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::UsernameAlreadyOccupied);
    }

    update!(&mut tx, Account)
        .condition(Account::F.uuid.equals(uuid.as_ref()))
        .set(Account::F.username, Some(req.into_inner().username))
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Statistics about the executing user's account
#[derive(Serialize, ToSchema)]
pub struct AccountStatsResponse {
    /// Games this user administrates
    #[schema(example = 3)]
    games_hosted: u64,
    /// Games this user participates in without administrating them
    #[schema(example = 7)]
    games_played: u64,
    /// The first time this user joined any game
    first_joined: Option<DateTime<Utc>>,
}

/// Retrieve statistics about the executing user's account
#[utoipa::path(
    tag = "Accounts",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the statistics of the current user", body = AccountStatsResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/accounts/me/stats")]
pub async fn get_account_stats(
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<AccountStatsResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    let games_hosted = query!(db.as_ref(), (Game::F.uuid.count(),))
        .condition(Game::F.admin.equals(account.uuid.as_ref()))
        .one()
        .await?
        .0 as u64;

    let participations = query!(
        db.as_ref(),
        (
            GameParticipant::F.game.admin,
            GameParticipant::F.joined_at,
        )
    )
    .condition(GameParticipant::F.player.equals(account.uuid.as_ref()))
    .all()
    .await?;

    let games_played = participations
        .iter()
        .filter(|(admin, _)| *admin.key() != account.uuid)
        .count() as u64;
    let first_joined = participations
        .iter()
        .map(|(_, joined_at)| *joined_at)
        .min()
        .map(|at| DateTime::from_utc(at, Utc));

    Ok(Json(AccountStatsResponse {
        games_hosted,
        games_played,
        first_joined,
    }))
}

#[cfg(test)]
mod tests {
    use super::valid_username;

    #[test]
    fn username_rules() {
        assert!(valid_username("abc"));
        assert!(valid_username("user123"));
        assert!(valid_username("A1234567890123456789"));

        assert!(!valid_username("ab"));
        assert!(!valid_username("a".repeat(21).as_str()));
        assert!(!valid_username("user name"));
        assert!(!valid_username("user-name"));
        assert!(!valid_username("über"));
        assert!(!valid_username(""));
    }
}
