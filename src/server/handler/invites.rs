//! Handlers for the invite lifecycle
//!
//! Two invite kinds share the status vocabulary: [UserInvite] names a
//! specific invitee, [InviteLink] is a bearer token usable by whoever
//! presents its code. Both start out `Pending` and only ever leave that
//! state through exactly one transition.
//!
//! Acceptance is the race-sensitive path: the status update and the
//! participant insert happen in one transaction, together with all
//! their preconditions, so a half-applied acceptance (participant added
//! but the invite still pending, or a single-use link redeemed twice)
//! can not be observed.

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post, HttpResponse};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    check_redeemable, Account, Game, GameParticipant, GameParticipantInsert, InviteLink,
    InviteLinkInsert, InviteStatus, LinkUsage, UserInvite, UserInviteInsert,
};
use crate::server::handler::{
    named_session_account, AccountResponse, ApiError, ApiErrorResponse, ApiResult, ApiStatusCode,
    PathInviteCode, PathUuid,
};

/// Length of the random token in a generated invite link
const INVITE_CODE_LENGTH: usize = 32;

/// Generate a fresh random invite code.
///
/// `thread_rng` is a CSPRNG, so the codes are not guessable.
fn generate_invite_code() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// The request to invite a user into a game by username
#[derive(Deserialize, ToSchema)]
pub struct CreateUserInviteRequest {
    game_uuid: Uuid,
    #[schema(example = "user123")]
    username: String,
    #[schema(example = "Come play with us!")]
    message: Option<String>,
    /// If set, the invite can not be redeemed after this point in time
    expires_at: Option<DateTime<Utc>>,
}

/// The response of a created user invite
#[derive(Serialize, ToSchema)]
pub struct CreateUserInviteResponse {
    uuid: Uuid,
}

/// Invite a user into a game
///
/// The executing user must be the game's admin. There may be at most
/// one pending invite per user and game.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "User got invited", body = CreateUserInviteResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateUserInviteRequest,
    security(("session_cookie" = []))
)]
#[post("/invites")]
pub async fn create_user_invite(
    req: Json<CreateUserInviteRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<CreateUserInviteResponse>> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let uuid = insert_user_invite(
        &mut tx,
        &account,
        req.game_uuid,
        &req.username,
        req.message.clone(),
        req.expires_at,
    )
    .await?;

    tx.commit().await?;

    Ok(Json(CreateUserInviteResponse { uuid }))
}

/// Check the creation preconditions for a single user invite and insert it.
///
/// Factored out to be shared between the single and the bulk endpoint.
async fn insert_user_invite(
    tx: &mut rorm::db::transaction::Transaction,
    admin: &Account,
    game_uuid: Uuid,
    username: &str,
    message: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> ApiResult<Uuid> {
    let game = query!(&mut *tx, Game)
        .condition(Game::F.uuid.equals(game_uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    if *game.admin.key() != admin.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    let target = query!(&mut *tx, Account)
        .condition(Account::F.username.equals(username))
        .optional()
        .await?
        .ok_or(ApiError::UsernameNotFound)?;

    if query!(&mut *tx, (UserInvite::F.uuid,))
        .condition(and!(
            UserInvite::F.game.equals(game.uuid.as_ref()),
            UserInvite::F.invited_user.equals(target.uuid.as_ref()),
            UserInvite::F.status.equals(InviteStatus::Pending)
        ))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::InviteAlreadyExists);
    }

    let uuid = Uuid::new_v4();
    insert!(&mut *tx, UserInviteInsert)
        .single(&UserInviteInsert {
            uuid,
            game: ForeignModelByField::Key(game.uuid),
            invited_user: ForeignModelByField::Key(target.uuid),
            invited_by: ForeignModelByField::Key(admin.uuid),
            message,
            status: InviteStatus::Pending,
            expires_at: expires_at.map(|at| at.naive_utc()),
            accepted_by: None,
            accepted_at: None,
        })
        .await?;

    Ok(uuid)
}

/// The request to invite a list of users into a game
#[derive(Deserialize, ToSchema)]
pub struct BulkUserInviteRequest {
    game_uuid: Uuid,
    /// The usernames to invite
    usernames: Vec<String>,
    #[schema(example = "Come play with us!")]
    message: Option<String>,
    /// If set, the invites can not be redeemed after this point in time
    expires_at: Option<DateTime<Utc>>,
}

/// A successfully created invite of a bulk request
#[derive(Serialize, ToSchema)]
pub struct BulkInviteCreated {
    uuid: Uuid,
    #[schema(example = "user123")]
    username: String,
}

/// A failed item of a bulk invite request
#[derive(Serialize, ToSchema)]
pub struct BulkInviteError {
    #[schema(example = "user321")]
    username: String,
    #[schema(example = 1010)]
    status_code: ApiStatusCode,
    #[schema(example = "No account with this username exists")]
    message: String,
}

/// The outcome of a bulk invite request
#[derive(Serialize, ToSchema)]
pub struct BulkUserInviteResponse {
    created: Vec<BulkInviteCreated>,
    errors: Vec<BulkInviteError>,
}

/// Invite a list of users into a game by username
///
/// Every username is processed independently: a misspelled or already
/// invited user ends up in `errors` without aborting the rest of the
/// batch.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The batch was processed", body = BulkUserInviteResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = BulkUserInviteRequest,
    security(("session_cookie" = []))
)]
#[post("/invites/bulk")]
pub async fn bulk_user_invite(
    req: Json<BulkUserInviteRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<BulkUserInviteResponse>> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let req = req.into_inner();
    let mut created = vec![];
    let mut errors = vec![];

    for username in req.usernames {
        let mut tx = db.start_transaction().await?;

        match insert_user_invite(
            &mut tx,
            &account,
            req.game_uuid,
            &username,
            req.message.clone(),
            req.expires_at,
        )
        .await
        {
            Ok(uuid) => {
                tx.commit().await?;
                created.push(BulkInviteCreated { uuid, username });
            }
            // the admin not owning the game aborts the whole batch,
            // everything else is a per-item outcome
            Err(err @ (ApiError::GameNotFound | ApiError::MissingPrivileges)) => return Err(err),
            Err(err @ (ApiError::UsernameNotFound | ApiError::InviteAlreadyExists)) => {
                errors.push(BulkInviteError {
                    username,
                    status_code: err.status(),
                    message: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(Json(BulkUserInviteResponse { created, errors }))
}

/// The request to create an invite link for a game
#[derive(Deserialize, ToSchema)]
pub struct CreateInviteLinkRequest {
    game_uuid: Uuid,
    /// Whether the link dies after its first redemption
    single_use: bool,
    #[schema(example = "Come play with us!")]
    message: Option<String>,
    /// If set, the link can not be redeemed after this point in time
    expires_at: Option<DateTime<Utc>>,
}

/// The response of a created invite link
#[derive(Serialize, ToSchema)]
pub struct CreateInviteLinkResponse {
    uuid: Uuid,
    #[schema(example = "h72ndAq91mc0Dkel03xGb55ezJw8yvTF")]
    invite_code: String,
}

/// Create an invite link for a game
///
/// The executing user must be the game's admin. The returned code is a
/// bearer token: anyone who presents it may join.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Invite link got created", body = CreateInviteLinkResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateInviteLinkRequest,
    security(("session_cookie" = []))
)]
#[post("/inviteLinks")]
pub async fn create_invite_link(
    req: Json<CreateInviteLinkRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<CreateInviteLinkResponse>> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let game = query!(&mut tx, Game)
        .condition(Game::F.uuid.equals(req.game_uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    if *game.admin.key() != account.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    let uuid = Uuid::new_v4();
    let invite_code = generate_invite_code();
    insert!(&mut tx, InviteLinkInsert)
        .single(&InviteLinkInsert {
            uuid,
            game: ForeignModelByField::Key(game.uuid),
            invite_code: invite_code.clone(),
            invited_by: ForeignModelByField::Key(account.uuid),
            message: req.message.clone(),
            usage: if req.single_use {
                LinkUsage::SingleUse
            } else {
                LinkUsage::Unlimited
            },
            status: InviteStatus::Pending,
            expires_at: req.expires_at.map(|at| at.naive_utc()),
            used_by: None,
            used_at: None,
        })
        .await?;

    tx.commit().await?;

    Ok(Json(CreateInviteLinkResponse { uuid, invite_code }))
}

/// A short game representation embedded in invite responses
#[derive(Serialize, ToSchema)]
pub struct InviteGameResponse {
    uuid: Uuid,
    #[schema(example = "Herbert's ctf")]
    title: String,
    ending_time: DateTime<Utc>,
}

/// A pending invite of the executing user
#[derive(Serialize, ToSchema)]
pub struct MyInviteResponse {
    uuid: Uuid,
    game: InviteGameResponse,
    invited_by: AccountResponse,
    #[schema(example = "Come play with us!")]
    message: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// The pending invites of the executing user
#[derive(Serialize, ToSchema)]
pub struct GetMyInvitesResponse {
    invites: Vec<MyInviteResponse>,
}

/// Retrieve all pending invites for the executing user
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Retrieve all pending invites", body = GetMyInvitesResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/invites")]
pub async fn get_my_invites(
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetMyInvitesResponse>> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let invites = query!(
        db.as_ref(),
        (
            UserInvite::F.uuid,
            UserInvite::F.message,
            UserInvite::F.expires_at,
            UserInvite::F.created_at,
            UserInvite::F.game.uuid,
            UserInvite::F.game.title,
            UserInvite::F.game.ending_time,
            UserInvite::F.invited_by.uuid,
            UserInvite::F.invited_by.username,
            UserInvite::F.invited_by.display_name,
        )
    )
    .condition(and!(
        UserInvite::F.invited_user.equals(account.uuid.as_ref()),
        UserInvite::F.status.equals(InviteStatus::Pending)
    ))
    .all()
    .await?;

    Ok(Json(GetMyInvitesResponse {
        invites: invites
            .into_iter()
            .map(
                |(
                    uuid,
                    message,
                    expires_at,
                    created_at,
                    game_uuid,
                    game_title,
                    game_ending_time,
                    by_uuid,
                    by_username,
                    by_display_name,
                )| {
                    MyInviteResponse {
                        uuid,
                        game: InviteGameResponse {
                            uuid: game_uuid,
                            title: game_title,
                            ending_time: DateTime::from_utc(game_ending_time, Utc),
                        },
                        invited_by: AccountResponse {
                            uuid: by_uuid,
                            username: by_username,
                            display_name: by_display_name,
                        },
                        message,
                        expires_at: expires_at.map(|at| DateTime::from_utc(at, Utc)),
                        created_at: DateTime::from_utc(created_at, Utc),
                    }
                },
            )
            .collect(),
    }))
}

/// A user invite as seen by the game's admin
#[derive(Serialize, ToSchema)]
pub struct GameUserInviteResponse {
    uuid: Uuid,
    invited_user: AccountResponse,
    status: InviteStatus,
    #[schema(example = "Come play with us!")]
    message: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// An invite link as seen by the game's admin
#[derive(Serialize, ToSchema)]
pub struct GameInviteLinkResponse {
    uuid: Uuid,
    #[schema(example = "h72ndAq91mc0Dkel03xGb55ezJw8yvTF")]
    invite_code: String,
    usage: LinkUsage,
    status: InviteStatus,
    #[schema(example = "Come play with us!")]
    message: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// All invites of a game
#[derive(Serialize, ToSchema)]
pub struct GetGameInvitesResponse {
    user_invites: Vec<GameUserInviteResponse>,
    invite_links: Vec<GameInviteLinkResponse>,
}

/// Retrieve all invites and invite links of a game
///
/// Only the game's admin may do this.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Retrieve all invites of the game", body = GetGameInvitesResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/games/{uuid}/invites")]
pub async fn get_game_invites(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetGameInvitesResponse>> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let game = query!(db.as_ref(), Game)
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    if *game.admin.key() != account.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    let user_invites = query!(
        db.as_ref(),
        (
            UserInvite::F.uuid,
            UserInvite::F.message,
            UserInvite::F.status,
            UserInvite::F.expires_at,
            UserInvite::F.accepted_at,
            UserInvite::F.created_at,
            UserInvite::F.invited_user.uuid,
            UserInvite::F.invited_user.username,
            UserInvite::F.invited_user.display_name,
        )
    )
    .condition(UserInvite::F.game.equals(game.uuid.as_ref()))
    .all()
    .await?;

    let invite_links = query!(db.as_ref(), InviteLink)
        .condition(InviteLink::F.game.equals(game.uuid.as_ref()))
        .all()
        .await?;

    Ok(Json(GetGameInvitesResponse {
        user_invites: user_invites
            .into_iter()
            .map(
                |(
                    uuid,
                    message,
                    status,
                    expires_at,
                    accepted_at,
                    created_at,
                    user_uuid,
                    user_username,
                    user_display_name,
                )| {
                    GameUserInviteResponse {
                        uuid,
                        invited_user: AccountResponse {
                            uuid: user_uuid,
                            username: user_username,
                            display_name: user_display_name,
                        },
                        status,
                        message,
                        expires_at: expires_at.map(|at| DateTime::from_utc(at, Utc)),
                        accepted_at: accepted_at.map(|at| DateTime::from_utc(at, Utc)),
                        created_at: DateTime::from_utc(created_at, Utc),
                    }
                },
            )
            .collect(),
        invite_links: invite_links
            .into_iter()
            .map(|link| GameInviteLinkResponse {
                uuid: link.uuid,
                invite_code: link.invite_code,
                usage: link.usage,
                status: link.status,
                message: link.message,
                expires_at: link.expires_at.map(|at| DateTime::from_utc(at, Utc)),
                used_at: link.used_at.map(|at| DateTime::from_utc(at, Utc)),
                created_at: DateTime::from_utc(link.created_at, Utc),
            })
            .collect(),
    }))
}

/// The public details of an invite link
#[derive(Serialize, ToSchema)]
pub struct InviteLinkDetailsResponse {
    game: InviteGameResponse,
    invited_by: AccountResponse,
    #[schema(example = "Come play with us!")]
    message: Option<String>,
    /// Whether the link dies after its first redemption
    single_use: bool,
    created_at: DateTime<Utc>,
}

/// Retrieve the details of an invite link by its code
///
/// Knowing the code is the only requirement. Fails if the link has
/// left the pending state or has expired.
#[utoipa::path(
    tag = "Invites",
    responses(
        (status = 200, description = "Returns the invite link's details", body = InviteLinkDetailsResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathInviteCode),
)]
#[get("/api/v1/invite/{code}")]
pub async fn get_invite_link(
    path: Path<PathInviteCode>,
    db: Data<Database>,
) -> ApiResult<Json<InviteLinkDetailsResponse>> {
    let link = query!(db.as_ref(), InviteLink)
        .condition(InviteLink::F.invite_code.equals(&path.code))
        .optional()
        .await?
        .ok_or(ApiError::InviteNotFound)?;

    if link.status != InviteStatus::Pending {
        return Err(ApiError::InvalidInviteState);
    }

    if let Some(expires_at) = link.expires_at {
        if Utc::now().naive_utc() > expires_at {
            return Err(ApiError::InviteExpired);
        }
    }

    let (game_uuid, game_title, game_ending_time) = query!(
        db.as_ref(),
        (Game::F.uuid, Game::F.title, Game::F.ending_time)
    )
    .condition(Game::F.uuid.equals(link.game.key().as_ref()))
    .one()
    .await?;

    let invited_by = query!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(link.invited_by.key().as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::InternalServerError)?;

    Ok(Json(InviteLinkDetailsResponse {
        game: InviteGameResponse {
            uuid: game_uuid,
            title: game_title,
            ending_time: DateTime::from_utc(game_ending_time, Utc),
        },
        invited_by: invited_by.into(),
        message: link.message,
        single_use: link.usage != LinkUsage::Unlimited,
        created_at: DateTime::from_utc(link.created_at, Utc),
    }))
}

/// Accept a user invite
///
/// Only the invited user may do this, only while the invite is pending
/// and unexpired and the game still running. Updating the invite and
/// adding the participant happen atomically.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Invite was accepted"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[post("/invites/{uuid}/accept")]
pub async fn accept_user_invite(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let invite = query!(&mut tx, UserInvite)
        .condition(UserInvite::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::InviteNotFound)?;

    if *invite.invited_user.key() != account.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    let (game_ending_time,) = query!(&mut tx, (Game::F.ending_time,))
        .condition(Game::F.uuid.equals(invite.game.key().as_ref()))
        .one()
        .await?;

    let now = Utc::now().naive_utc();
    check_redeemable(invite.status, invite.expires_at, game_ending_time, now)?;

    if query!(&mut tx, (GameParticipant::F.uuid,))
        .condition(and!(
            GameParticipant::F.game.equals(invite.game.key().as_ref()),
            GameParticipant::F.player.equals(account.uuid.as_ref())
        ))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::AlreadyParticipant);
    }

    update!(&mut tx, UserInvite)
        .condition(UserInvite::F.uuid.equals(invite.uuid.as_ref()))
        .set(UserInvite::F.status, InviteStatus::Accepted)
        .set(
            UserInvite::F.accepted_by,
            Some(ForeignModelByField::Key(account.uuid)),
        )
        .set(UserInvite::F.accepted_at, Some(now))
        .exec()
        .await?;

    insert!(&mut tx, GameParticipantInsert)
        .single(&GameParticipantInsert {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(*invite.game.key()),
            player: ForeignModelByField::Key(account.uuid),
        })
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Accept an invite link by its code
///
/// Like accepting a user invite, but open to anyone who presents the
/// code. Single-use links are flipped to redeemed in the same
/// transaction that adds the participant, so the link can not be
/// redeemed twice. Unlimited links stay pending.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Invite link was accepted"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathInviteCode),
    security(("session_cookie" = []))
)]
#[post("/invite/{code}/accept")]
pub async fn accept_invite_link(
    path: Path<PathInviteCode>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let link = query!(&mut tx, InviteLink)
        .condition(InviteLink::F.invite_code.equals(&path.code))
        .optional()
        .await?
        .ok_or(ApiError::InviteNotFound)?;

    let (game_ending_time,) = query!(&mut tx, (Game::F.ending_time,))
        .condition(Game::F.uuid.equals(link.game.key().as_ref()))
        .one()
        .await?;

    let now = Utc::now().naive_utc();
    check_redeemable(link.status, link.expires_at, game_ending_time, now)?;

    if query!(&mut tx, (GameParticipant::F.uuid,))
        .condition(and!(
            GameParticipant::F.game.equals(link.game.key().as_ref()),
            GameParticipant::F.player.equals(account.uuid.as_ref())
        ))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::AlreadyParticipant);
    }

    if link.usage == LinkUsage::SingleUse {
        update!(&mut tx, InviteLink)
            .condition(InviteLink::F.uuid.equals(link.uuid.as_ref()))
            .set(InviteLink::F.status, InviteStatus::Used)
            .set(InviteLink::F.usage, LinkUsage::Redeemed)
            .set(
                InviteLink::F.used_by,
                Some(ForeignModelByField::Key(account.uuid)),
            )
            .set(InviteLink::F.used_at, Some(now))
            .exec()
            .await?;
    } else {
        update!(&mut tx, InviteLink)
            .condition(InviteLink::F.uuid.equals(link.uuid.as_ref()))
            .set(
                InviteLink::F.used_by,
                Some(ForeignModelByField::Key(account.uuid)),
            )
            .set(InviteLink::F.used_at, Some(now))
            .exec()
            .await?;
    }

    insert!(&mut tx, GameParticipantInsert)
        .single(&GameParticipantInsert {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(*link.game.key()),
            player: ForeignModelByField::Key(account.uuid),
        })
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Decline a user invite
///
/// Only the invited user may do this, only while the invite is pending.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Invite was declined"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[post("/invites/{uuid}/decline")]
pub async fn decline_user_invite(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let invite = query!(&mut tx, UserInvite)
        .condition(UserInvite::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::InviteNotFound)?;

    if *invite.invited_user.key() != account.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    if invite.status != InviteStatus::Pending {
        return Err(ApiError::InvalidInviteState);
    }

    update!(&mut tx, UserInvite)
        .condition(UserInvite::F.uuid.equals(invite.uuid.as_ref()))
        .set(UserInvite::F.status, InviteStatus::Declined)
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Cancel a user invite
///
/// Only the game's admin may do this, only while the invite is pending.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Invite was cancelled"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[delete("/invites/{uuid}")]
pub async fn cancel_user_invite(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let invite = query!(&mut tx, UserInvite)
        .condition(UserInvite::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::InviteNotFound)?;

    let (admin,) = query!(&mut tx, (Game::F.admin,))
        .condition(Game::F.uuid.equals(invite.game.key().as_ref()))
        .one()
        .await?;

    if *admin.key() != account.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    if invite.status != InviteStatus::Pending {
        return Err(ApiError::InvalidInviteState);
    }

    update!(&mut tx, UserInvite)
        .condition(UserInvite::F.uuid.equals(invite.uuid.as_ref()))
        .set(UserInvite::F.status, InviteStatus::Deleted)
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Cancel an invite link
///
/// Only the game's admin may do this, only while the link is pending.
#[utoipa::path(
    tag = "Invites",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Invite link was cancelled"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[delete("/inviteLinks/{uuid}")]
pub async fn cancel_invite_link(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let link = query!(&mut tx, InviteLink)
        .condition(InviteLink::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::InviteNotFound)?;

    let (admin,) = query!(&mut tx, (Game::F.admin,))
        .condition(Game::F.uuid.equals(link.game.key().as_ref()))
        .one()
        .await?;

    if *admin.key() != account.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    if link.status != InviteStatus::Pending {
        return Err(ApiError::InvalidInviteState);
    }

    update!(&mut tx, InviteLink)
        .condition(InviteLink::F.uuid.equals(link.uuid.as_ref()))
        .set(InviteLink::F.status, InviteStatus::Deleted)
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

#[cfg(test)]
mod tests {
    use super::generate_invite_code;

    #[test]
    fn invite_codes_are_long_alphanumeric_and_unique() {
        let codes: Vec<String> = (0..64).map(|_| generate_invite_code()).collect();

        for code in &codes {
            assert_eq!(code.len(), 32);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }

        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
