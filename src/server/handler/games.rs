//! Handlers for creating, browsing and administrating games

use std::collections::{HashMap, HashSet};

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, put, HttpResponse};
use chrono::{DateTime, Utc};
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, query, update, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    Account, Challenge, Game, GameInsert, GameParticipant, GameParticipantInsert, Submission,
};
use crate::scoring::{compute_leaderboard, ScoredSubmission};
use crate::server::handler::{
    named_session_account, session_account, AccountResponse, ApiError, ApiErrorResponse, ApiResult,
    PathUuid,
};

/// The request to create a new game
#[derive(Deserialize, ToSchema)]
pub struct CreateGameRequest {
    #[schema(example = "Herbert's ctf")]
    title: String,
    #[schema(example = "A selection of easy web challenges")]
    description: Option<String>,
    /// The point in time the game ends
    ending_time: DateTime<Utc>,
    /// Whether anyone may join, or access is invite-only
    is_public: bool,
}

/// The response of a created game
#[derive(Serialize, ToSchema)]
pub struct CreateGameResponse {
    uuid: Uuid,
}

/// Create a new game
///
/// The executing user becomes the game's admin and its first participant.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Game got created", body = CreateGameResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    request_body = CreateGameRequest,
    security(("session_cookie" = []))
)]
#[post("/games")]
pub async fn create_game(
    req: Json<CreateGameRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<CreateGameResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    if req.title.is_empty() {
        return Err(ApiError::InvalidTitle);
    }

    let mut tx = db.start_transaction().await?;

    let uuid = Uuid::new_v4();
    insert!(&mut tx, GameInsert)
        .single(&GameInsert {
            uuid,
            title: req.title.clone(),
            description: req.description.clone(),
            ending_time: req.ending_time.naive_utc(),
            is_public: req.is_public,
            admin: ForeignModelByField::Key(account.uuid),
        })
        .await?;

    // The admin participates in its own game
    insert!(&mut tx, GameParticipantInsert)
        .single(&GameParticipantInsert {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(uuid),
            player: ForeignModelByField::Key(account.uuid),
        })
        .await?;

    tx.commit().await?;

    Ok(Json(CreateGameResponse { uuid }))
}

/// A single game in an overview listing
#[derive(Serialize, ToSchema)]
pub struct GameOverviewResponse {
    uuid: Uuid,
    #[schema(example = "Herbert's ctf")]
    title: String,
    ending_time: DateTime<Utc>,
    is_public: bool,
    admin: AccountResponse,
    #[schema(example = 12)]
    challenge_count: u64,
    #[schema(example = 42)]
    participant_count: u64,
}

/// The games that are visible to the executing user
#[derive(Serialize, ToSchema)]
pub struct GetGamesResponse {
    games: Vec<GameOverviewResponse>,
}

/// Retrieve all games visible to the executing user
///
/// These are all public games plus the private ones the user
/// participates in or administrates.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns all visible games", body = GetGamesResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("session_cookie" = []))
)]
#[get("/games")]
pub async fn get_games(db: Data<Database>, session: Session) -> ApiResult<Json<GetGamesResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    let my_games: HashSet<Uuid> = query!(db.as_ref(), (GameParticipant::F.game,))
        .condition(GameParticipant::F.player.equals(account.uuid.as_ref()))
        .all()
        .await?
        .into_iter()
        .map(|(game,)| *game.key())
        .collect();

    let mut challenge_counts: HashMap<Uuid, u64> = HashMap::new();
    for (game,) in query!(db.as_ref(), (Challenge::F.game,)).all().await? {
        *challenge_counts.entry(*game.key()).or_default() += 1;
    }

    let mut participant_counts: HashMap<Uuid, u64> = HashMap::new();
    for (game,) in query!(db.as_ref(), (GameParticipant::F.game,)).all().await? {
        *participant_counts.entry(*game.key()).or_default() += 1;
    }

    let games = query!(
        db.as_ref(),
        (
            Game::F.uuid,
            Game::F.title,
            Game::F.ending_time,
            Game::F.is_public,
            Game::F.admin.uuid,
            Game::F.admin.username,
            Game::F.admin.display_name,
        )
    )
    .all()
    .await?
    .into_iter()
    .filter(|(uuid, _, _, is_public, admin_uuid, _, _)| {
        *is_public || my_games.contains(uuid) || *admin_uuid == account.uuid
    })
    .map(
        |(uuid, title, ending_time, is_public, admin_uuid, admin_username, admin_display_name)| {
            GameOverviewResponse {
                uuid,
                title,
                ending_time: DateTime::from_utc(ending_time, Utc),
                is_public,
                admin: AccountResponse {
                    uuid: admin_uuid,
                    username: admin_username,
                    display_name: admin_display_name,
                },
                challenge_count: challenge_counts.get(&uuid).copied().unwrap_or(0),
                participant_count: participant_counts.get(&uuid).copied().unwrap_or(0),
            }
        },
    )
    .collect();

    Ok(Json(GetGamesResponse { games }))
}

/// A single game
#[derive(Serialize, ToSchema)]
pub struct GameResponse {
    uuid: Uuid,
    #[schema(example = "Herbert's ctf")]
    title: String,
    #[schema(example = "A selection of easy web challenges")]
    description: Option<String>,
    ending_time: DateTime<Utc>,
    /// Convenience flag, derived from `ending_time`
    has_ended: bool,
    is_public: bool,
    admin: AccountResponse,
    /// Whether the executing user participates in this game
    joined: bool,
    #[schema(example = 42)]
    participant_count: u64,
}

/// Retrieve a single game
///
/// Private games are only returned to their participants and admin.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the requested game", body = GameResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/games/{uuid}")]
pub async fn get_game(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GameResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    let game = query!(db.as_ref(), Game)
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    let joined = query!(db.as_ref(), (GameParticipant::F.uuid,))
        .condition(and!(
            GameParticipant::F.game.equals(game.uuid.as_ref()),
            GameParticipant::F.player.equals(account.uuid.as_ref())
        ))
        .optional()
        .await?
        .is_some();

    let is_admin = *game.admin.key() == account.uuid;
    if !game.is_public && !joined && !is_admin {
        return Err(ApiError::MissingPrivileges);
    }

    let admin = query!(db.as_ref(), Account)
        .condition(Account::F.uuid.equals(game.admin.key().as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::InternalServerError)?;

    let participant_count = query!(db.as_ref(), (GameParticipant::F.uuid.count(),))
        .condition(GameParticipant::F.game.equals(game.uuid.as_ref()))
        .one()
        .await?
        .0 as u64;

    Ok(Json(GameResponse {
        uuid: game.uuid,
        title: game.title,
        description: game.description,
        ending_time: DateTime::from_utc(game.ending_time, Utc),
        has_ended: Utc::now().naive_utc() > game.ending_time,
        is_public: game.is_public,
        admin: admin.into(),
        joined,
        participant_count,
    }))
}

/// The request to update a game's settings
///
/// All parameter are optional, but at least one of them is required.
#[derive(Deserialize, ToSchema)]
pub struct UpdateGameRequest {
    #[schema(example = "Herbert's harder ctf")]
    title: Option<String>,
    description: Option<String>,
    ending_time: Option<DateTime<Utc>>,
    is_public: Option<bool>,
}

/// Update the settings of a game
///
/// Only the game's admin may do this.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Game has been updated"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = UpdateGameRequest,
    security(("session_cookie" = []))
)]
#[put("/games/{uuid}")]
pub async fn update_game(
    path: Path<PathUuid>,
    req: Json<UpdateGameRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = session_account(db.as_ref(), &session).await?;

    if let Some(title) = &req.title {
        if title.is_empty() {
            return Err(ApiError::InvalidTitle);
        }
    }

    let mut tx = db.start_transaction().await?;

    let game = query!(&mut tx, Game)
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    if *game.admin.key() != account.uuid {
        return Err(ApiError::MissingPrivileges);
    }

    let req = req.into_inner();
    update!(&mut tx, Game)
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .begin_dyn_set()
        .set_if(Game::F.title, req.title)
        .set_if(Game::F.description, req.description.map(Some))
        .set_if(
            Game::F.ending_time,
            req.ending_time.map(|et| et.naive_utc()),
        )
        .set_if(Game::F.is_public, req.is_public)
        .finish_dyn_set()
        .map_err(|_| ApiError::EmptyJson)?
        .exec()
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// Join a public game
///
/// Private games can only be entered through invites.
#[utoipa::path(
    tag = "Games",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Joined the game"),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[post("/games/{uuid}/join")]
pub async fn join_game(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<HttpResponse> {
    let account = named_session_account(db.as_ref(), &session).await?;

    let mut tx = db.start_transaction().await?;

    let game = query!(&mut tx, Game)
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    if !game.is_public {
        return Err(ApiError::MissingPrivileges);
    }

    if Utc::now().naive_utc() > game.ending_time {
        return Err(ApiError::GameEnded);
    }

    if query!(&mut tx, (GameParticipant::F.uuid,))
        .condition(and!(
            GameParticipant::F.game.equals(game.uuid.as_ref()),
            GameParticipant::F.player.equals(account.uuid.as_ref())
        ))
        .optional()
        .await?
        .is_some()
    {
        return Err(ApiError::AlreadyParticipant);
    }

    insert!(&mut tx, GameParticipantInsert)
        .single(&GameParticipantInsert {
            uuid: Uuid::new_v4(),
            game: ForeignModelByField::Key(game.uuid),
            player: ForeignModelByField::Key(account.uuid),
        })
        .await?;

    tx.commit().await?;

    Ok(HttpResponse::Ok().finish())
}

/// A single row of a game's leaderboard
#[derive(Serialize, ToSchema)]
pub struct LeaderboardEntryResponse {
    user: AccountResponse,
    #[schema(example = 1337)]
    score: i64,
    #[schema(example = 5)]
    challenges_solved: u64,
}

/// The computed leaderboard of a game
#[derive(Serialize, ToSchema)]
pub struct GetLeaderboardResponse {
    entries: Vec<LeaderboardEntryResponse>,
}

/// Retrieve the leaderboard of a game
///
/// The leaderboard is recomputed from the submission log on every call,
/// sorted by score. Ties are broken in favor of whoever completed their
/// score first. For private games this endpoint requires participation.
#[utoipa::path(
    tag = "Games",
    responses(
        (status = 200, description = "Returns the game's leaderboard", body = GetLeaderboardResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
)]
#[get("/api/v1/games/{uuid}/leaderboard")]
pub async fn get_leaderboard(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetLeaderboardResponse>> {
    let game = query!(db.as_ref(), Game)
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    if !game.is_public {
        // leaderboards of private games are for their members only
        let caller: Option<Uuid> = session.get("uuid").ok().flatten();
        let caller = caller.ok_or(ApiError::MissingPrivileges)?;

        if *game.admin.key() != caller
            && query!(db.as_ref(), (GameParticipant::F.uuid,))
                .condition(and!(
                    GameParticipant::F.game.equals(game.uuid.as_ref()),
                    GameParticipant::F.player.equals(caller.as_ref())
                ))
                .optional()
                .await?
                .is_none()
        {
            return Err(ApiError::MissingPrivileges);
        }
    }

    let submissions = query!(
        db.as_ref(),
        (
            Submission::F.flag,
            Submission::F.created_at,
            Submission::F.challenge.flag,
            Submission::F.challenge.point_value,
            Submission::F.player.uuid,
            Submission::F.player.username,
            Submission::F.player.display_name,
        )
    )
    .condition(Submission::F.challenge.game.equals(game.uuid.as_ref()))
    .all()
    .await?;

    let mut players: HashMap<Uuid, AccountResponse> = HashMap::new();
    let rows: Vec<ScoredSubmission> = submissions
        .into_iter()
        .map(
            |(guess, submitted_at, challenge_flag, point_value, uuid, username, display_name)| {
                players.entry(uuid).or_insert(AccountResponse {
                    uuid,
                    username,
                    display_name,
                });
                ScoredSubmission {
                    player: uuid,
                    guess,
                    challenge_flag,
                    point_value,
                    submitted_at,
                }
            },
        )
        .collect();

    let entries = compute_leaderboard(rows)
        .into_iter()
        .filter_map(|entry| {
            players.remove(&entry.player).map(|user| LeaderboardEntryResponse {
                user,
                score: entry.score,
                challenges_solved: entry.challenges_solved,
            })
        })
        .collect();

    Ok(Json(GetLeaderboardResponse { entries }))
}
