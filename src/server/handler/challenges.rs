//! Handlers for creating and viewing challenges
//!
//! A challenge's flag is a secret: list responses never contain it and
//! the dedicated flag endpoint only serves the game admin and users
//! that have already solved the challenge.

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post};
use chrono::{DateTime, Utc};
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, query, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Challenge, ChallengeInsert, Game, GameParticipant, Submission};
use crate::server::handler::{session_account, ApiError, ApiErrorResponse, ApiResult, PathUuid};

/// The request to create a new challenge
#[derive(Deserialize, ToSchema)]
pub struct CreateChallengeRequest {
    #[schema(example = "Baby's first overflow")]
    title: String,
    #[schema(example = "The stack is lava")]
    description: Option<String>,
    /// The secret that solves this challenge
    #[schema(example = "FLAG{s4mpl3}")]
    flag: String,
    /// The score awarded for solving this challenge, must be positive
    #[schema(example = 100)]
    point_value: i64,
}

/// The response of a created challenge
#[derive(Serialize, ToSchema)]
pub struct CreateChallengeResponse {
    uuid: Uuid,
}

/// Create a new challenge in a game
///
/// Only the game's admin may do this, and only while the game is running.
#[utoipa::path(
    tag = "Challenges",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Challenge got created", body = CreateChallengeResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = CreateChallengeRequest,
    security(("session_cookie" = []))
)]
#[post("/games/{uuid}/challenges")]
pub async fn create_challenge(
    path: Path<PathUuid>,
    req: Json<CreateChallengeRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<CreateChallengeResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    if req.title.is_empty() {
        return Err(ApiError::InvalidTitle);
    }

    if req.flag.is_empty() {
        return Err(ApiError::InvalidFlag);
    }

    if req.point_value <= 0 {
        return Err(ApiError::InvalidPointValue);
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

    if Utc::now().naive_utc() > game.ending_time {
        return Err(ApiError::GameEnded);
    }

    let uuid = Uuid::new_v4();
    insert!(&mut tx, ChallengeInsert)
        .single(&ChallengeInsert {
            uuid,
            game: ForeignModelByField::Key(game.uuid),
            title: req.title.clone(),
            description: req.description.clone(),
            flag: req.flag.clone(),
            point_value: req.point_value,
        })
        .await?;

    tx.commit().await?;

    Ok(Json(CreateChallengeResponse { uuid }))
}

/// A single challenge as seen by a participant
///
/// The flag itself is never part of this response.
#[derive(Serialize, ToSchema)]
pub struct ChallengeResponse {
    uuid: Uuid,
    #[schema(example = "Baby's first overflow")]
    title: String,
    #[schema(example = "The stack is lava")]
    description: Option<String>,
    #[schema(example = 100)]
    point_value: i64,
    /// Whether the executing user has already solved this challenge
    solved: bool,
    created_at: DateTime<Utc>,
}

/// The challenges of a game
#[derive(Serialize, ToSchema)]
pub struct GetChallengesResponse {
    challenges: Vec<ChallengeResponse>,
}

/// Retrieve all challenges of a game, ordered by point value
///
/// Only participants and the admin may view a game's challenges.
/// Whether the executing user solved a challenge is derived from its
/// submission log on the fly.
#[utoipa::path(
    tag = "Challenges",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the game's challenges", body = GetChallengesResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/games/{uuid}/challenges")]
pub async fn get_challenges(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetChallengesResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    let game = query!(db.as_ref(), Game)
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::GameNotFound)?;

    if *game.admin.key() != account.uuid
        && query!(db.as_ref(), (GameParticipant::F.uuid,))
            .condition(and!(
                GameParticipant::F.game.equals(game.uuid.as_ref()),
                GameParticipant::F.player.equals(account.uuid.as_ref())
            ))
            .optional()
            .await?
            .is_none()
    {
        return Err(ApiError::MissingPrivileges);
    }

    let mut challenges = query!(db.as_ref(), Challenge)
        .condition(Challenge::F.game.equals(game.uuid.as_ref()))
        .all()
        .await?;
    challenges.sort_by_key(|c| c.point_value);

    let my_submissions = query!(db.as_ref(), (Submission::F.challenge, Submission::F.flag))
        .condition(and!(
            Submission::F.challenge.game.equals(game.uuid.as_ref()),
            Submission::F.player.equals(account.uuid.as_ref())
        ))
        .all()
        .await?;

    Ok(Json(GetChallengesResponse {
        challenges: challenges
            .into_iter()
            .map(|challenge| {
                let solved = my_submissions
                    .iter()
                    .any(|(ch, flag)| *ch.key() == challenge.uuid && *flag == challenge.flag);
                ChallengeResponse {
                    uuid: challenge.uuid,
                    title: challenge.title,
                    description: challenge.description,
                    point_value: challenge.point_value,
                    solved,
                    created_at: DateTime::from_utc(challenge.created_at, Utc),
                }
            })
            .collect(),
    }))
}

/// The flag of a challenge
#[derive(Serialize, ToSchema)]
pub struct GetFlagResponse {
    #[schema(example = "FLAG{s4mpl3}")]
    flag: String,
}

/// Retrieve the raw flag of a challenge
///
/// The flag is only revealed to the game's admin and to users with a
/// recorded correct submission for the challenge. There is no other
/// path to the secret.
#[utoipa::path(
    tag = "Challenges",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the challenge's flag", body = GetFlagResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/challenges/{uuid}/flag")]
pub async fn get_flag(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetFlagResponse>> {
    let account = session_account(db.as_ref(), &session).await?;

    let challenge = query!(db.as_ref(), Challenge)
        .condition(Challenge::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::ChallengeNotFound)?;

    let (admin,) = query!(db.as_ref(), (Game::F.admin,))
        .condition(Game::F.uuid.equals(challenge.game.key().as_ref()))
        .one()
        .await?;

    if *admin.key() != account.uuid {
        let solved = query!(db.as_ref(), (Submission::F.uuid,))
            .condition(and!(
                Submission::F.challenge.equals(challenge.uuid.as_ref()),
                Submission::F.player.equals(account.uuid.as_ref()),
                Submission::F.flag.equals(&challenge.flag)
            ))
            .optional()
            .await?
            .is_some();

        if !solved {
            return Err(ApiError::MissingPrivileges);
        }
    }

    Ok(Json(GetFlagResponse {
        flag: challenge.flag,
    }))
}
