//! The submission gate: accepting or rejecting flag guesses
//!
//! Every guess that passes the gate is persisted before it is judged.
//! An incorrect guess therefore fails the request but still leaves a
//! durable attempt record behind, which is what makes the submission
//! log usable as an audit trail and as the leaderboard's input.

use actix_toolbox::tb_middleware::Session;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post};
use chrono::{DateTime, NaiveDateTime, Utc};
use rorm::fields::types::ForeignModelByField;
use rorm::{and, insert, query, Database, FieldAccess, Model};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Challenge, Game, Submission, SubmissionInsert};
use crate::server::handler::{
    named_session_account, ApiError, ApiErrorResponse, ApiResult, PathUuid,
};

/// Decide whether a new guess may enter the submission log.
///
/// `prior_guesses` are all flags this user has submitted for this
/// challenge so far. The checks are ordered: a game that has ended
/// rejects everything, a solved challenge rejects even duplicates of
/// old wrong guesses, and only then are exact repeats filtered.
pub(crate) fn check_submittable(
    now: NaiveDateTime,
    ending_time: NaiveDateTime,
    prior_guesses: &[String],
    challenge_flag: &str,
    guess: &str,
) -> Result<(), ApiError> {
    if now > ending_time {
        return Err(ApiError::GameEnded);
    }

    if prior_guesses.iter().any(|prior| prior == challenge_flag) {
        return Err(ApiError::AlreadySolved);
    }

    if prior_guesses.iter().any(|prior| prior == guess) {
        return Err(ApiError::DuplicateAttempt);
    }

    Ok(())
}

/// The request to submit a flag guess
#[derive(Deserialize, ToSchema)]
pub struct SubmitFlagRequest {
    #[schema(example = "FLAG{s4mpl3}")]
    flag: String,
}

/// A recorded submission of the executing user
#[derive(Serialize, ToSchema)]
pub struct SubmissionResponse {
    uuid: Uuid,
    challenge_uuid: Uuid,
    #[schema(example = "FLAG{s4mpl3}")]
    flag: String,
    created_at: DateTime<Utc>,
}

/// Submit a flag guess for a challenge
///
/// The attempt is checked in order: the game must still be running, the
/// challenge must not already be solved by the executing user and the
/// exact same guess must not have been tried before. A guess passing
/// those checks is recorded *unconditionally*; if it then turns out to
/// be wrong the request fails with `IncorrectFlag` but the attempt
/// stays recorded.
///
/// All checks and the insert run in one transaction, so two racing
/// submissions of the same correct flag can not both be counted.
#[utoipa::path(
    tag = "Submissions",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "The flag was correct", body = SubmissionResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    request_body = SubmitFlagRequest,
    security(("session_cookie" = []))
)]
#[post("/challenges/{uuid}/submissions")]
pub async fn submit_flag(
    path: Path<PathUuid>,
    req: Json<SubmitFlagRequest>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<SubmissionResponse>> {
    let account = named_session_account(db.as_ref(), &session).await?;

    if req.flag.is_empty() {
        return Err(ApiError::InvalidFlag);
    }

    let mut tx = db.start_transaction().await?;

    let challenge = query!(&mut tx, Challenge)
        .condition(Challenge::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .ok_or(ApiError::ChallengeNotFound)?;

    let (ending_time,) = query!(&mut tx, (Game::F.ending_time,))
        .condition(Game::F.uuid.equals(challenge.game.key().as_ref()))
        .one()
        .await?;

    let prior_guesses: Vec<String> = query!(&mut tx, (Submission::F.flag,))
        .condition(and!(
            Submission::F.challenge.equals(challenge.uuid.as_ref()),
            Submission::F.player.equals(account.uuid.as_ref())
        ))
        .all()
        .await?
        .into_iter()
        .map(|(flag,)| flag)
        .collect();

    check_submittable(
        Utc::now().naive_utc(),
        ending_time,
        &prior_guesses,
        &challenge.flag,
        &req.flag,
    )?;

    let uuid = Uuid::new_v4();
    insert!(&mut tx, SubmissionInsert)
        .single(&SubmissionInsert {
            uuid,
            challenge: ForeignModelByField::Key(challenge.uuid),
            player: ForeignModelByField::Key(account.uuid),
            flag: req.flag.clone(),
        })
        .await?;

    let (created_at,) = query!(&mut tx, (Submission::F.created_at,))
        .condition(Submission::F.uuid.equals(uuid.as_ref()))
        .one()
        .await?;

    tx.commit().await?;

    // Judged only after the attempt has been committed
    if req.flag != challenge.flag {
        return Err(ApiError::IncorrectFlag);
    }

    Ok(Json(SubmissionResponse {
        uuid,
        challenge_uuid: challenge.uuid,
        flag: req.into_inner().flag,
        created_at: DateTime::from_utc(created_at, Utc),
    }))
}

/// A single submission in the executing user's history
#[derive(Serialize, ToSchema)]
pub struct SubmissionHistoryEntry {
    uuid: Uuid,
    challenge_uuid: Uuid,
    #[schema(example = "Baby's first overflow")]
    challenge_title: String,
    #[schema(example = 100)]
    point_value: i64,
    #[schema(example = "FLAG{gu3ss}")]
    flag: String,
    /// Derived by comparing the guess against the challenge's current flag
    correct: bool,
    created_at: DateTime<Utc>,
}

/// The executing user's submissions within one game
#[derive(Serialize, ToSchema)]
pub struct GetSubmissionsResponse {
    submissions: Vec<SubmissionHistoryEntry>,
}

/// Retrieve the executing user's submissions in a game, newest first
#[utoipa::path(
    tag = "Submissions",
    context_path = "/api/v1",
    responses(
        (status = 200, description = "Returns the executing user's submissions", body = GetSubmissionsResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    params(PathUuid),
    security(("session_cookie" = []))
)]
#[get("/games/{uuid}/submissions")]
pub async fn get_my_submissions(
    path: Path<PathUuid>,
    db: Data<Database>,
    session: Session,
) -> ApiResult<Json<GetSubmissionsResponse>> {
    let account = named_session_account(db.as_ref(), &session).await?;

    if query!(db.as_ref(), (Game::F.uuid,))
        .condition(Game::F.uuid.equals(path.uuid.as_ref()))
        .optional()
        .await?
        .is_none()
    {
        return Err(ApiError::GameNotFound);
    }

    let mut submissions = query!(
        db.as_ref(),
        (
            Submission::F.uuid,
            Submission::F.flag,
            Submission::F.created_at,
            Submission::F.challenge.uuid,
            Submission::F.challenge.title,
            Submission::F.challenge.point_value,
            Submission::F.challenge.flag,
        )
    )
    .condition(and!(
        Submission::F.challenge.game.equals(path.uuid.as_ref()),
        Submission::F.player.equals(account.uuid.as_ref())
    ))
    .all()
    .await?;
    submissions.sort_by(|a, b| b.2.cmp(&a.2));

    Ok(Json(GetSubmissionsResponse {
        submissions: submissions
            .into_iter()
            .map(
                |(uuid, flag, created_at, challenge_uuid, title, point_value, challenge_flag)| {
                    SubmissionHistoryEntry {
                        uuid,
                        challenge_uuid,
                        challenge_title: title,
                        point_value,
                        correct: flag == challenge_flag,
                        flag,
                        created_at: DateTime::from_utc(created_at, Utc),
                    }
                },
            )
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::check_submittable;
    use crate::server::handler::ApiError;

    const FLAG: &str = "FLAG{x}";

    fn t(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    fn guesses(prior: &[&str]) -> Vec<String> {
        prior.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fresh_guess_passes() {
        assert!(check_submittable(t(0), t(60), &[], FLAG, "wrong").is_ok());
        assert!(check_submittable(t(0), t(60), &[], FLAG, FLAG).is_ok());
    }

    #[test]
    fn ended_game_rejects_everything() {
        let prior = guesses(&[FLAG]);
        assert!(matches!(
            check_submittable(t(61), t(60), &prior, FLAG, FLAG),
            Err(ApiError::GameEnded)
        ));
        assert!(matches!(
            check_submittable(t(61), t(60), &[], FLAG, "wrong"),
            Err(ApiError::GameEnded)
        ));
    }

    #[test]
    fn ending_time_itself_is_still_playable() {
        assert!(check_submittable(t(60), t(60), &[], FLAG, FLAG).is_ok());
    }

    #[test]
    fn second_solve_is_rejected() {
        let prior = guesses(&["wrong", FLAG]);
        assert!(matches!(
            check_submittable(t(0), t(60), &prior, FLAG, "other"),
            Err(ApiError::AlreadySolved)
        ));
    }

    #[test]
    fn repeated_wrong_guess_is_a_duplicate() {
        let prior = guesses(&["wrong"]);
        assert!(matches!(
            check_submittable(t(0), t(60), &prior, FLAG, "wrong"),
            Err(ApiError::DuplicateAttempt)
        ));
    }

    #[test]
    fn already_solved_wins_over_duplicate() {
        // resubmitting an old wrong guess after the solve reports the
        // solve, not the duplicate
        let prior = guesses(&["wrong", FLAG]);
        assert!(matches!(
            check_submittable(t(0), t(60), &prior, FLAG, "wrong"),
            Err(ApiError::AlreadySolved)
        ));
    }

    #[test]
    fn full_match_lifecycle() {
        // game ends at t(60), challenge worth 100 points
        let mut prior: Vec<String> = vec![];

        // wrong guess at t(50): rejected as incorrect by the judge, but
        // the gate lets it through and the row is recorded
        assert!(check_submittable(t(50), t(60), &prior, FLAG, "wrong").is_ok());
        prior.push("wrong".to_string());

        // correct guess at t(55)
        assert!(check_submittable(t(55), t(60), &prior, FLAG, FLAG).is_ok());
        prior.push(FLAG.to_string());

        // the same flag again at t(59)
        assert!(matches!(
            check_submittable(t(59), t(60), &prior, FLAG, FLAG),
            Err(ApiError::AlreadySolved)
        ));

        // the old wrong guess again at t(59)
        assert!(matches!(
            check_submittable(t(59), t(60), &prior, FLAG, "wrong"),
            Err(ApiError::AlreadySolved)
        ));
    }
}
