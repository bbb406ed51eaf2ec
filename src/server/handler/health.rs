use actix_web::get;
use actix_web::web::{Data, Json};
use chrono::Utc;
use rorm::{query, Database, Model};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Account, Game};
use crate::server::handler::{ApiErrorResponse, ApiResult};

/// The health data of this server
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = 1337)]
    registered_accounts: u64,
    #[schema(example = 42)]
    running_games: u64,
}

/// Request health data from this server.
///
/// `registered_accounts` are the currently registered user accounts on the server
/// `running_games` are the games whose ending time has not passed yet
#[utoipa::path(
    tag = "Server status",
    context_path = "/api/v1/admin",
    responses(
        (status = 200, description = "Health data of this server", body = HealthResponse),
        (status = 400, description = "Client error", body = ApiErrorResponse),
        (status = 500, description = "Server error", body = ApiErrorResponse),
    ),
    security(("admin_token" = []))
)]
#[get("/health")]
pub async fn health(db: Data<Database>) -> ApiResult<Json<HealthResponse>> {
    let accounts = query!(db.as_ref(), (Account::F.uuid.count(),))
        .one()
        .await?
        .0 as u64;

    let now = Utc::now().naive_utc();
    let running_games = query!(db.as_ref(), (Game::F.ending_time,))
        .all()
        .await?
        .into_iter()
        .filter(|(ending_time,)| *ending_time >= now)
        .count() as u64;

    Ok(Json(HealthResponse {
        registered_accounts: accounts,
        running_games,
    }))
}
