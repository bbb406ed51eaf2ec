//! This module holds the server definition

use std::net::SocketAddr;

use actix_toolbox::tb_middleware::{
    setup_logging_mw, DBSessionStore, LoggingMiddlewareConfig, PersistentSession, SessionMiddleware,
};
use actix_web::cookie::time::Duration;
use actix_web::cookie::Key;
use actix_web::http::StatusCode;
use actix_web::middleware::{Compress, ErrorHandlers};
use actix_web::web::{scope, Data, JsonConfig, PayloadConfig};
use actix_web::{App, HttpServer};
use base64::prelude::{Engine, BASE64_STANDARD};
use log::info;
use rorm::Database;
use utoipa::OpenApi;
use utoipa_swagger_ui::{SwaggerUi, Url};

use crate::config::Config;
use crate::server::error::StartServerError;
use crate::server::handler::{
    accept_invite_link, accept_user_invite, bulk_user_invite, cancel_invite_link,
    cancel_user_invite, check_username, create_challenge, create_game, create_invite_link,
    create_user_invite, decline_user_invite, get_account_stats, get_challenges, get_flag, get_game,
    get_game_invites, get_games, get_invite_link, get_leaderboard, get_me, get_my_invites,
    get_my_submissions, health, join_game, login, logout, register_account, set_username,
    submit_flag, update_game, update_me, version,
};
use crate::server::middleware::{
    handle_not_found, json_extractor_error, AdminTokenRequired, AuthenticationRequired,
};
use crate::server::swagger::{AdminApiDoc, ApiDoc};

pub mod error;
pub mod handler;
pub mod middleware;
pub mod swagger;

/// Start the flagforge server
///
/// **Parameter**:
/// - `config`: Reference to a [Config] struct
/// - `db`: [Database]
pub async fn start_server(config: &Config, db: Database) -> Result<(), StartServerError> {
    let s_addr = SocketAddr::new(config.server.listen_address, config.server.listen_port);

    let key = Key::try_from(
        BASE64_STANDARD
            .decode(&config.server.secret_key)?
            .as_slice(),
    )
    .map_err(|_| StartServerError::InvalidSecretKey)?;

    let admin_token = config.server.admin_token.clone();

    info!("Starting to listen on {}", s_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(PayloadConfig::default())
            .app_data(JsonConfig::default().error_handler(json_extractor_error))
            .app_data(Data::new(db.clone()))
            .wrap(setup_logging_mw(LoggingMiddlewareConfig::default()))
            .wrap(
                SessionMiddleware::builder(DBSessionStore::new(db.clone()), key.clone())
                    .session_lifecycle(PersistentSession::default().session_ttl(Duration::days(1)))
                    .build(),
            )
            .wrap(Compress::default())
            .wrap(ErrorHandlers::new().handler(StatusCode::NOT_FOUND, handle_not_found))
            .service(
                SwaggerUi::new("/docs/{_:.*}").urls(vec![
                    (
                        Url::new("api", "/api-doc/openapi.json"),
                        ApiDoc::openapi(),
                    ),
                    (
                        Url::new("admin-api", "/api-doc/admin-openapi.json"),
                        AdminApiDoc::openapi(),
                    ),
                ]),
            )
            .service(version)
            .service(register_account)
            .service(check_username)
            .service(get_leaderboard)
            .service(get_invite_link)
            .service(scope("/api/v1/auth").service(login).service(logout))
            .service(
                scope("/api/v1/admin")
                    .wrap(AdminTokenRequired {
                        token: admin_token.clone(),
                    })
                    .service(health),
            )
            .service(
                scope("/api/v1")
                    .wrap(AuthenticationRequired)
                    .service(get_me)
                    .service(update_me)
                    .service(set_username)
                    .service(get_account_stats)
                    .service(create_game)
                    .service(get_games)
                    .service(get_game)
                    .service(update_game)
                    .service(join_game)
                    .service(create_challenge)
                    .service(get_challenges)
                    .service(get_flag)
                    .service(submit_flag)
                    .service(get_my_submissions)
                    .service(create_user_invite)
                    .service(bulk_user_invite)
                    .service(create_invite_link)
                    .service(get_my_invites)
                    .service(get_game_invites)
                    .service(accept_user_invite)
                    .service(accept_invite_link)
                    .service(decline_user_invite)
                    .service(cancel_user_invite)
                    .service(cancel_invite_link),
            )
    })
    .bind(s_addr)?
    .run()
    .await?;

    Ok(())
}
