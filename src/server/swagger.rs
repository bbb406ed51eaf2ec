//! This module holds the definition of the swagger declaration

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::models;
use crate::server::handler;

struct CookieSecurity;

impl Modify for CookieSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("id"))),
            )
        }
    }
}

/// Helper struct for the openapi definitions.
#[derive(OpenApi)]
#[openapi(
    paths(
        handler::version,
        handler::register_account,
        handler::check_username,
        handler::login,
        handler::logout,
        handler::get_me,
        handler::update_me,
        handler::set_username,
        handler::get_account_stats,
        handler::create_game,
        handler::get_games,
        handler::get_game,
        handler::update_game,
        handler::join_game,
        handler::get_leaderboard,
        handler::create_challenge,
        handler::get_challenges,
        handler::get_flag,
        handler::submit_flag,
        handler::get_my_submissions,
        handler::create_user_invite,
        handler::bulk_user_invite,
        handler::create_invite_link,
        handler::get_my_invites,
        handler::get_game_invites,
        handler::get_invite_link,
        handler::accept_user_invite,
        handler::accept_invite_link,
        handler::decline_user_invite,
        handler::cancel_user_invite,
        handler::cancel_invite_link,
    ),
    components(schemas(
        handler::ApiErrorResponse,
        handler::ApiStatusCode,
        handler::AccountResponse,
        handler::VersionResponse,
        handler::AccountRegistrationRequest,
        handler::CheckUsernameRequest,
        handler::CheckUsernameResponse,
        handler::LoginRequest,
        handler::MeResponse,
        handler::UpdateAccountRequest,
        handler::SetUsernameRequest,
        handler::AccountStatsResponse,
        handler::CreateGameRequest,
        handler::CreateGameResponse,
        handler::GameOverviewResponse,
        handler::GetGamesResponse,
        handler::GameResponse,
        handler::UpdateGameRequest,
        handler::LeaderboardEntryResponse,
        handler::GetLeaderboardResponse,
        handler::CreateChallengeRequest,
        handler::CreateChallengeResponse,
        handler::ChallengeResponse,
        handler::GetChallengesResponse,
        handler::GetFlagResponse,
        handler::SubmitFlagRequest,
        handler::SubmissionResponse,
        handler::SubmissionHistoryEntry,
        handler::GetSubmissionsResponse,
        handler::CreateUserInviteRequest,
        handler::CreateUserInviteResponse,
        handler::BulkUserInviteRequest,
        handler::BulkInviteCreated,
        handler::BulkInviteError,
        handler::BulkUserInviteResponse,
        handler::CreateInviteLinkRequest,
        handler::CreateInviteLinkResponse,
        handler::InviteGameResponse,
        handler::MyInviteResponse,
        handler::GetMyInvitesResponse,
        handler::GameUserInviteResponse,
        handler::GameInviteLinkResponse,
        handler::GetGameInvitesResponse,
        handler::InviteLinkDetailsResponse,
        models::InviteStatus,
        models::LinkUsage,
    )),
    modifiers(&CookieSecurity)
)]
pub struct ApiDoc;

struct TokenSecurity;

impl Modify for TokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "The token is set in the configuration file of the server.",
                        ))
                        .build(),
                ),
            )
        }
    }
}

/// Helper struct for the admin openapi definitions.
#[derive(OpenApi)]
#[openapi(
    paths(
        handler::health,
    ),
    components(schemas(
        handler::ApiErrorResponse,
        handler::ApiStatusCode,
        handler::HealthResponse,
    )),
    modifiers(&TokenSecurity)
)]
pub struct AdminApiDoc;
