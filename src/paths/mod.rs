use actix_web::{HttpResponse, Result, web};
use actix_web::dev::HttpResponseBuilder;
use actix_web::web::ServiceConfig;
use serde_json::json;

use crate::{
    auth::{AccessToken, AuthError, AuthGateway},
    model::User,
    operations::{PollError, PollOperationsT, VoteError},
    lifecycle::PollStatus,
    validation::ValidationErrors,
};

mod auth;
mod polls;
mod votes;

pub const POLLS_PATH: &str = "/polls";
pub const POLL_PATH: &str = "/polls/{poll_id}";
pub const DUPLICATE_PATH: &str = "/polls/{poll_id}/duplicate";
pub const ARCHIVE_PATH: &str = "/polls/{poll_id}/archive";
pub const RESTORE_PATH: &str = "/polls/{poll_id}/restore";
pub const OWNERSHIP_PATH: &str = "/polls/{poll_id}/ownership";
pub const VOTE_PATH: &str = "/polls/{poll_id}/vote";
pub const VOTING_STATS_PATH: &str = "/users/{user_id}/voting-stats";

pub const SIGN_UP_PATH: &str = "/auth/signup";
pub const SIGN_IN_PATH: &str = "/auth/signin";
pub const SIGN_OUT_PATH: &str = "/auth/signout";
pub const CURRENT_USER_PATH: &str = "/auth/user";
pub const PROVIDER_PATH: &str = "/auth/providers/{provider}";
pub const CALLBACK_PATH: &str = "/auth/callback";

fn error_body(mut builder: HttpResponseBuilder, message: &str) -> HttpResponse {
    builder.json(json!({ "error": message }))
}

fn invalid(errors: ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "errors": errors }))
}

fn poll_error(e: PollError) -> HttpResponse {
    match e {
        PollError::Invalid(errors) => invalid(errors),
        PollError::NotFound => HttpResponse::NotFound().finish(),
        PollError::Unexpected => HttpResponse::InternalServerError().finish(),
    }
}

fn vote_error(e: VoteError) -> HttpResponse {
    match e {
        VoteError::Invalid(errors) => invalid(errors),
        VoteError::PollNotFound => HttpResponse::NotFound().finish(),
        VoteError::OptionNotFound =>
            error_body(HttpResponse::BadRequest(), "Option does not belong to this poll"),
        VoteError::VoteNotFound =>
            error_body(HttpResponse::NotFound(), "No vote to change"),
        VoteError::AlreadyVoted =>
            error_body(HttpResponse::Conflict(), "You have already voted on this poll"),
        VoteError::PollNotActive(status) =>
            error_body(HttpResponse::BadRequest(), status.describe()),
        VoteError::PollEnded =>
            error_body(HttpResponse::BadRequest(), PollStatus::Ended.describe()),
        VoteError::Unexpected => HttpResponse::InternalServerError().finish(),
    }
}

fn auth_error(e: AuthError) -> HttpResponse {
    match e {
        AuthError::InvalidCredentials =>
            error_body(HttpResponse::Unauthorized(), "Invalid login credentials"),
        AuthError::Rejected(message) =>
            error_body(HttpResponse::BadRequest(), &message),
        AuthError::Unexpected => HttpResponse::InternalServerError().finish(),
    }
}

/// Resolves the bearer token to a user and mirrors the user into storage.
async fn authenticate<A: PollOperationsT, G: AuthGateway>(ops: &A, gateway: &G, token: &AccessToken)
    -> Result<User>
{
    let user = gateway.get_current_user(&token.0)
        .await
        .map_err(auth_error)?
        .ok_or_else(|| error_body(HttpResponse::Unauthorized(), "Authentication required"))?;
    ops.register_user(&user)
        .await
        .map_err(poll_error)?;
    Ok(user)
}

pub fn config<A, G>(cfg: &mut ServiceConfig)
where A: 'static + PollOperationsT,
      G: 'static + AuthGateway {
    cfg.route(POLLS_PATH, web::get().to(polls::list_polls_handler::<A>))
        .route(POLLS_PATH, web::post().to(polls::post_poll_handler::<A, G>))
        .route(POLL_PATH, web::get().to(polls::get_poll_handler::<A>))
        .route(POLL_PATH, web::put().to(polls::put_poll_handler::<A, G>))
        .route(POLL_PATH, web::delete().to(polls::delete_poll_handler::<A, G>))
        .route(DUPLICATE_PATH, web::post().to(polls::duplicate_poll_handler::<A, G>))
        .route(ARCHIVE_PATH, web::post().to(polls::archive_poll_handler::<A, G>))
        .route(RESTORE_PATH, web::post().to(polls::restore_poll_handler::<A, G>))
        .route(OWNERSHIP_PATH, web::get().to(polls::ownership_handler::<A, G>))
        .route(VOTING_STATS_PATH, web::get().to(polls::voting_stats_handler::<A>))
        .route(VOTE_PATH, web::get().to(votes::get_vote_handler::<A, G>))
        .route(VOTE_PATH, web::post().to(votes::post_vote_handler::<A, G>))
        .route(VOTE_PATH, web::put().to(votes::put_vote_handler::<A, G>))
        .route(VOTE_PATH, web::delete().to(votes::delete_vote_handler::<A, G>))
        .route(SIGN_UP_PATH, web::post().to(auth::sign_up_handler::<A, G>))
        .route(SIGN_IN_PATH, web::post().to(auth::sign_in_handler::<A, G>))
        .route(SIGN_OUT_PATH, web::post().to(auth::sign_out_handler::<G>))
        .route(CURRENT_USER_PATH, web::get().to(auth::current_user_handler::<A, G>))
        .route(PROVIDER_PATH, web::get().to(auth::provider_handler::<G>))
        .route(CALLBACK_PATH, web::get().to(auth::callback_handler::<A, G>))
    ;
}
