use actix_web::{HttpMessage, HttpRequest, HttpResponse, Result};
use actix_web::cookie::Cookie;
use actix_web::http::header::LOCATION;
use actix_web::web::{Data, Json, Path, Query};
use serde::{Deserialize, Serialize};

use super::{CALLBACK_PATH, auth_error, authenticate, error_body, poll_error};
use crate::{
    auth::{AccessToken, AuthGateway, Session, SignUp},
    model::User,
    operations::PollOperationsT,
};

pub const CODE_VERIFIER_COOKIE: &str = "pollster-code-verifier";

#[derive(Deserialize, Serialize, Debug)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct ProviderQuery {
    pub redirect_to: String,
}

#[derive(Deserialize, Debug)]
pub struct CallbackQuery {
    pub code: String,
}

async fn register_session<A: PollOperationsT>(ops: &A, session: &Session) -> Result<()> {
    ops.register_user(&session.user)
        .await
        .map_err(poll_error)?;
    Ok(())
}

pub async fn sign_up_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    body: Json<CredentialsRequest>) -> Result<Json<SignUp>>
{
    let Json(credentials) = body;
    let signed_up = gateway.sign_up(&credentials.email, &credentials.password)
        .await
        .map_err(auth_error)?;
    if let SignUp::Session(session) = &signed_up {
        register_session(ops.get_ref(), session).await?;
    }
    Ok(Json(signed_up))
}

pub async fn sign_in_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    body: Json<CredentialsRequest>) -> Result<Json<Session>>
{
    let Json(credentials) = body;
    let session = gateway.sign_in(&credentials.email, &credentials.password)
        .await
        .map_err(auth_error)?;
    register_session(ops.get_ref(), &session).await?;
    Ok(Json(session))
}

pub async fn sign_out_handler<G: 'static + AuthGateway>(
    gateway: Data<G>,
    AccessToken(token): AccessToken) -> Result<HttpResponse>
{
    gateway.sign_out(&token)
        .await
        .map_err(auth_error)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn current_user_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken) -> Result<Json<User>>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    Ok(Json(user))
}

/// Starts an OAuth sign-in. The PKCE verifier rides along in a cookie scoped
/// to the callback.
pub async fn provider_handler<G: 'static + AuthGateway>(
    gateway: Data<G>,
    Path(provider): Path<String>,
    query: Query<ProviderQuery>) -> Result<HttpResponse>
{
    let redirect = gateway.sign_in_with_provider(&provider, &query.redirect_to)
        .map_err(auth_error)?;
    let cookie = Cookie::build(CODE_VERIFIER_COOKIE, redirect.code_verifier)
        .path(CALLBACK_PATH)
        .http_only(true)
        .finish();
    Ok(HttpResponse::Found()
        .header(LOCATION, redirect.url)
        .cookie(cookie)
        .finish())
}

pub async fn callback_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    req: HttpRequest,
    ops: Data<A>,
    gateway: Data<G>,
    query: Query<CallbackQuery>) -> Result<HttpResponse>
{
    let verifier = req.cookie(CODE_VERIFIER_COOKIE)
        .ok_or_else(|| error_body(HttpResponse::BadRequest(), "Missing code verifier"))?;
    let session = gateway.exchange_code_for_session(&query.code, verifier.value())
        .await
        .map_err(auth_error)?;
    register_session(ops.get_ref(), &session).await?;
    let used = Cookie::build(CODE_VERIFIER_COOKIE, "")
        .path(CALLBACK_PATH)
        .finish();
    Ok(HttpResponse::Ok()
        .del_cookie(&used)
        .json(session))
}
