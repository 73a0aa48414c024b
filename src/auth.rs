use std::future::{Ready, ready};

use actix_web::{Error, FromRequest, HttpRequest, HttpResponse};
use actix_web::client::Client;
use actix_web::dev::Payload;
use actix_web::http::{StatusCode, header};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::model::User;
use crate::util;

#[cfg(test)]
use mockall::automock;

const BEARER: &str = "Bearer ";
const CODE_VERIFIER_LEN: usize = 64;

/// Raw token from `Authorization: Bearer <token>`. Whether it names a user is
/// up to the `AuthGateway`.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken(pub String);

impl FromRequest for AccessToken {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;
    type Config = ();

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = req.headers()
            .get(header::AUTHORIZATION)
            .ok_or_else(|| {
                let msg = format!("Missing header: {}", header::AUTHORIZATION);
                Error::from(HttpResponse::Unauthorized().body(msg))
            }).and_then(|header_value|
                header_value
                    .to_str()
                    .ok()
                    .filter(|value| value.starts_with(BEARER))
                    .map(|value| value[BEARER.len()..].trim().to_owned())
                    .filter(|token| !token.is_empty())
                    .ok_or_else(|| {
                        let msg = format!("Malformed header: {}", header::AUTHORIZATION);
                        Error::from(HttpResponse::Unauthorized().body(msg))
                    })
            ).map(AccessToken);

        ready(token)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: User,
}

/// Sign-up either signs the user in straight away or, when the provider wants
/// the email confirmed first, only returns the new user.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SignUp {
    Session(Session),
    ConfirmationPending(User),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProviderRedirect {
    pub url: String,
    pub code_verifier: String,
}

#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    Rejected(String),
    Unexpected,
}

#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait AuthGateway {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
    /// `None` when the token is unknown or expired.
    async fn get_current_user(&self, access_token: &str) -> Result<Option<User>, AuthError>;
    fn sign_in_with_provider(&self, provider: &str, redirect_url: &str) -> Result<ProviderRedirect, AuthError>;
    async fn exchange_code_for_session(&self, code: &str, code_verifier: &str) -> Result<Session, AuthError>;
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CodeExchange<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "error_description", alias = "message")]
    msg: Option<String>,
}

/// Client for a GoTrue-style auth API.
pub struct GoTrueGateway {
    client: Client,
    config: AuthConfig,
}

impl GoTrueGateway {
    pub fn new(config: AuthConfig) -> GoTrueGateway {
        GoTrueGateway {
            client: Client::default(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }
}

fn log_request_error(e: impl std::fmt::Display) -> AuthError {
    error!("auth request failed: {}", e);
    AuthError::Unexpected
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.msg)
        .unwrap_or_else(|| status.to_string())
}

fn rejection(status: StatusCode, body: &[u8]) -> AuthError {
    let message = error_message(status, body);
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
            debug!("auth provider refused credentials: {}", message);
            AuthError::InvalidCredentials
        }
        s if s.is_client_error() => AuthError::Rejected(message),
        _ => {
            error!("auth provider failed with {}: {}", status, message);
            AuthError::Unexpected
        }
    }
}

/// A 400 from the token endpoint means a bad or stale code or verifier.
fn code_exchange_rejection(status: StatusCode, body: &[u8]) -> AuthError {
    match status {
        StatusCode::BAD_REQUEST => {
            let message = error_message(status, body);
            debug!("auth provider refused code exchange: {}", message);
            AuthError::Rejected(message)
        }
        _ => rejection(status, body),
    }
}

#[async_trait(?Send)]
impl AuthGateway for GoTrueGateway {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, AuthError> {
        let mut response = self.client.post(self.url("/signup"))
            .header("apikey", self.config.api_key.as_str())
            .send_json(&Credentials { email, password })
            .await
            .map_err(log_request_error)?;
        let body = response.body().await.map_err(log_request_error)?;
        match response.status() {
            // GoTrue reports an already registered email as 400/422
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY =>
                Err(AuthError::Rejected(
                    serde_json::from_slice::<ErrorBody>(&body)
                        .ok()
                        .and_then(|b| b.msg)
                        .unwrap_or_else(|| "Sign up rejected".to_owned())
                )),
            s if s.is_success() => serde_json::from_slice(&body).map_err(log_request_error),
            s => Err(rejection(s, &body)),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut response = self.client.post(self.url("/token?grant_type=password"))
            .header("apikey", self.config.api_key.as_str())
            .send_json(&Credentials { email, password })
            .await
            .map_err(log_request_error)?;
        let body = response.body().await.map_err(log_request_error)?;
        if !response.status().is_success() {
            return Err(rejection(response.status(), &body));
        }
        serde_json::from_slice(&body).map_err(log_request_error)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let mut response = self.client.post(self.url("/logout"))
            .header("apikey", self.config.api_key.as_str())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(log_request_error)?;
        let body = response.body().await.map_err(log_request_error)?;
        match response.status() {
            s if s.is_success() => Ok(()),
            // already signed out
            StatusCode::UNAUTHORIZED => Ok(()),
            s => Err(rejection(s, &body)),
        }
    }

    async fn get_current_user(&self, access_token: &str) -> Result<Option<User>, AuthError> {
        let mut response = self.client.get(self.url("/user"))
            .header("apikey", self.config.api_key.as_str())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(log_request_error)?;
        let body = response.body().await.map_err(log_request_error)?;
        match response.status() {
            s if s.is_success() => serde_json::from_slice(&body)
                .map(Some)
                .map_err(log_request_error),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            s => Err(rejection(s, &body)),
        }
    }

    fn sign_in_with_provider(&self, provider: &str, redirect_url: &str) -> Result<ProviderRedirect, AuthError> {
        let code_verifier = util::random_token(CODE_VERIFIER_LEN);
        let query = serde_urlencoded::to_string(&[
            ("provider", provider),
            ("redirect_to", redirect_url),
            ("code_challenge", code_verifier.as_str()),
            ("code_challenge_method", "plain"),
        ]).map_err(log_request_error)?;
        Ok(ProviderRedirect {
            url: format!("{}?{}", self.url("/authorize"), query),
            code_verifier,
        })
    }

    async fn exchange_code_for_session(&self, code: &str, code_verifier: &str) -> Result<Session, AuthError> {
        let mut response = self.client.post(self.url("/token?grant_type=pkce"))
            .header("apikey", self.config.api_key.as_str())
            .send_json(&CodeExchange { auth_code: code, code_verifier })
            .await
            .map_err(log_request_error)?;
        let body = response.body().await.map_err(log_request_error)?;
        if !response.status().is_success() {
            return Err(code_exchange_rejection(response.status(), &body));
        }
        serde_json::from_slice(&body).map_err(log_request_error)
    }
}
