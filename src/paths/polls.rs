use actix_web::{HttpResponse, Result};
use actix_web::web::{Bytes, Data, Json, Path, Query};
use uuid::Uuid;

use super::{authenticate, error_body, poll_error};
use crate::{
    auth::{AccessToken, AuthGateway},
    model::*,
    operations::PollOperationsT,
};

pub async fn list_polls_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    query: Query<ListPollsQuery>) -> Result<Json<Vec<PollView>>>
{
    let polls = ops.list_polls(query.into_inner())
        .await
        .map_err(poll_error)?;
    Ok(Json(polls))
}

pub async fn get_poll_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    Path(poll_id): Path<Uuid>) -> Result<Json<PollView>>
{
    let poll = ops.get_poll(poll_id)
        .await
        .map_err(poll_error)?;
    Ok(Json(poll))
}

pub async fn post_poll_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    body: Json<PollRequest>) -> Result<HttpResponse>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    let Json(request_body) = body;
    let created = ops.create_poll(user.id, &request_body)
        .await
        .map_err(poll_error)?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn put_poll_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<Uuid>,
    body: Json<PollRequest>) -> Result<Json<PollView>>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    let Json(request_body) = body;
    ops.edit_poll(user.id, poll_id, &request_body)
        .await
        .map_err(poll_error)?;
    let poll = ops.get_poll(poll_id)
        .await
        .map_err(poll_error)?;
    Ok(Json(poll))
}

pub async fn delete_poll_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<Uuid>) -> Result<HttpResponse>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    ops.delete_poll(user.id, poll_id)
        .await
        .map_err(poll_error)?;
    Ok(HttpResponse::NoContent().finish())
}

fn duplicate_request(body: &[u8]) -> Result<DuplicatePollRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DuplicatePollRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| {
            debug!("rejected duplicate request body: {}", e);
            error_body(HttpResponse::BadRequest(), &format!("Invalid request body: {}", e)).into()
        })
}

/// The body is optional; without one the copy is titled after the source.
/// A body that is present must parse.
pub async fn duplicate_poll_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<Uuid>,
    body: Bytes) -> Result<HttpResponse>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    let request_body = duplicate_request(&body)?;
    let created = ops.duplicate_poll(user.id, poll_id, &request_body)
        .await
        .map_err(poll_error)?;
    Ok(HttpResponse::Created().json(created))
}

async fn set_archived<A: PollOperationsT, G: AuthGateway>(
    ops: &A,
    gateway: &G,
    token: &AccessToken,
    poll_id: Uuid,
    archived: bool) -> Result<HttpResponse>
{
    let user = authenticate(ops, gateway, token).await?;
    ops.set_archived(user.id, poll_id, archived)
        .await
        .map_err(poll_error)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn archive_poll_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<Uuid>) -> Result<HttpResponse>
{
    set_archived(ops.get_ref(), gateway.get_ref(), &token, poll_id, true).await
}

pub async fn restore_poll_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<Uuid>) -> Result<HttpResponse>
{
    set_archived(ops.get_ref(), gateway.get_ref(), &token, poll_id, false).await
}

/// Anonymous callers and unresolvable tokens are simply not owners.
pub async fn ownership_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: Option<AccessToken>,
    Path(poll_id): Path<Uuid>) -> Json<OwnershipResponse>
{
    let user_id = match token {
        Some(AccessToken(token)) => gateway.get_current_user(&token)
            .await
            .ok()
            .flatten()
            .map(|user| user.id),
        None => None,
    };
    let is_owner = ops.validate_ownership(poll_id, user_id).await;
    Json(OwnershipResponse { is_owner })
}

pub async fn voting_stats_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    Path(user_id): Path<Uuid>) -> Result<Json<VotingStats>>
{
    let stats = ops.voting_stats(user_id)
        .await
        .map_err(poll_error)?;
    Ok(Json(stats))
}
