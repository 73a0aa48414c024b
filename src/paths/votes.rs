use actix_web::{HttpResponse, Result};
use actix_web::web::{Data, Json, Path};

use super::{authenticate, vote_error};
use crate::{
    auth::{AccessToken, AuthGateway},
    model::*,
    operations::PollOperationsT,
};

// Vote routes take the poll id as a plain string so that a malformed id is
// reported as a validation error rather than a missing route.

pub async fn get_vote_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<String>) -> Result<Json<UserVoteResponse>>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    let vote = ops.get_user_vote(user.id, &poll_id)
        .await
        .map_err(vote_error)?;
    Ok(Json(vote))
}

pub async fn post_vote_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<String>,
    body: Json<VoteRequest>) -> Result<HttpResponse>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    let Json(request_body) = body;
    ops.cast_vote(user.id, &poll_id, &request_body)
        .await
        .map_err(vote_error)?;
    Ok(HttpResponse::Created().finish())
}

pub async fn put_vote_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<String>,
    body: Json<VoteRequest>) -> Result<HttpResponse>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    let Json(request_body) = body;
    ops.change_vote(user.id, &poll_id, &request_body)
        .await
        .map_err(vote_error)?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_vote_handler<A: 'static + PollOperationsT, G: 'static + AuthGateway>(
    ops: Data<A>,
    gateway: Data<G>,
    token: AccessToken,
    Path(poll_id): Path<String>) -> Result<HttpResponse>
{
    let user = authenticate(ops.get_ref(), gateway.get_ref(), &token).await?;
    ops.remove_vote(user.id, &poll_id)
        .await
        .map_err(vote_error)?;
    Ok(HttpResponse::NoContent().finish())
}
