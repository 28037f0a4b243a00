// handlers.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State as AxumState,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::auth::Caller;
use crate::error::Result;
use crate::models::{
    NewPoll, NewUser, OptionId, OptionLabel, PollChanges, PollId, UserChanges, UserId, VoteRequest,
};
use crate::policy::Actor;
use crate::state::State;
use crate::views::{OptionView, PollView, RegistrationView, UserView};

type AppState = AxumState<Arc<State>>;
type Body<T> = std::result::Result<Json<T>, JsonRejection>;
type Ids<T> = std::result::Result<Path<T>, PathRejection>;

/// Register a participant (or, for administrators, another administrator)
pub async fn create_user(
    AxumState(state): AppState,
    Caller(actor): Caller,
    body: Body<NewUser>,
) -> Result<(StatusCode, Json<RegistrationView>)> {
    let Json(new) = body?;
    let registration = state.core.register_user(&actor, new).await?;
    Ok((StatusCode::CREATED, Json(registration.into())))
}

pub async fn list_users(AxumState(state): AppState, Caller(actor): Caller) -> Result<Json<Vec<UserView>>> {
    let users = state.core.list_users(&actor).await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

pub async fn get_user(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<UserId>,
) -> Result<Json<UserView>> {
    let Path(id) = path?;
    let user = state.core.get_user(&actor, id).await?;
    Ok(Json(user.into()))
}

pub async fn update_user(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<UserId>,
    body: Body<UserChanges>,
) -> Result<Json<UserView>> {
    let Path(id) = path?;
    let Json(changes) = body?;
    let user = state.core.update_user(&actor, id, changes).await?;
    Ok(Json(user.into()))
}

pub async fn delete_user(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<UserId>,
) -> Result<StatusCode> {
    let Path(id) = path?;
    state.core.delete_user(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Polls visible to the caller
pub async fn list_polls(AxumState(state): AppState, Caller(actor): Caller) -> Result<Json<Vec<PollView>>> {
    let polls = state.core.list_polls(&actor).await?;
    Ok(Json(
        polls
            .into_iter()
            .map(|details| PollView::project(&actor, details))
            .collect(),
    ))
}

pub async fn create_poll(
    AxumState(state): AppState,
    Caller(actor): Caller,
    body: Body<NewPoll>,
) -> Result<(StatusCode, Json<PollView>)> {
    let Json(new) = body?;
    let poll = state.core.create_poll(&actor, new).await?;
    let details = state.core.get_poll(&actor, poll.id).await?;
    Ok((StatusCode::CREATED, Json(PollView::project(&actor, details))))
}

pub async fn get_poll(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
) -> Result<Json<PollView>> {
    let Path(id) = path?;
    let details = state.core.get_poll(&actor, id).await?;
    Ok(Json(PollView::project(&actor, details)))
}

/// Full replacement (PUT)
pub async fn replace_poll(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
    body: Body<NewPoll>,
) -> Result<Json<PollView>> {
    let Path(id) = path?;
    let Json(poll) = body?;
    update(&state, &actor, id, poll.into()).await
}

/// Partial update (PATCH)
pub async fn patch_poll(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
    body: Body<PollChanges>,
) -> Result<Json<PollView>> {
    let Path(id) = path?;
    let Json(changes) = body?;
    update(&state, &actor, id, changes).await
}

async fn update(
    state: &State,
    actor: &Actor,
    id: PollId,
    changes: PollChanges,
) -> Result<Json<PollView>> {
    state.core.update_poll(actor, id, changes).await?;
    let details = state.core.get_poll(actor, id).await?;
    Ok(Json(PollView::project(actor, details)))
}

pub async fn delete_poll(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
) -> Result<StatusCode> {
    let Path(id) = path?;
    state.core.delete_poll(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_options(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
) -> Result<Json<Vec<OptionView>>> {
    let Path(id) = path?;
    let options = state.core.list_options(&actor, id).await?;
    Ok(Json(options.into_iter().map(OptionView::from).collect()))
}

/// Add an option; responds with every option of the poll
pub async fn add_option(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
    body: Body<OptionLabel>,
) -> Result<(StatusCode, Json<Vec<OptionView>>)> {
    let Path(id) = path?;
    let Json(label) = body?;
    let options = state.core.add_option(&actor, id, label).await?;
    Ok((
        StatusCode::CREATED,
        Json(options.into_iter().map(OptionView::from).collect()),
    ))
}

pub async fn update_option(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<(PollId, OptionId)>,
    body: Body<OptionLabel>,
) -> Result<Json<OptionView>> {
    let Path((poll_id, option_id)) = path?;
    let Json(label) = body?;
    let option = state
        .core
        .update_option(&actor, poll_id, option_id, label)
        .await?;
    Ok(Json(option.into()))
}

pub async fn delete_option(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<(PollId, OptionId)>,
) -> Result<StatusCode> {
    let Path((poll_id, option_id)) = path?;
    state.core.delete_option(&actor, poll_id, option_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Vote for an option of the poll
pub async fn cast_vote(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
    body: Body<VoteRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let Path(id) = path?;
    let Json(request) = body?;
    let vote = state.core.cast_vote(&actor, id, request.option).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "Vote recorded", "vote": vote.id })),
    ))
}

/// `label -> count` for every option of the poll
pub async fn results(
    AxumState(state): AppState,
    Caller(actor): Caller,
    path: Ids<PollId>,
) -> Result<Json<BTreeMap<String, i64>>> {
    let Path(id) = path?;
    let tally = state.core.tally(&actor, id).await?;
    Ok(Json(tally.by_label()))
}
