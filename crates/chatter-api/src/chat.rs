use axum::{Json, extract::State};
use tracing::debug;

use chatter_types::api::{AckResponse, PostMessageRequest, UserRequest};
use chatter_types::models::Message;

use crate::error::ChatError;
use crate::extract::JsonOrForm;
use crate::state::AppState;

/// `GET /messages`
pub async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<Message>>, ChatError> {
    Ok(Json(state.room.messages().await?))
}

/// `GET /users`
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<String>>, ChatError> {
    Ok(Json(state.room.users().await?))
}

/// `POST /user`
pub async fn join(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<UserRequest>,
) -> Result<Json<AckResponse>, ChatError> {
    state.room.join(&req.user).await.inspect_err(|e| {
        debug!("Join of '{}' rejected: {}", req.user, e);
    })?;
    Ok(Json(AckResponse::ok("User joined")))
}

/// `DELETE /user`
pub async fn leave(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<UserRequest>,
) -> Result<Json<AckResponse>, ChatError> {
    state.room.leave(&req.user).await.inspect_err(|e| {
        debug!("Leave of '{}' rejected: {}", req.user, e);
    })?;
    Ok(Json(AckResponse::ok("User removed")))
}

/// `POST /message`
pub async fn post_message(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<PostMessageRequest>,
) -> Result<Json<AckResponse>, ChatError> {
    state.room.post(&req.user, &req.msg).await?;
    Ok(Json(AckResponse::ok("Message sent")))
}
