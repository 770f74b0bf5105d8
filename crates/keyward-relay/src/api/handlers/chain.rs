//! Chain Handler
//!
//! A single endpoint accepts every block; the signed payload decides
//! whether it is an append or a read.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use keyward_core::{Block, EmptyResponse, ServerResponse};
use std::sync::Arc;
use tracing::debug;

use crate::api::error::ApiError;
use crate::api::handlers::AppState;
use crate::core::RelayReply;

/// Append a block or read a page of blocks
///
/// POST /v1/chain
pub async fn process_block(
    State(state): State<Arc<AppState>>,
    Json(block): Json<Block>,
) -> Result<Response, ApiError> {
    debug!(public_key = %hex::encode(&block.public_key), "Processing block");

    let reply = match state.relay.process(&block).await? {
        RelayReply::Appended => Json(ServerResponse::Success(EmptyResponse {})).into_response(),
        RelayReply::Page(page) => Json(ServerResponse::Success(page)).into_response(),
    };
    Ok(reply)
}
