use crate::error::Result;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;
use zipline_proto_schema::v1 as proto;

/// GET /p/:short_key for public short links.
pub async fn public_redirect_handler(
    Path(short_key): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    redirection(state, short_key, true).await
}

/// GET /u/:short_key for user short links.
pub async fn user_redirect_handler(
    Path(short_key): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    redirection(state, short_key, false).await
}

async fn redirection(state: AppState, short_key: String, is_public: bool) -> Result<Response> {
    let mut client = state.client();

    let request = proto::ShortKey {
        key: short_key.clone(),
        user_id: 0,
        is_public,
    };

    let response = client.get_original_url(request).await?;
    let original_url = response.into_inner().url;
    debug!(short_key = %short_key, url = %original_url, "redirecting");

    Ok((StatusCode::FOUND, [(header::LOCATION, original_url)]).into_response())
}
