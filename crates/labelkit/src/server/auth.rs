use axum::http::HeaderMap;

use labelkit_core::{Capability, RequestContext};

use super::AppState;

pub(super) const API_TOKEN_HEADER: &str = "x-api-token";

/// Build the core request context for an incoming request. A matching
/// `X-API-Token` grants the user capability; anything else yields an
/// anonymous context, which the label store rejects. Every context is
/// cancelled when the server shuts down.
pub(super) fn request_context(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let token = headers
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let ctx = if !token.is_empty() && token == state.api_token {
        RequestContext::anonymous().with_capability(Capability::User)
    } else {
        RequestContext::anonymous()
    };
    ctx.with_cancellation(state.shutdown.child_token())
}
