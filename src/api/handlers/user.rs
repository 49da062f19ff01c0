use axum::{
    Json,
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::passcode::{ConfirmationFlow, token::User};

/// Reject requests without a valid credential cookie; the verified [`User`]
/// is made available to handlers as a request extension.
pub async fn require_user(
    flow: Extension<Arc<ConfirmationFlow>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match flow.tokens().verify(&jar).await {
        Ok(claims) => {
            request.extensions_mut().insert(claims.user);
            next.run(request).await
        }
        Err(err) => {
            debug!("credential rejected: {err}");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response()
        }
    }
}

/// Attach the verified [`User`] when the request carries a valid credential;
/// requests without one pass through untouched.
pub async fn optional_user(
    flow: Extension<Arc<ConfirmationFlow>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match flow.tokens().verify(&jar).await {
        Ok(claims) => {
            request.extensions_mut().insert(claims.user);
        }
        Err(err) => debug!("no credential attached: {err}"),
    }
    next.run(request).await
}

#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "Signed-in user", body = User),
        (status = 401, description = "Missing or invalid credential", body = String)
    ),
    tag = "auth"
)]
pub async fn user(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
