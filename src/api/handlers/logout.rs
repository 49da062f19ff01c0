use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::passcode::ConfirmationFlow;

#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 200, description = "Credential cookies cleared"),
        (status = 500, description = "Token service failure", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(jar: CookieJar, flow: Extension<Arc<ConfirmationFlow>>) -> Response {
    match flow.logout(jar).await {
        Ok(jar) => (jar, StatusCode::OK).into_response(),
        Err(err) => err.into_response(),
    }
}
