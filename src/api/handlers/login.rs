//! Confirmation-code login endpoint.
//!
//! One route serves both steps: without `code` it sends a new code to
//! `address`, with `code` it verifies it and sets the credential cookie.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, header::HOST},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::passcode::ConfirmationFlow;

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    /// Address the code is sent to (email, phone number, IM handle).
    pub address: Option<String>,
    /// Code received at `address`; omit to request a new one.
    pub code: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CodeSentResponse {
    pub address: String,
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Code sent to the address", body = CodeSentResponse),
        (status = 307, description = "Code accepted, credential cookie set"),
        (status = 400, description = "Missing parameters or wrong code", body = String),
        (status = 500, description = "Template, delivery or token failure", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    jar: CookieJar,
    flow: Extension<Arc<ConfirmationFlow>>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let address = query.address.unwrap_or_default();

    let Some(code) = query.code else {
        let site = headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        return match flow.request_code(&address, site).await {
            Ok(sent) => Json(CodeSentResponse {
                address: sent.address,
                message: "code sent".to_string(),
            })
            .into_response(),
            Err(err) => err.into_response(),
        };
    };

    match flow.verify_code(jar, &address, &code).await {
        Ok((jar, _claims)) => (jar, Redirect::temporary("/")).into_response(),
        Err(err) => err.into_response(),
    }
}
