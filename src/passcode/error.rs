use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::{code::CodeError, template::TemplateError, token::TokenError};

/// Failures of the confirmation flow, mapped onto HTTP statuses by the API.
///
/// `WrongCode` covers both "no pending code" and "code mismatch" so callers
/// cannot tell which addresses have a code outstanding.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("wrong code")]
    WrongCode,
    #[error("failed to generate code")]
    Entropy(#[source] CodeError),
    #[error("can't parse message template")]
    Render(#[source] TemplateError),
    #[error("failed to send the message")]
    Delivery(#[source] anyhow::Error),
    #[error("failed to set token")]
    Credential(#[source] anyhow::Error),
}

impl FlowError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::WrongCode => StatusCode::BAD_REQUEST,
            Self::Entropy(_) | Self::Render(_) | Self::Delivery(_) | Self::Credential(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TokenError> for FlowError {
    fn from(err: TokenError) -> Self {
        Self::Credential(err.into())
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
