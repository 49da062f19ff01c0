use axum::{extract::Extension, response::IntoResponse};

use crate::passcode::token::User;

// axum handler for the service banner, greets the signed-in user if any
pub async fn root(user: Option<Extension<User>>) -> impl IntoResponse {
    let banner = format!(
        "{} {} - passwordless login with confirmation codes",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    match user {
        Some(Extension(user)) => format!("{banner}\nsigned in as {}", user.email),
        None => banner,
    }
}
