use crate::api::handlers::{root, user};
use crate::passcode::ConfirmationFlow;
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
};
use std::{path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir,
    set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, `/`, avatars, Swagger UI and layers.
pub fn app(flow: Arc<ConfirmationFlow>, avatars_dir: &Path) -> Router {
    let (router, openapi) = router().split_for_parts();

    router
        .route(
            "/",
            get(root::root).route_layer(middleware::from_fn(user::optional_user)),
        )
        .nest_service("/avatars", ServeDir::new(avatars_dir))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(flow)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, flow: Arc<ConfirmationFlow>, avatars_dir: &Path) -> Result<()> {
    let app = app(flow, avatars_dir);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::passcode::{
        ConfirmationFlow, FlowConfig, code::CodeGenerator, sender::LogSender,
        store::BoundedUseStore, token::JwtTokenService,
    };
    use secrecy::SecretString;
    use std::sync::Arc;

    pub(crate) fn flow() -> Arc<ConfirmationFlow> {
        Arc::new(ConfirmationFlow::new(
            FlowConfig::new("passcode".to_string()),
            CodeGenerator::default(),
            Arc::new(BoundedUseStore::new(3)),
            Arc::new(LogSender),
            Arc::new(JwtTokenService::new(
                SecretString::from("wow-so-secure"),
                "passcode".to_string(),
            )),
        ))
    }
}
