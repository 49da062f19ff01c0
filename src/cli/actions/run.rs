use crate::cli::{
    actions::{Action, server},
    telemetry,
};
use anyhow::Result;
use tracing::error;

/// Run `action`, then flush pending spans whether it succeeded or not.
pub(super) async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Server(args) => server::execute(args).await,
    };

    if let Err(err) = &result {
        error!("passcode stopped: {err:#}");
    }
    telemetry::shutdown_tracer();

    result
}
