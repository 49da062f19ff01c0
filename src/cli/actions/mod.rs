//! What the binary does once arguments are parsed.

pub mod server;

mod run;

/// A parsed command line, ready to run.
#[derive(Debug)]
pub enum Action {
    /// Serve the login API with the given configuration.
    Server(server::Args),
}

impl Action {
    /// Run the action to completion.
    /// # Errors
    /// Returns an error if startup fails or the server stops with an error.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
