//! Map validated command-line arguments to an [`Action`].

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, ARG_PROVIDER, ARG_SITE, ARG_URL, code, delivery, token};
use anyhow::{Context, Result};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let url = matches
        .get_one::<Url>(ARG_URL)
        .cloned()
        .context("missing required argument: --url")?;
    let site = matches
        .get_one::<String>(ARG_SITE)
        .cloned()
        .context("missing required argument: --site")?;
    let provider = matches
        .get_one::<String>(ARG_PROVIDER)
        .cloned()
        .context("missing required argument: --provider")?;

    Ok(Action::Server(Args {
        port,
        url,
        site,
        provider,
        code: code::Options::parse(matches)?,
        token: token::Options::parse(matches)?,
        delivery: delivery::Options::parse(matches)?,
    }))
}
