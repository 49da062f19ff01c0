use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_SECRET: &str = "secret";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_COOKIE_TTL_SECONDS: &str = "cookie-ttl-seconds";
pub const ARG_INSECURE_COOKIES: &str = "insecure-cookies";

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
    pub issuer: String,
    pub token_ttl: Duration,
    pub cookie_ttl: Duration,
    pub secure_cookies: bool,
}

impl Options {
    /// Parse credential arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SECRET)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SECRET}"))?;

        let seconds = |id: &str| -> anyhow::Result<Duration> {
            matches
                .get_one::<u64>(id)
                .copied()
                .map(Duration::from_secs)
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            secret: SecretString::from(secret),
            issuer: matches
                .get_one::<String>(ARG_ISSUER)
                .cloned()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            token_ttl: seconds(ARG_TOKEN_TTL_SECONDS)?,
            cookie_ttl: seconds(ARG_COOKIE_TTL_SECONDS)?,
            secure_cookies: !matches.get_flag(ARG_INSECURE_COOKIES),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECRET)
                .long(ARG_SECRET)
                .help("HMAC secret used to sign credentials")
                .env("PASSCODE_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer (iss) of signed credentials")
                .env("PASSCODE_ISSUER")
                .default_value(env!("CARGO_PKG_NAME")),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Credential lifetime in seconds")
                .env("PASSCODE_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_TTL_SECONDS)
                .long(ARG_COOKIE_TTL_SECONDS)
                .help("Credential cookie max-age in seconds")
                .env("PASSCODE_COOKIE_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_INSECURE_COOKIES)
                .long(ARG_INSECURE_COOKIES)
                .help("Send credential cookies without the Secure flag (plain HTTP development)")
                .env("PASSCODE_INSECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
}
