use crate::passcode::store::CodePolicy;
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_CODE_LENGTH: &str = "code-length";
pub const ARG_CODE_POLICY: &str = "code-policy";
pub const ARG_CODE_USES: &str = "code-uses";
pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_CODE_MAX_IDLE_SECONDS: &str = "code-max-idle-seconds";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";

/// Longest accepted code lifetime: one year.
pub const MAX_CODE_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub length: usize,
    pub policy: CodePolicy,
    pub sweep_interval: Duration,
}

impl Options {
    /// Parse code generation and expiry arguments.
    ///
    /// # Errors
    /// Returns an error if a value is missing or the policy is unknown.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_u64 = |id: &str| -> anyhow::Result<u64> {
            matches
                .get_one::<u64>(id)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let length = matches
            .get_one::<u16>(ARG_CODE_LENGTH)
            .copied()
            .map(usize::from)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_CODE_LENGTH}"))?;

        let policy = match matches.get_one::<String>(ARG_CODE_POLICY).map(String::as_str) {
            Some("ttl") => CodePolicy::Ttl(Duration::from_secs(read_u64(ARG_CODE_TTL_SECONDS)?)),
            Some("uses") | None => {
                let uses = matches.get_one::<u32>(ARG_CODE_USES).copied().ok_or_else(|| {
                    anyhow::anyhow!("missing required argument: --{ARG_CODE_USES}")
                })?;
                let max_idle = read_u64(ARG_CODE_MAX_IDLE_SECONDS)?;
                CodePolicy::Uses {
                    uses,
                    max_idle: (max_idle > 0).then(|| Duration::from_secs(max_idle)),
                }
            }
            Some(other) => anyhow::bail!("unknown code policy: {other}"),
        };

        Ok(Self {
            length,
            policy,
            sweep_interval: Duration::from_secs(read_u64(ARG_SWEEP_INTERVAL_SECONDS)?),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CODE_LENGTH)
                .long(ARG_CODE_LENGTH)
                .help("Number of digits in a confirmation code")
                .env("PASSCODE_CODE_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(u16).range(1..=64)),
        )
        .arg(
            Arg::new(ARG_CODE_POLICY)
                .long(ARG_CODE_POLICY)
                .help("Code expiry: 'uses' (bounded lookups) or 'ttl' (bounded lifetime)")
                .env("PASSCODE_CODE_POLICY")
                .default_value("uses")
                .value_parser(["uses", "ttl"]),
        )
        .arg(
            Arg::new(ARG_CODE_USES)
                .long(ARG_CODE_USES)
                .help("Lookups allowed per code, right or wrong")
                .env("PASSCODE_CODE_USES")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Code lifetime in seconds when --code-policy=ttl")
                .env("PASSCODE_CODE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_CODE_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_CODE_MAX_IDLE_SECONDS)
                .long(ARG_CODE_MAX_IDLE_SECONDS)
                .help("Drop unused codes after this many seconds when --code-policy=uses (0 disables)")
                .env("PASSCODE_CODE_MAX_IDLE_SECONDS")
                .default_value("0")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("How often stale codes are swept, in seconds")
                .env("PASSCODE_SWEEP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
