pub mod code;
pub mod delivery;
pub mod logging;
pub mod token;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_URL: &str = "url";
pub const ARG_SITE: &str = "site";
pub const ARG_PROVIDER: &str = "provider";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("passcode")
        .about("Passwordless login with confirmation codes")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("PASSCODE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_URL)
                .long(ARG_URL)
                .help("Public base URL of this service, used to build avatar links")
                .default_value("http://localhost:8080")
                .env("PASSCODE_URL")
                .value_parser(clap::value_parser!(url::Url)),
        )
        .arg(
            Arg::new(ARG_SITE)
                .long(ARG_SITE)
                .help("Site name shown in messages when the request carries no Host header")
                .default_value("passcode")
                .env("PASSCODE_SITE"),
        )
        .arg(
            Arg::new(ARG_PROVIDER)
                .long(ARG_PROVIDER)
                .help("Provider name, used as the user id prefix")
                .default_value(crate::passcode::flow::DEFAULT_PROVIDER)
                .env("PASSCODE_PROVIDER"),
        );

    let command = token::with_args(command);
    let command = code::with_args(command);
    let command = delivery::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "passcode");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Passwordless login with confirmation codes".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "PASSCODE_PORT",
                "PASSCODE_URL",
                "PASSCODE_SITE",
                "PASSCODE_PROVIDER",
                "PASSCODE_LOG_LEVEL",
            ],
            || {
                let matches = new().get_matches_from(vec!["passcode", "--secret", "s3cr3t"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
                assert_eq!(
                    matches.get_one::<url::Url>(ARG_URL).map(url::Url::as_str),
                    Some("http://localhost:8080/")
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_SITE).cloned(),
                    Some("passcode".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_PROVIDER).cloned(),
                    Some("email".to_string())
                );
            },
        );
    }

    #[test]
    fn test_secret_is_required() {
        temp_env::with_var_unset("PASSCODE_SECRET", || {
            let result = new().try_get_matches_from(vec!["passcode"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("PASSCODE_PORT", Some("443")),
                ("PASSCODE_SITE", Some("example.org")),
                ("PASSCODE_PROVIDER", Some("sms")),
                ("PASSCODE_SECRET", Some("s3cr3t")),
                ("PASSCODE_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["passcode"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>(ARG_SITE).cloned(),
                    Some("example.org".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>(ARG_PROVIDER).cloned(),
                    Some("sms".to_string())
                );
                assert_eq!(logging::verbosity(&matches), 2);
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("PASSCODE_LOG_LEVEL", Some(level)),
                    ("PASSCODE_SECRET", Some("s3cr3t")),
                ],
                || {
                    let matches = new().get_matches_from(vec!["passcode"]);
                    assert_eq!(Some(logging::verbosity(&matches)), u8::try_from(index).ok());
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        temp_env::with_vars(
            [
                ("PASSCODE_LOG_LEVEL", None::<&str>),
                ("PASSCODE_SECRET", Some("s3cr3t")),
            ],
            || {
                let matches = new().get_matches_from(vec!["passcode", "-vvv"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(3)
                );
                assert_eq!(logging::verbosity(&matches), 3);
            },
        );
    }
}
