use crate::passcode::{
    avatar::GRAVATAR_BASE_URL,
    sender::{SmtpConfig, SmtpTls},
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};
use url::Url;

pub const ARG_TEMPLATE: &str = "template";
pub const ARG_SENDER: &str = "sender";
pub const ARG_WEBHOOK_URL: &str = "webhook-url";
pub const ARG_SMTP_SERVER: &str = "smtp-server";
pub const ARG_SMTP_FROM: &str = "smtp-from";
pub const ARG_SMTP_SUBJECT: &str = "smtp-subject";
pub const ARG_SMTP_USER: &str = "smtp-user";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_TLS: &str = "smtp-tls";
pub const ARG_GRAVATAR: &str = "gravatar";
pub const ARG_GRAVATAR_URL: &str = "gravatar-url";
pub const ARG_AVATARS_DIR: &str = "avatars-dir";
pub const ARG_CALL_TIMEOUT_SECONDS: &str = "call-timeout-seconds";

/// Where confirmation messages go.
#[derive(Debug)]
pub enum SenderKind {
    Log,
    Smtp(SmtpConfig),
    Webhook(Url),
}

#[derive(Debug)]
pub struct Options {
    pub template: Option<String>,
    pub sender: SenderKind,
    pub gravatar: bool,
    pub gravatar_url: Url,
    pub avatars_dir: PathBuf,
    pub call_timeout: Duration,
}

impl Options {
    /// Parse message delivery and avatar arguments.
    ///
    /// # Errors
    /// Returns an error if the selected sender is missing its required settings.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let sender = match matches.get_one::<String>(ARG_SENDER).map(String::as_str) {
            Some("smtp") => SenderKind::Smtp(smtp_config(matches)?),
            Some("webhook") => SenderKind::Webhook(
                matches.get_one::<Url>(ARG_WEBHOOK_URL).cloned().ok_or_else(|| {
                    anyhow::anyhow!("missing required argument: --{ARG_WEBHOOK_URL}")
                })?,
            ),
            Some("log") | None => SenderKind::Log,
            Some(other) => anyhow::bail!("unknown sender: {other}"),
        };

        Ok(Self {
            template: matches
                .get_one::<String>(ARG_TEMPLATE)
                .filter(|v| !v.trim().is_empty())
                .cloned(),
            sender,
            gravatar: matches.get_flag(ARG_GRAVATAR),
            gravatar_url: match matches.get_one::<Url>(ARG_GRAVATAR_URL) {
                Some(url) => url.clone(),
                None => Url::parse(GRAVATAR_BASE_URL)?,
            },
            avatars_dir: matches
                .get_one::<PathBuf>(ARG_AVATARS_DIR)
                .cloned()
                .unwrap_or_else(|| PathBuf::from("avatars")),
            call_timeout: matches
                .get_one::<u64>(ARG_CALL_TIMEOUT_SECONDS)
                .copied()
                .map_or(crate::passcode::flow::DEFAULT_CALL_TIMEOUT, Duration::from_secs),
        })
    }
}

fn smtp_config(matches: &ArgMatches) -> anyhow::Result<SmtpConfig> {
    let required = |name: &str| {
        matches
            .get_one::<String>(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{name}"))
    };

    Ok(SmtpConfig {
        server: required(ARG_SMTP_SERVER)?,
        from: required(ARG_SMTP_FROM)?,
        subject: required(ARG_SMTP_SUBJECT)?,
        user: matches
            .get_one::<String>(ARG_SMTP_USER)
            .filter(|v| !v.is_empty())
            .cloned(),
        password: matches
            .get_one::<String>(ARG_SMTP_PASSWORD)
            .map(|v| SecretString::from(v.clone())),
        tls: match matches.get_one::<String>(ARG_SMTP_TLS).map(String::as_str) {
            Some("none") => SmtpTls::None,
            Some("tls") => SmtpTls::Wrapper,
            _ => SmtpTls::StartTls,
        },
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TEMPLATE)
                .long(ARG_TEMPLATE)
                .help("Message template, placeholders: {{.Address}} {{.Code}} {{.Site}}")
                .env("PASSCODE_TEMPLATE"),
        )
        .arg(
            Arg::new(ARG_SENDER)
                .long(ARG_SENDER)
                .help("Message sender: 'log' (development), 'smtp' or 'webhook'")
                .env("PASSCODE_SENDER")
                .default_value("log")
                .value_parser(["log", "smtp", "webhook"]),
        )
        .arg(
            Arg::new(ARG_SMTP_SERVER)
                .long(ARG_SMTP_SERVER)
                .help("SMTP server as host or host:port when --sender=smtp")
                .env("PASSCODE_SMTP_SERVER")
                .required_if_eq(ARG_SENDER, "smtp"),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM)
                .long(ARG_SMTP_FROM)
                .help("From address of confirmation emails")
                .env("PASSCODE_SMTP_FROM")
                .required_if_eq(ARG_SENDER, "smtp"),
        )
        .arg(
            Arg::new(ARG_SMTP_SUBJECT)
                .long(ARG_SMTP_SUBJECT)
                .help("Subject of confirmation emails")
                .env("PASSCODE_SMTP_SUBJECT")
                .default_value("Confirmation code"),
        )
        .arg(
            Arg::new(ARG_SMTP_USER)
                .long(ARG_SMTP_USER)
                .help("SMTP username, enables authentication")
                .env("PASSCODE_SMTP_USER"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("PASSCODE_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_TLS)
                .long(ARG_SMTP_TLS)
                .help("SMTP transport security")
                .env("PASSCODE_SMTP_TLS")
                .default_value("starttls")
                .value_parser(["none", "starttls", "tls"]),
        )
        .arg(
            Arg::new(ARG_WEBHOOK_URL)
                .long(ARG_WEBHOOK_URL)
                .help("URL receiving {\"address\", \"text\"} JSON when --sender=webhook")
                .env("PASSCODE_WEBHOOK_URL")
                .required_if_eq(ARG_SENDER, "webhook")
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            Arg::new(ARG_GRAVATAR)
                .long(ARG_GRAVATAR)
                .help("Look up user pictures on Gravatar")
                .env("PASSCODE_GRAVATAR")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_GRAVATAR_URL)
                .long(ARG_GRAVATAR_URL)
                .help("Gravatar-compatible avatar service base URL")
                .env("PASSCODE_GRAVATAR_URL")
                .default_value(GRAVATAR_BASE_URL)
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            Arg::new(ARG_AVATARS_DIR)
                .long(ARG_AVATARS_DIR)
                .help("Directory where fetched avatars are cached and served from")
                .env("PASSCODE_AVATARS_DIR")
                .default_value("avatars")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_CALL_TIMEOUT_SECONDS)
                .long(ARG_CALL_TIMEOUT_SECONDS)
                .help("Timeout for sender, token and avatar calls, in seconds")
                .env("PASSCODE_CALL_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn matches(args: &[&str]) -> Result<ArgMatches, clap::Error> {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        with_args(Command::new("test")).try_get_matches_from(argv)
    }

    #[test]
    fn defaults_to_log_sender() -> anyhow::Result<()> {
        let options = temp_env::with_vars_unset(
            [
                "PASSCODE_TEMPLATE",
                "PASSCODE_SENDER",
                "PASSCODE_GRAVATAR",
                "PASSCODE_GRAVATAR_URL",
                "PASSCODE_AVATARS_DIR",
                "PASSCODE_CALL_TIMEOUT_SECONDS",
            ],
            || -> anyhow::Result<Options> { Options::parse(&matches(&[])?) },
        )?;
        assert!(matches!(options.sender, SenderKind::Log));
        assert_eq!(options.template, None);
        assert!(!options.gravatar);
        assert_eq!(options.gravatar_url.as_str(), GRAVATAR_BASE_URL);
        assert_eq!(options.avatars_dir, PathBuf::from("avatars"));
        assert_eq!(options.call_timeout, Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn webhook_requires_url() {
        temp_env::with_var_unset("PASSCODE_WEBHOOK_URL", || {
            assert!(matches(&["--sender", "webhook"]).is_err());
        });
    }

    #[test]
    fn webhook_sender() -> anyhow::Result<()> {
        let options = Options::parse(&matches(&[
            "--sender",
            "webhook",
            "--webhook-url",
            "https://hooks.example.org/send",
            "--template",
            "{{.Code}}",
            "--gravatar",
        ])?)?;
        assert!(matches!(
            &options.sender,
            SenderKind::Webhook(url) if url.as_str() == "https://hooks.example.org/send"
        ));
        assert_eq!(options.template.as_deref(), Some("{{.Code}}"));
        assert!(options.gravatar);
        Ok(())
    }

    #[test]
    fn smtp_requires_server_and_from() {
        temp_env::with_vars_unset(["PASSCODE_SMTP_SERVER", "PASSCODE_SMTP_FROM"], || {
            assert!(matches(&["--sender", "smtp"]).is_err());
            assert!(matches(&["--sender", "smtp", "--smtp-server", "mail.example.org"]).is_err());
        });
    }

    #[test]
    fn smtp_sender() -> anyhow::Result<()> {
        let options = temp_env::with_vars(
            [
                ("PASSCODE_SMTP_PASSWORD", Some("hunter2")),
                ("PASSCODE_SMTP_SUBJECT", None::<&str>),
                ("PASSCODE_SMTP_TLS", None::<&str>),
            ],
            || -> anyhow::Result<Options> {
                Options::parse(&matches(&[
                    "--sender",
                    "smtp",
                    "--smtp-server",
                    "mail.example.org:2525",
                    "--smtp-from",
                    "login@example.org",
                    "--smtp-user",
                    "login",
                ])?)
            },
        )?;

        let SenderKind::Smtp(config) = options.sender else {
            anyhow::bail!("expected the smtp sender");
        };
        assert_eq!(config.server, "mail.example.org:2525");
        assert_eq!(config.from, "login@example.org");
        assert_eq!(config.subject, "Confirmation code");
        assert_eq!(config.user.as_deref(), Some("login"));
        assert_eq!(
            config.password.as_ref().map(ExposeSecret::expose_secret),
            Some("hunter2")
        );
        assert_eq!(config.tls, SmtpTls::StartTls);
        Ok(())
    }
}
