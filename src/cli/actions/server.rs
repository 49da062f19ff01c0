use crate::{
    api,
    cli::commands::{
        code,
        delivery::{self, SenderKind},
        token,
    },
    passcode::{
        ConfirmationFlow, FlowConfig,
        avatar::GravatarLookup,
        code::CodeGenerator,
        sender::{LogSender, Sender, SmtpSender, WebhookSender},
        store,
        template::MessageTemplate,
        token::JwtTokenService,
    },
};
use anyhow::{Context, Result};
use std::{fs, sync::Arc};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub url: Url,
    pub site: String,
    pub provider: String,
    pub code: code::Options,
    pub token: token::Options,
    pub delivery: delivery::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the template is invalid, the avatar directory cannot be
/// created, a client cannot be built, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let mut config = FlowConfig::new(args.token.issuer.clone())
        .with_provider(args.provider)
        .with_site(args.site)
        .with_call_timeout(args.delivery.call_timeout);
    if let Some(template) = args.delivery.template {
        config = config.with_template(template);
    }
    // Refuse to start with a template that every request would fail to render.
    MessageTemplate::parse(config.template()).context("invalid message template")?;

    fs::create_dir_all(&args.delivery.avatars_dir).with_context(|| {
        format!(
            "Failed to create avatars directory: {}",
            args.delivery.avatars_dir.display()
        )
    })?;

    let code_store = args.code.policy.build_store();
    let sweeper = args
        .code
        .policy
        .needs_sweeper()
        .then(|| store::spawn_sweeper(code_store.clone(), args.code.sweep_interval));

    let sender: Arc<dyn Sender> = match args.delivery.sender {
        SenderKind::Log => {
            warn!("Using the log sender: confirmation codes are written to the log");
            Arc::new(LogSender)
        }
        SenderKind::Smtp(smtp) => Arc::new(SmtpSender::new(smtp, args.delivery.call_timeout)?),
        SenderKind::Webhook(url) => Arc::new(WebhookSender::new(url, args.delivery.call_timeout)?),
    };

    let tokens = JwtTokenService::new(args.token.secret, args.token.issuer)
        .with_token_ttl(args.token.token_ttl)
        .with_cookie_ttl(args.token.cookie_ttl)
        .with_secure_cookies(args.token.secure_cookies);

    let mut flow = ConfirmationFlow::new(
        config,
        CodeGenerator::new(args.code.length),
        code_store,
        sender,
        Arc::new(tokens),
    );

    if args.delivery.gravatar {
        let lookup = GravatarLookup::new(args.delivery.call_timeout)?
            .with_base_url(args.delivery.gravatar_url)
            .with_local_store(args.delivery.avatars_dir.clone(), public_base(args.url));
        flow = flow.with_avatars(Arc::new(lookup));
    }

    let result = api::new(args.port, Arc::new(flow), &args.delivery.avatars_dir).await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    result
}

// `Url::join` replaces the last path segment unless the base ends with '/'.
fn public_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        url = %args.url,
        provider = %args.provider,
        code_length = args.code.length,
        policy = ?args.code.policy,
        gravatar = args.delivery.gravatar,
        secure_cookies = args.token.secure_cookies,
        "Starting passcode"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_base_gets_trailing_slash() -> Result<()> {
        let base = public_base(Url::parse("https://login.example.org/auth")?);
        assert_eq!(
            base.join("avatars/x.image")?.as_str(),
            "https://login.example.org/auth/avatars/x.image"
        );

        let root = public_base(Url::parse("http://localhost:8080")?);
        assert_eq!(root.as_str(), "http://localhost:8080/");
        Ok(())
    }
}
