//! The three-step confirmation protocol.
//!
//! 1. `request_code`: generate a code, store it under the address, render the
//!    message and hand it to the [`Sender`].
//! 2. `verify_code`: look the code up (every attempt consumes a use), compare,
//!    delete on match and issue a credential through the [`TokenService`].
//! 3. `logout`: let the [`TokenService`] clear the credential.
//!
//! Render and delivery failures leave the stored code in place; the next
//! `request_code` for the same address overwrites it. A credential failure
//! happens after the code was deleted, so the user has to ask for a new one.

use anyhow::anyhow;
use axum_extra::extract::cookie::CookieJar;
use sha2::{Digest, Sha256};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::{
    avatar::AvatarLookup,
    code::CodeGenerator,
    error::FlowError,
    sender::Sender,
    store::CodeStore,
    template::{DEFAULT_TEMPLATE, MessageData, MessageTemplate},
    token::{Claims, TokenService, User},
};

pub const DEFAULT_PROVIDER: &str = "email";
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct FlowConfig {
    provider: String,
    issuer: String,
    template: String,
    site: String,
    call_timeout: Duration,
}

impl FlowConfig {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            issuer,
            template: DEFAULT_TEMPLATE.to_string(),
            site: String::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: String) -> Self {
        self.provider = provider;
        self
    }

    #[must_use]
    pub fn with_template(mut self, template: String) -> Self {
        self.template = template;
        self
    }

    /// Site name used when the request does not carry one.
    #[must_use]
    pub fn with_site(mut self, site: String) -> Self {
        self.site = site;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Acknowledgement returned once a code has been handed to the sender.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeSent {
    pub address: String,
}

pub struct ConfirmationFlow {
    config: FlowConfig,
    generator: CodeGenerator,
    store: Arc<dyn CodeStore>,
    sender: Arc<dyn Sender>,
    tokens: Arc<dyn TokenService>,
    avatars: Option<Arc<dyn AvatarLookup>>,
}

impl ConfirmationFlow {
    #[must_use]
    pub fn new(
        config: FlowConfig,
        generator: CodeGenerator,
        store: Arc<dyn CodeStore>,
        sender: Arc<dyn Sender>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            config,
            generator,
            store,
            sender,
            tokens,
            avatars: None,
        }
    }

    #[must_use]
    pub fn with_avatars(mut self, avatars: Arc<dyn AvatarLookup>) -> Self {
        self.avatars = Some(avatars);
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CodeStore> {
        &self.store
    }

    #[must_use]
    pub fn tokens(&self) -> &Arc<dyn TokenService> {
        &self.tokens
    }

    /// Send a fresh confirmation code to `address`.
    ///
    /// `site` fills the `{{.Site}}` placeholder; empty falls back to the configured site.
    ///
    /// # Errors
    /// `Validation` for an empty address, `Entropy`, `Render` or `Delivery` otherwise.
    #[instrument(skip(self, site))]
    pub async fn request_code(&self, address: &str, site: &str) -> Result<CodeSent, FlowError> {
        if address.is_empty() {
            return Err(FlowError::Validation("can't get user address"));
        }

        let code = self.generator.generate().map_err(FlowError::Entropy)?;
        self.store.set(address, code.clone());
        debug!("confirmation code stored");

        let template = MessageTemplate::parse(&self.config.template).map_err(FlowError::Render)?;
        let site = if site.is_empty() {
            self.config.site.as_str()
        } else {
            site
        };
        let body = template.render(&MessageData {
            address,
            code: &code,
            site,
        });

        self.call(self.sender.send(address, &body))
            .await
            .map_err(|err| {
                warn!("failed to deliver confirmation code: {err:#}");
                FlowError::Delivery(err)
            })?;

        info!("confirmation code sent");
        Ok(CodeSent {
            address: address.to_string(),
        })
    }

    /// Check `code` against the pending code for `address` and sign the user in.
    ///
    /// # Errors
    /// `Validation` for missing input, `WrongCode` when there is no pending code or it
    /// differs, `Credential` when the token service fails.
    #[instrument(skip(self, jar, code))]
    pub async fn verify_code(
        &self,
        jar: CookieJar,
        address: &str,
        code: &str,
    ) -> Result<(CookieJar, Claims), FlowError> {
        if address.is_empty() {
            return Err(FlowError::Validation("address is missing"));
        }
        if code.is_empty() {
            return Err(FlowError::Validation("code is missing"));
        }

        if !self.store.take_if_matches(address, code) {
            debug!("code rejected");
            return Err(FlowError::WrongCode);
        }

        let mut user = User {
            id: user_id(&self.config.provider, address),
            email: address.to_string(),
            picture: None,
        };
        if let Some(avatars) = &self.avatars {
            match self.call(avatars.resolve(address)).await {
                Ok(url) => user.picture = Some(url),
                Err(err) => debug!("avatar lookup skipped: {err:#}"),
            }
        }

        let claims = Claims::new(user, self.config.issuer.clone());
        let (jar, _token) = self
            .call(async { self.tokens.issue(jar, claims.clone()).await.map_err(Into::into) })
            .await
            .map_err(|err| {
                warn!("failed to issue credential: {err:#}");
                FlowError::Credential(err)
            })?;

        info!(user_id = %claims.user.id, "address verified");
        Ok((jar, claims))
    }

    /// Clear the credential carried by `jar`.
    ///
    /// # Errors
    /// `Credential` when the token service fails.
    #[instrument(skip_all)]
    pub async fn logout(&self, jar: CookieJar) -> Result<CookieJar, FlowError> {
        self.call(async { self.tokens.reset(jar).await.map_err(Into::into) })
            .await
            .map_err(FlowError::Credential)
    }

    async fn call<T, F>(&self, future: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let limit = self.config.call_timeout;
        timeout(limit, future)
            .await
            .map_err(|_| anyhow!("timed out after {limit:?}"))?
    }
}

/// Stable identity for an address: `<provider>_<sha256(address)>`.
#[must_use]
pub fn user_id(provider: &str, address: &str) -> String {
    format!("{provider}_{:x}", Sha256::digest(address.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passcode::{
        store::BoundedUseStore,
        token::{JWT_COOKIE_NAME, JwtTokenService, TokenError},
    };
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::sync::Mutex;

    /// Records every message; fails when `fail` is set.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSender {
        fn last_body(&self) -> Option<String> {
            self.sent
                .lock()
                .ok()
                .and_then(|sent| sent.last().map(|(_, body)| body.clone()))
        }
    }

    #[async_trait]
    impl Sender for RecordingSender {
        async fn send(&self, address: &str, body: &str) -> Result<()> {
            if self.fail {
                bail!("transport down");
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((address.to_string(), body.to_string()));
            }
            Ok(())
        }
    }

    struct SlowSender;

    #[async_trait]
    impl Sender for SlowSender {
        async fn send(&self, _address: &str, _body: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    struct FailingTokens;

    #[async_trait]
    impl TokenService for FailingTokens {
        async fn issue(
            &self,
            _jar: CookieJar,
            _claims: Claims,
        ) -> Result<(CookieJar, String), TokenError> {
            Err(TokenError::Missing)
        }

        async fn reset(&self, _jar: CookieJar) -> Result<CookieJar, TokenError> {
            Err(TokenError::Missing)
        }

        async fn verify(&self, _jar: &CookieJar) -> Result<Claims, TokenError> {
            Err(TokenError::Missing)
        }
    }

    struct FixedAvatar(Option<&'static str>);

    #[async_trait]
    impl AvatarLookup for FixedAvatar {
        async fn resolve(&self, _address: &str) -> Result<String> {
            match self.0 {
                Some(url) => Ok(url.to_string()),
                None => bail!("no avatar"),
            }
        }
    }

    fn tokens() -> Arc<dyn TokenService> {
        Arc::new(JwtTokenService::new(
            SecretString::from("wow-so-secure"),
            "passcode".to_string(),
        ))
    }

    fn flow_with(uses: u32, sender: Arc<dyn Sender>, tokens: Arc<dyn TokenService>) -> ConfirmationFlow {
        let config = FlowConfig::new("passcode".to_string())
            .with_template("{{.Code}}".to_string())
            .with_site("example.org".to_string());
        ConfirmationFlow::new(
            config,
            CodeGenerator::new(6),
            Arc::new(BoundedUseStore::new(uses)),
            sender,
            tokens,
        )
    }

    async fn issue_code(flow: &ConfirmationFlow, sender: &RecordingSender) -> Result<String> {
        flow.request_code("a@x.com", "").await?;
        sender
            .last_body()
            .ok_or_else(|| anyhow!("nothing was sent"))
    }

    #[tokio::test]
    async fn request_code_requires_address() {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), tokens());
        let err = flow.request_code("", "").await;
        assert!(matches!(err, Err(FlowError::Validation("can't get user address"))));
        assert!(flow.store().is_empty());
        assert_eq!(sender.last_body(), None);
    }

    #[tokio::test]
    async fn request_code_stores_and_sends() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), tokens());

        let sent = flow.request_code("a@x.com", "").await?;
        assert_eq!(sent.address, "a@x.com");

        let code = sender.last_body().unwrap_or_default();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| ('0'..='8').contains(&c)));
        assert_eq!(flow.store().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn site_falls_back_to_configuration() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let config = FlowConfig::new("passcode".to_string())
            .with_template("{{.Address}}@{{.Site}}".to_string())
            .with_site("example.org".to_string());
        let flow = ConfirmationFlow::new(
            config,
            CodeGenerator::default(),
            Arc::new(BoundedUseStore::new(1)),
            sender.clone(),
            tokens(),
        );

        flow.request_code("a@x.com", "").await?;
        assert_eq!(sender.last_body().as_deref(), Some("a@x.com@example.org"));
        flow.request_code("a@x.com", "login.example.com").await?;
        assert_eq!(sender.last_body().as_deref(), Some("a@x.com@login.example.com"));
        Ok(())
    }

    #[tokio::test]
    async fn verification_is_single_use() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), tokens());
        let code = issue_code(&flow, &sender).await?;

        let (jar, claims) = flow.verify_code(CookieJar::new(), "a@x.com", &code).await?;
        assert!(jar.get(JWT_COOKIE_NAME).is_some());
        assert_eq!(claims.user.email, "a@x.com");
        assert_eq!(claims.user.id, user_id("email", "a@x.com"));
        assert_eq!(claims.iss, "passcode");

        let again = flow.verify_code(CookieJar::new(), "a@x.com", &code).await;
        assert!(matches!(again, Err(FlowError::WrongCode)));
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_consumes_a_use() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(2, sender.clone(), tokens());
        let code = issue_code(&flow, &sender).await?;
        // '9' never appears in generated codes.
        let wrong = "999999";

        let err = flow.verify_code(CookieJar::new(), "a@x.com", wrong).await;
        assert!(matches!(err, Err(FlowError::WrongCode)));
        assert_eq!(flow.store().len(), 1);

        flow.verify_code(CookieJar::new(), "a@x.com", &code).await?;
        Ok(())
    }

    #[tokio::test]
    async fn guesses_are_bounded() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(2, sender.clone(), tokens());
        let code = issue_code(&flow, &sender).await?;

        for _ in 0..2 {
            assert!(flow.verify_code(CookieJar::new(), "a@x.com", "999999").await.is_err());
        }
        let late = flow.verify_code(CookieJar::new(), "a@x.com", &code).await;
        assert!(matches!(late, Err(FlowError::WrongCode)));
        Ok(())
    }

    #[tokio::test]
    async fn re_request_invalidates_previous_code() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), tokens());
        let first = issue_code(&flow, &sender).await?;
        let mut second = issue_code(&flow, &sender).await?;
        while second == first {
            second = issue_code(&flow, &sender).await?;
        }

        let stale = flow.verify_code(CookieJar::new(), "a@x.com", &first).await;
        assert!(matches!(stale, Err(FlowError::WrongCode)));
        flow.verify_code(CookieJar::new(), "a@x.com", &second).await?;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_address_and_mismatch_look_the_same() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), tokens());
        issue_code(&flow, &sender).await?;

        let unknown = flow
            .verify_code(CookieJar::new(), "b@x.com", "123456")
            .await
            .err()
            .map(|err| err.to_string());
        let mismatch = flow
            .verify_code(CookieJar::new(), "a@x.com", "999999")
            .await
            .err()
            .map(|err| err.to_string());
        assert_eq!(unknown.as_deref(), Some("wrong code"));
        assert_eq!(unknown, mismatch);
        Ok(())
    }

    #[tokio::test]
    async fn verify_requires_address_and_code() {
        let flow = flow_with(3, Arc::new(RecordingSender::default()), tokens());
        assert!(matches!(
            flow.verify_code(CookieJar::new(), "", "123").await,
            Err(FlowError::Validation("address is missing"))
        ));
        assert!(matches!(
            flow.verify_code(CookieJar::new(), "a@x.com", "").await,
            Err(FlowError::Validation("code is missing"))
        ));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_code() -> Result<()> {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..RecordingSender::default()
        });
        let flow = flow_with(3, sender, tokens());

        let err = flow.request_code("a@x.com", "").await;
        assert!(matches!(err, Err(FlowError::Delivery(_))));
        assert_eq!(flow.store().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn render_failure_keeps_the_code() {
        let sender = Arc::new(RecordingSender::default());
        let config = FlowConfig::new("passcode".to_string()).with_template("{{.Token}}".to_string());
        let flow = ConfirmationFlow::new(
            config,
            CodeGenerator::default(),
            Arc::new(BoundedUseStore::new(3)),
            sender.clone(),
            tokens(),
        );

        let err = flow.request_code("a@x.com", "").await;
        assert!(matches!(err, Err(FlowError::Render(_))));
        assert_eq!(flow.store().len(), 1);
        assert_eq!(sender.last_body(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sender_times_out() {
        let config = FlowConfig::new("passcode".to_string()).with_call_timeout(Duration::from_secs(2));
        let flow = ConfirmationFlow::new(
            config,
            CodeGenerator::default(),
            Arc::new(BoundedUseStore::new(3)),
            Arc::new(SlowSender),
            tokens(),
        );

        let err = flow.request_code("a@x.com", "").await;
        assert!(matches!(err, Err(FlowError::Delivery(_))));
    }

    #[tokio::test]
    async fn credential_failure_consumes_the_code() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), Arc::new(FailingTokens));
        let code = issue_code(&flow, &sender).await?;

        let err = flow.verify_code(CookieJar::new(), "a@x.com", &code).await;
        assert!(matches!(err, Err(FlowError::Credential(_))));
        assert!(flow.store().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn avatar_is_attached_when_found() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), tokens())
            .with_avatars(Arc::new(FixedAvatar(Some("https://img.example/a.png"))));
        let code = issue_code(&flow, &sender).await?;

        let (_, claims) = flow.verify_code(CookieJar::new(), "a@x.com", &code).await?;
        assert_eq!(claims.user.picture.as_deref(), Some("https://img.example/a.png"));
        Ok(())
    }

    #[tokio::test]
    async fn avatar_failure_is_ignored() -> Result<()> {
        let sender = Arc::new(RecordingSender::default());
        let flow = flow_with(3, sender.clone(), tokens()).with_avatars(Arc::new(FixedAvatar(None)));
        let code = issue_code(&flow, &sender).await?;

        let (_, claims) = flow.verify_code(CookieJar::new(), "a@x.com", &code).await?;
        assert_eq!(claims.user.picture, None);
        Ok(())
    }

    #[tokio::test]
    async fn logout_resets_cookies() -> Result<()> {
        let flow = flow_with(3, Arc::new(RecordingSender::default()), tokens());
        let jar = flow.logout(CookieJar::new()).await?;
        let cookie = jar
            .get(JWT_COOKIE_NAME)
            .ok_or_else(|| anyhow!("cookie not cleared"))?;
        assert_eq!(cookie.value(), "");

        let failing = flow_with(3, Arc::new(RecordingSender::default()), Arc::new(FailingTokens));
        assert!(matches!(
            failing.logout(CookieJar::new()).await,
            Err(FlowError::Credential(_))
        ));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_correct_submissions_sign_in_once() -> Result<()> {
        // The bound leaves room for several lookups; only one may sign in.
        for _ in 0..20 {
            let sender = Arc::new(RecordingSender::default());
            let flow = Arc::new(flow_with(3, sender.clone(), tokens()));
            let code = issue_code(&flow, &sender).await?;

            let attempts: Vec<_> = (0..8)
                .map(|_| {
                    let flow = flow.clone();
                    let code = code.clone();
                    tokio::spawn(async move {
                        flow.verify_code(CookieJar::new(), "a@x.com", &code).await.is_ok()
                    })
                })
                .collect();

            let mut successes = 0;
            for attempt in attempts {
                if attempt.await? {
                    successes += 1;
                }
            }
            assert_eq!(successes, 1);
        }
        Ok(())
    }
}
