//! Best-effort avatar enrichment for verified addresses.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::{path::PathBuf, time::Duration};
use tracing::debug;
use url::Url;

use crate::APP_USER_AGENT;

pub const GRAVATAR_BASE_URL: &str = "https://www.gravatar.com/avatar/";

#[async_trait]
pub trait AvatarLookup: Send + Sync {
    /// Return a picture URL for `address`.
    async fn resolve(&self, address: &str) -> Result<String>;
}

/// Basic email format check, addresses that fail it are never sent to Gravatar.
#[must_use]
pub fn valid_email(address: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(address))
}

/// Gravatar identifies pictures by the SHA-256 of the trimmed, lowercased address.
#[must_use]
pub fn gravatar_hash(address: &str) -> String {
    format!("{:x}", Sha256::digest(address.trim().to_lowercase().as_bytes()))
}

#[derive(Clone, Debug)]
struct LocalStore {
    dir: PathBuf,
    base_url: Url,
}

#[derive(Clone, Debug)]
pub struct GravatarLookup {
    client: Client,
    base_url: Url,
    store: Option<LocalStore>,
}

impl GravatarLookup {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Error creating gravatar client")?;
        let base_url = Url::parse(GRAVATAR_BASE_URL).context("invalid gravatar base URL")?;
        Ok(Self {
            client,
            base_url,
            store: None,
        })
    }

    /// Point lookups at another Gravatar-compatible endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Cache fetched pictures in `dir`; `public_url` is where `dir` is served from.
    #[must_use]
    pub fn with_local_store(mut self, dir: PathBuf, public_url: Url) -> Self {
        self.store = Some(LocalStore {
            dir,
            base_url: public_url,
        });
        self
    }

    fn avatar_url(&self, hash: &str) -> Result<Url> {
        let mut url = self
            .base_url
            .join(hash)
            .with_context(|| format!("invalid avatar hash: {hash}"))?;
        url.set_query(Some("d=404"));
        Ok(url)
    }
}

#[async_trait]
impl AvatarLookup for GravatarLookup {
    async fn resolve(&self, address: &str) -> Result<String> {
        if !valid_email(address) {
            bail!("not an email address");
        }

        let hash = gravatar_hash(address);
        let url = self.avatar_url(&hash)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("gravatar request failed")?;

        if response.status() != StatusCode::OK {
            bail!("no gravatar for address ({})", response.status());
        }

        let Some(store) = &self.store else {
            return Ok(url.to_string());
        };

        let bytes = response
            .bytes()
            .await
            .context("failed to read gravatar body")?;
        let file_name = format!("{hash}.image");
        tokio::fs::write(store.dir.join(&file_name), &bytes)
            .await
            .with_context(|| format!("failed to store avatar {file_name}"))?;
        debug!(file_name, size = bytes.len(), "avatar cached");

        let local = store
            .base_url
            .join(&format!("avatars/{file_name}"))
            .context("invalid avatar public URL")?;
        Ok(local.to_string())
    }
}
