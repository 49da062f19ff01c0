//! Signed credentials for verified addresses.
//!
//! The flow hands over a [`Claims`] value once a code matches; a
//! [`TokenService`] signs it and attaches it to the response cookie jar.
//! [`JwtTokenService`] signs HS256 JWTs, keeps them in the `JWT` cookie and
//! mirrors the token id in a script-readable `XSRF-TOKEN` cookie.

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use ulid::Ulid;

pub const JWT_COOKIE_NAME: &str = "JWT";
pub const XSRF_COOKIE_NAME: &str = "XSRF-TOKEN";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_COOKIE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token not found")]
    Missing,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user: User,
    #[serde(default)]
    pub jti: String,
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub nbf: u64,
    #[serde(default)]
    pub exp: u64,
    #[serde(default)]
    pub session_only: bool,
}

impl Claims {
    /// Unsigned claims for `user`; timestamps are filled in on issue.
    #[must_use]
    pub fn new(user: User, issuer: impl Into<String>) -> Self {
        Self {
            jti: user.id.clone(),
            user,
            iss: issuer.into(),
            aud: None,
            iat: 0,
            nbf: 0,
            exp: 0,
            session_only: false,
        }
    }
}

#[async_trait]
pub trait TokenService: Send + Sync {
    /// Sign `claims` and attach the credential to `jar`.
    async fn issue(&self, jar: CookieJar, claims: Claims)
    -> Result<(CookieJar, String), TokenError>;

    /// Clear any credential carried by `jar`.
    async fn reset(&self, jar: CookieJar) -> Result<CookieJar, TokenError>;

    /// Read and validate the credential carried by `jar`.
    async fn verify(&self, jar: &CookieJar) -> Result<Claims, TokenError>;
}

#[derive(Clone, Debug)]
pub struct JwtTokenService {
    secret: SecretString,
    issuer: String,
    token_ttl: Duration,
    cookie_ttl: Duration,
    secure_cookies: bool,
}

impl JwtTokenService {
    #[must_use]
    pub fn new(secret: SecretString, issuer: String) -> Self {
        Self {
            secret,
            issuer,
            token_ttl: DEFAULT_TOKEN_TTL,
            cookie_ttl: DEFAULT_COOKIE_TTL,
            secure_cookies: true,
        }
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_cookie_ttl(mut self, ttl: Duration) -> Self {
        self.cookie_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    fn cookie(&self, name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .build()
    }

    fn expired(&self, name: &'static str, http_only: bool) -> Cookie<'static> {
        let mut cookie = self.cookie(name, String::new(), http_only);
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }
}

#[async_trait]
impl TokenService for JwtTokenService {
    async fn issue(
        &self,
        jar: CookieJar,
        mut claims: Claims,
    ) -> Result<(CookieJar, String), TokenError> {
        let now = unix_now();
        claims.iat = now;
        claims.nbf = now;
        claims.exp = now.saturating_add(self.token_ttl.as_secs());
        if claims.jti.is_empty() {
            claims.jti = Ulid::new().to_string();
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )?;

        let mut jwt_cookie = self.cookie(JWT_COOKIE_NAME, token.clone(), true);
        let mut xsrf_cookie = self.cookie(XSRF_COOKIE_NAME, claims.jti.clone(), false);
        if !claims.session_only {
            let max_age = time::Duration::seconds(
                i64::try_from(self.cookie_ttl.as_secs()).unwrap_or(i64::MAX),
            );
            jwt_cookie.set_max_age(max_age);
            xsrf_cookie.set_max_age(max_age);
        }

        Ok((jar.add(jwt_cookie).add(xsrf_cookie), token))
    }

    async fn reset(&self, jar: CookieJar) -> Result<CookieJar, TokenError> {
        Ok(jar
            .add(self.expired(JWT_COOKIE_NAME, true))
            .add(self.expired(XSRF_COOKIE_NAME, false)))
    }

    async fn verify(&self, jar: &CookieJar) -> Result<Claims, TokenError> {
        let token = jar
            .get(JWT_COOKIE_NAME)
            .map(Cookie::value)
            .filter(|value| !value.is_empty())
            .ok_or(TokenError::Missing)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )?;

        Ok(data.claims)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
