//! # Passcode (passwordless confirmation-code login)
//!
//! `passcode` signs users in by sending a short numeric code to an address they
//! control (email, SMS, IM) and issuing a signed credential once the code comes back.
//!
//! ## Protocol
//!
//! - `GET /login?address=<addr>` generates a code, stores it under the address and
//!   delivers it through the configured sender.
//! - `GET /login?address=<addr>&code=<code>` checks the code, deletes it on match and
//!   sets the `JWT` cookie.
//! - `GET /logout` clears the credential.
//!
//! ## Code Expiry
//!
//! Pending codes are either **count-bounded** (valid for a fixed number of lookups,
//! every verification attempt counts, right or wrong) or **time-bounded** (valid for
//! a fixed duration). Both strategies live behind the same store interface and are
//! selected with `--code-policy`.
//!
//! Failed attempts never reveal whether an address has a pending code: a missing code
//! and a wrong code produce the same `wrong code` response.

pub mod api;
pub mod cli;
pub mod passcode;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
