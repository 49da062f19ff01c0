//! Passwordless login through confirmation codes.
//!
//! [`flow::ConfirmationFlow`] drives the protocol and depends only on narrow
//! capabilities injected at construction: a [`store::CodeStore`], a
//! [`sender::Sender`], a [`token::TokenService`] and, optionally, an
//! [`avatar::AvatarLookup`].

pub mod avatar;
pub mod code;
pub mod error;
pub mod flow;
pub mod sender;
pub mod store;
pub mod template;
pub mod token;

pub use error::FlowError;
pub use flow::{CodeSent, ConfirmationFlow, FlowConfig};
