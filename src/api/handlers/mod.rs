//! API handlers.

pub mod health;
pub mod login;
pub mod logout;
pub mod root;
pub mod user;
