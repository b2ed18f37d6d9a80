//! Interactive flows that turn a user's consent into
//! [`Credentials`](crate::credentials::Credentials).

pub mod pkce;
pub mod web_server;

pub use pkce::*;
pub use web_server::*;
