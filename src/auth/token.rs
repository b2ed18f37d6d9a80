//! Token material and the parsers that normalize provider responses into it.

pub mod id_token;
pub mod response;
pub mod secret;
