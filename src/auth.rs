//! Auth-domain primitives: granted scope sets, redacted secrets, and token endpoint payloads.

pub mod scope;
pub mod token;

pub use scope::*;
pub use token::{id_token::*, response::*, secret::*};
