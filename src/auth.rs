//! Credential models held by the gateway and the signing hook that attaches them to requests.

pub mod signer;
pub mod token;

pub use signer::*;
pub use token::{pair::*, secret::*};
