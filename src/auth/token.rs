//! Token secrets and the access/refresh pair tracked per gateway.

pub mod pair;
pub mod secret;
