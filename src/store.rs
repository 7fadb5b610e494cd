//! Storage contracts and built-in credential stores backing a gateway's token pair.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenPair};

/// Storage backend contract implemented by gateway credential stores.
///
/// Reads are infallible snapshots so request signing never waits on I/O; implementations
/// that persist keep an in-memory copy and write through on mutation.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current token pair (empty when unauthenticated).
	fn load(&self) -> TokenPair;

	/// Replaces the stored token pair.
	fn save(&self, pair: TokenPair) -> Result<(), StoreError>;

	/// Removes both tokens.
	fn clear(&self) -> Result<(), StoreError>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
