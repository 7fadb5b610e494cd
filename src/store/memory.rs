//! Thread-safe in-memory [`CredentialStore`] used by default.

// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	store::{CredentialStore, StoreError},
};

/// Keeps the token pair in process memory for the lifetime of the store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<TokenPair>>);
impl MemoryStore {
	/// Creates a store seeded with `pair`.
	pub fn with_pair(pair: TokenPair) -> Self {
		Self(Arc::new(RwLock::new(pair)))
	}
}
impl CredentialStore for MemoryStore {
	fn load(&self) -> TokenPair {
		self.0.read().clone()
	}

	fn save(&self, pair: TokenPair) -> Result<(), StoreError> {
		*self.0.write() = pair;

		Ok(())
	}

	fn clear(&self) -> Result<(), StoreError> {
		*self.0.write() = TokenPair::default();

		Ok(())
	}
}
