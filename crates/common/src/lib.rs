//! Common types and errors shared across `kms-crypto` crates.

pub mod error;
pub mod key;

pub use error::{BoxError, CryptoError, Operation, RemoteError};
pub use key::{build_key_name, KeyReference, KEY_LOCATION};
