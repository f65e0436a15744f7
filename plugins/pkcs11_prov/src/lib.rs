// Copyright (C) Microsoft Corporation. All rights reserved.

//! ECDH key exchange for a cryptographic provider framework, performed on a
//! PKCS#11 token.
//!
//! The framework drives a [`KeyExchange`] context created through
//! [`ProviderCtx::new_exchange`]. The context collects the local and peer
//! keys and the KDF parameters, then asks the token to derive the secret
//! with `C_DeriveKey` and reads it back with [`fetch_attributes`].

mod config;
mod digest;
mod error;
mod exchange;
mod fetch;
mod key;
mod mem;
pub mod pkcs11;
mod provider;
mod token;

pub use config::*;
pub use digest::*;
pub use error::ErrorKind;
pub use error::ProvError;
pub use exchange::*;
pub use fetch::*;
pub use key::*;
pub use provider::*;
pub use token::*;

/// Result type used throughout the provider.
pub type ProvResult<T> = Result<T, ProvError>;
