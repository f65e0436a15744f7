// Copyright (C) Microsoft Corporation. All rights reserved.

use std::fmt::Debug;

use crate::pkcs11::AttributeType;
use crate::pkcs11::CkRv;

pub(crate) trait ProvErrorMapper<T, E> {
    fn map_prov_err(self, prov_err: ProvError) -> Result<T, ProvError>;
}

impl<T, E: Debug> ProvErrorMapper<T, E> for Result<T, E> {
    fn map_prov_err(self, prov_err: ProvError) -> Result<T, ProvError> {
        match self {
            Ok(t) => Ok(t),
            Err(err) => {
                tracing::error!("Mapping error {:?} to provider error: {:?}", err, prov_err);
                Err(prov_err)
            }
        }
    }
}

/// Broad class of a [`ProvError`], used by the host framework to pick the
/// reason code it raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied an unusable argument or the context is incomplete.
    Validation,
    /// A digest, KDF or algorithm name has no token counterpart.
    Mapping,
    /// Memory could not be allocated.
    Resource,
    /// A required attribute is not available on the object.
    NotFound,
    /// The token failed the call; the return code is carried verbatim.
    Hardware,
}

/// Errors reported by the provider.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ProvError {
    #[error("missing {0} key")]
    MissingKey(&'static str),

    #[error("output buffer too small: {needed} bytes required, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid value for parameter {0}")]
    InvalidParam(&'static str),

    #[error("invalid key: {0}")]
    InvalidKey(&'static str),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("unknown digest {0:?}")]
    InvalidDigest(String),

    #[error("digest-based KDF selected but no digest was set")]
    MissingDigest,

    #[error("unsupported KDF {0:?}")]
    UnsupportedKdf(String),

    #[error("unknown algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("memory allocation failed")]
    AllocationFailed,

    #[error("attribute {0:?} is not available on the object")]
    AttributeNotFound(AttributeType),

    #[error("token call failed with {0:?}")]
    Token(CkRv),
}

impl ProvError {
    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvError::MissingKey(_)
            | ProvError::BufferTooSmall { .. }
            | ProvError::InvalidParam(_)
            | ProvError::InvalidKey(_)
            | ProvError::InvalidConfig(_) => ErrorKind::Validation,
            ProvError::InvalidDigest(_)
            | ProvError::MissingDigest
            | ProvError::UnsupportedKdf(_)
            | ProvError::UnknownAlgorithm(_) => ErrorKind::Mapping,
            ProvError::AllocationFailed => ErrorKind::Resource,
            ProvError::AttributeNotFound(_) => ErrorKind::NotFound,
            ProvError::Token(_) => ErrorKind::Hardware,
        }
    }

    /// Returns the token return code for hardware errors.
    pub fn token_rv(&self) -> Option<CkRv> {
        match self {
            ProvError::Token(rv) => Some(*rv),
            _ => None,
        }
    }
}

impl From<CkRv> for ProvError {
    fn from(rv: CkRv) -> Self {
        ProvError::Token(rv)
    }
}

#[cfg(test)]
mod tests {
    use test_with_tracing::test;

    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ProvError::MissingKey("peer").kind(), ErrorKind::Validation);
        assert_eq!(
            ProvError::BufferTooSmall {
                needed: 32,
                available: 16
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ProvError::InvalidDigest("MD5".to_string()).kind(),
            ErrorKind::Mapping
        );
        assert_eq!(ProvError::MissingDigest.kind(), ErrorKind::Mapping);
        assert_eq!(ProvError::AllocationFailed.kind(), ErrorKind::Resource);
        assert_eq!(
            ProvError::AttributeNotFound(AttributeType::Value).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ProvError::Token(CkRv::DeviceError).kind(),
            ErrorKind::Hardware
        );
    }

    #[test]
    fn test_token_rv_is_preserved() {
        let err: ProvError = CkRv(0x8000_0001).into();
        assert_eq!(err.token_rv(), Some(CkRv(0x8000_0001)));
        assert_eq!(ProvError::AllocationFailed.token_rv(), None);
    }

    #[test]
    fn test_map_prov_err() {
        let result: Result<(), &str> = Err("boom");
        assert_eq!(
            result.map_prov_err(ProvError::AllocationFailed),
            Err(ProvError::AllocationFailed)
        );
        let result: Result<u8, &str> = Ok(7);
        assert_eq!(result.map_prov_err(ProvError::AllocationFailed), Ok(7));
    }
}
