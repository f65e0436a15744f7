// Copyright (C) Microsoft Corporation. All rights reserved.

//! Provider context shared by every operation context.

use std::fmt;
use std::sync::Arc;

use open_enum::open_enum;

use crate::config::ProviderConfig;
use crate::exchange::exchange_algorithms;
use crate::exchange::find_exchange;
use crate::exchange::AlgorithmDescriptor;
use crate::exchange::KeyExchange;
use crate::token::Pkcs11Token;
use crate::ProvError;
use crate::ProvResult;

/// Framework operation identifiers (`OSSL_OP_*`).
#[open_enum]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u32)]
pub enum OperationId {
    Digest = 1,
    Cipher = 2,
    Mac = 3,
    Kdf = 4,
    Rand = 5,
    Keymgmt = 10,
    KeyExchange = 11,
    Signature = 12,
    AsymCipher = 13,
    Kem = 14,
    Decoder = 20,
    Encoder = 21,
    Store = 22,
}

/// State shared by the provider and the contexts it creates.
pub struct ProviderCtx {
    token: Arc<dyn Pkcs11Token>,
    config: ProviderConfig,
}

impl ProviderCtx {
    pub fn new(token: Arc<dyn Pkcs11Token>, config: ProviderConfig) -> Arc<Self> {
        Arc::new(Self { token, config })
    }

    /// The PKCS#11 module the provider drives.
    pub fn token(&self) -> &dyn Pkcs11Token {
        self.token.as_ref()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Algorithms the provider offers for `operation`; empty for operations
    /// it does not implement.
    pub fn query_operation(&self, operation: OperationId) -> &'static [AlgorithmDescriptor] {
        match operation {
            OperationId::KeyExchange => exchange_algorithms(),
            _ => {
                tracing::debug!(?operation, "Operation not offered");
                &[]
            }
        }
    }

    /// Creates a key exchange context for the algorithm named `name`.
    pub fn new_exchange(self: &Arc<Self>, name: &str) -> ProvResult<Box<dyn KeyExchange>> {
        let algorithm = find_exchange(name).ok_or_else(|| {
            tracing::error!(name, "Unknown key exchange algorithm");
            ProvError::UnknownAlgorithm(name.to_string())
        })?;
        algorithm.new_ctx(Arc::clone(self))
    }
}

impl fmt::Debug for ProviderCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCtx")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use test_with_tracing::test;

    use super::*;
    use crate::exchange::Param;
    use crate::exchange::PARAM_KDF_TYPE;
    use crate::token::mock::MockToken;

    fn provider() -> Arc<ProviderCtx> {
        let config = ProviderConfig::new("/usr/lib/softhsm/libsofthsm2.so").with_init_args("");
        ProviderCtx::new(Arc::new(MockToken::new()), config)
    }

    #[test]
    fn test_query_key_exchange() {
        let provctx = provider();
        let algorithms = provctx.query_operation(OperationId::KeyExchange);
        assert_eq!(algorithms.len(), 1);
        assert!(algorithms[0].name_list().any(|name| name == "PKCS11-ECDH"));
        assert_eq!(algorithms[0].properties, provctx.config().properties());
        assert_eq!(algorithms[0].description, "PKCS11 ECDH Implementation");

        assert!(provctx.query_operation(OperationId::Signature).is_empty());
        assert!(provctx.query_operation(OperationId(99)).is_empty());
    }

    #[test]
    fn test_new_exchange() {
        let provctx = provider();
        let ctx = provctx.new_exchange("PKCS11-ECDH").expect("no context");
        let params = ctx.get_ctx_params(&[PARAM_KDF_TYPE]).expect("get failed");
        assert_eq!(params, vec![Param::utf8(PARAM_KDF_TYPE, "")]);
        assert_eq!(Arc::strong_count(&provctx), 2);

        drop(params);
        drop(ctx);
        assert_eq!(Arc::strong_count(&provctx), 1);
    }

    #[test]
    fn test_new_exchange_unknown() {
        let provctx = provider();
        let err = provctx.new_exchange("DH").err();
        assert_eq!(err, Some(ProvError::UnknownAlgorithm("DH".to_string())));
    }

    #[test]
    fn test_config_accessor() {
        let provctx = provider();
        assert_eq!(
            provctx.config().module_path(),
            "/usr/lib/softhsm/libsofthsm2.so"
        );
        assert_eq!(provctx.config().init_args(), Some(""));
    }
}
