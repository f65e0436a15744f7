// Copyright (C) Microsoft Corporation. All rights reserved.

//! Provider configuration read from the framework's core parameters.

use crate::exchange::locate;
use crate::exchange::Param;
use crate::ProvError;
use crate::ProvResult;

/// Core parameter naming the PKCS#11 module to load.
pub const PARAM_MODULE_PATH: &str = "pkcs11-module-path";
/// Core parameter with the argument string passed to `C_Initialize`.
pub const PARAM_MODULE_INIT_ARGS: &str = "pkcs11-module-init-args";
/// Environment variable consulted when no module path is configured.
pub const ENV_MODULE_PATH: &str = "PKCS11_PROVIDER_MODULE";

/// Property definition every algorithm of the provider is registered with.
pub const DEFAULT_PROPERTIES: &str = "provider=pkcs11";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    module_path: String,
    init_args: Option<String>,
}

impl ProviderConfig {
    pub fn new(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            init_args: None,
        }
    }

    pub fn with_init_args(mut self, init_args: impl Into<String>) -> Self {
        self.init_args = Some(init_args.into());
        self
    }

    /// Reads the configuration from the provider's core parameters, falling
    /// back to `PKCS11_PROVIDER_MODULE` for the module path.
    ///
    /// # Errors
    ///
    /// * [`ProvError::InvalidConfig`] - No module path is configured.
    /// * [`ProvError::InvalidParam`] - A parameter is not a string.
    pub fn from_core_params(params: &[Param<'_>]) -> ProvResult<Self> {
        Self::from_params_or_env(params, std::env::var(ENV_MODULE_PATH).ok())
    }

    fn from_params_or_env(params: &[Param<'_>], env_path: Option<String>) -> ProvResult<Self> {
        let module_path = match locate(params, PARAM_MODULE_PATH) {
            Some(param) => Some(param.get_utf8_string()?.to_string()),
            None => env_path,
        };
        let module_path = module_path.filter(|path| !path.is_empty()).ok_or_else(|| {
            tracing::error!("No PKCS#11 module configured");
            ProvError::InvalidConfig("pkcs11-module-path is not set")
        })?;

        let init_args = match locate(params, PARAM_MODULE_INIT_ARGS) {
            Some(param) => Some(param.get_utf8_string()?.to_string()),
            None => None,
        };

        tracing::debug!(module_path = %module_path, ?init_args, "Loaded provider configuration");
        Ok(Self {
            module_path,
            init_args,
        })
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn init_args(&self) -> Option<&str> {
        self.init_args.as_deref()
    }

    /// Properties the provider's algorithms are registered with.
    pub fn properties(&self) -> &'static str {
        DEFAULT_PROPERTIES
    }
}
