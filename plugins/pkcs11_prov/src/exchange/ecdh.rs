// Copyright (C) Microsoft Corporation. All rights reserved.

//! ECDH performed by the token with `CKM_ECDH1_DERIVE`.
//!
//! Parameters may arrive in any order and over several calls. The context
//! keeps what it was told and only resolves it into the single parameter
//! block the mechanism needs when a secret is derived.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::params::*;
use super::AlgorithmDescriptor;
use super::KeyExchange;
use crate::config::DEFAULT_PROPERTIES;
use crate::digest::digest_from_name;
use crate::digest::digest_name;
use crate::digest::digest_to_kdf;
use crate::fetch::fetch_attributes;
use crate::fetch::FetchAttr;
use crate::key::P11Key;
use crate::key::P11Object;
use crate::mem::try_copy;
use crate::pkcs11::*;
use crate::provider::ProviderCtx;
use crate::token::Session;
use crate::ProvError;
use crate::ProvResult;

/// ECDH as registered with the framework.
pub const ECDH_ALGORITHM: AlgorithmDescriptor = AlgorithmDescriptor::new(
    "ECDH:PKCS11-ECDH",
    DEFAULT_PROPERTIES,
    "PKCS11 ECDH Implementation",
    EcdhCtx::new_exchange,
);

static ECDH_PARAMS: [ParamDescriptor; 5] = [
    ParamDescriptor {
        key: PARAM_ECDH_COFACTOR_MODE,
        data_type: ParamType::Integer,
    },
    ParamDescriptor {
        key: PARAM_KDF_TYPE,
        data_type: ParamType::Utf8String,
    },
    ParamDescriptor {
        key: PARAM_KDF_DIGEST,
        data_type: ParamType::Utf8String,
    },
    ParamDescriptor {
        key: PARAM_KDF_OUTLEN,
        data_type: ParamType::SizeT,
    },
    ParamDescriptor {
        key: PARAM_KDF_UKM,
        data_type: ParamType::OctetString,
    },
];

/// Where the KDF selection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfState {
    /// Nothing was selected; the raw agreed value is returned.
    NotSet,
    /// A digest based KDF was selected; the digest decides which one.
    PendingDigest,
    /// The KDF is known.
    Resolved(EcKdf),
}

/// Settings that are staged by [`EcdhCtx::set_ctx_params`] before they are
/// committed.
#[derive(Debug, Clone, Copy)]
struct EcdhSettings {
    mechanism: MechanismType,
    kdf: KdfState,
    digest: Option<MechanismType>,
    kdf_outlen: usize,
}

impl Default for EcdhSettings {
    fn default() -> Self {
        Self {
            mechanism: MechanismType::Ecdh1Derive,
            kdf: KdfState::NotSet,
            digest: None,
            kdf_outlen: 0,
        }
    }
}

/// ECDH key exchange context.
pub struct EcdhCtx {
    provctx: Arc<ProviderCtx>,
    key: Option<Arc<P11Key>>,
    peer_key: Option<Arc<P11Key>>,
    settings: EcdhSettings,
    shared_info: Zeroizing<Vec<u8>>,
}

impl EcdhCtx {
    /// Creates an unconfigured context: standard ECDH, no KDF.
    pub fn new(provctx: Arc<ProviderCtx>) -> Self {
        Self {
            provctx,
            key: None,
            peer_key: None,
            settings: EcdhSettings::default(),
            shared_info: Zeroizing::new(Vec::new()),
        }
    }

    fn new_exchange(provctx: Arc<ProviderCtx>) -> ProvResult<Box<dyn KeyExchange>> {
        Ok(Box::new(Self::new(provctx)))
    }

    /// Current KDF selection.
    pub fn kdf_state(&self) -> KdfState {
        self.settings.kdf
    }

    /// Mechanism the next derive uses.
    pub fn mechanism(&self) -> MechanismType {
        self.settings.mechanism
    }

    /// Turns the KDF selection into the token KDF identifier, remembering
    /// the outcome.
    fn resolve_kdf(&mut self) -> ProvResult<EcKdf> {
        let kdf = match self.settings.kdf {
            KdfState::NotSet => EcKdf::Null,
            KdfState::Resolved(kdf) => kdf,
            KdfState::PendingDigest => {
                let digest = self.settings.digest.ok_or_else(|| {
                    tracing::error!("X963KDF selected without a digest");
                    ProvError::MissingDigest
                })?;
                let kdf = digest_to_kdf(digest).ok_or_else(|| {
                    tracing::error!(?digest, "No KDF for digest");
                    ProvError::UnsupportedKdf(format!("{:?}", digest))
                })?;
                self.settings.kdf = KdfState::Resolved(kdf);
                kdf
            }
        };
        Ok(kdf)
    }
}

fn stage_param(settings: &mut EcdhSettings, param: &Param<'_>) -> ProvResult<()> {
    match param.key {
        PARAM_ECDH_COFACTOR_MODE => match param.get_int()? {
            -1 => {}
            0 => settings.mechanism = MechanismType::Ecdh1Derive,
            1 => settings.mechanism = MechanismType::Ecdh1CofactorDerive,
            mode => {
                tracing::error!(mode, "Invalid cofactor mode");
                return Err(ProvError::InvalidParam(PARAM_ECDH_COFACTOR_MODE));
            }
        },
        PARAM_KDF_TYPE => match param.get_utf8_string()? {
            "" => settings.kdf = KdfState::Resolved(EcKdf::Null),
            KDF_NAME_X963KDF => settings.kdf = KdfState::PendingDigest,
            name => {
                tracing::error!(name, "Unsupported KDF");
                return Err(ProvError::UnsupportedKdf(name.to_string()));
            }
        },
        PARAM_KDF_DIGEST => {
            let name = param.get_utf8_string()?;
            let digest = digest_from_name(name).ok_or_else(|| {
                tracing::error!(name, "Unknown digest");
                ProvError::InvalidDigest(name.to_string())
            })?;
            settings.digest = Some(digest);
            if matches!(settings.kdf, KdfState::Resolved(kdf) if kdf != EcKdf::Null) {
                settings.kdf = KdfState::PendingDigest;
            }
        }
        PARAM_KDF_OUTLEN => settings.kdf_outlen = param.get_size_t()?,
        _ => {}
    }
    Ok(())
}

impl KeyExchange for EcdhCtx {
    fn dup(&self) -> ProvResult<Box<dyn KeyExchange>> {
        let shared_info = try_copy(&self.shared_info)?;
        Ok(Box::new(Self {
            provctx: self.provctx.clone(),
            key: self.key.clone(),
            peer_key: self.peer_key.clone(),
            settings: self.settings,
            shared_info,
        }))
    }

    fn init(&mut self, key: &P11Object, params: &[Param<'_>]) -> ProvResult<()> {
        self.key = None;
        let key = key.get_key(true).ok_or_else(|| {
            tracing::error!("Object has no private key");
            ProvError::MissingKey("private")
        })?;
        self.key = Some(key);
        self.set_ctx_params(params)
    }

    fn set_peer(&mut self, peer: &P11Object) -> ProvResult<()> {
        self.peer_key = None;
        let peer = peer.get_key(false).ok_or_else(|| {
            tracing::error!("Peer object has no public key");
            ProvError::MissingKey("public")
        })?;
        self.peer_key = Some(peer);
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(mechanism = ?self.settings.mechanism))]
    fn derive(&mut self, secret: Option<&mut [u8]>) -> ProvResult<usize> {
        let (Some(key), Some(peer_key)) = (self.key.clone(), self.peer_key.clone()) else {
            tracing::error!(
                has_key = self.key.is_some(),
                has_peer = self.peer_key.is_some(),
                "Derive without both keys"
            );
            return Err(ProvError::MissingKey(if self.key.is_none() {
                "local"
            } else {
                "peer"
            }));
        };

        let Some(secret) = secret else {
            return Ok(key.size());
        };

        if self.settings.kdf_outlen > secret.len() {
            tracing::error!(
                needed = self.settings.kdf_outlen,
                available = secret.len(),
                "Secret buffer too small"
            );
            return Err(ProvError::BufferTooSmall {
                needed: self.settings.kdf_outlen,
                available: secret.len(),
            });
        }

        let kdf = self.resolve_kdf()?;

        let public_data = peer_key.attr(AttributeType::EcPoint).ok_or_else(|| {
            tracing::error!("Peer key has no EC point");
            ProvError::InvalidKey("peer key has no EC point")
        })?;

        let key_size = match self.settings.kdf_outlen {
            0 => key.size(),
            outlen => outlen,
        };
        let template = [
            Attribute::new(
                AttributeType::Class,
                AttributeValue::Class(ObjectClass::SecretKey),
            ),
            Attribute::new(
                AttributeType::KeyType,
                AttributeValue::KeyType(KeyType::GenericSecret),
            ),
            Attribute::new(AttributeType::Sensitive, AttributeValue::Bool(false)),
            Attribute::new(AttributeType::Extractable, AttributeValue::Bool(true)),
            Attribute::new(AttributeType::ValueLen, AttributeValue::Ulong(key_size as u64)),
        ];

        let handle = key.handle().ok_or_else(|| {
            tracing::error!("Local key has no object handle");
            ProvError::InvalidKey("local key has no object handle")
        })?;
        let slot_id = key.slot_id().ok_or_else(|| {
            tracing::error!("Local key has no slot");
            ProvError::InvalidKey("local key has no slot")
        })?;

        let mechanism = Mechanism {
            mechanism: self.settings.mechanism,
            params: Ecdh1DeriveParams {
                kdf,
                shared_data: &self.shared_info,
                public_data,
            },
        };

        let session = Session::open(self.provctx.token(), slot_id)?;
        let secret_handle = session.derive_key(&mechanism, handle, &template)?;

        let mut attrs = [FetchAttr::buffer(AttributeType::Value, secret, true)];
        fetch_attributes(&session, secret_handle, &mut attrs)
            .inspect_err(|err| tracing::error!(?err, "Failed to read derived secret"))?;
        let len = attrs[0].len();
        tracing::debug!(len, ?kdf, "Derived shared secret");
        Ok(len)
    }

    fn set_ctx_params(&mut self, params: &[Param<'_>]) -> ProvResult<()> {
        tracing::debug!(count = params.len(), "Setting ECDH parameters");

        let mut staged = self.settings;
        for key in [
            PARAM_ECDH_COFACTOR_MODE,
            PARAM_KDF_TYPE,
            PARAM_KDF_DIGEST,
            PARAM_KDF_OUTLEN,
        ] {
            if let Some(param) = locate(params, key) {
                stage_param(&mut staged, param)?;
            }
        }
        let shared_info = match locate(params, PARAM_KDF_UKM) {
            Some(param) => Some(try_copy(param.get_octet_string()?)?),
            None => None,
        };

        self.settings = staged;
        if let Some(shared_info) = shared_info {
            self.shared_info = shared_info;
        }
        Ok(())
    }

    fn settable_ctx_params(&self) -> &'static [ParamDescriptor] {
        &ECDH_PARAMS
    }

    fn get_ctx_params(&self, keys: &[&str]) -> ProvResult<Vec<Param<'_>>> {
        tracing::debug!(?keys, "Getting ECDH parameters");

        let mut params = Vec::with_capacity(keys.len());
        for key in keys {
            let param = match *key {
                PARAM_ECDH_COFACTOR_MODE => {
                    let mode = match self.settings.mechanism {
                        MechanismType::Ecdh1CofactorDerive => 1,
                        _ => 0,
                    };
                    Param::int(PARAM_ECDH_COFACTOR_MODE, mode)
                }
                PARAM_KDF_TYPE => {
                    let name = match self.settings.kdf {
                        KdfState::NotSet | KdfState::Resolved(EcKdf::Null) => "",
                        _ => KDF_NAME_X963KDF,
                    };
                    Param::utf8(PARAM_KDF_TYPE, name)
                }
                PARAM_KDF_DIGEST => {
                    let name = self.settings.digest.and_then(digest_name).unwrap_or("");
                    Param::utf8(PARAM_KDF_DIGEST, name)
                }
                PARAM_KDF_OUTLEN => Param::size_t(PARAM_KDF_OUTLEN, self.settings.kdf_outlen),
                PARAM_KDF_UKM => Param::octets(PARAM_KDF_UKM, &self.shared_info),
                _ => continue,
            };
            params.push(param);
        }
        Ok(params)
    }

    fn gettable_ctx_params(&self) -> &'static [ParamDescriptor] {
        &ECDH_PARAMS
    }
}
