// Copyright (C) Microsoft Corporation. All rights reserved.

//! Typed key/value parameters exchanged with the framework.

use crate::ProvError;
use crate::ProvResult;

/// ECDH cofactor mode: -1 keeps the current mode, 0 standard, 1 cofactor.
pub const PARAM_ECDH_COFACTOR_MODE: &str = "ecdh-cofactor-mode";
/// KDF applied to the agreed value.
pub const PARAM_KDF_TYPE: &str = "kdf-type";
/// Digest used by the KDF.
pub const PARAM_KDF_DIGEST: &str = "kdf-digest";
/// Derived secret length in bytes.
pub const PARAM_KDF_OUTLEN: &str = "kdf-outlen";
/// User keying material (shared info) fed to the KDF.
pub const PARAM_KDF_UKM: &str = "kdf-ukm";

/// The ANSI X9.63 KDF, the only KDF family the token mechanisms offer.
pub const KDF_NAME_X963KDF: &str = "X963KDF";

/// Data type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    SizeT,
    Utf8String,
    OctetString,
}

/// Describes a parameter a context accepts or reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub key: &'static str,
    pub data_type: ParamType,
}

/// A parameter value. Strings and octets are borrowed, in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamValue<'a> {
    Integer(i32),
    SizeT(usize),
    Utf8String(&'a str),
    OctetString(&'a [u8]),
}

impl ParamValue<'_> {
    pub fn data_type(&self) -> ParamType {
        match self {
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::SizeT(_) => ParamType::SizeT,
            ParamValue::Utf8String(_) => ParamType::Utf8String,
            ParamValue::OctetString(_) => ParamType::OctetString,
        }
    }
}

/// A named parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param<'a> {
    pub key: &'a str,
    pub value: ParamValue<'a>,
}

impl<'a> Param<'a> {
    pub fn int(key: &'a str, value: i32) -> Self {
        Self {
            key,
            value: ParamValue::Integer(value),
        }
    }

    pub fn size_t(key: &'a str, value: usize) -> Self {
        Self {
            key,
            value: ParamValue::SizeT(value),
        }
    }

    pub fn utf8(key: &'a str, value: &'a str) -> Self {
        Self {
            key,
            value: ParamValue::Utf8String(value),
        }
    }

    pub fn octets(key: &'a str, value: &'a [u8]) -> Self {
        Self {
            key,
            value: ParamValue::OctetString(value),
        }
    }

    /// Reads the value as an integer; size values that fit are converted.
    pub fn get_int(&self) -> ProvResult<i32> {
        match self.value {
            ParamValue::Integer(value) => Ok(value),
            ParamValue::SizeT(value) => i32::try_from(value).map_err(|_| self.invalid()),
            _ => Err(self.invalid()),
        }
    }

    /// Reads the value as a size; non-negative integers are converted.
    pub fn get_size_t(&self) -> ProvResult<usize> {
        match self.value {
            ParamValue::SizeT(value) => Ok(value),
            ParamValue::Integer(value) => usize::try_from(value).map_err(|_| self.invalid()),
            _ => Err(self.invalid()),
        }
    }

    pub fn get_utf8_string(&self) -> ProvResult<&'a str> {
        match self.value {
            ParamValue::Utf8String(value) => Ok(value),
            _ => Err(self.invalid()),
        }
    }

    pub fn get_octet_string(&self) -> ProvResult<&'a [u8]> {
        match self.value {
            ParamValue::OctetString(value) => Ok(value),
            _ => Err(self.invalid()),
        }
    }

    fn invalid(&self) -> ProvError {
        tracing::error!(key = self.key, value = ?self.value, "Parameter has an unexpected type");
        ProvError::InvalidParam(known_key(self.key))
    }
}

/// Returns the first parameter named `key`.
pub fn locate<'p, 'a>(params: &'p [Param<'a>], key: &str) -> Option<&'p Param<'a>> {
    params.iter().find(|param| param.key == key)
}

fn known_key(key: &str) -> &'static str {
    [
        PARAM_ECDH_COFACTOR_MODE,
        PARAM_KDF_TYPE,
        PARAM_KDF_DIGEST,
        PARAM_KDF_OUTLEN,
        PARAM_KDF_UKM,
    ]
    .into_iter()
    .find(|known| *known == key)
    .unwrap_or("<unknown>")
}
