// Copyright (C) Microsoft Corporation. All rights reserved.

//! PKCS#11 identifiers and structures used by the exchange provider.
//!
//! Identifiers are open enums: values a token reports that are not listed
//! here still round-trip unchanged, they just print as raw numbers.

#![allow(non_upper_case_globals)]

use open_enum::open_enum;

/// Token slot identifier (`CK_SLOT_ID`).
pub type SlotId = u64;

/// Session handle (`CK_SESSION_HANDLE`).
pub type SessionHandle = u64;

/// Object handle (`CK_OBJECT_HANDLE`).
pub type ObjectHandle = u64;

/// PKCS#11 return value (`CK_RV`).
#[open_enum]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u64)]
pub enum CkRv {
    Ok = 0x0000,
    HostMemory = 0x0002,
    SlotIdInvalid = 0x0003,
    GeneralError = 0x0005,
    FunctionFailed = 0x0006,
    ArgumentsBad = 0x0007,
    AttributeSensitive = 0x0011,
    AttributeTypeInvalid = 0x0012,
    AttributeValueInvalid = 0x0013,
    DeviceError = 0x0030,
    KeyHandleInvalid = 0x0060,
    MechanismInvalid = 0x0070,
    MechanismParamInvalid = 0x0071,
    ObjectHandleInvalid = 0x0082,
    SessionHandleInvalid = 0x00B3,
    TemplateIncomplete = 0x00D0,
    BufferTooSmall = 0x0150,
}

/// Object attribute type (`CK_ATTRIBUTE_TYPE`).
#[open_enum]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u64)]
pub enum AttributeType {
    Class = 0x0000,
    Token = 0x0001,
    Private = 0x0002,
    Label = 0x0003,
    Value = 0x0011,
    KeyType = 0x0100,
    Id = 0x0102,
    Sensitive = 0x0103,
    Derive = 0x010C,
    ValueLen = 0x0161,
    Extractable = 0x0162,
    EcParams = 0x0180,
    EcPoint = 0x0181,
}

/// Mechanism type (`CK_MECHANISM_TYPE`).
#[open_enum]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u64)]
pub enum MechanismType {
    Sha1 = 0x0220,
    Sha256 = 0x0250,
    Sha224 = 0x0255,
    Sha384 = 0x0260,
    Sha512 = 0x0270,
    Sha3_256 = 0x02B0,
    Sha3_224 = 0x02B5,
    Sha3_384 = 0x02C0,
    Sha3_512 = 0x02D0,
    Ecdh1Derive = 0x1050,
    Ecdh1CofactorDerive = 0x1051,
}

/// Key derivation function applied to the raw agreed value (`CK_EC_KDF_TYPE`).
#[open_enum]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u64)]
pub enum EcKdf {
    Null = 0x0001,
    Sha1Kdf = 0x0002,
    Sha224Kdf = 0x0005,
    Sha256Kdf = 0x0006,
    Sha384Kdf = 0x0007,
    Sha512Kdf = 0x0008,
    Sha3_224Kdf = 0x000A,
    Sha3_256Kdf = 0x000B,
    Sha3_384Kdf = 0x000C,
    Sha3_512Kdf = 0x000D,
}

/// Object class (`CK_OBJECT_CLASS`).
#[open_enum]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u64)]
pub enum ObjectClass {
    Data = 0x0000,
    Certificate = 0x0001,
    PublicKey = 0x0002,
    PrivateKey = 0x0003,
    SecretKey = 0x0004,
}

/// Key type (`CK_KEY_TYPE`).
#[open_enum]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u64)]
pub enum KeyType {
    Rsa = 0x0000,
    Ec = 0x0003,
    GenericSecret = 0x0010,
}

/// Session flags passed to `C_OpenSession`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SessionFlags(pub u64);

impl SessionFlags {
    pub const RW_SESSION: Self = Self(0x0002);
    pub const SERIAL_SESSION: Self = Self(0x0004);
}

/// Typed value of a template attribute.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AttributeValue {
    Class(ObjectClass),
    KeyType(KeyType),
    Bool(bool),
    Ulong(u64),
    Bytes(Vec<u8>),
}

/// One entry of an object creation template.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Attribute {
    pub attr_type: AttributeType,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, value: AttributeValue) -> Self {
        Self { attr_type, value }
    }
}

/// Parameters of `CKM_ECDH1_DERIVE` / `CKM_ECDH1_COFACTOR_DERIVE`
/// (`CK_ECDH1_DERIVE_PARAMS`).
///
/// Both byte fields are borrowed: the block only lives for the duration of a
/// single derive call.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Ecdh1DeriveParams<'a> {
    pub kdf: EcKdf,
    pub shared_data: &'a [u8],
    pub public_data: &'a [u8],
}

/// Mechanism selector together with its parameter block (`CK_MECHANISM`).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Mechanism<'a> {
    pub mechanism: MechanismType,
    pub params: Ecdh1DeriveParams<'a>,
}

/// One entry of a `C_GetAttributeValue` template.
///
/// With `value` unset the token only reports the length. `value_len` of
/// `None` is `CK_UNAVAILABLE_INFORMATION`.
#[derive(Debug)]
pub struct AttributeQuery<'a> {
    pub attr_type: AttributeType,
    pub value: Option<&'a mut [u8]>,
    pub value_len: Option<usize>,
}

impl<'a> AttributeQuery<'a> {
    /// Creates a query that only asks for the attribute length.
    pub fn probe(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            value: None,
            value_len: None,
        }
    }

    /// Creates a query that asks the token to copy the value into `buf`.
    pub fn with_buffer(attr_type: AttributeType, buf: &'a mut [u8]) -> Self {
        let value_len = Some(buf.len());
        Self {
            attr_type,
            value: Some(buf),
            value_len,
        }
    }
}
