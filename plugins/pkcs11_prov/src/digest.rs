// Copyright (C) Microsoft Corporation. All rights reserved.

//! Digests usable with the ECDH key derivation functions.
//!
//! Each entry ties a digest name, as the framework spells it, to the token
//! digest mechanism and the `CKD_*` KDF built on that digest. Only digests
//! with a matching KDF are listed.

use crate::pkcs11::EcKdf;
use crate::pkcs11::MechanismType;

/// One row of the digest table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestEntry {
    /// Canonical name, reported back by parameter getters.
    pub name: &'static str,
    /// Alternate spellings accepted on input.
    pub aliases: &'static [&'static str],
    pub digest: MechanismType,
    pub kdf: EcKdf,
    /// Digest output size in bytes.
    pub digest_size: usize,
}

static DIGEST_MAP: [DigestEntry; 9] = [
    DigestEntry {
        name: "SHA3-256",
        aliases: &[],
        digest: MechanismType::Sha3_256,
        kdf: EcKdf::Sha3_256Kdf,
        digest_size: 32,
    },
    DigestEntry {
        name: "SHA3-512",
        aliases: &[],
        digest: MechanismType::Sha3_512,
        kdf: EcKdf::Sha3_512Kdf,
        digest_size: 64,
    },
    DigestEntry {
        name: "SHA3-384",
        aliases: &[],
        digest: MechanismType::Sha3_384,
        kdf: EcKdf::Sha3_384Kdf,
        digest_size: 48,
    },
    DigestEntry {
        name: "SHA3-224",
        aliases: &[],
        digest: MechanismType::Sha3_224,
        kdf: EcKdf::Sha3_224Kdf,
        digest_size: 28,
    },
    DigestEntry {
        name: "SHA-256",
        aliases: &["SHA256", "SHA2-256"],
        digest: MechanismType::Sha256,
        kdf: EcKdf::Sha256Kdf,
        digest_size: 32,
    },
    DigestEntry {
        name: "SHA-512",
        aliases: &["SHA512", "SHA2-512"],
        digest: MechanismType::Sha512,
        kdf: EcKdf::Sha512Kdf,
        digest_size: 64,
    },
    DigestEntry {
        name: "SHA-384",
        aliases: &["SHA384", "SHA2-384"],
        digest: MechanismType::Sha384,
        kdf: EcKdf::Sha384Kdf,
        digest_size: 48,
    },
    DigestEntry {
        name: "SHA-224",
        aliases: &["SHA224", "SHA2-224"],
        digest: MechanismType::Sha224,
        kdf: EcKdf::Sha224Kdf,
        digest_size: 28,
    },
    DigestEntry {
        name: "SHA-1",
        aliases: &["SHA1"],
        digest: MechanismType::Sha1,
        kdf: EcKdf::Sha1Kdf,
        digest_size: 20,
    },
];

/// Returns every supported digest.
pub fn digest_entries() -> &'static [DigestEntry] {
    &DIGEST_MAP
}

fn entry_by_digest(digest: MechanismType) -> Option<&'static DigestEntry> {
    DIGEST_MAP.iter().find(|entry| entry.digest == digest)
}

/// Looks up a digest mechanism by name. Matching ignores ASCII case, as the
/// framework does for algorithm names.
pub fn digest_from_name(name: &str) -> Option<MechanismType> {
    DIGEST_MAP
        .iter()
        .find(|entry| {
            entry.name.eq_ignore_ascii_case(name)
                || entry
                    .aliases
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(name))
        })
        .map(|entry| entry.digest)
}

/// Returns the KDF built on `digest`.
pub fn digest_to_kdf(digest: MechanismType) -> Option<EcKdf> {
    entry_by_digest(digest).map(|entry| entry.kdf)
}

/// Returns the canonical name of `digest`.
pub fn digest_name(digest: MechanismType) -> Option<&'static str> {
    entry_by_digest(digest).map(|entry| entry.name)
}

/// Returns the output size of `digest` in bytes.
pub fn digest_size(digest: MechanismType) -> Option<usize> {
    entry_by_digest(digest).map(|entry| entry.digest_size)
}

#[cfg(test)]
mod tests {
    use test_with_tracing::test;

    use super::*;

    #[test]
    fn test_name_round_trip() {
        for entry in digest_entries() {
            let digest = digest_from_name(entry.name).expect("name not mapped");
            assert_eq!(digest, entry.digest);
            assert_eq!(digest_name(digest), Some(entry.name));
            assert_eq!(digest_to_kdf(digest), Some(entry.kdf));
            assert_eq!(digest_size(digest), Some(entry.digest_size));
        }
    }

    #[test]
    fn test_aliases_and_case() {
        assert_eq!(digest_from_name("sha256"), Some(MechanismType::Sha256));
        assert_eq!(digest_from_name("SHA2-384"), Some(MechanismType::Sha384));
        assert_eq!(digest_from_name("sha3-224"), Some(MechanismType::Sha3_224));
        assert_eq!(digest_from_name("Sha1"), Some(MechanismType::Sha1));
        assert_eq!(digest_name(MechanismType::Sha1), Some("SHA-1"));
    }

    #[test]
    fn test_misses() {
        assert_eq!(digest_from_name("MD5"), None);
        assert_eq!(digest_from_name(""), None);
        assert_eq!(digest_from_name("SHA-512/256"), None);
        assert_eq!(digest_to_kdf(MechanismType::Ecdh1Derive), None);
        assert_eq!(digest_name(MechanismType(0xdead)), None);
        assert_eq!(digest_size(MechanismType(0xdead)), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(digest_size(MechanismType::Sha3_512), Some(64));
        assert_eq!(digest_size(MechanismType::Sha224), Some(28));
        assert_eq!(digest_size(MechanismType::Sha1), Some(20));
    }
}
