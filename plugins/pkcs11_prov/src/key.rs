// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key objects handed to the exchange by the key store.
//!
//! The store loads a token key once and shares it: every holder keeps an
//! `Arc<P11Key>` and the cached attributes are wiped when the last
//! reference goes away.

use std::sync::Arc;

use zeroize::Zeroize;

use crate::pkcs11::AttributeType;
use crate::pkcs11::KeyType;
use crate::pkcs11::ObjectClass;
use crate::pkcs11::ObjectHandle;
use crate::pkcs11::SlotId;

/// A token key together with the attributes the store cached for it.
#[derive(Debug)]
pub struct P11Key {
    class: ObjectClass,
    key_type: KeyType,
    slot_id: Option<SlotId>,
    handle: Option<ObjectHandle>,
    size: usize,
    attrs: Vec<(AttributeType, Vec<u8>)>,
}

impl P11Key {
    /// Creates a key description.
    ///
    /// # Arguments
    ///
    /// * `class` - Object class of the key.
    /// * `key_type` - Key type of the key.
    /// * `size` - Natural size in bytes (the field size for EC keys).
    pub fn new(class: ObjectClass, key_type: KeyType, size: usize) -> Self {
        Self {
            class,
            key_type,
            slot_id: None,
            handle: None,
            size,
            attrs: Vec::new(),
        }
    }

    /// Sets the slot the key lives on.
    pub fn with_slot(mut self, slot_id: SlotId) -> Self {
        self.slot_id = Some(slot_id);
        self
    }

    /// Sets the token object handle of the key.
    pub fn with_handle(mut self, handle: ObjectHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Caches an attribute value, replacing any previous value of that type.
    pub fn with_attr(mut self, attr_type: AttributeType, value: impl Into<Vec<u8>>) -> Self {
        let value = value.into();
        match self.attrs.iter_mut().find(|(ty, _)| *ty == attr_type) {
            Some((_, old)) => {
                old.zeroize();
                *old = value;
            }
            None => self.attrs.push((attr_type, value)),
        }
        self
    }

    pub fn class(&self) -> ObjectClass {
        self.class
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Returns the cached value of `attr_type`, if the store loaded it.
    pub fn attr(&self, attr_type: AttributeType) -> Option<&[u8]> {
        self.attrs
            .iter()
            .find(|(ty, _)| *ty == attr_type)
            .map(|(_, value)| value.as_slice())
    }

    /// Natural size of the key in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn slot_id(&self) -> Option<SlotId> {
        self.slot_id
    }

    pub fn handle(&self) -> Option<ObjectHandle> {
        self.handle
    }
}

impl Drop for P11Key {
    fn drop(&mut self) {
        for (_, value) in self.attrs.iter_mut() {
            value.zeroize();
        }
    }
}

/// Provider-side object wrapping the private and/or public half of a key pair.
#[derive(Debug, Clone, Default)]
pub struct P11Object {
    private_key: Option<Arc<P11Key>>,
    public_key: Option<Arc<P11Key>>,
}

impl P11Object {
    pub fn new(private_key: Option<Arc<P11Key>>, public_key: Option<Arc<P11Key>>) -> Self {
        Self {
            private_key,
            public_key,
        }
    }

    /// Returns a new reference to the requested half of the key pair.
    pub fn get_key(&self, want_private: bool) -> Option<Arc<P11Key>> {
        if want_private {
            self.private_key.clone()
        } else {
            self.public_key.clone()
        }
    }
}
