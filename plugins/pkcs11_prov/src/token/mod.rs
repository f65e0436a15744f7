// Copyright (C) Microsoft Corporation. All rights reserved.

//! Interface to the PKCS#11 module and the scoped session built on it.

#[cfg(test)]
pub(crate) mod mock;

use crate::pkcs11::*;
use crate::ProvResult;

/// The subset of the PKCS#11 function list the exchange calls.
///
/// Implementations wrap a loaded module; every call blocks until the token
/// answers.
pub trait Pkcs11Token: Send + Sync {
    /// `C_OpenSession` without notification callback.
    fn open_session(&self, slot_id: SlotId, flags: SessionFlags) -> Result<SessionHandle, CkRv>;

    /// `C_CloseSession`.
    fn close_session(&self, session: SessionHandle) -> Result<(), CkRv>;

    /// `C_DeriveKey`; returns the handle of the new object.
    fn derive_key(
        &self,
        session: SessionHandle,
        mechanism: &Mechanism<'_>,
        base_key: ObjectHandle,
        template: &[Attribute],
    ) -> Result<ObjectHandle, CkRv>;

    /// `C_GetAttributeValue`.
    ///
    /// The token updates `value_len` of every entry, and copies values into
    /// entries that carry a buffer, even when it reports an error for some
    /// other entry.
    fn get_attribute_value(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        template: &mut [AttributeQuery<'_>],
    ) -> Result<(), CkRv>;
}

/// An open session that is closed when dropped.
pub struct Session<'a> {
    token: &'a dyn Pkcs11Token,
    handle: SessionHandle,
    slot_id: SlotId,
}

impl<'a> Session<'a> {
    /// Opens a serial read-only session on `slot_id`.
    pub fn open(token: &'a dyn Pkcs11Token, slot_id: SlotId) -> ProvResult<Self> {
        let handle = token
            .open_session(slot_id, SessionFlags::SERIAL_SESSION)
            .inspect_err(|rv| tracing::error!(slot_id, ?rv, "C_OpenSession failed"))?;
        tracing::debug!(slot_id, handle, "Opened session");
        Ok(Self {
            token,
            handle,
            slot_id,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    /// Derives a new object from `base_key` in this session.
    pub fn derive_key(
        &self,
        mechanism: &Mechanism<'_>,
        base_key: ObjectHandle,
        template: &[Attribute],
    ) -> ProvResult<ObjectHandle> {
        let handle = self
            .token
            .derive_key(self.handle, mechanism, base_key, template)
            .inspect_err(|rv| {
                tracing::error!(
                    mechanism = ?mechanism.mechanism,
                    kdf = ?mechanism.params.kdf,
                    ?rv,
                    "C_DeriveKey failed"
                )
            })?;
        Ok(handle)
    }

    /// Issues one `C_GetAttributeValue` call. The raw return code is kept so
    /// callers can tell capability errors apart from hard failures.
    pub fn get_attribute_value(
        &self,
        object: ObjectHandle,
        template: &mut [AttributeQuery<'_>],
    ) -> Result<(), CkRv> {
        self.token.get_attribute_value(self.handle, object, template)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        match self.token.close_session(self.handle) {
            Ok(()) => tracing::debug!(handle = self.handle, "Closed session"),
            Err(rv) => tracing::warn!(handle = self.handle, ?rv, "C_CloseSession failed"),
        }
    }
}
