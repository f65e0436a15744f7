// Copyright (C) Microsoft Corporation. All rights reserved.

//! Scripted in-memory token for unit tests.
//!
//! Derived "secrets" are a deterministic function of the mechanism and the
//! peer point; tests only care that they are reproducible and sized as the
//! template asked.

use std::collections::HashMap;
use std::collections::HashSet;

use parking_lot::Mutex;

use super::Pkcs11Token;
use crate::pkcs11::*;

/// Attribute as stored on a mock object.
#[derive(Debug, Clone)]
pub(crate) enum MockAttr {
    Value(Vec<u8>),
    Sensitive,
}

/// Record of one `C_DeriveKey` call.
#[derive(Debug, Clone)]
pub(crate) struct DeriveCall {
    pub session: SessionHandle,
    pub base_key: ObjectHandle,
    pub mechanism: MechanismType,
    pub kdf: EcKdf,
    pub shared_data: Vec<u8>,
    pub public_data: Vec<u8>,
    pub template: Vec<Attribute>,
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    objects: HashMap<ObjectHandle, HashMap<AttributeType, MockAttr>>,
    open_sessions: HashSet<SessionHandle>,
    sessions_opened: usize,
    derive_calls: Vec<DeriveCall>,
    attribute_calls: Vec<Vec<(AttributeType, Option<usize>)>>,
    reported_lengths: HashMap<AttributeType, usize>,
    reject_batched: bool,
    lenient: bool,
    open_error: Option<CkRv>,
    derive_error: Option<CkRv>,
    attribute_error: Option<CkRv>,
}

impl MockState {
    fn alloc_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

pub(crate) struct MockToken {
    state: Mutex<MockState>,
}

impl MockToken {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 100,
                ..Default::default()
            }),
        }
    }

    /// Creates an object holding `attrs` and returns its handle.
    pub fn add_object(&self, attrs: Vec<(AttributeType, MockAttr)>) -> ObjectHandle {
        let mut state = self.state.lock();
        let handle = state.alloc_handle();
        state.objects.insert(handle, attrs.into_iter().collect());
        handle
    }

    /// Fails any multi-entry `C_GetAttributeValue` with `CKR_ATTRIBUTE_TYPE_INVALID`.
    pub fn reject_batched_queries(&self) {
        self.state.lock().reject_batched = true;
    }

    /// Reports `CKR_OK` even when some entries are unavailable.
    pub fn report_ok_for_unavailable(&self) {
        self.state.lock().lenient = true;
    }

    /// Reports `len` for every length-only query of `attr_type`.
    pub fn report_length(&self, attr_type: AttributeType, len: usize) {
        self.state.lock().reported_lengths.insert(attr_type, len);
    }

    pub fn fail_open_session(&self, rv: CkRv) {
        self.state.lock().open_error = Some(rv);
    }

    pub fn fail_derive(&self, rv: CkRv) {
        self.state.lock().derive_error = Some(rv);
    }

    pub fn fail_attribute_queries(&self, rv: CkRv) {
        self.state.lock().attribute_error = Some(rv);
    }

    pub fn open_session_count(&self) -> usize {
        self.state.lock().open_sessions.len()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.lock().sessions_opened
    }

    pub fn derive_calls(&self) -> Vec<DeriveCall> {
        self.state.lock().derive_calls.clone()
    }

    /// Every `C_GetAttributeValue` template seen, as (type, buffer length).
    pub fn attribute_calls(&self) -> Vec<Vec<(AttributeType, Option<usize>)>> {
        self.state.lock().attribute_calls.clone()
    }

    /// The bytes a derive with these inputs produces.
    pub fn expected_secret(
        mechanism: MechanismType,
        kdf: EcKdf,
        public_data: &[u8],
        len: usize,
    ) -> Vec<u8> {
        let salt = (mechanism.0 as u8) ^ (kdf.0 as u8);
        (0..len)
            .map(|i| {
                let point = public_data.get(i % public_data.len().max(1)).copied();
                point.unwrap_or(0).wrapping_add(i as u8) ^ salt
            })
            .collect()
    }
}

impl Pkcs11Token for MockToken {
    fn open_session(&self, slot_id: SlotId, _flags: SessionFlags) -> Result<SessionHandle, CkRv> {
        let mut state = self.state.lock();
        if let Some(rv) = state.open_error {
            return Err(rv);
        }
        let handle = state.alloc_handle() + slot_id * 0x1_0000;
        state.open_sessions.insert(handle);
        state.sessions_opened += 1;
        Ok(handle)
    }

    fn close_session(&self, session: SessionHandle) -> Result<(), CkRv> {
        let mut state = self.state.lock();
        if state.open_sessions.remove(&session) {
            Ok(())
        } else {
            Err(CkRv::SessionHandleInvalid)
        }
    }

    fn derive_key(
        &self,
        session: SessionHandle,
        mechanism: &Mechanism<'_>,
        base_key: ObjectHandle,
        template: &[Attribute],
    ) -> Result<ObjectHandle, CkRv> {
        let mut state = self.state.lock();
        if !state.open_sessions.contains(&session) {
            return Err(CkRv::SessionHandleInvalid);
        }
        state.derive_calls.push(DeriveCall {
            session,
            base_key,
            mechanism: mechanism.mechanism,
            kdf: mechanism.params.kdf,
            shared_data: mechanism.params.shared_data.to_vec(),
            public_data: mechanism.params.public_data.to_vec(),
            template: template.to_vec(),
        });
        if let Some(rv) = state.derive_error {
            return Err(rv);
        }
        if !state.objects.contains_key(&base_key) {
            return Err(CkRv::KeyHandleInvalid);
        }
        let len = template
            .iter()
            .find_map(|attr| match (attr.attr_type, &attr.value) {
                (AttributeType::ValueLen, AttributeValue::Ulong(len)) => Some(*len as usize),
                _ => None,
            })
            .ok_or(CkRv::TemplateIncomplete)?;

        let secret = Self::expected_secret(
            mechanism.mechanism,
            mechanism.params.kdf,
            mechanism.params.public_data,
            len,
        );
        let handle = state.alloc_handle();
        let mut attrs = HashMap::new();
        attrs.insert(AttributeType::Value, MockAttr::Value(secret));
        attrs.insert(
            AttributeType::ValueLen,
            MockAttr::Value((len as u64).to_ne_bytes().to_vec()),
        );
        state.objects.insert(handle, attrs);
        Ok(handle)
    }

    fn get_attribute_value(
        &self,
        session: SessionHandle,
        object: ObjectHandle,
        template: &mut [AttributeQuery<'_>],
    ) -> Result<(), CkRv> {
        let mut state = self.state.lock();
        if !state.open_sessions.contains(&session) {
            return Err(CkRv::SessionHandleInvalid);
        }
        state.attribute_calls.push(
            template
                .iter()
                .map(|q| (q.attr_type, q.value.as_ref().map(|v| v.len())))
                .collect(),
        );
        if let Some(rv) = state.attribute_error {
            return Err(rv);
        }
        if state.reject_batched && template.len() > 1 {
            return Err(CkRv::AttributeTypeInvalid);
        }
        let attrs = state.objects.get(&object).ok_or(CkRv::ObjectHandleInvalid)?;

        let mut result = Ok(());
        for query in template.iter_mut() {
            if query.value.is_none() {
                if let Some(len) = state.reported_lengths.get(&query.attr_type) {
                    query.value_len = Some(*len);
                    continue;
                }
            }
            let rv = match attrs.get(&query.attr_type) {
                None => {
                    query.value_len = None;
                    CkRv::AttributeTypeInvalid
                }
                Some(MockAttr::Sensitive) => {
                    query.value_len = None;
                    CkRv::AttributeSensitive
                }
                Some(MockAttr::Value(value)) => match query.value.as_deref_mut() {
                    None => {
                        query.value_len = Some(value.len());
                        CkRv::Ok
                    }
                    Some(buf) if buf.len() >= value.len() => {
                        buf[..value.len()].copy_from_slice(value);
                        query.value_len = Some(value.len());
                        CkRv::Ok
                    }
                    Some(_) => {
                        query.value_len = None;
                        CkRv::BufferTooSmall
                    }
                },
            };
            if rv != CkRv::Ok && result.is_ok() {
                result = Err(rv);
            }
        }

        match result {
            Err(CkRv::AttributeTypeInvalid) | Err(CkRv::AttributeSensitive) if state.lenient => {
                Ok(())
            }
            other => other,
        }
    }
}
