// Copyright (C) Microsoft Corporation. All rights reserved.

//! Reading attribute values out of token objects.
//!
//! All requested attributes are first read with a single batched
//! `C_GetAttributeValue`. Attributes without a caller buffer only have their
//! length reported by that call; buffers are then allocated and filled with
//! a second batched call. Tokens that refuse the batched call because one of
//! the attributes is sensitive or unknown to them are queried one attribute
//! at a time instead.
//!
//! Allocated buffers carry one extra zero byte, so attributes holding text
//! can be read as NUL-terminated strings.

use zeroize::Zeroizing;

use crate::mem::try_alloc_zeroed;
use crate::pkcs11::AttributeQuery;
use crate::pkcs11::AttributeType;
use crate::pkcs11::CkRv;
use crate::pkcs11::ObjectHandle;
use crate::token::Session;
use crate::ProvError;
use crate::ProvResult;

/// Where a fetched value goes.
#[derive(Debug)]
enum FetchTarget<'a> {
    /// Allocated by the fetcher once the length is known.
    Allocate(Option<Zeroizing<Vec<u8>>>),
    /// Caller-provided buffer.
    Buffer(&'a mut [u8]),
}

/// One attribute to read from an object.
#[derive(Debug)]
pub struct FetchAttr<'a> {
    attr_type: AttributeType,
    target: FetchTarget<'a>,
    required: bool,
    len: usize,
}

impl<'a> FetchAttr<'a> {
    /// Requests `attr_type` into a buffer sized by the token.
    pub fn allocate(attr_type: AttributeType, required: bool) -> Self {
        Self {
            attr_type,
            target: FetchTarget::Allocate(None),
            required,
            len: 0,
        }
    }

    /// Requests `attr_type` into `buf`.
    pub fn buffer(attr_type: AttributeType, buf: &'a mut [u8], required: bool) -> Self {
        Self {
            attr_type,
            target: FetchTarget::Buffer(buf),
            required,
            len: 0,
        }
    }

    pub fn attr_type(&self) -> AttributeType {
        self.attr_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Length of the value; 0 when the attribute was not available.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The fetched value, without the trailing zero of allocated buffers.
    pub fn value(&self) -> Option<&[u8]> {
        match &self.target {
            FetchTarget::Allocate(buf) => buf.as_ref().map(|buf| &buf[..self.len]),
            FetchTarget::Buffer(buf) => Some(&buf[..self.len.min(buf.len())]),
        }
    }

    /// The whole allocated buffer, trailing zero included.
    pub fn allocated(&self) -> Option<&[u8]> {
        match &self.target {
            FetchTarget::Allocate(buf) => buf.as_ref().map(|buf| buf.as_slice()),
            FetchTarget::Buffer(_) => None,
        }
    }

    /// Takes ownership of the allocated buffer, trailing zero included.
    pub fn into_allocated(self) -> Option<Zeroizing<Vec<u8>>> {
        match self.target {
            FetchTarget::Allocate(buf) => buf,
            FetchTarget::Buffer(_) => None,
        }
    }

    fn is_allocate(&self) -> bool {
        matches!(self.target, FetchTarget::Allocate(_))
    }

    /// Query used by the first batched call: lengths for allocate entries,
    /// the full caller buffer otherwise.
    fn first_query(&mut self) -> AttributeQuery<'_> {
        match &mut self.target {
            FetchTarget::Allocate(_) => AttributeQuery::probe(self.attr_type),
            FetchTarget::Buffer(buf) => AttributeQuery::with_buffer(self.attr_type, buf),
        }
    }

    /// Query that fills the value: `len` bytes of the allocated buffer, or the
    /// caller buffer.
    fn fill_query(&mut self) -> AttributeQuery<'_> {
        let attr_type = self.attr_type;
        let len = self.len;
        match &mut self.target {
            FetchTarget::Allocate(Some(buf)) => {
                AttributeQuery::with_buffer(attr_type, &mut buf[..len])
            }
            FetchTarget::Allocate(None) => AttributeQuery::probe(attr_type),
            FetchTarget::Buffer(buf) => AttributeQuery::with_buffer(attr_type, buf),
        }
    }

    /// Allocates `len + 1` zero bytes for an allocate entry.
    fn allocate_for(&mut self, len: usize) -> ProvResult<()> {
        let size = len.checked_add(1).ok_or(ProvError::AllocationFailed)?;
        if let FetchTarget::Allocate(slot) = &mut self.target {
            *slot = Some(try_alloc_zeroed(size)?);
        }
        self.len = len;
        Ok(())
    }

    fn mark_unavailable(&mut self) {
        if let FetchTarget::Allocate(slot) = &mut self.target {
            *slot = None;
        }
        self.len = 0;
    }
}

/// Reads `attrs` from `object`.
///
/// # Errors
///
/// * [`ProvError::AttributeNotFound`] - A required attribute is not
///   available on the object.
/// * [`ProvError::AllocationFailed`] - A value buffer could not be allocated.
/// * [`ProvError::Token`] - Any other token failure, with the token's code.
pub fn fetch_attributes(
    session: &Session<'_>,
    object: ObjectHandle,
    attrs: &mut [FetchAttr<'_>],
) -> ProvResult<()> {
    let (result, lens) = {
        let mut queries: Vec<AttributeQuery<'_>> =
            attrs.iter_mut().map(FetchAttr::first_query).collect();
        let result = session.get_attribute_value(object, &mut queries);
        let lens: Vec<Option<usize>> = queries.iter().map(|q| q.value_len).collect();
        (result, lens)
    };

    match result {
        Ok(()) => fetch_batched(session, object, attrs, &lens),
        Err(rv) if rv == CkRv::AttributeSensitive || rv == CkRv::AttributeTypeInvalid => {
            tracing::debug!(?rv, object, "Querying attributes one by one");
            for attr in attrs.iter_mut() {
                fetch_single(session, object, attr)?;
            }
            Ok(())
        }
        Err(rv) => {
            tracing::error!(?rv, object, "C_GetAttributeValue failed");
            Err(ProvError::Token(rv))
        }
    }
}

/// Completes a successful batched call: records lengths, allocates buffers
/// and fills them with one more batched call.
fn fetch_batched(
    session: &Session<'_>,
    object: ObjectHandle,
    attrs: &mut [FetchAttr<'_>],
    lens: &[Option<usize>],
) -> ProvResult<()> {
    let mut refill = Vec::with_capacity(attrs.len());
    for (index, (attr, len)) in attrs.iter_mut().zip(lens).enumerate() {
        let Some(len) = *len else {
            if attr.required {
                tracing::error!(attr_type = ?attr.attr_type, "Required attribute unavailable");
                return Err(ProvError::AttributeNotFound(attr.attr_type));
            }
            attr.mark_unavailable();
            continue;
        };
        if attr.is_allocate() {
            attr.allocate_for(len)?;
            refill.push(index);
        } else {
            attr.len = len;
        }
    }

    if refill.is_empty() {
        return Ok(());
    }

    let mut queries: Vec<AttributeQuery<'_>> = attrs
        .iter_mut()
        .enumerate()
        .filter(|(index, _)| refill.contains(index))
        .map(|(_, attr)| attr.fill_query())
        .collect();
    session
        .get_attribute_value(object, &mut queries)
        .inspect_err(|rv| tracing::error!(?rv, object, "Failed to fill attribute values"))?;
    Ok(())
}

/// Reads one attribute on its own. Failures are recorded as an empty value
/// unless the attribute is required.
fn fetch_single(
    session: &Session<'_>,
    object: ObjectHandle,
    attr: &mut FetchAttr<'_>,
) -> ProvResult<()> {
    if attr.is_allocate() {
        let mut probe = [AttributeQuery::probe(attr.attr_type)];
        let result = session.get_attribute_value(object, &mut probe);
        match (result, probe[0].value_len) {
            (Ok(()), Some(len)) => attr.allocate_for(len)?,
            (result, _) => return single_failure(attr, result.err()),
        }
    }

    let (result, reported) = {
        let mut query = [attr.fill_query()];
        let result = session.get_attribute_value(object, &mut query);
        (result, query[0].value_len)
    };
    match (result, reported) {
        (Ok(()), Some(len)) => {
            if !attr.is_allocate() {
                attr.len = len;
            }
            tracing::debug!(attr_type = ?attr.attr_type, len = attr.len, "Fetched attribute");
            Ok(())
        }
        (result, _) => single_failure(attr, result.err()),
    }
}

/// Handles an attribute the token could not return. `rv` is `None` when the
/// call succeeded but the length came back unavailable.
fn single_failure(attr: &mut FetchAttr<'_>, rv: Option<CkRv>) -> ProvResult<()> {
    attr.mark_unavailable();
    if !attr.required {
        tracing::debug!(attr_type = ?attr.attr_type, ?rv, "Optional attribute unavailable");
        return Ok(());
    }
    tracing::error!(attr_type = ?attr.attr_type, ?rv, "Required attribute unavailable");
    match rv {
        Some(rv) => Err(ProvError::Token(rv)),
        None => Err(ProvError::AttributeNotFound(attr.attr_type)),
    }
}
