// Copyright (C) Microsoft Corporation. All rights reserved.

//! Key exchange operations offered to the framework.
//!
//! Each algorithm implements [`KeyExchange`] and is listed in a static
//! registry the provider consults when the framework queries the
//! key-exchange operation or fetches an algorithm by name.

mod ecdh;
mod params;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub use ecdh::*;
use lazy_static::lazy_static;
pub use params::*;

use crate::key::P11Object;
use crate::provider::ProviderCtx;
use crate::ProvResult;

/// A key exchange context as driven by the framework.
///
/// The framework never calls into one context from two threads at once.
/// Dropping the context is the `freectx` step.
pub trait KeyExchange: Send {
    /// Creates an independent copy of this context.
    fn dup(&self) -> ProvResult<Box<dyn KeyExchange>>;

    /// Sets the local (private) key, then applies `params`.
    fn init(&mut self, key: &P11Object, params: &[Param<'_>]) -> ProvResult<()>;

    /// Sets the peer (public) key.
    fn set_peer(&mut self, peer: &P11Object) -> ProvResult<()>;

    /// Derives the shared secret into `secret` and returns its length.
    /// Without a buffer, returns the length a derive would need.
    fn derive(&mut self, secret: Option<&mut [u8]>) -> ProvResult<usize>;

    /// Applies parameters; unknown names are ignored.
    fn set_ctx_params(&mut self, params: &[Param<'_>]) -> ProvResult<()>;

    /// Parameters accepted by [`KeyExchange::set_ctx_params`].
    fn settable_ctx_params(&self) -> &'static [ParamDescriptor];

    /// Reports the current value of each known parameter in `keys`.
    fn get_ctx_params(&self, keys: &[&str]) -> ProvResult<Vec<Param<'_>>>;

    /// Parameters reported by [`KeyExchange::get_ctx_params`].
    fn gettable_ctx_params(&self) -> &'static [ParamDescriptor];
}

/// Constructor of a fresh exchange context.
pub type NewExchangeFn = fn(Arc<ProviderCtx>) -> ProvResult<Box<dyn KeyExchange>>;

/// A key exchange algorithm as advertised to the framework.
#[derive(Clone, Copy)]
pub struct AlgorithmDescriptor {
    /// Colon separated algorithm names.
    pub names: &'static str,
    /// Property definition string.
    pub properties: &'static str,
    pub description: &'static str,
    new_ctx: NewExchangeFn,
}

impl AlgorithmDescriptor {
    pub(crate) const fn new(
        names: &'static str,
        properties: &'static str,
        description: &'static str,
        new_ctx: NewExchangeFn,
    ) -> Self {
        Self {
            names,
            properties,
            description,
            new_ctx,
        }
    }

    /// Creates a new context of this algorithm.
    pub fn new_ctx(&self, provctx: Arc<ProviderCtx>) -> ProvResult<Box<dyn KeyExchange>> {
        (self.new_ctx)(provctx)
    }

    /// Iterates over the individual algorithm names.
    pub fn name_list(&self) -> impl Iterator<Item = &'static str> {
        self.names.split(':')
    }
}

impl fmt::Debug for AlgorithmDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmDescriptor")
            .field("names", &self.names)
            .field("properties", &self.properties)
            .field("description", &self.description)
            .finish()
    }
}

struct ExchangeRegistry {
    algorithms: Vec<AlgorithmDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ExchangeRegistry {
    fn new() -> Self {
        let mut registry = Self {
            algorithms: Vec::new(),
            by_name: HashMap::new(),
        };
        registry.register(ECDH_ALGORITHM);
        registry
    }

    fn register(&mut self, algorithm: AlgorithmDescriptor) {
        let index = self.algorithms.len();
        for name in algorithm.name_list() {
            self.by_name.insert(name.to_ascii_uppercase(), index);
        }
        self.algorithms.push(algorithm);
    }
}

lazy_static! {
    static ref EXCHANGE_REGISTRY: ExchangeRegistry = ExchangeRegistry::new();
}

/// All key exchange algorithms of the provider.
pub fn exchange_algorithms() -> &'static [AlgorithmDescriptor] {
    &EXCHANGE_REGISTRY.algorithms
}

/// Finds a key exchange algorithm by any of its names, ignoring ASCII case.
pub fn find_exchange(name: &str) -> Option<&'static AlgorithmDescriptor> {
    let registry: &'static ExchangeRegistry = &EXCHANGE_REGISTRY;
    registry
        .by_name
        .get(&name.to_ascii_uppercase())
        .map(|index| &registry.algorithms[*index])
}
