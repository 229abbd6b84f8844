//! Key/value store shared by the server and every request.
//!
//! # Responsibilities
//! - Hold server-wide defaults set during configuration
//! - Seed a per-request copy at the start of every request
//! - Let middleware, permission predicates and handlers enrich their own copy
//!
//! # Design Decisions
//! - The map lives behind an `Arc`; cloning is cheap and mutation copies the
//!   map first (`Arc::make_mut`), so concurrent requests never share writes
//! - Values are opaque `Any` objects, looked up with their concrete type
//! - Keys are kept ordered so diagnostics list them deterministically

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Request as HttpRequest;

type Value = Arc<dyn Any + Send + Sync>;

/// Ordered string → value mapping with copy-on-write clones.
#[derive(Clone, Default)]
pub struct Values {
    map: Arc<BTreeMap<String, Value>>,
}

impl Values {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to `key`, replacing any previous value.
    ///
    /// Only this copy of the store is affected.
    pub fn set<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        Arc::make_mut(&mut self.map).insert(key.into(), Arc::new(value));
    }

    /// Look up `key`. Returns `None` when the key is absent or holds a value
    /// of another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.map.get(key)?.downcast_ref::<T>()
    }

    /// Whether a value is stored under `key`, whatever its type.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Stored keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

/// Access to the request-scoped store carried in a transport request's
/// extensions. Used by middleware and raw handlers.
pub trait ValuesExt {
    /// The request's store, if one was seeded.
    fn values(&self) -> Option<&Values>;

    /// The request's store, inserting an empty one when missing.
    fn values_mut(&mut self) -> &mut Values;
}

impl<B> ValuesExt for HttpRequest<B> {
    fn values(&self) -> Option<&Values> {
        self.extensions().get::<Values>()
    }

    fn values_mut(&mut self) -> &mut Values {
        self.extensions_mut().get_or_insert_default::<Values>()
    }
}
