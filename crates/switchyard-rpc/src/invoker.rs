//! Static method table and the dispatch pipeline.
//!
//! Methods are registered once at construction as boxed async closures, so
//! resolution is a map lookup rather than runtime introspection of a live
//! object. The table keeps registration order, which makes method
//! enumeration stable, and the dispatch pipeline applies the resolution
//! rules in a fixed order: string check, reserved-name check, table lookup,
//! deny-list check, parameter decode, invocation, result encode.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::convert::ConversionTables;
use crate::errors::{DispatchError, MethodFault, RegistryError};
use crate::service::DenyList;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Reserved construction-method name that may never be dispatched.
pub const RESERVED_METHOD: &str = "constructor";

/// Ordered positional parameters handed to a method.
pub type MethodParams = Vec<Value>;

/// Future returned by a registered method.
pub type MethodFuture = Pin<Box<dyn Future<Output = Result<Value, MethodFault>> + Send + 'static>>;

/// Type-erased registered method.
pub(crate) type StoredMethod = Arc<dyn Fn(MethodParams) -> MethodFuture + Send + Sync>;

/// Insertion-ordered table of registered methods.
///
/// Built once when a service is constructed and read-only afterwards.
/// Direct registration rejects empty, reserved, and duplicate names; the
/// namespace aggregator uses the crate-internal overwrite insert instead,
/// implementing the later-member-wins collision policy.
#[derive(Clone, Default)]
pub struct MethodTable {
    order: Vec<String>,
    entries: HashMap<String, StoredMethod>,
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.order)
            .finish()
    }
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a method under the given name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the name is empty, reserved, or
    /// already registered.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        method: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(MethodParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, MethodFault>> + Send + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyMethodName);
        }
        if name == RESERVED_METHOD {
            return Err(RegistryError::ReservedMethodName { name });
        }
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateMethodName { name });
        }
        self.order.push(name.clone());
        self.entries
            .insert(name, Arc::new(move |params| Box::pin(method(params))));
        Ok(())
    }

    /// Inserts a forwarding binding, silently replacing any existing entry.
    ///
    /// A replaced name keeps its original enumeration position; only the
    /// binding changes.
    pub(crate) fn insert_forwarding(&mut self, name: String, method: StoredMethod) {
        if self.entries.insert(name.clone(), method).is_none() {
            self.order.push(name);
        }
    }

    /// Returns the registered method names in registration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Returns `true` when a method is registered under the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn get(&self, name: &str) -> Option<&StoredMethod> {
        self.entries.get(name)
    }
}

/// Runs the dispatch pipeline for one named call.
///
/// All resolution failures collapse into [`DispatchError::MethodNotFound`]:
/// reserved, absent, and deny-listed methods are indistinguishable to the
/// caller. Trusted in-process calls skip both conversion steps: their
/// parameters are already domain values and their result is encoded by the
/// outermost dispatch, so values cross the tables exactly once per call
/// regardless of aggregation depth.
pub(crate) async fn dispatch_named(
    table: &MethodTable,
    deny: &DenyList,
    tables: &ConversionTables,
    name: &str,
    params: MethodParams,
    convert: bool,
) -> Result<Value, DispatchError> {
    if name == RESERVED_METHOD {
        return Err(DispatchError::method_not_found(name));
    }
    let Some(method) = table.get(name) else {
        return Err(DispatchError::method_not_found(name));
    };
    if deny.contains(name) {
        return Err(DispatchError::method_not_found(name));
    }

    let params = if convert {
        decode_all(tables, params)?
    } else {
        params
    };

    debug!(target: DISPATCH_TARGET, method = name, "invoking method");
    let result = method(params)
        .await
        .map_err(|fault| DispatchError::application(fault.message()))?;

    if convert {
        tables
            .encode_value(result)
            .map_err(|error| DispatchError::internal(format!("result encode failed: {error}")))
    } else {
        Ok(result)
    }
}

fn decode_all(
    tables: &ConversionTables,
    params: MethodParams,
) -> Result<MethodParams, DispatchError> {
    params
        .into_iter()
        .map(|param| {
            tables
                .decode_value(param)
                .map_err(|error| DispatchError::internal(format!("param decode failed: {error}")))
        })
        .collect()
}
