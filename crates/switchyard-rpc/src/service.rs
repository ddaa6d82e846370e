//! The dispatch service: one method table plus its policy.
//!
//! A [`Service`] bundles a statically registered [`MethodTable`] with the
//! deny list, conversion tables, and liveness probe that govern it. All four
//! are fixed at construction; concurrent dispatches share the service
//! immutably and the core takes no locks around handler state (stateful
//! handlers are responsible for their own internal safety).

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::convert::ConversionTables;
use crate::errors::{DispatchError, HealthFault};
use crate::invoker::{self, MethodParams, MethodTable};

/// Future returned by a liveness probe.
pub type HealthFuture = Pin<Box<dyn Future<Output = Result<bool, HealthFault>> + Send + 'static>>;

/// Type-erased liveness probe.
pub(crate) type StoredProbe = Arc<dyn Fn() -> HealthFuture + Send + Sync>;

/// Set of method names excluded from remote invocation.
///
/// Deny-listed methods are indistinguishable from absent ones at dispatch
/// time; enumeration via [`Service::method_names`] does not filter them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DenyList(BTreeSet<String>);

impl DenyList {
    /// Creates an empty deny list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a deny list from the given names.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Adds a name to the list.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.0.insert(name.into());
    }

    /// Returns `true` when the name is denied.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Iterates the denied names in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of denied names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no names are denied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One handler's dispatch surface: methods, policy, and liveness.
#[derive(Clone)]
pub struct Service {
    methods: MethodTable,
    deny: DenyList,
    tables: ConversionTables,
    probe: StoredProbe,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("methods", &self.methods)
            .field("deny", &self.deny)
            .field("tables", &self.tables)
            .finish()
    }
}

impl Service {
    /// Starts building a service.
    #[must_use]
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    /// Enumerates the registered method names in registration order.
    ///
    /// The sequence is stable across calls and includes deny-listed names;
    /// deny filtering happens only at dispatch time.
    #[must_use]
    pub fn method_names(&self) -> &[String] {
        self.methods.names()
    }

    /// Evaluates the liveness probe.
    ///
    /// A bare service propagates the probe's fault to its direct caller;
    /// fault isolation is the aggregator's responsibility.
    ///
    /// # Errors
    ///
    /// Returns the probe's [`HealthFault`] unchanged.
    pub async fn is_healthy(&self) -> Result<bool, HealthFault> {
        (self.probe)().await
    }

    /// Returns the service's conversion tables.
    #[must_use]
    pub fn tables(&self) -> &ConversionTables {
        &self.tables
    }

    /// Returns the service's deny list.
    #[must_use]
    pub fn deny_list(&self) -> &DenyList {
        &self.deny
    }

    /// Dispatches a call, decoding parameters through the conversion tables.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MethodNotFound`] for unresolvable methods,
    /// [`DispatchError::Application`] for handler faults, and
    /// [`DispatchError::Internal`] for conversion failures.
    pub async fn call(&self, method: &str, params: MethodParams) -> Result<Value, DispatchError> {
        invoker::dispatch_named(&self.methods, &self.deny, &self.tables, method, params, true)
            .await
    }

    /// Dispatches a trusted in-process call whose parameters are already
    /// decoded domain values and whose result the caller encodes. Used by
    /// the aggregator's forwarding bindings so values cross the conversion
    /// tables exactly once, at the outer edge.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Service::call`].
    pub async fn call_trusted(
        &self,
        method: &str,
        params: MethodParams,
    ) -> Result<Value, DispatchError> {
        invoker::dispatch_named(&self.methods, &self.deny, &self.tables, method, params, false)
            .await
    }
}

/// Builder assembling a [`Service`] from its four fixed parts.
///
/// Omitted parts default to an empty deny list, empty conversion tables,
/// and an always-healthy probe.
pub struct ServiceBuilder {
    methods: MethodTable,
    deny: DenyList,
    tables: ConversionTables,
    probe: StoredProbe,
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceBuilder {
    /// Creates a builder with empty defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: MethodTable::new(),
            deny: DenyList::new(),
            tables: ConversionTables::new(),
            probe: always_healthy(),
        }
    }

    /// Sets the method table.
    #[must_use]
    pub fn methods(mut self, methods: MethodTable) -> Self {
        self.methods = methods;
        self
    }

    /// Sets the deny list.
    #[must_use]
    pub fn deny_list(mut self, deny: DenyList) -> Self {
        self.deny = deny;
        self
    }

    /// Sets the conversion tables.
    #[must_use]
    pub fn tables(mut self, tables: ConversionTables) -> Self {
        self.tables = tables;
        self
    }

    /// Sets the liveness probe.
    #[must_use]
    pub fn probe<F, Fut>(mut self, probe: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HealthFault>> + Send + 'static,
    {
        self.probe = Arc::new(move || Box::pin(probe()));
        self
    }

    /// Finalises the service.
    #[must_use]
    pub fn build(self) -> Service {
        Service {
            methods: self.methods,
            deny: self.deny,
            tables: self.tables,
            probe: self.probe,
        }
    }
}

pub(crate) fn always_healthy() -> StoredProbe {
    Arc::new(|| Box::pin(async { Ok(true) }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::MethodFault;

    fn adder_service(deny: DenyList) -> Service {
        let mut methods = MethodTable::new();
        methods
            .register("add", |params: MethodParams| async move {
                let a = params.first().and_then(Value::as_i64).unwrap_or(0);
                let b = params.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            })
            .expect("register add");
        methods
            .register("fail", |_| async { Err(MethodFault::new("duplicate entry")) })
            .expect("register fail");
        Service::builder().methods(methods).deny_list(deny).build()
    }

    #[tokio::test]
    async fn call_dispatches_registered_method() {
        let service = adder_service(DenyList::new());
        let result = service
            .call("add", vec![json!(2), json!(3)])
            .await
            .expect("add");
        assert_eq!(result, json!(5));
    }

    #[tokio::test]
    async fn denied_method_matches_absent_method() {
        let service = adder_service(DenyList::from_names(["add"]));

        let denied = service
            .call("add", vec![json!(2), json!(3)])
            .await
            .expect_err("denied");
        let absent = service
            .call("subtract", Vec::new())
            .await
            .expect_err("absent");

        assert_eq!(denied.code(), absent.code());
        assert_eq!(denied.wire_error().message, absent.wire_error().message);
    }

    #[tokio::test]
    async fn enumeration_is_stable_and_unfiltered() {
        let service = adder_service(DenyList::from_names(["fail"]));
        let first: Vec<String> = service.method_names().to_vec();
        let second: Vec<String> = service.method_names().to_vec();
        assert_eq!(first, second);
        assert_eq!(first, ["add", "fail"]);
    }

    #[tokio::test]
    async fn default_probe_reports_healthy() {
        let service = adder_service(DenyList::new());
        assert!(service.is_healthy().await.expect("probe"));
    }

    #[tokio::test]
    async fn probe_fault_propagates_from_bare_service() {
        let service = Service::builder()
            .probe(|| async { Err(HealthFault::new("backend gone")) })
            .build();
        let fault = service.is_healthy().await.expect_err("fault");
        assert_eq!(fault.message(), "backend gone");
    }
}
