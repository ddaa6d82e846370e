//! Namespace aggregation: merging services into one dispatch surface.
//!
//! Composition is a renaming and forwarding transform, not a
//! re-implementation: for every member method a forwarding binding named
//! `<namespace>_<method>` is built once, calling the member through its
//! trusted entry point so parameters are decoded and results are encoded
//! exactly once, at the outer edge. Deny lists union under the same renaming, conversion tables merge
//! right-biased in member order, and aggregate liveness is the concurrent,
//! fault-isolated AND of the members' probes.

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::convert::ConversionTables;
use crate::errors::{MethodFault, RegistryError};
use crate::invoker::{DISPATCH_TARGET, MethodTable, StoredMethod};
use crate::service::{DenyList, Service};

/// Composes namespaced member services into one synthetic service.
///
/// Member order is significant twice: conversion tables merge right-biased
/// (later members win key collisions), and identical composed method names
/// resolve to the later member's binding. The composed service satisfies the
/// full [`Service`] contract and can itself be a member of a further
/// composition.
///
/// # Errors
///
/// Returns [`RegistryError::EmptyNamespace`] when a member's namespace is
/// empty.
pub fn compose<N>(members: Vec<(N, Service)>) -> Result<Service, RegistryError>
where
    N: Into<String>,
{
    let members: Vec<(String, Arc<Service>)> = members
        .into_iter()
        .map(|(namespace, service)| (namespace.into(), Arc::new(service)))
        .collect();
    if members.iter().any(|(namespace, _)| namespace.is_empty()) {
        return Err(RegistryError::EmptyNamespace);
    }

    let mut methods = MethodTable::new();
    let mut deny = DenyList::new();
    for (namespace, service) in &members {
        for name in service.method_names() {
            let composed = format!("{namespace}_{name}");
            methods.insert_forwarding(composed, forwarding_binding(service, name));
        }
        for denied in service.deny_list().iter() {
            deny.insert(format!("{namespace}_{denied}"));
        }
        debug!(
            target: DISPATCH_TARGET,
            namespace = namespace.as_str(),
            methods = service.method_names().len(),
            "composed member service"
        );
    }

    let tables = ConversionTables::merged(members.iter().map(|(_, service)| service.tables()));

    let probe_members: Vec<Arc<Service>> = members
        .iter()
        .map(|(_, service)| Arc::clone(service))
        .collect();

    Ok(Service::builder()
        .methods(methods)
        .deny_list(deny)
        .tables(tables)
        .probe(move || {
            let members = probe_members.clone();
            async move { Ok(aggregate_health(&members).await) }
        })
        .build())
}

/// Builds the forwarding binding for one member method.
///
/// The binding invokes the member through its trusted entry point and
/// converts any dispatch failure into a handler fault, preserving
/// application messages verbatim across the hop.
fn forwarding_binding(service: &Arc<Service>, name: &str) -> StoredMethod {
    let service = Arc::clone(service);
    let local = name.to_owned();
    Arc::new(move |params| {
        let service = Arc::clone(&service);
        let local = local.clone();
        Box::pin(async move {
            service
                .call_trusted(&local, params)
                .await
                .map_err(MethodFault::from)
        })
    })
}

/// Evaluates every member's probe concurrently and waits for all of them to
/// settle. A member that reports `false` or faults makes the aggregate
/// unhealthy without starving its siblings.
async fn aggregate_health(members: &[Arc<Service>]) -> bool {
    let settled = join_all(members.iter().map(|member| member.is_healthy())).await;
    settled
        .into_iter()
        .all(|outcome| matches!(outcome, Ok(true)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::errors::HealthFault;
    use crate::invoker::MethodParams;

    fn math_service() -> Service {
        let mut methods = MethodTable::new();
        methods
            .register("add", |params: MethodParams| async move {
                let a = params.first().and_then(Value::as_i64).unwrap_or(0);
                let b = params.get(1).and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            })
            .expect("register add");
        Service::builder().methods(methods).build()
    }

    #[tokio::test]
    async fn namespaced_dispatch_matches_direct_dispatch() {
        let direct = math_service()
            .call("add", vec![json!(2), json!(3)])
            .await
            .expect("direct");

        let aggregate = compose(vec![("math", math_service())]).expect("compose");
        let via_namespace = aggregate
            .call("math_add", vec![json!(2), json!(3)])
            .await
            .expect("namespaced");

        assert_eq!(direct, via_namespace);
        assert_eq!(via_namespace, json!(5));
    }

    #[tokio::test]
    async fn member_deny_list_is_namespaced() {
        let mut methods = MethodTable::new();
        methods
            .register("wipe", |_| async { Ok(Value::Null) })
            .expect("register wipe");
        let member = Service::builder()
            .methods(methods)
            .deny_list(DenyList::from_names(["wipe"]))
            .build();

        let aggregate = compose(vec![("admin", member)]).expect("compose");
        assert!(aggregate.deny_list().contains("admin_wipe"));

        let err = aggregate
            .call("admin_wipe", Vec::new())
            .await
            .expect_err("denied");
        assert_eq!(err.code(), switchyard_wire::codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn later_member_wins_method_name_collision() {
        let mut first = MethodTable::new();
        first
            .register("b_probe", |_| async { Ok(json!("first")) })
            .expect("register");
        let mut second = MethodTable::new();
        second
            .register("probe", |_| async { Ok(json!("second")) })
            .expect("register");

        // "a" + "b_probe" and "a_b" + "probe" both compose to "a_b_probe".
        let aggregate = compose(vec![
            ("a", Service::builder().methods(first).build()),
            ("a_b", Service::builder().methods(second).build()),
        ])
        .expect("compose");

        let result = aggregate
            .call("a_b_probe", Vec::new())
            .await
            .expect("dispatch");
        assert_eq!(result, json!("second"));
        assert_eq!(aggregate.method_names(), ["a_b_probe"]);
    }

    #[tokio::test]
    async fn empty_namespace_is_rejected() {
        let err = compose(vec![("", math_service())]).expect_err("empty namespace");
        assert_eq!(err, RegistryError::EmptyNamespace);
    }

    #[tokio::test]
    async fn aggregate_is_healthy_only_when_all_members_are() {
        let healthy = math_service();
        let unhealthy = Service::builder().probe(|| async { Ok(false) }).build();

        let aggregate =
            compose(vec![("a", healthy), ("b", unhealthy)]).expect("compose");
        assert!(!aggregate.is_healthy().await.expect("aggregate probe"));
    }

    #[tokio::test]
    async fn faulting_member_is_unhealthy_without_starving_siblings() {
        let slow_but_healthy = Service::builder()
            .probe(|| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(true)
            })
            .build();
        let faulting = Service::builder()
            .probe(|| async { Err(HealthFault::new("probe exploded")) })
            .build();

        let aggregate =
            compose(vec![("slow", slow_but_healthy), ("bad", faulting)]).expect("compose");

        // The aggregate settles (the slow sibling completes) and downgrades
        // the fault to an unhealthy verdict instead of propagating it.
        assert!(!aggregate.is_healthy().await.expect("no fault escapes"));
    }

    #[tokio::test]
    async fn aggregates_can_be_re_aggregated() {
        let inner = compose(vec![("math", math_service())]).expect("inner compose");
        let outer = compose(vec![("svc", inner)]).expect("outer compose");

        let result = outer
            .call("svc_math_add", vec![json!(2), json!(3)])
            .await
            .expect("nested dispatch");
        assert_eq!(result, json!(5));
        assert!(outer.is_healthy().await.expect("nested probe"));
    }

    #[tokio::test]
    async fn application_fault_message_survives_the_hop() {
        let mut methods = MethodTable::new();
        methods
            .register("insert", |_| async {
                Err(crate::errors::MethodFault::new("duplicate entry"))
            })
            .expect("register insert");
        let member = Service::builder().methods(methods).build();

        let aggregate = compose(vec![("db", member)]).expect("compose");
        let err = aggregate
            .call("db_insert", Vec::new())
            .await
            .expect_err("fault");
        assert_eq!(err.wire_error().message, "duplicate entry");
        assert_eq!(err.code(), switchyard_wire::codes::APPLICATION_ERROR);
    }
}
