//! Namespaced remote-procedure dispatch for composable services.
//!
//! The `switchyard-rpc` crate turns a set of statically registered async
//! methods into a remotely callable [`Service`] and merges several such
//! services into one unified dispatch surface without callers knowing they
//! are distinct. Each service carries its own deny list, conversion tables,
//! and liveness probe; [`compose`] folds any number of them into a synthetic
//! service whose method names are namespace-qualified, whose deny list and
//! conversion tables are merged, and whose liveness is the concurrent,
//! fault-isolated AND of its members.
//!
//! # Architecture
//!
//! Dispatch follows a fixed resolution pipeline (string method check,
//! reserved-name check, table lookup, deny-list check, parameter decode,
//! invocation, result encode) with a fixed wire error taxonomy: parse
//! failures, resolution failures, handler faults, and internal faults each
//! map to one stable numeric code. Resolution failures are deliberately
//! cause-collapsed so deny-listed methods are indistinguishable from absent
//! ones. The [`reply`] module maps every dispatch outcome onto a response
//! envelope, and the [`transport`] module serves that mapping over a JSONL
//! socket.
//!
//! # Example
//!
//! ```
//! use serde_json::{Value, json};
//! use switchyard_rpc::{MethodTable, Service, compose};
//!
//! let mut methods = MethodTable::new();
//! methods
//!     .register("add", |params: Vec<Value>| async move {
//!         let a = params.first().and_then(Value::as_i64).unwrap_or(0);
//!         let b = params.get(1).and_then(Value::as_i64).unwrap_or(0);
//!         Ok(json!(a + b))
//!     })
//!     .expect("registration succeeds");
//!
//! let math = Service::builder().methods(methods).build();
//! let hub = compose(vec![("math", math)]).expect("composition succeeds");
//!
//! let runtime = tokio::runtime::Builder::new_current_thread()
//!     .build()
//!     .expect("runtime");
//! let result = runtime
//!     .block_on(hub.call("math_add", vec![json!(2), json!(3)]))
//!     .expect("dispatch succeeds");
//! assert_eq!(result, json!(5));
//! ```

pub mod aggregate;
pub mod convert;
pub mod errors;
pub mod invoker;
pub mod reply;
pub mod service;
pub mod transport;

pub use switchyard_wire as wire;

pub use self::aggregate::compose;
pub use self::convert::{CLASS_TAG, ClassConverter, ConvertError, ConversionTables, ShapeKey};
pub use self::errors::{DispatchError, HealthFault, MethodFault, RegistryError};
pub use self::invoker::{MethodFuture, MethodParams, MethodTable, RESERVED_METHOD};
pub use self::service::{DenyList, HealthFuture, Service, ServiceBuilder};
pub use self::transport::{ListenerError, ListenerHandle, RpcListener};
