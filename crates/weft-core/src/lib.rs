//! Weft - runtime aspect weaving
//!
//! This crate intercepts calls on managed objects and runs cross-cutting
//! advice at five join points (before, around, after, throw, after-anyway),
//! selected by pattern-matched pointcuts.
//!
//! - [`pointcut`] - pointcut grammar and resolution against call signatures
//! - [`advice`] - advice references, the advice registry and the invoker
//! - [`proxy`] - the aspect proxy and its call-dispatch state machine
//! - [`factory`] - type registry and the construction boundary
//! - [`manifest`] - declarative join points (weft.toml)
//!
//! # Example
//!
//! ```ignore
//! let mut types = TypeRegistry::new();
//! types.register_aspected::<Cart>();
//!
//! let mut advice = AdviceRegistry::new();
//! advice.register_function("audit\\record", |inv| {
//!     println!("calling {}", inv.signature());
//!     Ok(Value::Null)
//! });
//!
//! let factory = AspectFactory::new(types, advice);
//! let mut cart = factory.create_managed("Shop\\Cart", &[])?;
//! cart.invoke("addItem", vec![json!("apple")])?;
//! ```

pub mod advice;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod join_point;
pub mod managed;
pub mod manifest;
pub mod pointcut;
pub mod proxy;
pub mod value;

pub use advice::{Advice, AdviceFn, AdviceRef, AdviceRegistry, AspectCtor, SELF_MARKER};
pub use descriptor::{CallKind, MethodInfo, Signature, TypeDescriptor, Visibility, PATH_SEPARATOR};
pub use error::{AspectError, AspectResult};
pub use factory::{AspectFactory, Instance, TypeEntry, TypeRegistry};
pub use join_point::{Invocation, JoinPoint, JoinPointKind};
pub use managed::{Aspect, Construct, Managed, SelfRegistering};
pub use manifest::{AspectManifest, JoinEntry, ManifestError, MANIFEST_FILE};
pub use pointcut::{Pattern, PatternToken, Pointcut, PointcutTarget, WILDCARD};
pub use proxy::{AspectProxy, Invoke, Registration};
pub use value::{Failure, Value};
