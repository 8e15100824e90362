//! Advice references, the advice registry and the advice invoker
//!
//! Advice is named by a reference string in one of four forms:
//!
//! | Reference              | Target                                          |
//! |------------------------|-------------------------------------------------|
//! | `audit\record`         | free function registered under that path        |
//! | `Audit\Log::record`    | static function registered on `Audit\Log`       |
//! | `Audit\Timer->start`   | method of a fresh `Audit\Timer` aspect instance |
//! | `$this->verify`        | advice hosted by the managed object itself      |
//!
//! References are parsed into an [`AdviceRef`] and resolved against the
//! [`AdviceRegistry`] once, when the join point is registered. Self
//! references stay symbolic and are bound to the live managed object each
//! time the advice runs.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::descriptor::{find_operator, is_identifier, CallKind, PATH_SEPARATOR};
use crate::error::{AspectError, AspectResult};
use crate::join_point::{Invocation, JoinPoint};
use crate::managed::{Aspect, Managed};
use crate::value::Value;

/// Marker for advice hosted by the managed object
pub const SELF_MARKER: &str = "$this";

/// Callable advice body
pub type AdviceFn = Arc<dyn Fn(&mut Invocation<'_>) -> AspectResult<Value> + Send + Sync>;

/// Constructor for per-call aspect instances
pub type AspectCtor = Arc<dyn Fn() -> Box<dyn Aspect> + Send + Sync>;

/// Parsed, unresolved advice reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AdviceRef {
    /// `ns\function`
    Free(String),
    /// `Ns\Type::function`
    Static {
        /// Owning type
        type_name: String,
        /// Function name
        function: String,
    },
    /// `Ns\Type->method` on a fresh instance
    NewInstance {
        /// Aspect type to instantiate
        type_name: String,
        /// Advice method
        method: String,
    },
    /// `$this->method` on the managed object
    SelfMethod(String),
}

impl AdviceRef {
    /// Parse a reference string; a trailing `()` is tolerated
    pub fn parse(text: &str) -> AspectResult<Self> {
        let malformed = || AspectError::MalformedAdviceRef(text.to_string());
        let trimmed = text.trim();
        let body = trimmed.strip_suffix("()").unwrap_or(trimmed);
        let body = body.trim_start_matches(PATH_SEPARATOR);

        match find_operator(body) {
            Some((pos, kind)) => {
                let (owner, name) = (&body[..pos], &body[pos + 2..]);
                if !is_identifier(name) {
                    return Err(malformed());
                }
                if owner == SELF_MARKER {
                    return Ok(AdviceRef::SelfMethod(name.to_string()));
                }
                if !is_path(owner) {
                    return Err(malformed());
                }
                Ok(match kind {
                    CallKind::Static => AdviceRef::Static {
                        type_name: owner.to_string(),
                        function: name.to_string(),
                    },
                    _ => AdviceRef::NewInstance {
                        type_name: owner.to_string(),
                        method: name.to_string(),
                    },
                })
            }
            None if is_path(body) => Ok(AdviceRef::Free(body.to_string())),
            None => Err(malformed()),
        }
    }
}

impl fmt::Display for AdviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdviceRef::Free(path) => f.write_str(path),
            AdviceRef::Static { type_name, function } => write!(f, "{}::{}", type_name, function),
            AdviceRef::NewInstance { type_name, method } => write!(f, "{}->{}", type_name, method),
            AdviceRef::SelfMethod(method) => write!(f, "{}->{}", SELF_MARKER, method),
        }
    }
}

fn is_path(s: &str) -> bool {
    !s.is_empty() && s.split(PATH_SEPARATOR).all(is_identifier)
}

/// Resolved advice, ready to execute
#[derive(Clone)]
pub enum Advice {
    /// Free function or closure
    Function {
        /// Display name
        name: String,
        /// Body
        body: AdviceFn,
    },
    /// Static function of a type
    Static {
        /// Owning type
        type_name: String,
        /// Function name
        function: String,
        /// Body
        body: AdviceFn,
    },
    /// Method of a freshly constructed aspect
    NewInstance {
        /// Aspect type
        type_name: String,
        /// Advice method
        method: String,
        /// Instance constructor
        ctor: AspectCtor,
    },
    /// Advice hosted by the managed object, bound at invocation time
    SelfMethod {
        /// Advice method
        method: String,
    },
}

impl Advice {
    /// Wrap a closure as advice
    pub fn function<F>(name: &str, body: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> AspectResult<Value> + Send + Sync + 'static,
    {
        Advice::Function {
            name: name.to_string(),
            body: Arc::new(body),
        }
    }

    /// Advice hosted by the managed object
    pub fn self_method(method: &str) -> Self {
        Advice::SelfMethod {
            method: method.to_string(),
        }
    }

    /// Run the advice at the join point's current kind
    ///
    /// The returned value is also stored in the join point's slot for that
    /// kind. A self reference the managed object does not host, or an
    /// aspect without the named method, fails with
    /// [`AspectError::AdviceTargetUnresolved`].
    pub fn execute(&self, target: &mut dyn Managed, join_point: &mut JoinPoint) -> AspectResult<Value> {
        let kind = join_point.kind();
        trace!(advice = %self, kind = %kind, signature = %join_point.signature(), "firing advice");

        let value = match self {
            Advice::Function { body, .. } | Advice::Static { body, .. } => {
                body(&mut Invocation::new(target, join_point))?
            }
            Advice::NewInstance { ctor, method, .. } => {
                let mut aspect = ctor();
                match aspect.advise(method, &mut Invocation::new(target, join_point)) {
                    Some(result) => result?,
                    None => return Err(AspectError::AdviceTargetUnresolved(self.to_string())),
                }
            }
            Advice::SelfMethod { method } => match target.advise(method, join_point) {
                Some(result) => result?,
                None => {
                    return Err(AspectError::AdviceTargetUnresolved(format!(
                        "{} (on {})",
                        self,
                        target.descriptor().name()
                    )))
                }
            },
        };

        join_point.store(kind, value.clone());
        Ok(value)
    }
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advice::Function { name, .. } => f.write_str(name),
            Advice::Static { type_name, function, .. } => write!(f, "{}::{}", type_name, function),
            Advice::NewInstance { type_name, method, .. } => write!(f, "{}->{}", type_name, method),
            Advice::SelfMethod { method } => write!(f, "{}->{}", SELF_MARKER, method),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice({})", self)
    }
}

/// Registry of advice targets, indexed by name
///
/// Populated at startup and shared (behind an `Arc`) by every proxy built
/// by the same factory.
#[derive(Default)]
pub struct AdviceRegistry {
    functions: FxHashMap<String, AdviceFn>,
    statics: FxHashMap<(String, String), AdviceFn>,
    aspects: FxHashMap<String, AspectCtor>,
}

impl AdviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a free function (`audit\record`)
    pub fn register_function<F>(&mut self, path: &str, body: F)
    where
        F: Fn(&mut Invocation<'_>) -> AspectResult<Value> + Send + Sync + 'static,
    {
        self.functions.insert(normalize(path), Arc::new(body));
    }

    /// Register a static function (`Audit\Log::record`)
    pub fn register_static<F>(&mut self, type_name: &str, function: &str, body: F)
    where
        F: Fn(&mut Invocation<'_>) -> AspectResult<Value> + Send + Sync + 'static,
    {
        self.statics
            .insert((normalize(type_name), function.to_string()), Arc::new(body));
    }

    /// Register an aspect type built with `Default` for every call
    pub fn register_aspect<A: Aspect + Default + 'static>(&mut self, type_name: &str) {
        self.register_aspect_with(type_name, || Box::new(A::default()) as Box<dyn Aspect>);
    }

    /// Register an aspect type with a custom constructor
    pub fn register_aspect_with<F>(&mut self, type_name: &str, ctor: F)
    where
        F: Fn() -> Box<dyn Aspect> + Send + Sync + 'static,
    {
        self.aspects.insert(normalize(type_name), Arc::new(ctor));
    }

    /// Check whether a reference would resolve
    pub fn contains(&self, reference: &AdviceRef) -> bool {
        self.resolve(reference).is_ok()
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.functions.len() + self.statics.len() + self.aspects.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a reference into executable advice
    pub fn resolve(&self, reference: &AdviceRef) -> AspectResult<Advice> {
        let unresolved = || AspectError::AdviceTargetUnresolved(reference.to_string());
        match reference {
            AdviceRef::Free(path) => {
                let body = self.functions.get(path).ok_or_else(unresolved)?;
                Ok(Advice::Function {
                    name: path.clone(),
                    body: Arc::clone(body),
                })
            }
            AdviceRef::Static { type_name, function } => {
                let body = self
                    .statics
                    .get(&(type_name.clone(), function.clone()))
                    .ok_or_else(unresolved)?;
                Ok(Advice::Static {
                    type_name: type_name.clone(),
                    function: function.clone(),
                    body: Arc::clone(body),
                })
            }
            AdviceRef::NewInstance { type_name, method } => {
                let ctor = self.aspects.get(type_name).ok_or_else(unresolved)?;
                Ok(Advice::NewInstance {
                    type_name: type_name.clone(),
                    method: method.clone(),
                    ctor: Arc::clone(ctor),
                })
            }
            AdviceRef::SelfMethod(method) => Ok(Advice::self_method(method)),
        }
    }

    /// Parse and resolve a reference string
    pub fn resolve_str(&self, reference: &str) -> AspectResult<Advice> {
        self.resolve(&AdviceRef::parse(reference)?)
    }
}

impl fmt::Debug for AdviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("statics", &self.statics.keys().collect::<Vec<_>>())
            .field("aspects", &self.aspects.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize(path: &str) -> String {
    path.trim().trim_start_matches(PATH_SEPARATOR).to_string()
}
