//! Type registry and aspect factory
//!
//! The [`TypeRegistry`] maps fully-qualified type names to constructors.
//! Types registered with [`TypeRegistry::register_aspected`] carry their
//! join-point registration hook; that is the only way a type becomes
//! eligible for interception. Structural compatibility (having the right
//! methods) is never enough.
//!
//! [`AspectFactory::create_managed`] is the construction boundary callers
//! use: it returns a proxy for aspected types and a plain instance
//! otherwise, both behind the [`Invoke`] call surface.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::advice::AdviceRegistry;
use crate::descriptor::{TypeDescriptor, PATH_SEPARATOR};
use crate::error::{AspectError, AspectResult};
use crate::manifest::AspectManifest;
use crate::managed::{Construct, Managed, SelfRegistering};
use crate::proxy::{AspectProxy, Invoke};
use crate::value::{Failure, Value};

/// Builds a boxed instance from constructor arguments
pub type ConstructFn = fn(&[Value]) -> Result<Box<dyn Managed>, Failure>;

/// Registers a type's own join points on its proxy
pub type RegisterFn = fn(&mut AspectProxy) -> AspectResult<()>;

/// Registry entry for one type
#[derive(Clone, Copy)]
pub struct TypeEntry {
    descriptor: &'static TypeDescriptor,
    construct: ConstructFn,
    join_points: Option<RegisterFn>,
}

impl TypeEntry {
    /// Type metadata
    pub fn descriptor(&self) -> &'static TypeDescriptor {
        self.descriptor
    }

    /// Whether the type opted into interception
    pub fn is_self_registering(&self) -> bool {
        self.join_points.is_some()
    }

    fn build(&self, args: &[Value]) -> AspectResult<Box<dyn Managed>> {
        (self.construct)(args).map_err(|failure| AspectError::Construction {
            type_name: self.descriptor.name().to_string(),
            failure,
        })
    }
}

fn construct_boxed<T: Construct>(args: &[Value]) -> Result<Box<dyn Managed>, Failure> {
    Ok(Box::new(T::construct(args)?))
}

/// Registry of constructible types, by fully-qualified name
#[derive(Default, Clone)]
pub struct TypeRegistry {
    entries: FxHashMap<String, TypeEntry>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain type (never intercepted)
    pub fn register<T: Construct>(&mut self) {
        self.insert(TypeEntry {
            descriptor: T::type_descriptor(),
            construct: construct_boxed::<T>,
            join_points: None,
        });
    }

    /// Register a type that declares its own join points
    pub fn register_aspected<T: Construct + SelfRegistering>(&mut self) {
        self.insert(TypeEntry {
            descriptor: T::type_descriptor(),
            construct: construct_boxed::<T>,
            join_points: Some(T::register_join_points),
        });
    }

    fn insert(&mut self, entry: TypeEntry) {
        self.entries.insert(entry.descriptor.name().to_string(), entry);
    }

    /// Look up a type
    pub fn get(&self, type_name: &str) -> Option<&TypeEntry> {
        self.entries.get(type_name.trim_start_matches(PATH_SEPARATOR))
    }

    /// Check if a type is registered
    pub fn contains(&self, type_name: &str) -> bool {
        self.get(type_name).is_some()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Either a proxy or a plain instance, depending on the type
pub enum Instance {
    /// Aspected type behind its proxy
    Proxied(AspectProxy),
    /// Plain type, called directly
    Plain(Box<dyn Managed>),
}

impl Instance {
    /// Whether calls go through join points
    pub fn is_proxied(&self) -> bool {
        matches!(self, Instance::Proxied(_))
    }

    /// The proxy, for aspected types
    pub fn as_proxy(&self) -> Option<&AspectProxy> {
        match self {
            Instance::Proxied(proxy) => Some(proxy),
            Instance::Plain(_) => None,
        }
    }

    /// The proxy, mutably
    pub fn as_proxy_mut(&mut self) -> Option<&mut AspectProxy> {
        match self {
            Instance::Proxied(proxy) => Some(proxy),
            Instance::Plain(_) => None,
        }
    }
}

impl Invoke for Instance {
    fn type_descriptor(&self) -> &TypeDescriptor {
        match self {
            Instance::Proxied(proxy) => Invoke::type_descriptor(proxy),
            Instance::Plain(plain) => Invoke::type_descriptor(plain),
        }
    }

    fn invoke(&mut self, method: &str, args: Vec<Value>) -> AspectResult<Value> {
        match self {
            Instance::Proxied(proxy) => proxy.invoke(method, args),
            Instance::Plain(plain) => Invoke::invoke(plain, method, args),
        }
    }

    fn get(&self, property: &str) -> AspectResult<Value> {
        match self {
            Instance::Proxied(proxy) => proxy.get(property),
            Instance::Plain(plain) => Invoke::get(plain, property),
        }
    }

    fn set(&mut self, property: &str, value: Value) -> AspectResult<()> {
        match self {
            Instance::Proxied(proxy) => proxy.set(property, value),
            Instance::Plain(plain) => Invoke::set(plain, property, value),
        }
    }
}

/// Decides whether new instances are wrapped in an [`AspectProxy`]
pub struct AspectFactory {
    types: TypeRegistry,
    advice: Arc<AdviceRegistry>,
    manifest: Option<AspectManifest>,
}

impl AspectFactory {
    /// Create a factory over a type registry and an advice registry
    pub fn new(types: TypeRegistry, advice: AdviceRegistry) -> Self {
        Self {
            types,
            advice: Arc::new(advice),
            manifest: None,
        }
    }

    /// Apply manifest join points to every aspected type built from now on
    ///
    /// The manifest is validated and every advice reference must resolve.
    pub fn with_manifest(mut self, manifest: AspectManifest) -> AspectResult<Self> {
        manifest.resolve_all(&self.advice)?;
        self.manifest = Some(manifest);
        Ok(self)
    }

    /// Registered types
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Shared advice registry
    pub fn advice(&self) -> &Arc<AdviceRegistry> {
        &self.advice
    }

    /// Build a proxy for an aspected type
    ///
    /// Returns `Ok(None)` without constructing anything when the type did
    /// not opt into interception.
    pub fn create(&self, type_name: &str, args: &[Value]) -> AspectResult<Option<AspectProxy>> {
        let entry = self.entry(type_name)?;
        let Some(register) = entry.join_points else {
            debug!(type_name = %entry.descriptor.name(), "type is not aspected");
            return Ok(None);
        };

        let mut proxy = AspectProxy::new(entry.build(args)?, Arc::clone(&self.advice));
        register(&mut proxy)?;
        if let Some(manifest) = &self.manifest {
            manifest.apply(&mut proxy)?;
        }
        debug!(
            type_name = %entry.descriptor.name(),
            join_points = proxy.registrations().len(),
            "created aspect proxy"
        );
        Ok(Some(proxy))
    }

    /// Build an instance, wrapped in a proxy when the type is aspected
    pub fn create_managed(&self, type_name: &str, args: &[Value]) -> AspectResult<Instance> {
        match self.create(type_name, args)? {
            Some(proxy) => Ok(Instance::Proxied(proxy)),
            None => Ok(Instance::Plain(self.entry(type_name)?.build(args)?)),
        }
    }

    fn entry(&self, type_name: &str) -> AspectResult<&TypeEntry> {
        self.types
            .get(type_name)
            .ok_or_else(|| AspectError::UnknownType(type_name.to_string()))
    }
}
