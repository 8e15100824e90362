//! Capability traits for interceptable objects
//!
//! [`Managed`] is the dynamic call surface an object exposes to its proxy.
//! [`Construct`] lets the type registry build instances from argument
//! lists, and [`SelfRegistering`] is the nominal opt-in to interception: a
//! type only gets wrapped in an [`AspectProxy`] when it is registered
//! through that trait.
//!
//! [`Aspect`] is implemented by advice holders that are instantiated
//! afresh for every advice call (the `Namespace\Class->method` advice
//! form).

use crate::descriptor::TypeDescriptor;
use crate::error::AspectResult;
use crate::join_point::{Invocation, JoinPoint};
use crate::proxy::AspectProxy;
use crate::value::{Failure, Value};

/// Object whose calls can be dispatched by name
pub trait Managed {
    /// Reflection metadata of the concrete type
    fn descriptor(&self) -> &TypeDescriptor;

    /// Run the real method
    ///
    /// Only called for methods the descriptor declares.
    fn call(&mut self, method: &str, args: &[Value]) -> Result<Value, Failure>;

    /// Read a declared property
    fn get_property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Write a declared property; returns `false` if the property is unknown
    fn set_property(&mut self, _name: &str, _value: Value) -> bool {
        false
    }

    /// Run advice hosted by this object (`$this->method` references)
    ///
    /// Returns `None` when the object has no advice of that name. Around
    /// advice can reach the original method with `join_point.proceed(self)`.
    fn advise(&mut self, _method: &str, _join_point: &mut JoinPoint) -> Option<AspectResult<Value>> {
        None
    }
}

/// Type the registry can build from an argument list
pub trait Construct: Managed + Sized + 'static {
    /// Reflection metadata, shared by all instances
    fn type_descriptor() -> &'static TypeDescriptor;

    /// Build an instance
    fn construct(args: &[Value]) -> Result<Self, Failure>;
}

/// Type that declares its own join points
pub trait SelfRegistering: Managed {
    /// Insert this type's (kind, pointcut, advice) rows into its proxy
    fn register_join_points(proxy: &mut AspectProxy) -> AspectResult<()>;
}

/// Advice holder instantiated for every advice call
pub trait Aspect {
    /// Run the named advice; `None` when this aspect has no such advice
    fn advise(&mut self, method: &str, invocation: &mut Invocation<'_>) -> Option<AspectResult<Value>>;
}
