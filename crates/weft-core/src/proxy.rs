//! Aspect proxy: the call-dispatch state machine
//!
//! An [`AspectProxy`] owns one managed object and a table of
//! (join point, pointcut, advice) rows. Every call goes through
//! [`AspectProxy::invoke`]:
//!
//! ```text
//!   start ──unknown method──▶ UnknownMethod (nothing fires)
//!     │
//!     ▼
//!   before ─▶ around | real call ─▶ after ─┬─▶ after-anyway ─▶ result
//!     │            │                  │    │
//!     └────────────┴──── failure ─────┴─▶ throw ─▶ after-anyway ─▶ failure
//! ```
//!
//! - `before`, `after`, `throw` and `after-anyway` run every matching row,
//!   in registration order.
//! - `around` runs the first matching row only; its return value is the
//!   call's result, and the real method runs only if it proceeds. Without
//!   a matching around row the real method is called directly.
//! - A failure from any earlier phase is handed to `throw` advice and then
//!   re-raised. Throw advice that itself fails replaces the failure.
//! - Configuration errors skip `throw` but still run `after-anyway`.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, debug_span, warn};

use crate::advice::{Advice, AdviceRef, AdviceRegistry};
use crate::descriptor::TypeDescriptor;
use crate::error::{AspectError, AspectResult};
use crate::join_point::{JoinPoint, JoinPointKind};
use crate::managed::{Construct, Managed, SelfRegistering};
use crate::pointcut::Pointcut;
use crate::value::{Failure, Value};

/// Call surface shared by proxies and plain instances
pub trait Invoke {
    /// Metadata of the underlying type
    fn type_descriptor(&self) -> &TypeDescriptor;

    /// Call a method by name
    fn invoke(&mut self, method: &str, args: Vec<Value>) -> AspectResult<Value>;

    /// Read a declared property
    fn get(&self, property: &str) -> AspectResult<Value>;

    /// Write a declared property
    fn set(&mut self, property: &str, value: Value) -> AspectResult<()>;
}

/// One row of the registration table
#[derive(Debug, Clone)]
pub struct Registration {
    /// When the advice fires
    pub kind: JoinPointKind,
    /// Which calls it covers
    pub pointcut: Pointcut,
    /// What runs
    pub advice: Advice,
}

/// Proxy owning a managed object and its join points
pub struct AspectProxy {
    managed: Box<dyn Managed>,
    registrations: Vec<Registration>,
    advice: Arc<AdviceRegistry>,
}

impl AspectProxy {
    /// Wrap an already built object; no join points are registered
    pub fn new(managed: Box<dyn Managed>, advice: Arc<AdviceRegistry>) -> Self {
        Self {
            managed,
            registrations: Vec::new(),
            advice,
        }
    }

    /// Build a `T` from `args` and let it register its join points
    pub fn construct<T: Construct + SelfRegistering>(
        args: &[Value],
        advice: Arc<AdviceRegistry>,
    ) -> AspectResult<Self> {
        let managed = T::construct(args).map_err(|failure| AspectError::Construction {
            type_name: T::type_descriptor().name().to_string(),
            failure,
        })?;
        let mut proxy = Self::new(Box::new(managed), advice);
        T::register_join_points(&mut proxy)?;
        Ok(proxy)
    }

    /// Register advice by reference string at the given join point
    pub fn register(&mut self, kind: JoinPointKind, pointcut: &str, advice: &str) -> AspectResult<()> {
        let pointcut = Pointcut::parse(pointcut)?;
        let advice = self.advice.resolve(&AdviceRef::parse(advice)?)?;
        self.insert(kind, pointcut, advice);
        Ok(())
    }

    /// Register already resolved advice (e.g. a closure)
    pub fn register_advice(&mut self, kind: JoinPointKind, pointcut: &str, advice: Advice) -> AspectResult<()> {
        let pointcut = Pointcut::parse(pointcut)?;
        self.insert(kind, pointcut, advice);
        Ok(())
    }

    /// Register `before` advice
    pub fn register_before(&mut self, pointcut: &str, advice: &str) -> AspectResult<()> {
        self.register(JoinPointKind::Before, pointcut, advice)
    }

    /// Register `after` advice
    pub fn register_after(&mut self, pointcut: &str, advice: &str) -> AspectResult<()> {
        self.register(JoinPointKind::After, pointcut, advice)
    }

    /// Register `around` advice
    pub fn register_around(&mut self, pointcut: &str, advice: &str) -> AspectResult<()> {
        self.register(JoinPointKind::Around, pointcut, advice)
    }

    /// Register `throw` advice
    pub fn register_throw(&mut self, pointcut: &str, advice: &str) -> AspectResult<()> {
        self.register(JoinPointKind::Throw, pointcut, advice)
    }

    /// Register `after-anyway` advice
    pub fn register_after_anyway(&mut self, pointcut: &str, advice: &str) -> AspectResult<()> {
        self.register(JoinPointKind::AfterAnyway, pointcut, advice)
    }

    /// Same (kind, pointcut text) replaces the earlier row in place
    fn insert(&mut self, kind: JoinPointKind, pointcut: Pointcut, advice: Advice) {
        debug!(
            type_name = %self.managed.descriptor().name(),
            kind = %kind,
            pointcut = %pointcut,
            advice = %advice,
            "registering join point"
        );
        let existing = self
            .registrations
            .iter_mut()
            .find(|r| r.kind == kind && r.pointcut.source() == pointcut.source());
        match existing {
            Some(row) => row.advice = advice,
            None => self.registrations.push(Registration { kind, pointcut, advice }),
        }
    }

    /// Registered rows, in registration order
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Advice registry this proxy resolves references against
    pub fn advice_registry(&self) -> &Arc<AdviceRegistry> {
        &self.advice
    }

    /// Read-only view of the managed object
    pub fn managed(&self) -> &dyn Managed {
        self.managed.as_ref()
    }

    /// Dispatch a call through the join points
    pub fn invoke(&mut self, method: &str, args: Vec<Value>) -> AspectResult<Value> {
        let descriptor = self.managed.descriptor();
        let signature = descriptor
            .signature(method)
            .ok_or_else(|| AspectError::UnknownMethod {
                type_name: descriptor.name().to_string(),
                method: method.to_string(),
            })?;

        let span = debug_span!("invoke", signature = %signature);
        let _enter = span.enter();

        let mut join_point = JoinPoint::new(signature, args);
        let mut dispatch = Dispatch {
            rows: &self.registrations,
            target: self.managed.as_mut(),
            join_point: &mut join_point,
        };

        let outcome = match dispatch.run_call() {
            Err(AspectError::ManagedCallFailure(failure)) => Err(dispatch.run_throw(failure)),
            other => other,
        };

        dispatch.join_point.enter(JoinPointKind::AfterAnyway);
        let anyway = dispatch.fire_all(JoinPointKind::AfterAnyway);

        match (outcome, anyway) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
            (Err(err), Err(dropped)) => {
                warn!(error = %dropped, "after-anyway advice failed while a failure was propagating");
                Err(err)
            }
        }
    }

    /// Read a property of the managed object
    pub fn get(&self, property: &str) -> AspectResult<Value> {
        let descriptor = self.managed.descriptor();
        if !descriptor.has_property(property) {
            return Err(unknown_property(descriptor, property));
        }
        self.managed
            .get_property(property)
            .ok_or_else(|| unknown_property(descriptor, property))
    }

    /// Write a property of the managed object; never creates new ones
    pub fn set(&mut self, property: &str, value: Value) -> AspectResult<()> {
        if !self.managed.descriptor().has_property(property) || !self.managed.set_property(property, value) {
            return Err(unknown_property(self.managed.descriptor(), property));
        }
        Ok(())
    }
}

impl Invoke for AspectProxy {
    fn type_descriptor(&self) -> &TypeDescriptor {
        self.managed.descriptor()
    }

    fn invoke(&mut self, method: &str, args: Vec<Value>) -> AspectResult<Value> {
        AspectProxy::invoke(self, method, args)
    }

    fn get(&self, property: &str) -> AspectResult<Value> {
        AspectProxy::get(self, property)
    }

    fn set(&mut self, property: &str, value: Value) -> AspectResult<()> {
        AspectProxy::set(self, property, value)
    }
}

impl fmt::Debug for AspectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectProxy")
            .field("type", &self.managed.descriptor().name())
            .field("registrations", &self.registrations)
            .finish()
    }
}

/// Plain instances dispatch directly, with the same existence checks
impl Invoke for Box<dyn Managed> {
    fn type_descriptor(&self) -> &TypeDescriptor {
        self.descriptor()
    }

    fn invoke(&mut self, method: &str, args: Vec<Value>) -> AspectResult<Value> {
        if !self.descriptor().has_method(method) {
            return Err(AspectError::UnknownMethod {
                type_name: self.descriptor().name().to_string(),
                method: method.to_string(),
            });
        }
        Ok(self.call(method, &args)?)
    }

    fn get(&self, property: &str) -> AspectResult<Value> {
        let descriptor = self.descriptor();
        if !descriptor.has_property(property) {
            return Err(unknown_property(descriptor, property));
        }
        self.get_property(property)
            .ok_or_else(|| unknown_property(descriptor, property))
    }

    fn set(&mut self, property: &str, value: Value) -> AspectResult<()> {
        if !self.descriptor().has_property(property) || !self.set_property(property, value) {
            return Err(unknown_property(self.descriptor(), property));
        }
        Ok(())
    }
}

fn unknown_property(descriptor: &TypeDescriptor, property: &str) -> AspectError {
    AspectError::UnknownProperty {
        type_name: descriptor.name().to_string(),
        property: property.to_string(),
    }
}

/// Borrowed state for one pass through the state machine
struct Dispatch<'a> {
    rows: &'a [Registration],
    target: &'a mut dyn Managed,
    join_point: &'a mut JoinPoint,
}

impl<'a> Dispatch<'a> {
    /// before → around | real call → after
    fn run_call(&mut self) -> AspectResult<Value> {
        self.join_point.enter(JoinPointKind::Before);
        self.fire_all(JoinPointKind::Before)?;

        self.join_point.enter(JoinPointKind::Around);
        let result = match self.first_match(JoinPointKind::Around) {
            Some(row) => row.advice.execute(&mut *self.target, self.join_point)?,
            None => self
                .target
                .call(self.join_point.method(), self.join_point.args())?,
        };

        self.join_point.set_returned(result.clone());
        self.join_point.enter(JoinPointKind::After);
        self.fire_all(JoinPointKind::After)?;
        Ok(result)
    }

    /// Hand the failure to throw advice; returns the error to propagate
    fn run_throw(&mut self, failure: Failure) -> AspectError {
        debug!(failure = %failure, "call failed");
        self.join_point.set_failure(failure.clone());
        self.join_point.enter(JoinPointKind::Throw);
        match self.fire_all(JoinPointKind::Throw) {
            Ok(()) => AspectError::ManagedCallFailure(failure),
            Err(replacement) => replacement,
        }
    }

    fn fire_all(&mut self, kind: JoinPointKind) -> AspectResult<()> {
        let rows = self.rows;
        for row in rows.iter().filter(|r| r.kind == kind) {
            if row.pointcut.resolve(self.join_point.signature()) {
                row.advice.execute(&mut *self.target, self.join_point)?;
            }
        }
        Ok(())
    }

    fn first_match(&self, kind: JoinPointKind) -> Option<&'a Registration> {
        let signature = self.join_point.signature();
        let rows: &'a [Registration] = self.rows;
        rows
            .iter()
            .find(|r| r.kind == kind && r.pointcut.resolve(signature))
    }
}
