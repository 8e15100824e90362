//! Join points and per-invocation context
//!
//! Every intercepted call gets its own [`JoinPoint`]. It carries the call
//! signature and arguments, the phase currently running, the failure being
//! handled (during `Throw`), the produced result (from `After` on), and one
//! result slot per join-point kind holding the value returned by the last
//! advice that fired at that kind. Nothing here is shared between calls:
//! nested invocations get their own context and the context is dropped
//! when the call returns.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::descriptor::Signature;
use crate::error::{AspectError, AspectResult};
use crate::managed::Managed;
use crate::value::{Failure, Value};

/// Moment in a call's lifecycle at which advice may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinPointKind {
    /// Before the call; receives the arguments
    Before,
    /// After a successful call; receives the arguments
    After,
    /// Replaces the call; may proceed to the original method
    Around,
    /// After a failure; receives the failure
    Throw,
    /// At the very end, whether or not the call failed
    AfterAnyway,
}

impl JoinPointKind {
    /// All kinds in dispatch order
    pub const ALL: [JoinPointKind; 5] = [
        JoinPointKind::Before,
        JoinPointKind::Around,
        JoinPointKind::After,
        JoinPointKind::Throw,
        JoinPointKind::AfterAnyway,
    ];

    /// Manifest keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinPointKind::Before => "before",
            JoinPointKind::After => "after",
            JoinPointKind::Around => "around",
            JoinPointKind::Throw => "throw",
            JoinPointKind::AfterAnyway => "after-anyway",
        }
    }

    /// Parse a manifest keyword
    pub fn from_keyword(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.keyword() == s)
    }

    fn slot_index(&self) -> usize {
        match self {
            JoinPointKind::Before => 0,
            JoinPointKind::After => 1,
            JoinPointKind::Around => 2,
            JoinPointKind::Throw => 3,
            JoinPointKind::AfterAnyway => 4,
        }
    }
}

impl fmt::Display for JoinPointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Context of one intercepted call
#[derive(Debug, Clone)]
pub struct JoinPoint {
    signature: Signature,
    args: Vec<Value>,
    kind: JoinPointKind,
    failure: Option<Failure>,
    returned: Option<Value>,
    slots: [Option<Value>; 5],
    proceed_count: usize,
}

impl JoinPoint {
    /// Create the context for a call
    pub fn new(signature: Signature, args: Vec<Value>) -> Self {
        Self {
            signature,
            args,
            kind: JoinPointKind::Before,
            failure: None,
            returned: None,
            slots: Default::default(),
            proceed_count: 0,
        }
    }

    /// Fully-qualified signature of the intercepted call
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Name of the intercepted method
    pub fn method(&self) -> &str {
        &self.signature.method
    }

    /// Original arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Single argument by position
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Join point currently running
    pub fn kind(&self) -> JoinPointKind {
        self.kind
    }

    /// Failure being handled (set from `Throw` on)
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Result of the call (set from `After` on, when it succeeded)
    pub fn returned(&self) -> Option<&Value> {
        self.returned.as_ref()
    }

    /// Value returned by the last advice that fired at `kind` during this call
    pub fn slot(&self, kind: JoinPointKind) -> Option<&Value> {
        self.slots[kind.slot_index()].as_ref()
    }

    /// Number of times the original method was reached through `proceed`
    pub fn proceed_count(&self) -> usize {
        self.proceed_count
    }

    /// Invoke the original method with the original arguments
    ///
    /// Only around advice may proceed.
    pub fn proceed(&mut self, target: &mut dyn Managed) -> AspectResult<Value> {
        self.ensure_around()?;
        self.proceed_count += 1;
        Ok(target.call(&self.signature.method, &self.args)?)
    }

    /// Invoke the original method with replacement arguments
    pub fn proceed_with(&mut self, target: &mut dyn Managed, args: &[Value]) -> AspectResult<Value> {
        self.ensure_around()?;
        self.proceed_count += 1;
        Ok(target.call(&self.signature.method, args)?)
    }

    fn ensure_around(&self) -> AspectResult<()> {
        if self.kind == JoinPointKind::Around {
            Ok(())
        } else {
            Err(AspectError::ProceedOutsideAround(self.kind.to_string()))
        }
    }

    pub(crate) fn enter(&mut self, kind: JoinPointKind) {
        self.kind = kind;
    }

    pub(crate) fn store(&mut self, kind: JoinPointKind, value: Value) {
        self.slots[kind.slot_index()] = Some(value);
    }

    pub(crate) fn set_returned(&mut self, value: Value) {
        self.returned = Some(value);
    }

    pub(crate) fn set_failure(&mut self, failure: Failure) {
        self.failure = Some(failure);
    }
}

/// Join point paired with the managed object, as seen by external advice
pub struct Invocation<'a> {
    target: &'a mut dyn Managed,
    join_point: &'a mut JoinPoint,
}

impl<'a> Invocation<'a> {
    /// Pair a target with its join point
    pub fn new(target: &'a mut dyn Managed, join_point: &'a mut JoinPoint) -> Self {
        Self { target, join_point }
    }

    /// The managed object
    pub fn target(&self) -> &dyn Managed {
        &*self.target
    }

    /// The managed object, mutably
    pub fn target_mut(&mut self) -> &mut dyn Managed {
        &mut *self.target
    }

    /// Invoke the original method (around advice only)
    pub fn proceed(&mut self) -> AspectResult<Value> {
        self.join_point.proceed(&mut *self.target)
    }

    /// Invoke the original method with replacement arguments (around advice only)
    pub fn proceed_with(&mut self, args: &[Value]) -> AspectResult<Value> {
        self.join_point.proceed_with(&mut *self.target, args)
    }
}

impl Deref for Invocation<'_> {
    type Target = JoinPoint;

    fn deref(&self) -> &JoinPoint {
        self.join_point
    }
}

impl DerefMut for Invocation<'_> {
    fn deref_mut(&mut self) -> &mut JoinPoint {
        self.join_point
    }
}
