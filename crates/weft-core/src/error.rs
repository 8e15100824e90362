//! Error types for the aspect engine

use crate::value::Failure;

/// Result type for aspect engine operations
pub type AspectResult<T> = Result<T, AspectError>;

/// Aspect engine error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum AspectError {
    /// Pointcut string does not follow the pointcut grammar
    #[error("Malformed pointcut '{pointcut}': {reason}")]
    MalformedPointcut {
        /// The rejected pointcut text
        pointcut: String,
        /// Why the grammar rejected it
        reason: String,
    },

    /// Advice reference string does not follow any advice form
    #[error("Malformed advice reference '{0}'")]
    MalformedAdviceRef(String),

    /// Call signature text could not be parsed
    #[error("Malformed signature '{0}'")]
    MalformedSignature(String),

    /// Call targets a method the managed type does not declare
    #[error("Unknown method {method}() on {type_name}")]
    UnknownMethod {
        /// Managed type name
        type_name: String,
        /// Requested method
        method: String,
    },

    /// Property access targets a property the managed type does not declare
    #[error("Unknown property '{property}' on {type_name}")]
    UnknownProperty {
        /// Managed type name
        type_name: String,
        /// Requested property
        property: String,
    },

    /// Type name is not present in the type registry
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// Advice reference cannot be resolved to a callable
    #[error("Advice target unresolved: {0}")]
    AdviceTargetUnresolved(String),

    /// Failure raised by the managed method or by an advice body
    #[error("{0}")]
    ManagedCallFailure(Failure),

    /// `proceed` was called outside of an `Around` join point
    #[error("proceed() is only available to around advice (called during {0})")]
    ProceedOutsideAround(String),

    /// Managed type constructor failed
    #[error("Failed to construct {type_name}: {failure}")]
    Construction {
        /// Type being constructed
        type_name: String,
        /// Failure raised by the constructor
        failure: Failure,
    },
}

impl AspectError {
    /// The failure object, if this error carries one
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            AspectError::ManagedCallFailure(failure) => Some(failure),
            AspectError::Construction { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Whether this error is routed to `Throw` advice
    pub fn is_call_failure(&self) -> bool {
        matches!(self, AspectError::ManagedCallFailure(_))
    }

    pub(crate) fn malformed_pointcut(pointcut: &str, reason: impl Into<String>) -> Self {
        AspectError::MalformedPointcut {
            pointcut: pointcut.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<Failure> for AspectError {
    fn from(failure: Failure) -> Self {
        AspectError::ManagedCallFailure(failure)
    }
}
