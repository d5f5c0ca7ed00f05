//! Error types for the bridge

use std::fmt;

use crate::refs::GlobalRef;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Managed class thrown for native errors that carry no throwable.
pub const RUNTIME_EXCEPTION: &str = "vm/lang/RuntimeException";

/// Managed class thrown for fatal bridge failures and native panics.
pub const FATAL_ERROR: &str = "vm/lang/Error";

/// Classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Contract violation or broken invariant. Ends the current call path:
    /// returned as `Err`, or thrown as `vm/lang/Error` into a managed caller.
    Fatal,
    /// Application failure that flows through the normal return path.
    Recoverable,
}

/// Bridge error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    /// A class or member could not be found in the managed runtime
    #[error("Unresolved {what} `{owner}{name}{signature}`")]
    Unresolved {
        /// "class", "method", "static method", "field", ...
        what: &'static str,
        /// Owning class path
        owner: String,
        /// Member name with a leading `.` (empty for classes)
        name: String,
        /// Member signature (empty for classes)
        signature: String,
    },

    /// A value crossing the boundary matched no category and no fallback
    #[error("Unable to bridge instance of `{class_name}`")]
    Unclassifiable {
        /// Runtime class (managed path or native type name)
        class_name: String,
    },

    /// The handle names a freed or recycled slot
    #[error("Stale peer handle {0:#x}")]
    StaleHandle(u64),

    /// The zero handle was dereferenced
    #[error("Null peer handle")]
    NullHandle,

    /// Release without an outstanding retain
    #[error("Over-release of peer handle {0:#x}")]
    OverRelease(u64),

    /// Typed resolve asked for the wrong concrete type
    #[error("Peer handle {handle:#x} does not hold a `{expected}`")]
    HandleTypeMismatch {
        /// Raw handle
        handle: u64,
        /// Requested native type
        expected: &'static str,
    },

    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// A value is out of range or malformed for its target type
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The managed runtime rejected a reference
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The managed side threw
    #[error("{0}")]
    Thrown(ThrownError),

    /// A completion was resolved twice
    #[error("Completion already resolved")]
    AlreadyCompleted,

    /// The completion callback was dropped without resolving
    #[error("Completion dropped without a result")]
    CompletionDropped,

    /// No process-wide bridge has been installed
    #[error("No bridge installed")]
    NotInstalled,

    /// A process-wide bridge is already installed
    #[error("Bridge already installed")]
    AlreadyInstalled,

    /// Managed runtime internal failure
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl BridgeError {
    /// Fatal or recoverable
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Thrown(_) | BridgeError::CompletionDropped => ErrorKind::Recoverable,
            _ => ErrorKind::Fatal,
        }
    }

    /// Shorthand for [`ErrorKind::Fatal`]
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Unresolved managed class
    pub fn unresolved_class(name: &str) -> Self {
        BridgeError::Unresolved {
            what: "class",
            owner: name.to_string(),
            name: String::new(),
            signature: String::new(),
        }
    }

    /// Unresolved member of a managed class
    pub fn unresolved_member(what: &'static str, owner: &str, name: &str, signature: &str) -> Self {
        BridgeError::Unresolved {
            what,
            owner: owner.to_string(),
            name: format!(".{}", name),
            signature: signature.to_string(),
        }
    }

    pub(crate) fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        BridgeError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

impl From<ThrownError> for BridgeError {
    fn from(e: ThrownError) -> Self {
        BridgeError::Thrown(e)
    }
}

// ============================================================================
// ThrownError
// ============================================================================

/// A failure that crossed the boundary.
///
/// Built from a managed throwable (keeping a global reference so the
/// original can be rethrown unchanged), or from a native message that will
/// be raised as a managed `RuntimeException`.
#[derive(Clone)]
pub struct ThrownError {
    class_name: String,
    message: Option<String>,
    throwable: Option<GlobalRef>,
}

impl ThrownError {
    /// Native failure with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            class_name: RUNTIME_EXCEPTION.to_string(),
            message: Some(message.into()),
            throwable: None,
        }
    }

    /// Native failure raised as a specific managed throwable class. The
    /// class must have a `(Lvm/lang/String;)V` constructor.
    pub fn with_class(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: Some(message.into()),
            throwable: None,
        }
    }

    pub(crate) fn from_throwable(
        class_name: String,
        message: Option<String>,
        throwable: GlobalRef,
    ) -> Self {
        Self {
            class_name,
            message,
            throwable: Some(throwable),
        }
    }

    /// Managed class of the throwable
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Message, if any
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The original managed throwable, when the failure came from there
    pub fn throwable(&self) -> Option<&GlobalRef> {
        self.throwable.as_ref()
    }
}

impl fmt::Display for ThrownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

impl fmt::Debug for ThrownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrownError")
            .field("class_name", &self.class_name)
            .field("message", &self.message)
            .field("managed", &self.throwable.is_some())
            .finish()
    }
}

impl PartialEq for ThrownError {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name && self.message == other.message
    }
}

impl std::error::Error for ThrownError {}
