//! Structured error types for compilation and dispatch (§7).
//!
//! Both enums are hand-written `Display`/`Error` impls rather than going
//! through a derive-macro error crate, matching how the reference crate's
//! `Diagnostic` type is plain data with its own renderer.

use std::fmt;

/// Raised while turning a signature map into a dispatcher. Construction
/// errors are always raised eagerly and fully: no partial dispatcher is ever
/// returned (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A parameter spec could not be parsed, or used `...` in a non-final
    /// position.
    InvalidParam { signature: String, detail: String },
    /// A variadic Param occupied a position other than last.
    MisplacedVariadic { signature: String },
    /// Two expanded signatures share a canonical key, sort equal under the
    /// Signature comparator, and bind different implementations.
    DuplicateSignature { key: String },
    /// Two Params sharing a discrimination-tree entry both wanted to be
    /// variadic (or one did while the entry already held another
    /// signature) — a Param cannot be both the sole occupant of its slot and
    /// share the slot with siblings.
    ConflictingVariadicParam { depth: usize },
    /// A signature referenced a type name the registry does not know.
    UnknownType { name: String, suggestion: Option<String> },
    /// A conversion's `from`/`to` referenced an unregistered type.
    InvalidConversion { detail: String },
    /// The input map was empty after dropping ignored signatures.
    EmptySignatureSet,
    /// Composing multiple dispatchers found the same name bound to
    /// different dispatchers.
    ConflictingName { name: String },
    /// Composing multiple dispatchers found the same expanded signature key
    /// bound to different implementations.
    DuplicateAcrossMerge { key: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::InvalidParam { signature, detail } => {
                write!(f, "invalid parameter in signature '{signature}': {detail}")
            }
            CompileError::MisplacedVariadic { signature } => {
                write!(f, "variadic parameter must be last in signature '{signature}'")
            }
            CompileError::DuplicateSignature { key } => {
                write!(f, "signature '{key}' is defined twice with incomparable implementations")
            }
            CompileError::ConflictingVariadicParam { depth } => {
                write!(f, "conflicting variadic parameter at position {depth}")
            }
            CompileError::UnknownType { name, suggestion } => match suggestion {
                Some(hint) => write!(f, "unknown type '{name}' (did you mean '{hint}'?)"),
                None => write!(f, "unknown type '{name}'"),
            },
            CompileError::InvalidConversion { detail } => write!(f, "invalid conversion: {detail}"),
            CompileError::EmptySignatureSet => write!(f, "no signatures to compile"),
            CompileError::ConflictingName { name } => {
                write!(f, "composed dispatchers disagree on name '{name}'")
            }
            CompileError::DuplicateAcrossMerge { key } => {
                write!(f, "signature '{key}' is bound to different implementations across merged dispatchers")
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl From<crate::registry::RegistryError> for CompileError {
    fn from(err: crate::registry::RegistryError) -> Self {
        match err {
            crate::registry::RegistryError::UnknownType { name, suggestion } => {
                CompileError::UnknownType { name, suggestion }
            }
            other => CompileError::InvalidConversion { detail: other.to_string() },
        }
    }
}

/// The single dispatch-error kind, raised synchronously at call time. All
/// variants carry structured fields for programmatic recovery (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentsError {
    pub function: String,
    pub argc: usize,
    pub index: usize,
    pub actual: String,
    pub expected: Vec<String>,
    pub kind: ArgumentsErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentsErrorKind {
    TooManyArguments,
    TooFewArguments,
    UnexpectedType,
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.function.is_empty() { "<anonymous>" } else { &self.function };
        match self.kind {
            ArgumentsErrorKind::TooManyArguments => {
                write!(f, "{name}(): too many arguments (expected {}, got {})", self.index, self.argc)
            }
            ArgumentsErrorKind::TooFewArguments => write!(
                f,
                "{name}(): too few arguments (index {}, expected one of [{}])",
                self.index,
                self.expected.join(", ")
            ),
            ArgumentsErrorKind::UnexpectedType => write!(
                f,
                "{name}(): unexpected type of argument at index {} (got {}, expected one of [{}])",
                self.index,
                self.actual,
                self.expected.join(", ")
            ),
        }
    }
}

impl std::error::Error for ArgumentsError {}

/// `createError` (§4.7): classify a failed call site into the right
/// `ArgumentsError` kind from `{fnName, argc, index, actual, expectedCsv}`.
pub fn create_error(
    function: &str,
    argc: usize,
    index: usize,
    actual: Option<&str>,
    expected: Option<Vec<String>>,
) -> ArgumentsError {
    let Some(expected) = expected else {
        return ArgumentsError {
            function: function.to_string(),
            argc,
            index,
            actual: String::new(),
            expected: Vec::new(),
            kind: ArgumentsErrorKind::TooManyArguments,
        };
    };

    let has_any = expected.iter().any(|t| t == crate::registry::ANY);
    let kind = if argc > index && !has_any {
        ArgumentsErrorKind::UnexpectedType
    } else {
        ArgumentsErrorKind::TooFewArguments
    };

    ArgumentsError {
        function: function.to_string(),
        argc,
        index,
        actual: actual.unwrap_or("unknown").to_string(),
        expected,
        kind,
    }
}
