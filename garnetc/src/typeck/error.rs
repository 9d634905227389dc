//! Resolution and inference errors.

use std::fmt;

use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::span::Span;

/// Result type alias for inference operations.
///
/// `TypeError` is boxed to keep the `Err` path small.
pub type TypeResult<T> = Result<T, Box<TypeError>>;

/// An inference error with its location and the instantiation frames it bubbled through.
#[derive(Debug, Clone)]
pub struct TypeError {
    /// The kind of error.
    pub kind: TypeErrorKind,
    /// The source span.
    pub span: Span,
    /// Optional help message.
    pub help: Option<String>,
    /// Locations of the earlier nodes that carried the offending type, newest first.
    pub trace: Vec<Span>,
    /// "while instantiating" frames, innermost first.
    pub context: Vec<String>,
}

impl TypeError {
    /// Create a new type error.
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            help: None,
            trace: Vec::new(),
            context: Vec::new(),
        }
    }

    /// Wrap this error in a `Box` and return as `Err`.
    pub fn into_err<T>(self) -> TypeResult<T> {
        Err(Box::new(self))
    }

    /// Add a help message.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_trace(mut self, trace: Vec<Span>) -> Self {
        self.trace = trace;
        self
    }

    /// Append an outer instantiation frame.
    pub fn push_context(&mut self, frame: impl Into<String>) {
        self.context.push(frame.into());
    }

    /// Stable diagnostic code for this error.
    pub fn code(&self) -> &'static str {
        match &self.kind {
            TypeErrorKind::UninitializedConstant { .. } => "E0203",
            TypeErrorKind::GenericArityMismatch { .. } => "E0204",
            TypeErrorKind::NotAGenericClass { .. } => "E0205",
            TypeErrorKind::BlockReturnMismatch { .. } => "E0206",
            TypeErrorKind::ExpectedFunctionType { .. } => "E0207",
            TypeErrorKind::ForeignArgumentTypeMismatch { .. } => "E0501",
            TypeErrorKind::ForeignFieldMismatch { .. } => "E0502",
            TypeErrorKind::StructFieldNotFound { .. } => "E0503",
            TypeErrorKind::OutArgumentNotPointer { .. } => "E0504",
            TypeErrorKind::OutOutsideForeignCall => "E0505",
            TypeErrorKind::NoOverloadMatch { .. } => "E0601",
            TypeErrorKind::ArityMismatch { .. } => "E0602",
            TypeErrorKind::UndefinedMethod { .. } => "E0603",
            TypeErrorKind::UndefinedVariableOrMethod { .. } => "E0604",
            TypeErrorKind::BlockRequiredOrUnexpected { .. } => "E0605",
            TypeErrorKind::InferenceLimitExceeded { .. } => "E0701",
        }
    }

    /// Convert to a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        // Error code categories:
        // - E02xx: type lookup and block typing
        // - E05xx: foreign calls
        // - E06xx: call resolution
        // - E07xx: inference limits
        let mut diag = Diagnostic::error(self.kind.to_string(), self.span).with_code(self.code());

        for span in &self.trace {
            diag = diag.with_note(*span, "type comes from here");
        }
        for frame in &self.context {
            diag = diag.with_context(frame.clone());
        }
        if let Some(help) = &self.help {
            diag = diag.with_suggestion(help.clone());
        }
        diag
    }
}

/// The kind of resolution error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeErrorKind {
    /// No definition of the name exists on the owner.
    #[error("undefined method '{name}'{}", owner_suffix(.owner))]
    UndefinedMethod { name: String, owner: Option<String> },

    /// A bare identifier that is neither a variable nor a method.
    #[error("undefined local variable or method '{name}'")]
    UndefinedVariableOrMethod { name: String },

    /// Definitions exist but none takes this many arguments.
    #[error("wrong number of arguments for '{name}' ({given} for {})", .expected.join(", "))]
    ArityMismatch {
        name: String,
        given: usize,
        /// Accepted arities, `n` or `min..max`.
        expected: Vec<String>,
    },

    /// Block presence does not fit any definition.
    #[error("'{name}' is {}", block_phrase(.block_given))]
    BlockRequiredOrUnexpected { name: String, block_given: bool },

    /// Candidates exist but none structurally accepts the argument types.
    #[error("{}", format_no_overload(.name, .arg_types, .overloads, .missing))]
    NoOverloadMatch {
        name: String,
        arg_types: Vec<String>,
        /// One rendered signature per candidate.
        overloads: Vec<String>,
        /// Argument type tuples left uncovered.
        missing: Vec<String>,
    },

    /// Wrong number of type arguments for a generic class.
    #[error("wrong number of type vars for {name} ({given} for {expected})")]
    GenericArityMismatch { name: String, given: usize, expected: usize },

    /// Type arguments applied to a non-generic class.
    #[error("{name} is not a generic class")]
    NotAGenericClass { name: String },

    #[error("uninitialized constant {name}")]
    UninitializedConstant { name: String },

    /// A block body type rejected by the declared block output.
    #[error("block expected to return {expected}, not {found}")]
    BlockReturnMismatch { expected: String, found: String },

    /// A foreign argument with no allowed conversion.
    #[error("argument #{index} to {fun} must be {expected}, not {found}")]
    ForeignArgumentTypeMismatch {
        /// 1-based.
        index: usize,
        fun: String,
        expected: String,
        found: String,
    },

    #[error("field '{field}' of struct {strukt} has type {expected}, not {found}")]
    ForeignFieldMismatch {
        strukt: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("struct {strukt} has no field '{field}'")]
    StructFieldNotFound { strukt: String, field: String },

    /// A `&fn` block argument that is not a function.
    #[error("expected a function type, not {found}")]
    ExpectedFunctionType { found: String },

    #[error("argument #{index} to {fun} cannot be passed as 'out' because it is not a pointer")]
    OutArgumentNotPointer { index: usize, fun: String },

    #[error("out can only be used with lib funs")]
    OutOutsideForeignCall,

    /// A configured depth guard tripped.
    #[error("{what} exceeded the limit of {limit}")]
    InferenceLimitExceeded { what: String, limit: usize },
}

fn owner_suffix(owner: &Option<String>) -> String {
    owner.as_ref().map(|o| format!(" for {}", o)).unwrap_or_default()
}

fn block_phrase(block_given: &bool) -> &'static str {
    if *block_given {
        "not expected to be invoked with a block, but a block was given"
    } else {
        "expected to be invoked with a block, but no block was given"
    }
}

fn format_no_overload(name: &str, arg_types: &[String], overloads: &[String], missing: &[String]) -> String {
    let mut msg = format!("no overload matches '{}'", name);
    if !arg_types.is_empty() {
        msg.push_str(&format!(" with types {}", arg_types.join(", ")));
    }
    msg.push_str("\nOverloads are:");
    for overload in overloads {
        msg.push_str(&format!("\n - {}", overload));
    }
    if !missing.is_empty() {
        msg.push_str("\nCouldn't find overloads for these types:");
        for tuple in missing {
            msg.push_str(&format!("\n - {}", tuple));
        }
    }
    msg
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for frame in &self.context {
            write!(f, "\n{}", frame)?;
        }
        Ok(())
    }
}

impl std::error::Error for TypeError {}
