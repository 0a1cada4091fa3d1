//! Error types.

use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// The error type used by the optimizer and its components.
///
/// Violated invariants (a corrupt memo, nested list items, mismatched logical properties etc.)
/// are not reported through this type. They are bugs and cause a panic.
#[derive(Debug)]
pub enum OptimizerError {
    /// A query can not be planned. Carries an SQL error code.
    Plan(PlanError),
    /// The memo has grown beyond the memory budget set in [OptimizerOptions](crate::optimizer::OptimizerOptions).
    Resource(ResourceError),
    /// This error indicates that a function of the optimizer or its components has been called with an invalid argument.
    Argument(ArgumentError),
    /// This error indicates that one of internal invariants of the optimizer or its components has been violated.
    Internal(InternalError),
}

impl OptimizerError {
    /// Creates a [plan error](OptimizerError::Plan).
    /// This method is a shorthand for `OptimizerError::Plan(PlanError::new(code, message))`.
    pub fn plan<T>(code: SqlCode, message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Plan(PlanError::new(code, message))
    }

    /// Creates a [resource error](OptimizerError::Resource).
    pub fn resource(used: usize, budget: usize) -> OptimizerError {
        OptimizerError::Resource(ResourceError::new(used, budget))
    }

    /// Creates an [argument error](OptimizerError::Argument).
    /// This method is a shorthand for `OptimizerError::Argument(ArgumentError::new(message))`.
    pub fn argument<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Argument(ArgumentError::new(message))
    }

    /// Creates an [internal error](OptimizerError::Internal).
    /// This method is a shorthand for `OptimizerError::Internal(InternalError::new(message, None))`.
    pub fn internal<T>(message: T) -> OptimizerError
    where
        T: Into<String>,
    {
        OptimizerError::Internal(InternalError::new(message, None))
    }

    /// Returns the SQL error code of this error. Errors that are not plan errors
    /// are reported as [internal errors](SqlCode::Internal).
    pub fn code(&self) -> SqlCode {
        match self {
            OptimizerError::Plan(err) => err.code,
            OptimizerError::Resource(_) => SqlCode::OutOfMemory,
            OptimizerError::Argument(_) | OptimizerError::Internal(_) => SqlCode::Internal,
        }
    }
}

impl Display for OptimizerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizerError::Plan(err) => write!(f, "Plan error: {}", err),
            OptimizerError::Resource(err) => write!(f, "Resource error: {}", err),
            OptimizerError::Argument(err) => write!(f, "Argument error: {}", err),
            OptimizerError::Internal(err) => write!(f, "Internal error: {}", err),
        }
    }
}

impl Error for OptimizerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OptimizerError::Plan(_) => None,
            OptimizerError::Resource(_) => None,
            OptimizerError::Argument(_) => None,
            OptimizerError::Internal(InternalError { cause: Some(error), .. }) => Some(error),
            OptimizerError::Internal(_) => None,
        }
    }
}

impl From<PlanError> for OptimizerError {
    fn from(err: PlanError) -> Self {
        OptimizerError::Plan(err)
    }
}

impl From<ArgumentError> for OptimizerError {
    fn from(err: ArgumentError) -> Self {
        OptimizerError::Argument(err)
    }
}

impl From<InternalError> for OptimizerError {
    fn from(err: InternalError) -> Self {
        OptimizerError::Internal(err)
    }
}

/// SQL error codes reported by [plan errors](PlanError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlCode {
    UndefinedTable,
    UndefinedColumn,
    InvalidSchemaName,
    DatatypeMismatch,
    FeatureNotSupported,
    InsufficientPrivilege,
    StaleCatalog,
    OutOfMemory,
    Internal,
}

impl SqlCode {
    /// The five character SQLSTATE code.
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlCode::UndefinedTable => "42P01",
            SqlCode::UndefinedColumn => "42703",
            SqlCode::InvalidSchemaName => "3F000",
            SqlCode::DatatypeMismatch => "42804",
            SqlCode::FeatureNotSupported => "0A000",
            SqlCode::InsufficientPrivilege => "42501",
            SqlCode::StaleCatalog => "40001",
            SqlCode::OutOfMemory => "53200",
            SqlCode::Internal => "XX000",
        }
    }
}

impl Display for SqlCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan error. See [OptimizerError::Plan].
#[derive(Debug)]
pub struct PlanError {
    code: SqlCode,
    message: String,
    backtrace: Backtrace,
}

impl PlanError {
    /// Creates a new instance of a [PlanError].
    pub fn new<T>(code: SqlCode, message: T) -> Self
    where
        T: Into<String>,
    {
        PlanError {
            code,
            message: message.into(),
            backtrace: Backtrace::new(),
        }
    }

    /// The SQL error code.
    pub fn code(&self) -> SqlCode {
        self.code
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for PlanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, &self.message)
    }
}

/// Resource error. See [OptimizerError::Resource].
#[derive(Debug)]
pub struct ResourceError {
    used: usize,
    budget: usize,
    backtrace: Backtrace,
}

impl ResourceError {
    /// Creates a new instance of a [ResourceError].
    pub fn new(used: usize, budget: usize) -> Self {
        ResourceError {
            used,
            budget,
            backtrace: Backtrace::new(),
        }
    }

    /// The estimated number of bytes used by the memo.
    pub fn used(&self) -> usize {
        self.used
    }

    /// The memory budget in bytes.
    pub fn budget(&self) -> usize {
        self.budget
    }
}

impl Display for ResourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "memo uses {} bytes, budget is {} bytes", self.used, self.budget)
    }
}

/// Argument error. See [OptimizerError::Argument].
#[derive(Debug)]
pub struct ArgumentError {
    message: String,
    backtrace: Backtrace,
}

impl ArgumentError {
    /// Creates a new instance of an [ArgumentError].
    pub fn new<T>(message: T) -> Self
    where
        T: Into<String>,
    {
        ArgumentError {
            message: message.into(),
            backtrace: Backtrace::new(),
        }
    }
}

impl Display for ArgumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.message)
    }
}

/// Internal error. See [OptimizerError::Internal].
#[derive(Debug)]
pub struct InternalError {
    message: String,
    cause: Option<Box<OptimizerError>>,
    backtrace: Backtrace,
}

impl InternalError {
    /// Creates an instance of an [InternalError] with the given message and an optional cause.
    /// This method captures a backtrace.
    pub fn new<T>(message: T, err: Option<OptimizerError>) -> Self
    where
        T: Into<String>,
    {
        InternalError {
            message: message.into(),
            cause: err.map(Box::new),
            backtrace: Backtrace::new(),
        }
    }

    /// Creates an instance of an [InternalError] with the given message and cause.
    /// This method captures a backtrace.
    pub fn with_cause<T>(message: T, cause: OptimizerError) -> Self
    where
        T: Into<String>,
    {
        InternalError {
            message: message.into(),
            cause: Some(Box::new(cause)),
            backtrace: Backtrace::new(),
        }
    }
}

impl From<&str> for InternalError {
    fn from(message: &str) -> Self {
        InternalError::new(message, None)
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        InternalError::new(message, None)
    }
}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(cause) = self.cause.as_ref() {
            write!(f, " caused by: {}", cause)?
        }
        Ok(())
    }
}
