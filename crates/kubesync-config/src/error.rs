//! Configuration and resolution errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("unrecognized document type: {0}")]
    UnrecognizedDocumentType(String),

    #[error("unrecognized runtime variable: {0}")]
    UnrecognizedRuntimeVariable(String),

    #[error("error loading runtime variable {name}: {source}")]
    RuntimeVariable {
        name: String,
        #[source]
        source: RuntimeVariableError,
    },

    #[error("error resolving expressions: {0}")]
    Expression(#[from] ExpressionError),

    #[error("invalid placeholder in {input:?}: {message}")]
    PlaceholderSyntax { input: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure computing a recognized runtime variable.
#[derive(Debug, Error)]
pub enum RuntimeVariableError {
    #[error("couldn't find dependency {0}")]
    UnknownDependency(String),

    #[error("couldn't find image {0} in config")]
    UnknownImage(String),

    #[error("malformed reference: {0}")]
    MalformedReference(String),
}

#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("command {command:?} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unterminated expression in {0:?}")]
    Unterminated(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
