use thiserror::Error;

use crate::result::ComputationResult;

#[derive(Debug, Error)]
pub enum Error {
    /// the external program could not be found
    #[error("{0}")]
    Availability(String),

    /// the installed program is too old
    #[error(
        "MP2D version '{installed}' too old. Please update to at least \
         '{minimum}'."
    )]
    Resource { installed: String, minimum: String },

    /// caller mistake detected before any process runs
    #[error("{0}")]
    Input(String),

    /// dispersion parameters could not be resolved or formatted
    #[error("{0}")]
    Configuration(String),

    /// expected content missing from the program output
    #[error("{0}")]
    ResultParsing(String),

    /// anything else that went wrong while running the program
    #[error("{0}")]
    Unknown(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to deserialize toml: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// the name of the error class, used as the `error_type` of an
    /// [ErrorRecord]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Availability(_) => "AvailabilityError",
            Error::Resource { .. } => "ResourceError",
            Error::Input(_) => "InputError",
            Error::Configuration(_) => "ConfigurationError",
            Error::ResultParsing(_) => "ResultParsingError",
            Error::Unknown(_) => "UnknownError",
            Error::Io(_) => "IoError",
            Error::Toml(_) => "TomlError",
        }
    }
}

/// The captured form of an [Error] stored on a failed result.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorRecord {
    pub error_type: String,
    pub error_message: String,
}

impl From<&Error> for ErrorRecord {
    /// `error_message` holds the error followed by every error in its
    /// `source` chain, one per line
    fn from(e: &Error) -> Self {
        let mut error_message = e.to_string();
        let mut source = std::error::Error::source(e);
        while let Some(s) = source {
            error_message.push_str(&format!("\n  caused by: {s}"));
            source = s.source();
        }
        Self {
            error_type: e.kind().to_owned(),
            error_message,
        }
    }
}

/// The error returned by [crate::harness::Harness::compute]. Precondition
/// failures have no `record`; failures after planning began carry the partial
/// record with `success` unset and its `error` filled in.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Failure {
    #[source]
    pub error: Error,
    pub record: Option<Box<ComputationResult>>,
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            record: None,
        }
    }
}
