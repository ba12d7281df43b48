use std::fmt;

/// Crate-wide error type.
///
/// Mirrors the error taxonomy of the event-dispatch runtime: configuration
/// and service-registration failures are fatal at boot, everything else is
/// reported through `crate::report::ErrorReporter` and the system keeps
/// running.
#[derive(Debug)]
pub enum Error {
    /// Missing or invalid configuration discovered during boot. Fatal.
    Configuration(String),
    /// Dependency-injection failure: ambiguous or missing service for an
    /// injection point. Fatal during boot, reported at runtime registration.
    ServiceRegistration(String),
    /// A target queue could not accept an event and the configured
    /// slow-consumer policy escalated to a hard failure.
    QueuePublish(String),
    /// An admin command was not found, or its handler returned an error.
    AdminCommand(String),
    Io(std::io::Error),
    Corrupt(&'static str),
    Unsupported(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Error::ServiceRegistration(msg) => write!(f, "service registration error: {msg}"),
            Error::QueuePublish(msg) => write!(f, "queue publish error: {msg}"),
            Error::AdminCommand(msg) => write!(f, "admin command error: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Corrupt(msg) => write!(f, "corrupt data: {msg}"),
            Error::Unsupported(msg) => write!(f, "unsupported: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
