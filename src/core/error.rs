use thiserror::Error;

/// Core error types for hanafw
///
/// Expected "absence" conditions (missing keys, unknown ports, no HANA
/// installed, unreadable socket tables) are never errors - they come back as
/// empty strings, `None` or empty lists at the call site. Only genuinely
/// unexpected conditions surface here.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed (unreadable services database, definitions
    /// directory or configuration file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A port field in a service definition expanded into an invalid
    /// regular expression
    #[error("invalid port pattern {pattern:?}: {source}")]
    PortPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
