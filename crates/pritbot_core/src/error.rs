use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Configuration-specific errors
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Configuration error in {config_path}")]
    #[diagnostic(
        code(pritbot_core::configuration_error),
        help("Expected {expected} for field '{field}'")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        expected: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Invalid roster: {reason}")]
    #[diagnostic(
        code(pritbot_core::invalid_roster),
        help("Member names are separated by commas and must not contain the summary marker")
    )]
    InvalidRoster { reason: String },

    #[error("Invalid time of day '{input}': {reason}")]
    #[diagnostic(
        code(pritbot_core::invalid_time),
        help("Use a 24-hour time such as 09:00 or 15:30:00")
    )]
    InvalidTime { input: String, reason: String },

    #[error("Invalid week {week} for ISO year {year}")]
    #[diagnostic(
        code(pritbot_core::invalid_week),
        help("ISO years have 52 or 53 weeks")
    )]
    InvalidWeek { year: i32, week: u32 },

    #[error("Invalid marker pattern '{pattern}'")]
    #[diagnostic(code(pritbot_core::invalid_marker))]
    InvalidMarker {
        pattern: String,
        #[source]
        cause: regex::Error,
    },

    #[error("Summary prefix '{prefix}' does not match the marker '{marker}'")]
    #[diagnostic(
        code(pritbot_core::prefix_without_marker),
        help("Generated events are only read back when their summary contains the marker")
    )]
    PrefixWithoutMarker { prefix: String, marker: String },

    #[error("Summary prefix '{prefix}' cannot be read back from generated events")]
    #[diagnostic(
        code(pritbot_core::unreadable_prefix),
        help("Choose another summary prefix")
    )]
    UnreadablePrefix { prefix: String },

    #[error("Calendar parse error on line {line}: {message}")]
    #[diagnostic(
        code(pritbot_core::calendar_parse),
        help("The feed must be RFC 5545 iCalendar text")
    )]
    CalendarParse { line: usize, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error("HTTP request to {url} failed")]
    #[diagnostic(code(pritbot_core::http))]
    Http {
        url: String,
        #[source]
        cause: reqwest::Error,
    },

    #[error("Unexpected response from {url}: {message}")]
    #[diagnostic(code(pritbot_core::unexpected_response))]
    UnexpectedResponse { url: String, message: String },
}

impl CoreError {
    pub fn invalid_roster(reason: impl Into<String>) -> Self {
        Self::InvalidRoster {
            reason: reason.into(),
        }
    }

    pub fn invalid_time(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTime {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn calendar_parse(line: usize, message: impl Into<String>) -> Self {
        Self::CalendarParse {
            line,
            message: message.into(),
        }
    }

    pub fn http(url: impl Into<String>, cause: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            cause,
        }
    }

    pub fn unexpected_response(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            url: url.into(),
            message: message.into(),
        }
    }
}
