//! Error kinds surfaced by the synthesis pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported to the command line driver.
///
/// Internal invariant violations (an ISOP cover disagreeing with its input,
/// a winning vertex without an admissible controller choice, ...) are
/// assertion failures, not `Error` values: they cannot be triggered by
/// well-formed input.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed automaton: bad ids, mixed priority styles, non-parity
    /// acceptance, dangling successors
    #[error("invalid automaton{}: {msg}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    Input {
        /// Problem description
        msg: String,
        /// 1-based input line, when known
        line: Option<usize>,
    },

    /// Incompatible flag combination, rejected before any work happens
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Temp file creation, external command or AIGER read/write failure
    #[error("resource error on {what}: {msg}")]
    Resource {
        /// The failing path or command
        what: String,
        /// Underlying failure
        msg: String,
    },
}

impl Error {
    /// Input error without location information
    pub fn input(msg: impl Into<String>) -> Error {
        Error::Input {
            msg: msg.into(),
            line: None,
        }
    }

    /// Input error at a 1-based line of the automaton file
    pub fn input_at(line: usize, msg: impl Into<String>) -> Error {
        Error::Input {
            msg: msg.into(),
            line: Some(line),
        }
    }

    /// Resource error for a file path
    pub fn resource(path: &PathBuf, msg: impl ToString) -> Error {
        Error::Resource {
            what: path.display().to_string(),
            msg: msg.to_string(),
        }
    }

    /// Resource error for an external command
    pub fn command(cmd: impl Into<String>, msg: impl ToString) -> Error {
        Error::Resource {
            what: cmd.into(),
            msg: msg.to_string(),
        }
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;
