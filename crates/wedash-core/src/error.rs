use std::io;

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    IOError(#[from] io::Error),

    #[error("empty command")]
    EmptyCommand,

    #[error("command not found: {program}")]
    CommandNotFound { program: String },

    #[error("cannot spawn `{argv}`: {source}")]
    SpawnFailure {
        argv: String,
        #[source]
        source: io::Error,
    },

    #[error("`{argv}` cancelled before it started")]
    Cancelled { argv: String },

    #[error("status of {unit} unavailable: {reason}")]
    ProbeUnavailable { unit: String, reason: String },

    #[error("{action} not supported: missing build-script target")]
    UnsupportedAction { action: &'static str },

    #[error("service list changed, select the service again")]
    StaleTarget,
}
