use crate::job;

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid job id pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("invalid job id in `{key}`: {source}")]
    InvalidJobID {
        key: &'static str,
        #[source]
        source: job::Error,
    },
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
