use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComplianceError>;

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("invalid policy pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
