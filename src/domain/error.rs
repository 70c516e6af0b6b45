use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Comment cannot be empty")]
    EmptyContent,

    #[error("Required field missing: {0}")]
    MissingField(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
