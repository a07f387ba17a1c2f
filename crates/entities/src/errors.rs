use searchads_core_types::AdsError;
use thiserror::Error;

/// Why a page's ad markup was rejected. Any of these drops the whole document.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unexpected product property: {0}")]
    UnexpectedProductProperty(String),
    #[error("product declares creatives more than once")]
    DuplicateCreatives,
    #[error("creatives property does not hold entities (got {0})")]
    CreativesNotEntities(&'static str),
    #[error("search result ad attributes list is empty")]
    EmptyCreatives,
    #[error("wrong search result ad type specified: {0}")]
    WrongAdType(String),
    #[error("wrong search result ad attribute specified: {0}")]
    UnknownAttribute(String),
    #[error("search result ad attribute specified twice: {0}")]
    DuplicateAttribute(&'static str),
    #[error("cannot read search result ad attribute value: {0}")]
    InvalidValue(&'static str),
    #[error("some of search result ad attributes were not specified: {}", .0.join(", "))]
    MissingAttributes(Vec<&'static str>),
}

impl From<ValidationError> for AdsError {
    fn from(value: ValidationError) -> Self {
        AdsError::new(value.to_string())
    }
}
