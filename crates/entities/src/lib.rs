pub mod ad;
pub mod attributes;
pub mod document;
pub mod errors;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod validator;

pub use ad::{AdRecord, Conversion, TabAdMap};
pub use attributes::AdAttribute;
pub use document::{Entity, Property, PropertyValues, WebPage};
pub use errors::ValidationError;
pub use validator::{parse_web_page, validate};
