pub mod alphabet;
pub mod ast;
pub mod error;
pub mod input;
pub mod parser;
pub mod service;
pub mod validator;

pub use ast::{Node, NodeId, NodeKind, Tree};
pub use error::{Error, ErrorKind};
pub use service::Service;
pub use validator::{ReferenceRule, ValidatorConfig};

/// Parse `pattern` and prove that every string back-reference in it always
/// has a value, using the default configuration.
pub fn validate_pattern(pattern: &str) -> Result<Tree, Error> {
    Service::new().validate(pattern)
}
