use crate::alphabet::Alphabet;
use crate::ast::Tree;
use crate::error::Error;
use crate::parser::Parser;
use crate::validator::{Validator, ValidatorConfig};

/// Parser and back-reference validator behind one entry point.
#[derive(Debug, Clone, Default)]
pub struct Service {
    alphabet: Alphabet,
    validator: Validator,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ValidatorConfig) -> Self {
        Self {
            alphabet: Alphabet::new(),
            validator: Validator::new(config),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        self.validator.config()
    }

    /// Syntax checks only.
    pub fn parse(&self, pattern: &str) -> Result<Tree, Error> {
        Parser::new(&self.alphabet, pattern).parse()
    }

    /// Parses `pattern` and checks its string back-references. The tree is
    /// only returned when both stages accept.
    pub fn validate(&self, pattern: &str) -> Result<Tree, Error> {
        let tree = self.parse(pattern)?;
        self.validator.validate(&tree)?;
        Ok(tree)
    }
}
