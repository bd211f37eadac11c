/// The three disjoint classes of characters a pattern may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Letter,
    Digit,
    Operator,
}

const OPERATORS: [char; 7] = ['(', ')', '|', '*', '?', ':', '\\'];

/// Membership tables for the pattern alphabet.
///
/// Built once and handed to the parser; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct Alphabet {
    letters: Vec<char>,
    digits: Vec<char>,
    operators: Vec<char>,
}

impl Alphabet {
    pub fn new() -> Self {
        Self {
            letters: ('a'..='z').collect(),
            digits: ('1'..='9').collect(),
            operators: OPERATORS.to_vec(),
        }
    }

    pub fn classify(&self, ch: char) -> Option<CharClass> {
        if self.letters.contains(&ch) {
            Some(CharClass::Letter)
        } else if self.digits.contains(&ch) {
            Some(CharClass::Digit)
        } else if self.operators.contains(&ch) {
            Some(CharClass::Operator)
        } else {
            None
        }
    }

    pub fn contains(&self, ch: char) -> bool {
        self.classify(ch).is_some()
    }

    pub fn is_letter(&self, ch: char) -> bool {
        self.classify(ch) == Some(CharClass::Letter)
    }

    /// Returns the numeric value of a group digit (`1`..=`9`).
    pub fn digit_value(&self, ch: char) -> Option<u8> {
        match self.classify(ch) {
            Some(CharClass::Digit) => ch.to_digit(10).map(|d| d as u8),
            _ => None,
        }
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::new()
    }
}
