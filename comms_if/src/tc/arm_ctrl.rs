//! # Arm control telecommand words
//!
//! Motion commands carry a list of axis words such as `X10.5` or `W-90`: a
//! single letter followed by a decimal number.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::TcParseError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One `<letter><value>` word of a motion command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisWord {
    /// The axis letter, compared case sensitively.
    pub letter: char,

    /// The value, degrees for joint words, millimetres or degrees for
    /// cartesian words.
    pub value: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AxisWord {
    pub fn new(letter: char, value: f64) -> Self {
        Self { letter, value }
    }

    /// Parse a single word token.
    pub fn parse(token: &str) -> Result<Self, TcParseError> {
        let invalid = || TcParseError::InvalidToken(token.to_string());

        let mut chars = token.chars();
        let letter = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => c,
            _ => return Err(invalid()),
        };

        let value: f64 = chars.as_str().parse().map_err(|_| invalid())?;

        if !value.is_finite() {
            return Err(invalid());
        }

        Ok(Self { letter, value })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse all remaining tokens of a motion command into axis words.
pub fn parse_axis_words<'a, I>(tokens: I) -> Result<Vec<AxisWord>, TcParseError>
where
    I: Iterator<Item = &'a str>,
{
    tokens.map(AxisWord::parse).collect()
}

/// Find the last word for the given letter.
///
/// G-code allows a letter to be repeated, the last occurence wins.
pub fn find_word(words: &[AxisWord], letter: char) -> Option<f64> {
    words.iter().rev().find(|w| w.letter == letter).map(|w| w.value)
}

/// Format a motion command line from its keyword and words.
///
/// Values use the shortest representation which parses back to the same
/// `f64`, so a formatted line always round trips.
pub fn format_axis_words(keyword: &str, words: &[AxisWord]) -> String {
    let mut line = String::from(keyword);

    for w in words {
        line.push(' ');
        line.push(w.letter);
        line.push_str(&w.value.to_string());
    }

    line
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_find_word() {
        let words = vec![
            AxisWord::new('X', 1.0),
            AxisWord::new('Y', 2.0),
            AxisWord::new('X', 3.0),
        ];
        assert_eq!(find_word(&words, 'X'), Some(3.0));
        assert_eq!(find_word(&words, 'Y'), Some(2.0));
        assert_eq!(find_word(&words, 'Z'), None);
    }

    #[test]
    fn test_format_exact() {
        let v = 89.99999999999997f64;
        let line = format_axis_words("G0", &[AxisWord::new('X', v)]);
        let word = AxisWord::parse(line.split_whitespace().nth(1).unwrap()).unwrap();
        assert_eq!(word.value.to_bits(), v.to_bits());
    }
}
