//! Parser for text-based protocol commands.
use thiserror::Error;

/// An error occurring while splitting a protocol command into words.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The command contains fewer words than the parser was asked to parse.
    #[error("expected {expected} words, but only got {actual}")]
    NotEnoughWords { expected: usize, actual: usize },
}

/// Splits a protocol command into a fixed number of parsed words plus an
/// unparsed remainder.
///
/// Words are separated by runs of ASCII spaces. Runs before and between the
/// parsed words are merged, and the run directly following the last parsed
/// word is trimmed; separators inside the remainder are preserved verbatim.
///
/// Both the RPTL and the SER layer build their command parsing on this type:
/// a layer parses the words it owns and hands the remainder down unchanged.
#[derive(Debug)]
pub struct TextParser<'a> {
    parsed_words: Vec<&'a str>,
    unparsed_words: &'a str,
}

impl<'a> TextParser<'a> {
    /// Parses `expected_words` words out of `command`, leaving the rest
    /// unparsed.
    pub fn new(command: &'a str, expected_words: usize) -> Result<Self, ParseError> {
        let bytes = command.as_bytes();
        let mut parsed_words = Vec::with_capacity(expected_words);
        let mut cursor = 0;

        while parsed_words.len() < expected_words {
            while cursor < bytes.len() && bytes[cursor] == b' ' {
                cursor += 1;
            }

            let word_begin = cursor;
            while cursor < bytes.len() && bytes[cursor] != b' ' {
                cursor += 1;
            }

            if word_begin == cursor {
                return Err(ParseError::NotEnoughWords {
                    expected: expected_words,
                    actual: parsed_words.len(),
                });
            }

            parsed_words.push(&command[word_begin..cursor]);
        }

        // One separator run after the last parsed word is trimmed; what
        // follows belongs to the remainder untouched.
        while cursor < bytes.len() && bytes[cursor] == b' ' {
            cursor += 1;
        }

        Ok(Self {
            parsed_words,
            unparsed_words: &command[cursor..],
        })
    }

    /// Parsed word at given index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not correspond to any parsed word.
    pub fn word(&self, index: usize) -> &'a str {
        match self.parsed_words.get(index) {
            Some(word) => word,
            None => panic!(
                "tried to get parsed word {} but only has {}",
                index,
                self.parsed_words.len()
            ),
        }
    }

    /// Unparsed remainder of the command.
    pub fn unparsed(&self) -> &'a str {
        self.unparsed_words
    }
}
