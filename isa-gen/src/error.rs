//! Error types shared by the TableGen parser and the byte-trie builder.

use thiserror::Error;

/// A fatal failure while parsing a TableGen text dump.
///
/// Parsing is all-or-nothing: a single malformed record aborts the whole
/// parse, so this always carries enough context to point a user at the
/// offending position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tablegen parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        ParseError {
            line,
            column,
            message: message.into(),
        }
    }
}

/// A non-fatal failure to recover an operand's bit-field layout.
///
/// Collected in [`crate::isa::IsaDescriptor::errors`] rather than aborting
/// the ISA filter pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorError {
    pub mnemonic: String,
    pub operand: String,
    pub reason: String,
}

/// A fatal failure to build a [`crate::trie::ByteTrie`] because two or more
/// patterns are indistinguishable from each other.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("ambiguous byte-trie patterns at byte depth {depth}: {tags:?} cannot be distinguished")]
pub struct TrieError {
    pub depth: usize,
    pub tags: Vec<String>,
}

/// Errors surfaced while assembling a [`crate::isa::IsaDescriptor`] and
/// [`crate::trie::ByteTrie`] into a runtime [`crate::runtime::GeneratedIsa`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Trie(#[from] TrieError),
}
