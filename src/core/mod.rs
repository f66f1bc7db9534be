/*!
# Core Module

Shared building blocks: error types, source positions and BOM-aware file
reading.
*/

pub mod errors;
pub mod fs_utils;
pub mod position;

pub use errors::{
    Conflict, ConflictKind, GenerateError, GrammarError, LanguageError, ParseError,
};
pub use fs_utils::{read_source_file, SOURCE_EXTENSIONS};
pub use position::{LineIndex, Position, Span};
