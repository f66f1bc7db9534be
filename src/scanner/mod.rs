/*!
# External Scanner

Context-sensitive tokens the regular lexer cannot express. The parse driver
calls the scanner first at every token position with the set of external
tokens the current automaton state accepts; a decline makes it fall back to
the grammar's literal and pattern tokens.

The scanner keeps no state of its own: everything it needs between calls is
carried in an explicit [`ScannerState`] value, so it can be called at any
offset in any order.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::language::tables::ValidExternals;

pub mod onescript;

pub use onescript::{OneScriptScanner, ONESCRIPT_SCANNER};

/// Сериализуемое состояние сканера, передаётся между вызовами
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScannerState(pub Vec<u8>);

impl ScannerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Result of one scanner call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Token {
        /// Index of the external token, in grammar declaration order.
        token: usize,
        length: usize,
        state: ScannerState,
        /// Bytes past `offset` the decision depended on.
        examined: usize,
    },
    Decline {
        examined: usize,
    },
}

impl ScanOutcome {
    pub fn examined(&self) -> usize {
        match self {
            ScanOutcome::Token { examined, .. } | ScanOutcome::Decline { examined } => *examined,
        }
    }
}

/// A scanner for the external tokens of one grammar.
pub trait ExternalScanner: Send + Sync + fmt::Debug {
    /// Number of external tokens the scanner produces.
    fn token_count(&self) -> usize;

    /// Tries to recognise an external token at `offset`.
    ///
    /// Must be deterministic: the outcome depends only on the arguments and
    /// on at most `examined` bytes of `input` after `offset`.
    fn scan(
        &self,
        input: &str,
        offset: usize,
        valid: ValidExternals,
        state: &ScannerState,
    ) -> ScanOutcome;
}
