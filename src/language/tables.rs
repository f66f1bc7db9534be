//! Serializable tables of a compiled language.
//!
//! Layout changes must bump [`LANGUAGE_VERSION`]: artifacts and parsers check
//! it before touching anything else.

use serde::{Deserialize, Serialize};

use crate::core::LanguageError;

/// Version of the table layout.
pub const LANGUAGE_VERSION: u32 = 3;

/// Magic prefix of a serialized artifact.
pub const ARTIFACT_MAGIC: &[u8; 4] = b"OSLT";

pub type SymbolId = u16;
pub type StateId = u32;
pub type ProductionId = u32;
pub type FieldId = u16;

/// End of input is always symbol 0.
pub const END_SYMBOL: SymbolId = 0;
/// Kind of ERROR nodes; never stored in the tables.
pub const ERROR_SYMBOL: SymbolId = SymbolId::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolKind {
    Terminal,
    Nonterminal,
    /// Generated helper rule (repetitions); always hidden.
    Auxiliary,
    /// Node kind that exists only as the target of an alias.
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    pub named: bool,
    pub visible: bool,
    pub extra: bool,
    pub external: bool,
    /// Canonical node kind this symbol is reported as.
    pub public: SymbolId,
}

/// Parse action for a `(state, symbol)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Error,
    Shift(StateId),
    Reduce(ProductionId),
    Goto(StateId),
    Accept,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionInfo {
    pub lhs: SymbolId,
    pub rhs: Vec<SymbolId>,
    /// Field of each structural child.
    pub fields: Vec<Option<FieldId>>,
    /// Index into [`LanguageTables::alias_sequences`].
    pub alias_sequence: Option<u32>,
    pub precedence: i32,
    pub dynamic_precedence: i32,
}

impl ProductionInfo {
    pub fn child_count(&self) -> usize {
        self.rhs.len()
    }
}

/// Множество внешних токенов, допустимых в состоянии автомата
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidExternals(pub u64);

impl ValidExternals {
    pub fn all(count: usize) -> Self {
        if count >= 64 {
            ValidExternals(u64::MAX)
        } else {
            ValidExternals((1u64 << count) - 1)
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        index < 64 && self.0 & (1u64 << index) != 0
    }

    pub fn insert(&mut self, index: usize) {
        if index < 64 {
            self.0 |= 1u64 << index;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Everything the run-time lexer needs, independent of parse states.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalTable {
    /// Literal tokens sorted by text.
    pub literals: Vec<(String, SymbolId)>,
    /// Regular-expression tokens in symbol order.
    pub patterns: Vec<(String, SymbolId)>,
    /// Case-folded keyword spellings sorted by text.
    pub keywords: Vec<(String, SymbolId)>,
    pub word: Option<SymbolId>,
    pub extras: Vec<SymbolId>,
    /// `(token, immediate twin)` pairs.
    pub immediate_twins: Vec<(SymbolId, SymbolId)>,
    /// Symbol of each external token, by scanner index.
    pub externals: Vec<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTables {
    pub version: u32,
    pub name: String,
    pub symbols: Vec<SymbolInfo>,
    pub terminal_count: usize,
    /// Terminals plus nonterminals; the width of the action table.
    pub table_symbol_count: usize,
    pub fields: Vec<String>,
    pub productions: Vec<ProductionInfo>,
    pub alias_sequences: Vec<Vec<Option<SymbolId>>>,
    pub state_count: usize,
    /// Dense `state_count * table_symbol_count` matrix.
    pub actions: Vec<Action>,
    pub lex_modes: Vec<ValidExternals>,
    pub lexical: LexicalTable,
}

impl LanguageTables {
    pub fn action(&self, state: StateId, symbol: SymbolId) -> Action {
        let symbol = symbol as usize;
        if symbol >= self.table_symbol_count {
            return Action::Error;
        }
        self.actions
            .get(state as usize * self.table_symbol_count + symbol)
            .copied()
            .unwrap_or(Action::Error)
    }

    pub fn is_terminal(&self, symbol: SymbolId) -> bool {
        (symbol as usize) < self.terminal_count
    }

    /// Serializes the tables into a versioned artifact.
    pub fn to_bytes(&self) -> Result<Vec<u8>, LanguageError> {
        let body =
            bincode::serialize(self).map_err(|e| LanguageError::InvalidArtifact(e.to_string()))?;
        let mut bytes = Vec::with_capacity(body.len() + 8);
        bytes.extend_from_slice(ARTIFACT_MAGIC);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Reads an artifact; the version is checked before the body is decoded.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LanguageError> {
        if bytes.len() < 8 || &bytes[..4] != ARTIFACT_MAGIC {
            return Err(LanguageError::InvalidArtifact(
                "missing artifact header".to_string(),
            ));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let found = u32::from_le_bytes(version);
        if found != LANGUAGE_VERSION {
            return Err(LanguageError::VersionMismatch {
                expected: LANGUAGE_VERSION,
                found,
            });
        }
        let tables: LanguageTables = bincode::deserialize(&bytes[8..])
            .map_err(|e| LanguageError::InvalidArtifact(e.to_string()))?;
        if tables.version != found {
            return Err(LanguageError::InvalidArtifact(
                "header and body versions differ".to_string(),
            ));
        }
        Ok(tables)
    }

    /// Checks the structural invariants the runtime relies on.
    pub fn validate(&self) -> Result<(), LanguageError> {
        let fail = |msg: String| Err(LanguageError::Inconsistent(msg));

        if self.version != LANGUAGE_VERSION {
            return Err(LanguageError::VersionMismatch {
                expected: LANGUAGE_VERSION,
                found: self.version,
            });
        }
        if self.symbols.len() > ERROR_SYMBOL as usize {
            return fail(format!("{} symbols do not fit the id range", self.symbols.len()));
        }
        if self.terminal_count == 0 || self.table_symbol_count > self.symbols.len() {
            return fail("symbol counts out of range".to_string());
        }
        if self.actions.len() != self.state_count * self.table_symbol_count
            || self.lex_modes.len() != self.state_count
        {
            return fail("action table dimensions do not match the state count".to_string());
        }

        // Ids are dense: terminals, then nonterminals, then alias-only kinds.
        for (id, symbol) in self.symbols.iter().enumerate() {
            let expected_terminal = id < self.terminal_count;
            let in_table = id < self.table_symbol_count;
            let ok = match symbol.kind {
                SymbolKind::Terminal => expected_terminal,
                SymbolKind::Nonterminal | SymbolKind::Auxiliary => !expected_terminal && in_table,
                SymbolKind::Alias => !in_table,
            };
            if !ok {
                return fail(format!("symbol {} `{}` is out of order", id, symbol.name));
            }
            let public = symbol.public as usize;
            match self.symbols.get(public) {
                Some(canonical) if canonical.public == symbol.public => {}
                _ => {
                    return fail(format!(
                        "symbol `{}` does not collapse onto a canonical kind",
                        symbol.name
                    ))
                }
            }
        }

        for (index, production) in self.productions.iter().enumerate() {
            let lhs = production.lhs as usize;
            if lhs < self.terminal_count || lhs >= self.table_symbol_count {
                return fail(format!("production {} has a non-nonterminal lhs", index));
            }
            if production.fields.len() != production.child_count() {
                return fail(format!("production {} field map has a wrong length", index));
            }
            if let Some(seq) = production.alias_sequence {
                match self.alias_sequences.get(seq as usize) {
                    Some(aliases) if aliases.len() == production.child_count() => {}
                    _ => return fail(format!("production {} alias sequence is invalid", index)),
                }
            }
            if production.rhs.iter().any(|&s| s as usize >= self.table_symbol_count) {
                return fail(format!("production {} references an unknown symbol", index));
            }
            if production
                .fields
                .iter()
                .flatten()
                .any(|&f| f as usize >= self.fields.len())
            {
                return fail(format!("production {} references an unknown field", index));
            }
        }

        for (index, action) in self.actions.iter().enumerate() {
            let symbol = index % self.table_symbol_count;
            let terminal = symbol < self.terminal_count;
            let ok = match *action {
                Action::Error => true,
                Action::Shift(s) => terminal && (s as usize) < self.state_count,
                Action::Goto(s) => !terminal && (s as usize) < self.state_count,
                Action::Reduce(p) => terminal && (p as usize) < self.productions.len(),
                Action::Accept => symbol == END_SYMBOL as usize,
            };
            if !ok {
                return fail(format!(
                    "invalid action {:?} in state {} for symbol {}",
                    action,
                    index / self.table_symbol_count,
                    symbol
                ));
            }
        }

        let lexical = &self.lexical;
        let all_lexical = lexical
            .literals
            .iter()
            .chain(&lexical.patterns)
            .chain(&lexical.keywords)
            .map(|(_, s)| *s)
            .chain(lexical.word)
            .chain(lexical.extras.iter().copied())
            .chain(lexical.externals.iter().copied())
            .chain(lexical.immediate_twins.iter().flat_map(|(a, b)| [*a, *b]));
        for symbol in all_lexical {
            if !self.is_terminal(symbol) || symbol == END_SYMBOL {
                return fail(format!("lexical table references non-terminal {}", symbol));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_externals() {
        let mut set = ValidExternals::default();
        assert!(set.is_empty());
        set.insert(2);
        assert!(set.contains(2));
        assert!(!set.contains(1));
        assert!(ValidExternals::all(4).contains(3));
        assert!(!ValidExternals::all(4).contains(4));
        assert!(ValidExternals::all(64).contains(63));
    }

    #[test]
    fn test_header_checked_before_body() {
        let mut bytes = ARTIFACT_MAGIC.to_vec();
        bytes.extend_from_slice(&(LANGUAGE_VERSION + 1).to_le_bytes());
        bytes.extend_from_slice(b"garbage");
        match LanguageTables::from_bytes(&bytes) {
            Err(LanguageError::VersionMismatch { found, .. }) => {
                assert_eq!(found, LANGUAGE_VERSION + 1)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            LanguageTables::from_bytes(b"nope"),
            Err(LanguageError::InvalidArtifact(_))
        ));
    }
}
