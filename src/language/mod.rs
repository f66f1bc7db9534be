/*!
# Compiled Language Descriptor

An immutable bundle of everything a parser needs for one language: the
generated [`LanguageTables`], the compiled lexical rules and a reference to
the external scanner. Built once, then shared read-only between any number
of parsers and threads.

```ignore
let language = onescript_syntax::language();
assert_eq!(language.version(), onescript_syntax::LANGUAGE_VERSION);
let if_kind = language.symbol_for_name("if_statement", true);
```
*/

use std::fmt;

use crate::core::LanguageError;
use crate::parser::lexer::CompiledLexer;
use crate::scanner::ExternalScanner;

pub mod tables;

pub use tables::{
    Action, FieldId, LanguageTables, ProductionId, ProductionInfo, StateId, SymbolId, SymbolInfo,
    SymbolKind, ValidExternals, END_SYMBOL, ERROR_SYMBOL, LANGUAGE_VERSION,
};

/// Имя узла ошибки в деревьях разбора
pub const ERROR_NAME: &str = "ERROR";

pub struct Language {
    tables: LanguageTables,
    scanner: &'static dyn ExternalScanner,
    lexer: CompiledLexer,
    start_symbol: SymbolId,
    /// Состояния, в которых допустимо хотя бы одно ключевое слово
    accepts_keywords: Vec<bool>,
}

impl Language {
    /// Validates `tables` and compiles the lexical rules.
    pub fn new(
        tables: LanguageTables,
        scanner: &'static dyn ExternalScanner,
    ) -> Result<Self, LanguageError> {
        tables.validate()?;
        if scanner.token_count() != tables.lexical.externals.len() {
            return Err(LanguageError::Inconsistent(format!(
                "scanner produces {} external tokens, grammar declares {}",
                scanner.token_count(),
                tables.lexical.externals.len()
            )));
        }
        let lexer = CompiledLexer::compile(&tables.lexical)?;
        let start_symbol = find_start_symbol(&tables).ok_or_else(|| {
            LanguageError::Inconsistent("no accepting state for a start symbol".to_string())
        })?;

        let accepts_keywords = (0..tables.state_count as StateId)
            .map(|state| {
                lexer
                    .keyword_symbols()
                    .iter()
                    .any(|&keyword| tables.action(state, keyword) != Action::Error)
            })
            .collect();

        Ok(Self {
            tables,
            scanner,
            lexer,
            start_symbol,
            accepts_keywords,
        })
    }

    /// Loads a serialized artifact; fails on a layout version mismatch.
    pub fn from_bytes(
        bytes: &[u8],
        scanner: &'static dyn ExternalScanner,
    ) -> Result<Self, LanguageError> {
        Self::new(LanguageTables::from_bytes(bytes)?, scanner)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LanguageError> {
        self.tables.to_bytes()
    }

    pub fn version(&self) -> u32 {
        self.tables.version
    }

    pub fn name(&self) -> &str {
        &self.tables.name
    }

    pub fn tables(&self) -> &LanguageTables {
        &self.tables
    }

    pub fn scanner(&self) -> &'static dyn ExternalScanner {
        self.scanner
    }

    /// Number of symbols including alias-only node kinds.
    pub fn symbol_count(&self) -> usize {
        self.tables.symbols.len()
    }

    pub fn state_count(&self) -> usize {
        self.tables.state_count
    }

    pub fn field_count(&self) -> usize {
        self.tables.fields.len()
    }

    pub fn symbol_info(&self, symbol: SymbolId) -> Option<&SymbolInfo> {
        self.tables.symbols.get(symbol as usize)
    }

    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        if symbol == ERROR_SYMBOL {
            return ERROR_NAME;
        }
        self.symbol_info(symbol).map_or("", |info| info.name.as_str())
    }

    /// Canonical node kind of `symbol`.
    pub fn public_symbol(&self, symbol: SymbolId) -> SymbolId {
        self.symbol_info(symbol).map_or(symbol, |info| info.public)
    }

    /// Id of the visible node kind with this name.
    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<SymbolId> {
        if name == ERROR_NAME && named {
            return Some(ERROR_SYMBOL);
        }
        self.tables
            .symbols
            .iter()
            .position(|s| s.visible && s.named == named && s.name == name)
            .map(|id| self.tables.symbols[id].public)
    }

    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        self.tables.fields.get(field as usize).map(String::as_str)
    }

    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.tables
            .fields
            .iter()
            .position(|f| f == name)
            .map(|id| id as FieldId)
    }

    pub fn start_symbol(&self) -> SymbolId {
        self.start_symbol
    }

    pub fn action(&self, state: StateId, symbol: SymbolId) -> Action {
        self.tables.action(state, symbol)
    }

    pub fn goto(&self, state: StateId, symbol: SymbolId) -> Option<StateId> {
        match self.tables.action(state, symbol) {
            Action::Goto(next) => Some(next),
            _ => None,
        }
    }

    /// External tokens valid in `state`.
    pub fn lex_mode(&self, state: StateId) -> ValidExternals {
        self.tables
            .lex_modes
            .get(state as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn production(&self, production: ProductionId) -> Option<&ProductionInfo> {
        self.tables.productions.get(production as usize)
    }

    /// Alias of the `index`-th structural child of `production`.
    pub fn alias_at(&self, production: ProductionId, index: usize) -> Option<SymbolId> {
        let sequence = self.production(production)?.alias_sequence?;
        self.tables
            .alias_sequences
            .get(sequence as usize)
            .and_then(|aliases| aliases.get(index).copied().flatten())
    }

    pub(crate) fn lexer(&self) -> &CompiledLexer {
        &self.lexer
    }

    pub(crate) fn accepts_keywords(&self, state: StateId) -> bool {
        self.accepts_keywords
            .get(state as usize)
            .copied()
            .unwrap_or(false)
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.tables.name)
            .field("version", &self.tables.version)
            .field("symbols", &self.tables.symbols.len())
            .field("states", &self.tables.state_count)
            .field("scanner", &self.scanner)
            .finish()
    }
}

/// The nonterminal whose goto from state 0 accepts at end of input.
fn find_start_symbol(tables: &LanguageTables) -> Option<SymbolId> {
    (tables.terminal_count..tables.table_symbol_count)
        .map(|id| id as SymbolId)
        .find(|&symbol| match tables.action(0, symbol) {
            Action::Goto(next) => tables.action(next, END_SYMBOL) == Action::Accept,
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ONESCRIPT_SCANNER;

    #[derive(Debug)]
    struct NoExternals;

    impl ExternalScanner for NoExternals {
        fn token_count(&self) -> usize {
            0
        }

        fn scan(
            &self,
            _input: &str,
            _offset: usize,
            _valid: ValidExternals,
            _state: &crate::scanner::ScannerState,
        ) -> crate::scanner::ScanOutcome {
            crate::scanner::ScanOutcome::Decline { examined: 0 }
        }
    }

    static NO_EXTERNALS: NoExternals = NoExternals;

    #[test]
    fn test_lookups() {
        let language = crate::language();
        assert_eq!(language.name(), "onescript");
        let if_statement = language.symbol_for_name("if_statement", true).unwrap();
        assert_eq!(language.symbol_name(if_statement), "if_statement");
        assert_eq!(language.symbol_name(ERROR_SYMBOL), "ERROR");
        let condition = language.field_id_for_name("condition").unwrap();
        assert_eq!(language.field_name(condition), Some("condition"));
        assert_eq!(language.symbol_name(language.start_symbol()), "source_file");
    }

    #[test]
    fn test_aliases_collapse_onto_one_kind() {
        let language = crate::language();
        for id in 0..language.symbol_count() as SymbolId {
            let public = language.public_symbol(id);
            assert_eq!(language.public_symbol(public), public);
        }
        // code_region is reported as region
        let region = language.symbol_for_name("region", true).unwrap();
        let code_region = language
            .tables()
            .symbols
            .iter()
            .position(|s| s.name == "code_region")
            .unwrap() as SymbolId;
        assert_ne!(region, code_region);
        let aliased = language
            .tables()
            .productions
            .iter()
            .enumerate()
            .flat_map(|(p, info)| {
                info.rhs
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| **s == code_region)
                    .map(move |(i, _)| (p as ProductionId, i))
            })
            .filter_map(|(p, i)| language.alias_at(p, i))
            .collect::<Vec<_>>();
        assert!(!aliased.is_empty());
        assert!(aliased.iter().all(|&a| language.public_symbol(a) == region));
    }

    #[test]
    fn test_scanner_token_count_must_match() {
        let tables = crate::language().tables().clone();
        match Language::new(tables, &NO_EXTERNALS) {
            Err(LanguageError::Inconsistent(msg)) => assert!(msg.contains("external")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_artifact_round_trip() {
        let language = crate::language();
        let bytes = language.to_bytes().unwrap();
        let loaded = Language::from_bytes(&bytes, &ONESCRIPT_SCANNER).unwrap();
        assert_eq!(loaded.tables(), language.tables());
        assert_eq!(loaded.start_symbol(), language.start_symbol());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut tables = crate::language().tables().clone();
        tables.version = LANGUAGE_VERSION + 1;
        assert!(matches!(
            Language::new(tables, &ONESCRIPT_SCANNER),
            Err(LanguageError::VersionMismatch { .. })
        ));
    }
}
