/*!
# Run-time lexer

Produces one [`Lexeme`] at a time: the extras before a token, the token
itself and everything the parse driver needs to reuse or re-check it later
(lexical mode, scanner states, how far the decision looked ahead).

At each position the external scanner is tried first with the valid
external tokens of the current state; on decline the grammar's literals and
patterns compete by longest match, literals winning ties. Matches of the
word token are looked up in the case-folded keyword table.
*/

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

use super::subtree::{Subtree, SubtreeRef};
use crate::core::LanguageError;
use crate::grammar::fold_case;
use crate::language::tables::{
    LexicalTable, StateId, SymbolId, ValidExternals, END_SYMBOL, ERROR_SYMBOL,
};
use crate::language::Language;
use crate::scanner::{ScanOutcome, ScannerState};

/// Upper bound on how far past a regular token the matchers look.
const REGULAR_LOOKAHEAD: usize = 8;

/// Lexical rules compiled once per language.
#[derive(Debug)]
pub(crate) struct CompiledLexer {
    literals: Vec<(String, SymbolId)>,
    patterns: Vec<(Regex, SymbolId)>,
    keywords: HashMap<String, SymbolId>,
    keyword_symbols: Vec<SymbolId>,
    word: Option<SymbolId>,
    extras: Vec<SymbolId>,
    twins: HashMap<SymbolId, SymbolId>,
    externals: Vec<SymbolId>,
}

impl CompiledLexer {
    pub fn compile(table: &LexicalTable) -> Result<Self, LanguageError> {
        let patterns = table
            .patterns
            .iter()
            .map(|(pattern, symbol)| {
                Regex::new(&format!("^(?:{})", pattern))
                    .map(|regex| (regex, *symbol))
                    .map_err(|source| LanguageError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut keyword_symbols: Vec<SymbolId> = table.keywords.iter().map(|(_, s)| *s).collect();
        keyword_symbols.sort_unstable();
        keyword_symbols.dedup();

        Ok(Self {
            literals: table.literals.clone(),
            patterns,
            keywords: table.keywords.iter().cloned().collect(),
            keyword_symbols,
            word: table.word,
            extras: table.extras.clone(),
            twins: table.immediate_twins.iter().copied().collect(),
            externals: table.externals.clone(),
        })
    }

    pub fn is_extra(&self, symbol: SymbolId) -> bool {
        self.extras.binary_search(&symbol).is_ok()
    }

    pub fn is_keyword(&self, symbol: SymbolId) -> bool {
        self.keyword_symbols.binary_search(&symbol).is_ok()
    }

    pub fn keyword_symbols(&self) -> &[SymbolId] {
        &self.keyword_symbols
    }

    pub fn twin(&self, symbol: SymbolId) -> Option<SymbolId> {
        self.twins.get(&symbol).copied()
    }

    pub fn is_twin(&self, symbol: SymbolId) -> bool {
        self.twins.values().any(|&t| t == symbol)
    }

    pub fn word(&self) -> Option<SymbolId> {
        self.word
    }

    /// Longest literal or pattern match at the start of `rest`.
    fn match_regular(&self, rest: &str) -> Option<(SymbolId, usize)> {
        let mut best: Option<(SymbolId, usize)> = None;
        for (text, symbol) in &self.literals {
            if rest.starts_with(text.as_str()) && best.map_or(true, |(_, len)| text.len() > len) {
                best = Some((*symbol, text.len()));
            }
        }
        for (regex, symbol) in &self.patterns {
            if let Some(m) = regex.find(rest) {
                if m.end() > 0 && best.map_or(true, |(_, len)| m.end() > len) {
                    best = Some((*symbol, m.end()));
                }
            }
        }
        best
    }
}

/// A token together with the extras lexed before it.
#[derive(Debug, Clone)]
pub(crate) struct Lexeme {
    /// Where lexing started (before the extras).
    pub start: usize,
    pub extras: Vec<SubtreeRef>,
    /// Start of the token's padding.
    pub token_start: usize,
    pub raw: SymbolId,
    /// Word token to fall back to when `raw` is a keyword.
    pub word: Option<SymbolId>,
    pub padding: usize,
    pub size: usize,
    pub examined_end: usize,
    pub mode: ValidExternals,
    pub scanner_before: ScannerState,
    pub scanner_after: ScannerState,
    /// Lexed on demand at the top of the stack rather than ahead of it
    /// during error recovery.
    pub fresh: bool,
    pub missing: bool,
    /// Symbol resolved for the current parse state.
    pub symbol: Option<SymbolId>,
}

impl Lexeme {
    pub fn content_start(&self) -> usize {
        self.token_start + self.padding
    }

    pub fn end(&self) -> usize {
        self.content_start() + self.size
    }

    /// No whitespace or extras between this token and the previous one.
    pub fn adjacent(&self) -> bool {
        self.extras.is_empty() && self.padding == 0
    }

    /// Zero-width MISSING token at `position`.
    pub fn missing(symbol: SymbolId, position: usize, mode: ValidExternals) -> Self {
        Self {
            start: position,
            extras: Vec::new(),
            token_start: position,
            raw: symbol,
            word: None,
            padding: 0,
            size: 0,
            examined_end: position,
            mode,
            scanner_before: ScannerState::default(),
            scanner_after: ScannerState::default(),
            fresh: false,
            missing: true,
            symbol: Some(symbol),
        }
    }

    pub fn is_reusable_lookahead(&self) -> bool {
        self.fresh && !self.missing && self.raw != ERROR_SYMBOL
    }

    /// Leaf for the token, shifted in `state`.
    pub fn to_leaf(&self, symbol: SymbolId, state: StateId) -> Subtree {
        let mut leaf = Subtree::leaf(symbol, self.raw, self.padding, self.size);
        leaf.parse_state = state;
        leaf.lookahead_bytes = self.examined_end.saturating_sub(self.end());
        leaf.lex_mode = self.mode;
        leaf.scanner_before = self.scanner_before.clone();
        leaf.scanner_after = self.scanner_after.clone();
        leaf.flags.missing = self.missing;
        leaf.flags.error = self.raw == ERROR_SYMBOL;
        leaf.flags.fragile = !self.missing && !self.fresh;
        leaf
    }
}

fn is_blank(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Lexes the next token at `position`.
pub(crate) fn lex(
    language: &Language,
    input: &str,
    position: usize,
    mode: ValidExternals,
    scanner_state: &ScannerState,
) -> Lexeme {
    let lexer = language.lexer();
    let mut extras: Vec<SubtreeRef> = Vec::new();
    let mut pos = position;
    let mut examined_end = position;
    let mut state = scanner_state.clone();

    loop {
        let rest = input.get(pos..).unwrap_or("");
        let padding = rest.len() - rest.trim_start_matches(is_blank).len();
        let start = pos + padding;
        let scanner_before = state.clone();

        let mut token: Option<(SymbolId, usize)> = None;
        if start >= input.len() {
            token = Some((END_SYMBOL, 0));
        } else if !mode.is_empty() {
            let outcome = language.scanner().scan(input, start, mode, &state);
            examined_end = examined_end.max(start + outcome.examined());
            if let ScanOutcome::Token {
                token: index,
                length,
                state: next,
                ..
            } = outcome
            {
                if let Some(&symbol) = lexer.externals.get(index) {
                    if length > 0 {
                        token = Some((symbol, length));
                        state = next;
                    }
                }
            }
        }

        let rest = &input[start..];
        let (symbol, length) = match token {
            Some(found) => found,
            None => match lexer.match_regular(rest) {
                Some(found) => {
                    examined_end = examined_end.max((start + found.1 + REGULAR_LOOKAHEAD).min(input.len()));
                    found
                }
                None => {
                    // Неизвестный символ становится листом ошибки
                    let length = rest.chars().next().map_or(1, char::len_utf8);
                    examined_end = examined_end.max(start + length);
                    (ERROR_SYMBOL, length)
                }
            },
        };

        if symbol != END_SYMBOL && lexer.is_extra(symbol) {
            let mut leaf = Subtree::leaf(symbol, symbol, padding, length);
            leaf.flags.extra = true;
            leaf.lex_mode = mode;
            leaf.scanner_before = scanner_before;
            leaf.scanner_after = state.clone();
            extras.push(Arc::new(leaf));
            pos = start + length;
            continue;
        }

        let (raw, word) = match lexer.word {
            Some(word) if symbol == word => {
                match lexer.keywords.get(&fold_case(&rest[..length])) {
                    Some(&keyword) => (keyword, Some(word)),
                    None => (symbol, None),
                }
            }
            _ => (symbol, None),
        };

        return Lexeme {
            start: position,
            extras,
            token_start: pos,
            raw,
            word,
            padding,
            size: length,
            examined_end: examined_end.max(start + length),
            mode,
            scanner_before,
            scanner_after: state,
            fresh: true,
            missing: false,
            symbol: None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn onescript() -> &'static Language {
        crate::language()
    }

    fn symbol(name: &str) -> SymbolId {
        onescript().symbol_for_name(name, false)
            .or_else(|| onescript().symbol_for_name(name, true))
            .unwrap()
    }

    #[test]
    fn test_keyword_spellings_fold_to_one_symbol() {
        let lang = onescript();
        let mode = ValidExternals::default();
        let state = ScannerState::new();
        let a = lex(lang, "ЕСЛИ", 0, mode, &state);
        let b = lex(lang, "if", 0, mode, &state);
        assert_eq!(a.raw, b.raw);
        assert_eq!(a.raw, symbol("If"));
        assert_eq!(a.word, lang.lexer().word());
    }

    #[test]
    fn test_extras_are_collected_before_token() {
        let lang = onescript();
        let text = "  // комментарий\n  А";
        let lexeme = lex(lang, text, 0, ValidExternals::default(), &ScannerState::new());
        assert_eq!(lexeme.extras.len(), 1);
        assert_eq!(lexeme.raw, symbol("identifier"));
        assert_eq!(lexeme.content_start(), text.len() - "А".len());
        assert_eq!(lexeme.padding, 3);
        assert!(!lexeme.adjacent());
    }

    #[test]
    fn test_longest_match_and_literal_priority() {
        let lang = onescript();
        let mode = ValidExternals::default();
        let state = ScannerState::new();
        assert_eq!(lex(lang, "<= 1", 0, mode, &state).size, 2);
        let number = lex(lang, "12.5;", 0, mode, &state);
        assert_eq!((number.raw, number.size), (symbol("number"), 4));
    }

    #[test]
    fn test_unknown_character_becomes_error_token() {
        let lang = onescript();
        let lexeme = lex(lang, "@", 0, ValidExternals::default(), &ScannerState::new());
        assert_eq!(lexeme.raw, ERROR_SYMBOL);
        assert_eq!(lexeme.size, 1);
    }

    #[test]
    fn test_end_of_input() {
        let lang = onescript();
        let lexeme = lex(lang, "А  ", 2, ValidExternals::default(), &ScannerState::new());
        assert_eq!(lexeme.raw, END_SYMBOL);
        assert_eq!(lexeme.size, 0);
    }
}
