/*!
# Parse driver

A table-driven LR engine over a [`Language`]. Each [`Parser`] owns its
session state; the language itself is shared read-only.

```ignore
let mut parser = Parser::new();
parser.set_language(onescript_syntax::language())?;
let tree = parser.parse("Если А Тогда Б(); КонецЕсли;", None)?;
assert!(!tree.root_node().has_error());
```

## Error recovery

The parser never gives up on input. When the lookahead has no action it tries,
in order: inserting one zero-width MISSING token that lets the lookahead be
consumed, skipping a few tokens into an ERROR node, popping stack entries into
an ERROR node, and finally wrapping the lookahead itself into an ERROR node.

## Incremental reparse

Passing the previous tree (after [`Tree::edit`]) lets the parser take over
unchanged subtrees instead of rebuilding them. A subtree is taken only if the
new parse reaches its first token in the same state with the same token, and
the token after it lexes the same way, so the result is the tree a full
parse would produce.
*/

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::core::{LanguageError, ParseError};
use crate::language::{Action, Language, ProductionId, StateId, SymbolId, LANGUAGE_VERSION};
use crate::scanner::ScannerState;

mod incremental;
pub(crate) mod lexer;
mod recovery;
pub(crate) mod subtree;
mod tree;

pub use incremental::InputEdit;
pub use tree::{Node, Tree};

use incremental::ReuseIndex;
use lexer::{lex, Lexeme};
use subtree::{LookaheadInfo, Subtree, SubtreeRef};

/// Настройки сеанса разбора
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// How many tokens error recovery may skip to resynchronise.
    pub max_skip_tokens: usize,
    /// Whether error recovery may insert MISSING tokens.
    pub insert_missing: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_skip_tokens: 4,
            insert_missing: true,
        }
    }
}

/// Statistics of the most recent parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub reused_nodes: usize,
    pub reused_bytes: usize,
}

#[derive(Debug, Default)]
pub struct Parser {
    language: Option<&'static Language>,
    config: ParseConfig,
    stats: ParseStats,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParseConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    pub fn language(&self) -> Option<&'static Language> {
        self.language
    }

    /// Attaches a language; one built for another table layout is rejected.
    pub fn set_language(&mut self, language: &'static Language) -> Result<(), LanguageError> {
        if language.version() != LANGUAGE_VERSION {
            return Err(LanguageError::VersionMismatch {
                expected: LANGUAGE_VERSION,
                found: language.version(),
            });
        }
        self.language = Some(language);
        Ok(())
    }

    /// Parses `text`, reusing unchanged parts of `old_tree` when given.
    pub fn parse(&mut self, text: &str, old_tree: Option<&Tree>) -> Result<Tree, ParseError> {
        let language = self.language.ok_or(ParseError::NoLanguage)?;
        let started = Instant::now();

        let reuse = old_tree
            .filter(|old| std::ptr::eq(old.language(), language))
            .map(|old| ReuseIndex::new(old.root_subtree(), old.edits()));
        if let Some(index) = &reuse {
            debug!(candidates = index.len(), "reuse index built");
        }

        let mut session = Session::new(language, text, &self.config, reuse);
        let root = session.run();
        self.stats = session.stats;

        debug!(
            bytes = text.len(),
            reused_nodes = self.stats.reused_nodes,
            reused_bytes = self.stats.reused_bytes,
            elapsed_us = started.elapsed().as_micros() as u64,
            "parse finished"
        );
        Ok(Tree::new(root, language))
    }

    pub fn last_stats(&self) -> ParseStats {
        self.stats
    }
}

struct StackEntry {
    /// State after pushing this entry; extras keep the state below them.
    state: StateId,
    subtree: SubtreeRef,
    /// Absolute offset of the subtree's padding.
    start: usize,
}

impl StackEntry {
    fn end(&self) -> usize {
        self.start + self.subtree.total_len()
    }

    fn is_extra(&self) -> bool {
        self.subtree.flags.extra
    }
}

/// Состояние одного прохода разбора
struct Session<'a> {
    language: &'static Language,
    input: &'a str,
    config: &'a ParseConfig,
    stack: Vec<StackEntry>,
    lookahead: Option<Lexeme>,
    /// Lexemes read ahead of the lookahead during recovery.
    pending: VecDeque<Lexeme>,
    /// End of everything lexed so far and the scanner state there.
    lex_position: usize,
    lex_scanner: ScannerState,
    reuse: Option<ReuseIndex>,
    missing_inserted_at: Option<usize>,
    stats: ParseStats,
}

impl<'a> Session<'a> {
    fn new(
        language: &'static Language,
        input: &'a str,
        config: &'a ParseConfig,
        reuse: Option<ReuseIndex>,
    ) -> Self {
        Self {
            language,
            input,
            config,
            stack: Vec::new(),
            lookahead: None,
            pending: VecDeque::new(),
            lex_position: 0,
            lex_scanner: ScannerState::new(),
            reuse,
            missing_inserted_at: None,
            stats: ParseStats::default(),
        }
    }

    fn run(&mut self) -> SubtreeRef {
        loop {
            let state = self.top_state();
            let mut lookahead = match self.lookahead.take() {
                Some(lookahead) => lookahead,
                None => self.next_lexeme(state),
            };
            let symbol = match lookahead.symbol {
                Some(symbol) => symbol,
                None => {
                    let symbol = self.resolve(state, &lookahead);
                    lookahead.symbol = Some(symbol);
                    symbol
                }
            };

            match self.language.action(state, symbol) {
                Action::Shift(next) => {
                    if !self.try_reuse(state, &lookahead) {
                        self.shift(state, next, symbol, lookahead);
                    }
                }
                Action::Reduce(production) => {
                    if self.reduce(production, &lookahead) {
                        self.lookahead = Some(lookahead);
                    } else if let Some(root) = self.recover(lookahead) {
                        return root;
                    }
                }
                Action::Accept => return self.accept(lookahead),
                Action::Error | Action::Goto(_) => {
                    if let Some(root) = self.recover(lookahead) {
                        return root;
                    }
                }
            }
        }
    }

    fn top_state(&self) -> StateId {
        self.stack.last().map_or(0, |entry| entry.state)
    }

    fn stack_end(&self) -> usize {
        self.stack.last().map_or(0, StackEntry::end)
    }

    /// States of the non-extra entries, with the initial state at the bottom.
    fn structural_states(&self) -> Vec<StateId> {
        std::iter::once(0)
            .chain(
                self.stack
                    .iter()
                    .filter(|entry| !entry.is_extra())
                    .map(|entry| entry.state),
            )
            .collect()
    }

    fn push(&mut self, state: StateId, subtree: SubtreeRef) {
        let start = self.stack_end();
        self.stack.push(StackEntry {
            state,
            subtree,
            start,
        });
    }

    fn next_lexeme(&mut self, state: StateId) -> Lexeme {
        if let Some(lexeme) = self.pending.pop_front() {
            return lexeme;
        }
        let lexeme = lex(
            self.language,
            self.input,
            self.lex_position,
            self.language.lex_mode(state),
            &self.lex_scanner,
        );
        self.advance_past(&lexeme);
        lexeme
    }

    /// Lexes past everything already read, without consuming anything.
    fn lex_ahead(&mut self, state: StateId) -> Lexeme {
        let mut lexeme = lex(
            self.language,
            self.input,
            self.lex_position,
            self.language.lex_mode(state),
            &self.lex_scanner,
        );
        lexeme.fresh = false;
        self.advance_past(&lexeme);
        lexeme
    }

    fn advance_past(&mut self, lexeme: &Lexeme) {
        self.lex_position = lexeme.end();
        self.lex_scanner = lexeme.scanner_after.clone();
    }

    /// Symbol the lexeme stands for in `state`.
    ///
    /// A keyword is read as the word token where no keyword is acceptable,
    /// and a token glued to the previous one becomes its immediate twin
    /// where the twin has an action.
    fn resolve(&self, state: StateId, lexeme: &Lexeme) -> SymbolId {
        let mut symbol = lexeme.raw;
        if let Some(word) = lexeme.word {
            if !self.language.accepts_keywords(state) {
                symbol = word;
            }
        }
        if lexeme.adjacent() {
            if let Some(twin) = self.language.lexer().twin(symbol) {
                if self.language.action(state, twin) != Action::Error {
                    symbol = twin;
                }
            }
        }
        symbol
    }

    fn shift(&mut self, state: StateId, next: StateId, symbol: SymbolId, lexeme: Lexeme) {
        for extra in &lexeme.extras {
            self.push(state, extra.clone());
        }
        let leaf = lexeme.to_leaf(symbol, state);
        self.push(next, Arc::new(leaf));
    }

    fn reduce(&mut self, production_id: ProductionId, lookahead: &Lexeme) -> bool {
        let language = self.language;
        let Some(production) = language.production(production_id) else {
            warn!(production = production_id, "reduce by an unknown production");
            return false;
        };
        let lhs = production.lhs;

        let mut trailing = Vec::new();
        while self.stack.last().map_or(false, StackEntry::is_extra) {
            trailing.extend(self.stack.pop());
        }
        trailing.reverse();

        let mut children = Vec::new();
        let mut remaining = production.child_count();
        while remaining > 0 {
            let Some(entry) = self.stack.pop() else {
                break;
            };
            if !entry.is_extra() {
                remaining -= 1;
            }
            children.push(entry);
        }
        children.reverse();

        let start = children
            .first()
            .map_or_else(|| self.stack_end(), |entry| entry.start);
        let dependency_end = children
            .iter()
            .map(|entry| entry.end() + entry.subtree.lookahead_bytes)
            .fold(lookahead.examined_end, usize::max);

        let state_below = self.top_state();
        let next = match language.goto(state_below, lhs) {
            Some(next) => next,
            None => {
                warn!(state = state_below, symbol = lhs, "missing goto entry");
                state_below
            }
        };

        let mut node = Subtree::node(
            lhs,
            Some(production_id),
            children.into_iter().map(|entry| entry.subtree).collect(),
        );
        let end = start + node.total_len();
        node.parse_state = state_below;
        node.lookahead = Some(LookaheadInfo {
            raw: lookahead.raw,
            symbol: lookahead.symbol.unwrap_or(lookahead.raw),
            mode: lookahead.mode,
            reusable: lookahead.is_reusable_lookahead() && lookahead.start == end,
        });
        node.lookahead_bytes = dependency_end.saturating_sub(end);

        self.stack.push(StackEntry {
            state: next,
            subtree: Arc::new(node),
            start,
        });
        for entry in trailing {
            self.push(next, entry.subtree);
        }
        true
    }

    /// Builds the root: the start node absorbs the extras around it.
    fn accept(&mut self, lookahead: Lexeme) -> SubtreeRef {
        let mut symbol = self.language.start_symbol();
        let mut production = None;
        let mut children = Vec::new();
        for entry in std::mem::take(&mut self.stack) {
            if entry.is_extra() {
                children.push(entry.subtree);
            } else {
                symbol = entry.subtree.symbol;
                production = entry.subtree.production;
                children.extend(entry.subtree.children.iter().cloned());
            }
        }
        children.extend(lookahead.extras);
        Arc::new(Subtree::node(symbol, production, children))
    }

    /// Takes over an old subtree starting at `token` if the new parse is
    /// guaranteed to rebuild it unchanged.
    fn try_reuse(&mut self, state: StateId, token: &Lexeme) -> bool {
        if !self.pending.is_empty() || !token.fresh {
            return false;
        }
        let candidates: Vec<SubtreeRef> = match &self.reuse {
            Some(index) => index.candidates(token.content_start()).to_vec(),
            None => return false,
        };
        let symbol = token.symbol.unwrap_or(token.raw);

        for candidate in candidates {
            if candidate.parse_state != state {
                continue;
            }
            let same_first_token = candidate.first_leaf().map_or(false, |first| {
                first.symbol == symbol
                    && first.raw == token.raw
                    && first.padding == token.padding
                    && first.size == token.size
                    && first.lex_mode == token.mode
                    && first.scanner_before == token.scanner_before
            });
            if !same_first_token {
                continue;
            }
            let (Some(info), Some(last)) = (&candidate.lookahead, candidate.last_leaf()) else {
                continue;
            };
            let Some(next) = self.language.goto(state, candidate.symbol) else {
                continue;
            };

            // Токен после узла должен прочитаться так же, как в старом дереве
            let end = token.token_start + candidate.total_len();
            let mut following = lex(self.language, self.input, end, info.mode, &last.scanner_after);
            if following.raw != info.raw {
                continue;
            }
            following.symbol = Some(info.symbol);

            for extra in &token.extras {
                self.push(state, extra.clone());
            }
            self.stats.reused_nodes += 1;
            self.stats.reused_bytes += candidate.total_len();
            debug!(
                kind = self.language.symbol_name(candidate.symbol),
                start = token.token_start,
                end,
                "subtree reused"
            );
            self.push(next, candidate);
            self.advance_past(&following);
            self.lookahead = Some(following);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> Parser {
        let mut parser = Parser::new();
        parser.set_language(crate::language()).unwrap();
        parser
    }

    #[test]
    fn test_parse_without_language_fails() {
        let mut parser = Parser::new();
        assert!(matches!(parser.parse("А = 1;", None), Err(ParseError::NoLanguage)));
    }

    #[test]
    fn test_simple_assignment() {
        let tree = parser().parse("А = 1;", None).unwrap();
        assert_eq!(
            tree.root_node().to_sexp(),
            "(source_file (assignment left: (identifier) right: (number)))"
        );
    }

    #[test]
    fn test_empty_input() {
        let tree = parser().parse("", None).unwrap();
        assert_eq!(tree.root_node().to_sexp(), "(source_file)");
        let tree = parser().parse("  \n// только комментарий\n", None).unwrap();
        assert_eq!(tree.root_node().to_sexp(), "(source_file (comment))");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_keyword_after_dot_is_identifier() {
        let source = "Запрос.Новый = 1;";
        let tree = parser().parse(source, None).unwrap();
        let root = tree.root_node();
        assert!(!root.has_error(), "{}", root.to_sexp());
        let assignment = root.named_child(0).unwrap();
        let member = assignment.child_by_field_name("left").unwrap();
        assert_eq!(member.kind(), "member_access");
        let property = member.child_by_field_name("property").unwrap();
        assert_eq!(property.kind(), "identifier");
        assert_eq!(property.utf8_text(source), "Новый");
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: ParseConfig = toml::from_str("max_skip_tokens = 2").unwrap();
        assert_eq!(config.max_skip_tokens, 2);
        assert!(config.insert_missing);
    }

    #[test]
    fn test_reparse_without_edits_reuses_everything() {
        let source = "Процедура А()\n    Б = 1;\nКонецПроцедуры\n\nВ = 2;\n";
        let mut parser = parser();
        let tree = parser.parse(source, None).unwrap();
        assert_eq!(parser.last_stats(), ParseStats::default());
        let again = parser.parse(source, Some(&tree)).unwrap();
        assert_eq!(again.root_node().to_sexp(), tree.root_node().to_sexp());
        assert!(parser.last_stats().reused_nodes > 0);
    }
}
