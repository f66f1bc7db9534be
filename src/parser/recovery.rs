//! Восстановление после синтаксических ошибок
//!
//! Strategies are tried cheapest first; every one of them either consumes
//! input or makes the lookahead acceptable, so recovery always terminates.

use std::sync::Arc;

use tracing::debug;

use super::lexer::Lexeme;
use super::subtree::{Subtree, SubtreeRef};
use super::Session;
use crate::language::{Action, Language, StateId, SymbolId, END_SYMBOL};

/// Upper bound on simulated actions for one lookahead.
const SIMULATION_LIMIT: usize = 4096;

/// Runs the automaton on a copy of the state stack until `symbol` is
/// shifted or accepted; returns the stack at that point.
pub(super) fn simulate(
    language: &Language,
    states: &[StateId],
    symbol: SymbolId,
) -> Option<Vec<StateId>> {
    let mut stack = states.to_vec();
    for _ in 0..SIMULATION_LIMIT {
        let top = *stack.last()?;
        match language.action(top, symbol) {
            Action::Shift(next) => {
                stack.push(next);
                return Some(stack);
            }
            Action::Accept => return Some(stack),
            Action::Reduce(production) => {
                let production = language.production(production)?;
                let count = production.child_count();
                if count >= stack.len() {
                    return None;
                }
                stack.truncate(stack.len() - count);
                let below = *stack.last()?;
                stack.push(language.goto(below, production.lhs)?);
            }
            Action::Error | Action::Goto(_) => return None,
        }
    }
    None
}

impl<'a> Session<'a> {
    /// Recovers from `token` having no action in the current state. Returns
    /// the root when the input ended and the stack could only be wrapped.
    pub(super) fn recover(&mut self, token: Lexeme) -> Option<SubtreeRef> {
        if self.config.insert_missing {
            if let Some(missing) = self.find_missing(&token) {
                self.insert_missing(missing, token);
                return None;
            }
        }
        let token = match self.skip_tokens(token) {
            Ok(()) => return None,
            Err(token) => token,
        };
        let token = match self.pop_entries(token) {
            Ok(()) => return None,
            Err(token) => token,
        };
        self.wrap_token(token)
    }

    /// A terminal whose insertion lets `token` be consumed.
    fn find_missing(&self, token: &Lexeme) -> Option<SymbolId> {
        if self.missing_inserted_at == Some(token.start) {
            return None;
        }
        let language = self.language;
        let lexer = language.lexer();
        let states = self.structural_states();
        let terminal_count = language.tables().terminal_count as SymbolId;

        (1..terminal_count)
            .filter(|&symbol| !lexer.is_extra(symbol) && !lexer.is_twin(symbol))
            .find(|&symbol| {
                simulate(language, &states, symbol).map_or(false, |after| {
                    let top = after.last().copied().unwrap_or(0);
                    simulate(language, &after, self.resolve(top, token)).is_some()
                })
            })
    }

    fn insert_missing(&mut self, symbol: SymbolId, mut token: Lexeme) {
        debug!(
            missing = self.language.symbol_name(symbol),
            at = token.start,
            "inserting missing token"
        );
        self.missing_inserted_at = Some(token.start);
        let mode = self.language.lex_mode(self.top_state());
        self.lookahead = Some(Lexeme::missing(symbol, token.start, mode));
        token.symbol = None;
        self.pending.push_front(token);
    }

    /// Skips `token` and up to `max_skip_tokens - 1` following tokens into
    /// an ERROR node when the token after them can be consumed.
    fn skip_tokens(&mut self, token: Lexeme) -> Result<(), Lexeme> {
        if token.raw == END_SYMBOL || self.config.max_skip_tokens == 0 {
            return Err(token);
        }
        let state = self.top_state();
        let states = self.structural_states();

        let mut found = None;
        for count in 1..=self.config.max_skip_tokens {
            while self.pending.len() < count {
                if self.pending.back().map_or(false, |l| l.raw == END_SYMBOL) {
                    break;
                }
                let ahead = self.lex_ahead(state);
                self.pending.push_back(ahead);
            }
            let Some(candidate) = self.pending.get(count - 1) else {
                break;
            };
            let symbol = self.resolve(state, candidate);
            if simulate(self.language, &states, symbol).is_some() {
                found = Some(count);
                break;
            }
            if candidate.raw == END_SYMBOL {
                break;
            }
        }
        let Some(count) = found else {
            return Err(token);
        };

        debug!(skipped = count, at = token.start, "skipping tokens");
        for extra in &token.extras {
            self.push(state, extra.clone());
        }
        let mut children: Vec<SubtreeRef> = vec![Arc::new(token.to_leaf(token.raw, state))];
        for _ in 1..count {
            if let Some(skipped) = self.pending.pop_front() {
                children.extend(skipped.extras.iter().cloned());
                children.push(Arc::new(skipped.to_leaf(skipped.raw, state)));
            }
        }
        self.push(state, Arc::new(Subtree::error(children)));
        if let Some(mut next) = self.pending.pop_front() {
            next.symbol = None;
            self.lookahead = Some(next);
        }
        Ok(())
    }

    /// Pops the fewest stack entries after which `token` can be consumed and
    /// keeps them in an ERROR node.
    fn pop_entries(&mut self, mut token: Lexeme) -> Result<(), Lexeme> {
        let states = self.structural_states();
        for depth in 1..states.len() {
            let remaining = &states[..states.len() - depth];
            let top = remaining.last().copied().unwrap_or(0);
            let symbol = self.resolve(top, &token);
            if simulate(self.language, remaining, symbol).is_none() {
                continue;
            }

            debug!(depth, at = token.start, "popping stack entries");
            let mut popped = Vec::new();
            let mut removed = 0;
            while removed < depth {
                let Some(entry) = self.stack.pop() else {
                    break;
                };
                if !entry.is_extra() {
                    removed += 1;
                }
                popped.push(entry.subtree);
            }
            popped.reverse();
            let state = self.top_state();
            self.push(state, Arc::new(Subtree::error(popped)));
            token.symbol = None;
            self.lookahead = Some(token);
            return Ok(());
        }
        Err(token)
    }

    /// Wraps `token` into an ERROR node; at end of input the whole stack is
    /// wrapped and the root returned.
    fn wrap_token(&mut self, token: Lexeme) -> Option<SubtreeRef> {
        if token.raw == END_SYMBOL {
            debug!("wrapping the remaining stack at end of input");
            let entries: Vec<SubtreeRef> = std::mem::take(&mut self.stack)
                .into_iter()
                .map(|entry| entry.subtree)
                .collect();
            let mut children = Vec::new();
            if !entries.is_empty() {
                children.push(Arc::new(Subtree::error(entries)));
            }
            children.extend(token.extras);
            return Some(Arc::new(Subtree::node(
                self.language.start_symbol(),
                None,
                children,
            )));
        }

        debug!(at = token.start, "wrapping unexpected token");
        let state = self.top_state();
        for extra in &token.extras {
            self.push(state, extra.clone());
        }
        let leaf = token.to_leaf(token.raw, state);
        self.push(state, Arc::new(Subtree::error(vec![Arc::new(leaf)])));
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_rejects_unexpected_token() {
        let language = crate::language();
        let then = language.symbol_for_name("Then", false).unwrap();
        assert!(simulate(language, &[0], then).is_none());
        let identifier = language.symbol_for_name("identifier", true).unwrap();
        let after = simulate(language, &[0], identifier).unwrap();
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_simulate_accepts_end_of_empty_module() {
        let language = crate::language();
        assert!(simulate(language, &[0], END_SYMBOL).is_some());
    }
}
