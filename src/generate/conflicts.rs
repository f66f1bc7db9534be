//! Action table construction and conflict resolution.
//!
//! Competing actions for one `(state, lookahead)` pair are settled by static
//! precedence, then associativity, then dynamic precedence, then the
//! grammar's conflict entries. Whatever is left is reported; all conflicts of
//! the automaton are collected before failing.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::item_sets::{Automaton, Item};
use super::prepare::PreparedGrammar;
use crate::core::{Conflict, ConflictKind};
use crate::grammar::Associativity;
use crate::language::tables::{Action, StateId, SymbolId, END_SYMBOL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Shift(StateId),
    Reduce(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    ReduceWins,
    ShiftWins,
    Tie,
}

pub(crate) struct ActionTableBuilder<'a> {
    grammar: &'a PreparedGrammar,
    automaton: &'a Automaton,
    conflicts: Vec<Conflict>,
}

impl<'a> ActionTableBuilder<'a> {
    pub fn new(grammar: &'a PreparedGrammar, automaton: &'a Automaton) -> Self {
        Self {
            grammar,
            automaton,
            conflicts: Vec::new(),
        }
    }

    /// Dense `state × symbol` table, or every unresolved conflict.
    pub fn build(mut self) -> Result<Vec<Action>, Vec<Conflict>> {
        let automaton = self.automaton;
        let width = self.grammar.table_symbol_count;
        let mut actions = vec![Action::Error; automaton.states.len() * width];

        for (index, state) in automaton.states.iter().enumerate() {
            let row = &mut actions[index * width..(index + 1) * width];
            for (&symbol, &target) in &state.transitions {
                row[symbol as usize] = if self.grammar.is_terminal(symbol) {
                    Action::Shift(target)
                } else {
                    Action::Goto(target)
                };
            }

            let mut reductions: Vec<(SymbolId, usize)> = Vec::new();
            for (item, lookahead) in &state.closure {
                if item.dot == self.rhs_len(item.production) {
                    reductions.extend(lookahead.iter().map(|t| (t, item.production)));
                }
            }
            reductions.sort_unstable();
            reductions.dedup();

            let mut start = 0;
            while start < reductions.len() {
                let terminal = reductions[start].0;
                let mut end = start;
                while end < reductions.len() && reductions[end].0 == terminal {
                    end += 1;
                }
                let reduces: Vec<usize> = reductions[start..end].iter().map(|r| r.1).collect();
                start = end;

                let shift = match row[terminal as usize] {
                    Action::Shift(target) => Some(target),
                    _ => None,
                };
                if let Some(action) = self.resolve(index, terminal, shift, reduces) {
                    row[terminal as usize] = action;
                }
            }
        }

        if self.conflicts.is_empty() {
            Ok(actions)
        } else {
            warn!(count = self.conflicts.len(), "unresolved conflicts");
            Err(self.conflicts)
        }
    }

    fn rhs_len(&self, production: usize) -> usize {
        if production == self.automaton.augmented {
            1
        } else {
            self.grammar.productions[production].steps.len()
        }
    }

    fn precedence(&self, production: usize) -> i32 {
        self.grammar
            .productions
            .get(production)
            .map_or(0, |p| p.precedence())
    }

    fn associativity(&self, production: usize) -> Option<Associativity> {
        self.grammar
            .productions
            .get(production)
            .and_then(|p| p.associativity())
    }

    fn dynamic_precedence(&self, production: usize) -> i32 {
        self.grammar
            .productions
            .get(production)
            .map_or(0, |p| p.dynamic_precedence)
    }

    fn rule_name(&self, production: usize) -> &'a str {
        let grammar = self.grammar;
        match grammar.productions.get(production) {
            Some(p) => grammar.origin(p.lhs),
            None => grammar.origin(grammar.start),
        }
    }

    fn action_of(&self, candidate: Candidate) -> Action {
        match candidate {
            Candidate::Shift(target) => Action::Shift(target),
            Candidate::Reduce(p) if p == self.automaton.augmented => Action::Accept,
            Candidate::Reduce(p) => Action::Reduce(p as u32),
        }
    }

    /// Items of `state` that shift `terminal`.
    fn shift_items(&self, state: usize, terminal: SymbolId) -> Vec<Item> {
        self.automaton.states[state]
            .closure
            .keys()
            .filter(|item| {
                self.grammar
                    .productions
                    .get(item.production)
                    .and_then(|p| p.steps.get(item.dot))
                    .map_or(false, |s| s.symbol == terminal)
            })
            .copied()
            .collect()
    }

    /// Precedence range of the shift: taken from items already past their
    /// first step; defaults to zero.
    fn shift_precedence(&self, items: &[Item]) -> (i32, i32) {
        let mut range: Option<(i32, i32)> = None;
        for item in items.iter().filter(|i| i.dot > 0) {
            let value = self.grammar.productions[item.production].steps[item.dot].precedence;
            range = Some(match range {
                None => (value, value),
                Some((min, max)) => (min.min(value), max.max(value)),
            });
        }
        range.unwrap_or((0, 0))
    }

    fn resolve(
        &mut self,
        state: usize,
        terminal: SymbolId,
        mut shift: Option<StateId>,
        mut reduces: Vec<usize>,
    ) -> Option<Action> {
        if shift.is_none() && reduces.len() == 1 {
            return Some(self.action_of(Candidate::Reduce(reduces[0])));
        }

        // Static precedence among reductions.
        if reduces.len() > 1 {
            let best = reduces.iter().map(|&p| self.precedence(p)).max().unwrap_or(0);
            reduces.retain(|&p| self.precedence(p) == best);
        }

        let shift_items = match shift {
            Some(_) => self.shift_items(state, terminal),
            None => Vec::new(),
        };

        if shift.is_some() {
            let (min, max) = self.shift_precedence(&shift_items);
            let outcomes: Vec<(usize, Outcome)> = reduces
                .iter()
                .map(|&p| {
                    let value = self.precedence(p);
                    let outcome = if value > max {
                        Outcome::ReduceWins
                    } else if value < min {
                        Outcome::ShiftWins
                    } else if value == min && value == max {
                        match self.associativity(p) {
                            Some(Associativity::Left) => Outcome::ReduceWins,
                            Some(Associativity::Right) => Outcome::ShiftWins,
                            None => Outcome::Tie,
                        }
                    } else {
                        Outcome::Tie
                    };
                    (p, outcome)
                })
                .collect();
            if outcomes.iter().any(|(_, o)| *o == Outcome::ReduceWins) {
                shift = None;
            }
            reduces = outcomes
                .into_iter()
                .filter(|(_, o)| *o != Outcome::ShiftWins)
                .map(|(p, _)| p)
                .collect();
        }

        let mut candidates: Vec<Candidate> = shift.map(Candidate::Shift).into_iter().collect();
        candidates.extend(reduces.iter().map(|&p| Candidate::Reduce(p)));
        if candidates.len() == 1 {
            return Some(self.action_of(candidates[0]));
        }

        // Dynamic precedence.
        let dynamic = |candidate: &Candidate| match candidate {
            Candidate::Shift(_) => shift_items
                .iter()
                .map(|i| self.dynamic_precedence(i.production))
                .max()
                .unwrap_or(0),
            Candidate::Reduce(p) => self.dynamic_precedence(*p),
        };
        let best = candidates.iter().map(dynamic).max().unwrap_or(0);
        let strongest: Vec<Candidate> = candidates
            .iter()
            .copied()
            .filter(|c| dynamic(c) == best)
            .collect();
        if strongest.len() == 1 {
            debug!(state, terminal, "conflict resolved by dynamic precedence");
            return Some(self.action_of(strongest[0]));
        }
        let candidates = strongest;

        // Conflict entries.
        let names: Vec<BTreeSet<&str>> = candidates
            .iter()
            .map(|candidate| match candidate {
                Candidate::Shift(_) => shift_items
                    .iter()
                    .map(|i| self.rule_name(i.production))
                    .collect(),
                Candidate::Reduce(p) => std::iter::once(self.rule_name(*p)).collect(),
            })
            .collect();
        for entry in &self.grammar.conflicts {
            let ranks: Option<Vec<usize>> = names
                .iter()
                .map(|set| set.iter().filter_map(|n| entry.iter().position(|e| e == n)).min())
                .collect();
            let Some(ranks) = ranks else {
                continue;
            };
            let Some(&winner_rank) = ranks.iter().min() else {
                continue;
            };
            if ranks.iter().filter(|&&r| r == winner_rank).count() == 1 {
                let winner = ranks.iter().position(|&r| r == winner_rank).unwrap_or(0);
                debug!(state, terminal, rule = %entry[winner_rank], "conflict resolved by entry");
                return Some(self.action_of(candidates[winner]));
            }
        }

        let mut rules: Vec<String> = names
            .iter()
            .flat_map(|set| set.iter().map(|n| n.to_string()))
            .collect();
        rules.sort();
        rules.dedup();
        let mut items: Vec<String> = Vec::new();
        for candidate in &candidates {
            match candidate {
                Candidate::Shift(_) => {
                    for item in &shift_items {
                        items.push(self.grammar.display_item(item.production, item.dot));
                    }
                }
                Candidate::Reduce(p) if *p == self.automaton.augmented => {
                    items.push(format!("{} •", self.rule_name(*p)));
                }
                Candidate::Reduce(p) => {
                    items.push(self.grammar.display_item(*p, self.rhs_len(*p)));
                }
            }
        }
        let kind = if candidates.iter().any(|c| matches!(c, Candidate::Shift(_))) {
            ConflictKind::ShiftReduce
        } else {
            ConflictKind::ReduceReduce
        };
        let lookahead = if terminal == END_SYMBOL {
            "end".to_string()
        } else {
            self.grammar.symbol_name(terminal).to_string()
        };
        let conflict = Conflict {
            kind,
            state,
            lookahead,
            rules,
            items,
        };
        // One report per rule combination is enough.
        if !self
            .conflicts
            .iter()
            .any(|c| c.kind == conflict.kind && c.rules == conflict.rules && c.items == conflict.items)
        {
            self.conflicts.push(conflict);
        }
        // Keep the table total: fall back to the first candidate.
        Some(self.action_of(candidates[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::item_sets;
    use crate::generate::prepare::prepare;
    use crate::grammar::{pattern, prec_dynamic, prec_left, prec_right, sym, Grammar, GrammarBuilder};
    use crate::{choice, seq};

    fn actions(grammar: &Grammar) -> Result<(Vec<Action>, PreparedGrammar), Vec<Conflict>> {
        let g = prepare(grammar).unwrap();
        let automaton = item_sets::build(&g);
        let table = ActionTableBuilder::new(&g, &automaton).build()?;
        Ok((table, g))
    }

    fn arithmetic(left: bool) -> Grammar {
        let binary = seq![sym("expr"), "-", sym("expr")];
        let binary = if left { prec_left(1, binary) } else { prec_right(1, binary) };
        GrammarBuilder::new("t")
            .rule("expr", choice![binary, sym("num")])
            .rule("num", pattern("[0-9]+"))
            .build()
            .unwrap()
    }

    /// Rows that reduce the binary production on `lookahead`.
    fn binary_reductions(table: &[Action], g: &PreparedGrammar, lookahead: &str) -> usize {
        let symbol = g.symbols.iter().position(|s| s.name == lookahead).unwrap();
        table
            .chunks(g.table_symbol_count)
            .filter(|row| match row[symbol] {
                Action::Reduce(p) => g.productions[p as usize].steps.len() == 3,
                _ => false,
            })
            .count()
    }

    #[test]
    fn test_left_associativity_reduces() {
        let (table, g) = actions(&arithmetic(true)).unwrap();
        assert_eq!(binary_reductions(&table, &g, "-"), 1);
    }

    #[test]
    fn test_right_associativity_shifts() {
        let (table, g) = actions(&arithmetic(false)).unwrap();
        assert_eq!(binary_reductions(&table, &g, "-"), 0);
        assert_eq!(binary_reductions(&table, &g, "end"), 1);
    }

    #[test]
    fn test_missing_precedence_is_reported() {
        let grammar = GrammarBuilder::new("t")
            .rule("expr", choice![seq![sym("expr"), "-", sym("expr")], sym("num")])
            .rule("num", pattern("[0-9]+"))
            .build()
            .unwrap();
        let conflicts = actions(&grammar).unwrap_err();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ShiftReduce);
        assert_eq!(conflicts[0].rules, vec!["expr".to_string()]);
        assert_eq!(conflicts[0].lookahead, "-");
    }

    #[test]
    fn test_dynamic_precedence_breaks_ties() {
        let grammar = GrammarBuilder::new("t")
            .rule("start", choice![sym("a"), sym("b")])
            .rule("a", prec_dynamic(1, seq!["x", "y"]))
            .rule("b", seq!["x", "y"])
            .build()
            .unwrap();
        assert!(actions(&grammar).is_ok());
    }
}
