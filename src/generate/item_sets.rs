//! LALR(1) automaton.
//!
//! States are identified by their LR(0) core; lookaheads of merged LR(1)
//! kernels are unioned and a state is revisited whenever its kernel grows.

use std::collections::{BTreeMap, HashMap, VecDeque};

use tracing::debug;

use super::first_sets::{FirstSets, TokenSet};
use super::prepare::PreparedGrammar;
use crate::language::tables::{StateId, SymbolId, END_SYMBOL};

/// `production → α • β`; the augmented start production has index
/// `productions.len()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Item {
    pub production: usize,
    pub dot: usize,
}

pub(crate) type ItemSet = BTreeMap<Item, TokenSet>;

#[derive(Debug)]
pub(crate) struct ParseState {
    pub kernel: ItemSet,
    pub closure: ItemSet,
    pub transitions: BTreeMap<SymbolId, StateId>,
}

#[derive(Debug)]
pub(crate) struct Automaton {
    pub states: Vec<ParseState>,
    /// Index of the augmented production.
    pub augmented: usize,
}

struct Builder<'a> {
    grammar: &'a PreparedGrammar,
    firsts: FirstSets,
    rhs: Vec<Vec<SymbolId>>,
    states: Vec<ParseState>,
    by_core: HashMap<Vec<Item>, StateId>,
    queue: VecDeque<StateId>,
    queued: Vec<bool>,
}

pub(crate) fn build(grammar: &PreparedGrammar) -> Automaton {
    let mut rhs: Vec<Vec<SymbolId>> = grammar
        .productions
        .iter()
        .map(|p| p.steps.iter().map(|s| s.symbol).collect())
        .collect();
    let augmented = rhs.len();
    rhs.push(vec![grammar.start]);

    let mut builder = Builder {
        grammar,
        firsts: FirstSets::compute(grammar),
        rhs,
        states: Vec::new(),
        by_core: HashMap::new(),
        queue: VecDeque::new(),
        queued: Vec::new(),
    };

    let mut end = TokenSet::new();
    end.insert(END_SYMBOL);
    let mut start = ItemSet::new();
    start.insert(
        Item {
            production: augmented,
            dot: 0,
        },
        end,
    );
    builder.add_kernel(start);

    while let Some(state) = builder.queue.pop_front() {
        builder.queued[state as usize] = false;
        builder.expand(state);
    }

    debug!(states = builder.states.len(), "LALR automaton built");
    Automaton {
        states: builder.states,
        augmented,
    }
}

impl Automaton {
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl<'a> Builder<'a> {
    /// Registers a kernel, merging it into the state with the same core.
    fn add_kernel(&mut self, kernel: ItemSet) -> StateId {
        let core: Vec<Item> = kernel.keys().copied().collect();
        if let Some(&id) = self.by_core.get(&core) {
            let state = &mut self.states[id as usize];
            let mut grew = false;
            for (item, lookahead) in &kernel {
                if let Some(existing) = state.kernel.get_mut(item) {
                    grew |= existing.union_with(lookahead);
                }
            }
            if grew && !self.queued[id as usize] {
                self.queued[id as usize] = true;
                self.queue.push_back(id);
            }
            return id;
        }
        let id = self.states.len() as StateId;
        self.states.push(ParseState {
            kernel,
            closure: ItemSet::new(),
            transitions: BTreeMap::new(),
        });
        self.by_core.insert(core, id);
        self.queued.push(true);
        self.queue.push_back(id);
        id
    }

    fn closure(&self, kernel: &ItemSet) -> ItemSet {
        let mut items = kernel.clone();
        let mut pending: Vec<Item> = kernel.keys().copied().collect();
        while let Some(item) = pending.pop() {
            let rhs = &self.rhs[item.production];
            let Some(&next) = rhs.get(item.dot) else {
                continue;
            };
            if self.grammar.is_terminal(next) {
                continue;
            }
            let lookahead = items[&item].clone();
            let follow = self
                .firsts
                .of_sequence(rhs[item.dot + 1..].iter().copied(), &lookahead);
            for &production in self.grammar.productions_of(next) {
                let predicted = Item { production, dot: 0 };
                let changed = match items.get_mut(&predicted) {
                    Some(existing) => existing.union_with(&follow),
                    None => {
                        items.insert(predicted, follow.clone());
                        true
                    }
                };
                if changed {
                    pending.push(predicted);
                }
            }
        }
        items
    }

    fn expand(&mut self, state: StateId) {
        let closure = self.closure(&self.states[state as usize].kernel);

        let mut successors: BTreeMap<SymbolId, ItemSet> = BTreeMap::new();
        for (item, lookahead) in &closure {
            if let Some(&symbol) = self.rhs[item.production].get(item.dot) {
                successors.entry(symbol).or_default().insert(
                    Item {
                        production: item.production,
                        dot: item.dot + 1,
                    },
                    lookahead.clone(),
                );
            }
        }

        let mut transitions = BTreeMap::new();
        for (symbol, kernel) in successors {
            let target = self.add_kernel(kernel);
            transitions.insert(symbol, target);
        }

        let entry = &mut self.states[state as usize];
        entry.closure = closure;
        entry.transitions = transitions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::prepare::prepare;
    use crate::grammar::{pattern, prec_left, sym, GrammarBuilder};
    use crate::{choice, seq};

    #[test]
    fn test_single_token_grammar() {
        let grammar = GrammarBuilder::new("t").rule("start", seq!["a"]).build().unwrap();
        let g = prepare(&grammar).unwrap();
        let automaton = build(&g);
        // start, after "a", after start
        assert_eq!(automaton.state_count(), 3);
        assert_eq!(automaton.states[0].transitions.len(), 2);
    }

    #[test]
    fn test_lookaheads_merge_into_one_state() {
        let grammar = GrammarBuilder::new("t")
            .rule(
                "expr",
                choice![
                    prec_left(1, seq![sym("expr"), "+", sym("expr")]),
                    seq!["(", sym("expr"), ")"],
                    sym("num"),
                ],
            )
            .rule("num", pattern("[0-9]+"))
            .build()
            .unwrap();
        let g = prepare(&grammar).unwrap();
        let automaton = build(&g);
        let num = g.symbols.iter().position(|s| s.name == "num").unwrap() as SymbolId;
        let targets: Vec<StateId> = automaton
            .states
            .iter()
            .filter_map(|s| s.transitions.get(&num).copied())
            .collect();
        assert!(targets.len() > 1);
        assert!(targets.iter().all(|t| *t == targets[0]));

        let close = g.symbols.iter().position(|s| s.name == ")").unwrap() as SymbolId;
        let state = &automaton.states[targets[0] as usize];
        let lookahead = state.kernel.values().next().unwrap();
        assert!(lookahead.contains(END_SYMBOL));
        assert!(lookahead.contains(close));
    }
}
