//! FIRST sets and nullability of nonterminals.

use super::prepare::PreparedGrammar;
use crate::language::tables::SymbolId;

/// Bit set over terminal ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TokenSet {
    words: Vec<u64>,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, terminal: SymbolId) -> bool {
        let (word, bit) = (terminal as usize / 64, terminal as usize % 64);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        let before = self.words[word];
        self.words[word] |= 1 << bit;
        before != self.words[word]
    }

    pub fn contains(&self, terminal: SymbolId) -> bool {
        let (word, bit) = (terminal as usize / 64, terminal as usize % 64);
        self.words.get(word).map_or(false, |w| w & (1 << bit) != 0)
    }

    /// Adds every member of `other`; returns whether anything was added.
    pub fn union_with(&mut self, other: &TokenSet) -> bool {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | theirs;
            if merged != *mine {
                *mine = merged;
                changed = true;
            }
        }
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            (0..64)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| (index * 64 + bit) as SymbolId)
        })
    }
}

#[derive(Debug)]
pub(crate) struct FirstSets {
    first: Vec<TokenSet>,
    nullable: Vec<bool>,
    terminal_count: usize,
}

impl FirstSets {
    pub fn compute(grammar: &PreparedGrammar) -> Self {
        let count = grammar.table_symbol_count - grammar.terminal_count;
        let mut sets = FirstSets {
            first: vec![TokenSet::new(); count],
            nullable: vec![false; count],
            terminal_count: grammar.terminal_count,
        };
        let mut changed = true;
        while changed {
            changed = false;
            for production in &grammar.productions {
                let lhs = production.lhs as usize - grammar.terminal_count;
                let mut all_nullable = true;
                for step in &production.steps {
                    if grammar.is_terminal(step.symbol) {
                        changed |= sets.first[lhs].insert(step.symbol);
                        all_nullable = false;
                        break;
                    }
                    let nt = step.symbol as usize - grammar.terminal_count;
                    if nt != lhs {
                        let first = sets.first[nt].clone();
                        changed |= sets.first[lhs].union_with(&first);
                    }
                    if !sets.nullable[nt] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !sets.nullable[lhs] {
                    sets.nullable[lhs] = true;
                    changed = true;
                }
            }
        }
        sets
    }

    pub fn nullable(&self, symbol: SymbolId) -> bool {
        (symbol as usize) >= self.terminal_count
            && self.nullable[symbol as usize - self.terminal_count]
    }

    /// FIRST of a symbol sequence followed by `follow`.
    pub fn of_sequence(&self, symbols: impl IntoIterator<Item = SymbolId>, follow: &TokenSet) -> TokenSet {
        let mut out = TokenSet::new();
        for symbol in symbols {
            if (symbol as usize) < self.terminal_count {
                out.insert(symbol);
                return out;
            }
            out.union_with(&self.first[symbol as usize - self.terminal_count]);
            if !self.nullable(symbol) {
                return out;
            }
        }
        out.union_with(follow);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::generate::prepare::prepare;
    use crate::grammar::{optional, sym, GrammarBuilder};
    use crate::seq;

    #[test]
    fn test_token_set_operations() {
        let mut a = TokenSet::new();
        assert!(a.insert(3));
        assert!(!a.insert(3));
        assert!(a.insert(70));
        let mut b = TokenSet::new();
        b.insert(1);
        assert!(b.union_with(&a));
        assert!(!b.union_with(&a));
        assert_eq!(b.iter().collect::<Vec<_>>(), vec![1, 3, 70]);
        assert!(b.contains(70) && !b.contains(2));
    }

    #[test]
    fn test_nullable_prefix_contributes_first() {
        let grammar = GrammarBuilder::new("t")
            .rule("start", seq![sym("head"), "b"])
            .rule("head", optional(seq!["a", "c"]))
            .build()
            .unwrap();
        let g = prepare(&grammar).unwrap();
        let firsts = FirstSets::compute(&g);
        let head = g.symbols.iter().position(|s| s.name == "head").unwrap() as SymbolId;
        let start = g.start;
        assert!(firsts.nullable(head));
        assert!(!firsts.nullable(start));
        // Порядок терминалов задаётся порядком интернирования
        let names: BTreeSet<&str> = firsts
            .of_sequence([start], &TokenSet::new())
            .iter()
            .map(|t| g.symbol_name(t))
            .collect();
        assert_eq!(names, BTreeSet::from(["a", "b"]));
    }
}
