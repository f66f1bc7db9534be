//! Assembly of [`LanguageTables`] from the prepared grammar and action table.

use indexmap::IndexSet;

use super::prepare::PreparedGrammar;
use crate::language::tables::{
    Action, LanguageTables, ProductionInfo, SymbolId, ValidExternals, LANGUAGE_VERSION,
};

pub(crate) fn assemble(grammar: PreparedGrammar, state_count: usize, actions: Vec<Action>) -> LanguageTables {
    let mut alias_sequences: IndexSet<Vec<Option<SymbolId>>> = IndexSet::new();
    let productions = grammar
        .productions
        .iter()
        .map(|production| {
            let aliases: Vec<Option<SymbolId>> =
                production.steps.iter().map(|s| s.alias).collect();
            let alias_sequence = if aliases.iter().any(Option::is_some) {
                Some(alias_sequences.insert_full(aliases).0 as u32)
            } else {
                None
            };
            ProductionInfo {
                lhs: production.lhs,
                rhs: production.steps.iter().map(|s| s.symbol).collect(),
                fields: production.steps.iter().map(|s| s.field).collect(),
                alias_sequence,
                precedence: production.precedence(),
                dynamic_precedence: production.dynamic_precedence,
            }
        })
        .collect();

    // Внешний токен допустим в состоянии, если для него есть действие
    let width = grammar.table_symbol_count;
    let lex_modes = (0..state_count)
        .map(|state| {
            let row = &actions[state * width..(state + 1) * width];
            let mut valid = ValidExternals::default();
            for (index, &symbol) in grammar.lexical.externals.iter().enumerate() {
                if row[symbol as usize] != Action::Error {
                    valid.insert(index);
                }
            }
            valid
        })
        .collect();

    LanguageTables {
        version: LANGUAGE_VERSION,
        name: grammar.name,
        symbols: grammar.symbols,
        terminal_count: grammar.terminal_count,
        table_symbol_count: grammar.table_symbol_count,
        fields: grammar.fields,
        productions,
        alias_sequences: alias_sequences.into_iter().collect(),
        state_count,
        actions,
        lex_modes,
        lexical: grammar.lexical,
    }
}
