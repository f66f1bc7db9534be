/*!
# Table Generator

Turns a [`Grammar`] into [`LanguageTables`]: the grammar is validated and
flattened into numbered productions, an LALR(1) automaton is built over them
and every state gets one row of the action table. Conflicts are resolved by
precedence, associativity, dynamic precedence and conflict entries; anything
left over fails the build with the full list.

The output only depends on the grammar: ordered maps everywhere and FIFO state
numbering make repeated runs byte-identical.
*/

use std::time::Instant;

use tracing::info;

use crate::core::GenerateError;
use crate::grammar::Grammar;
use crate::language::tables::LanguageTables;

mod conflicts;
mod first_sets;
mod item_sets;
mod prepare;
mod tables;

/// Generates the parse tables for `grammar`.
pub fn generate(grammar: &Grammar) -> Result<LanguageTables, GenerateError> {
    let started = Instant::now();
    let prepared = prepare::prepare(grammar)?;
    let automaton = item_sets::build(&prepared);
    let actions = conflicts::ActionTableBuilder::new(&prepared, &automaton)
        .build()
        .map_err(GenerateError::UnresolvedConflicts)?;
    let state_count = automaton.state_count();
    let tables = tables::assemble(prepared, state_count, actions);

    info!(
        grammar = %tables.name,
        symbols = tables.symbols.len(),
        productions = tables.productions.len(),
        states = tables.state_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parse tables generated"
    );
    Ok(tables)
}

/// Размеры сгенерированных таблиц для вывода `--stats`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TableStats {
    pub symbols: usize,
    pub terminals: usize,
    pub productions: usize,
    pub states: usize,
    pub fields: usize,
    pub alias_sequences: usize,
}

impl From<&LanguageTables> for TableStats {
    fn from(tables: &LanguageTables) -> Self {
        Self {
            symbols: tables.symbols.len(),
            terminals: tables.terminal_count,
            productions: tables.productions.len(),
            states: tables.state_count,
            fields: tables.fields.len(),
            alias_sequences: tables.alias_sequences.len(),
        }
    }
}
