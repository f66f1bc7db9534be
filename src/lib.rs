/*!
# OneScript Syntax

Grammar-driven, incremental, error-tolerant parser for OneScript, the
bilingual (Russian / English) 1C:Enterprise scripting language.

## Architecture

```text
onescript-syntax
├── Grammar     - declarative rule DSL and the OneScript rule set
├── Generate    - LALR(1) table generator with conflict resolution
├── Language    - versioned, immutable compiled descriptor
├── Scanner     - external scanner for #Область / #КонецОбласти markers
├── Parser      - table-driven driver with error recovery and reuse
└── Diagnostics - OS001..OS003 from ERROR and MISSING nodes
```

## Usage

```ignore
use onescript_syntax::{language, Parser};

let mut parser = Parser::new();
parser.set_language(language())?;
let tree = parser.parse("Если А Тогда Б(); КонецЕсли;", None)?;
println!("{}", tree.to_sexp());
```

The descriptor returned by [`language`] is generated from the grammar on
first use and lives for the rest of the process. A grammar that does not
generate is a programming error and aborts with the full diagnostic; use
[`build_onescript_language`] to get it as a value instead.
*/

use once_cell::sync::Lazy;

pub mod cli_common;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod generate;
pub mod grammar;
pub mod language;
pub mod parser;
pub mod scanner;

pub use crate::core::{GenerateError, GrammarError, LanguageError, ParseError};
pub use config::Config;
pub use diagnostics::{collect_syntax_diagnostics, Diagnostic, DiagnosticCode};
pub use generate::{generate, TableStats};
pub use grammar::{Grammar, GrammarBuilder};
pub use language::{Language, LANGUAGE_VERSION};
pub use parser::{InputEdit, Node, ParseConfig, Parser, Tree};

static ONESCRIPT_LANGUAGE: Lazy<Language> = Lazy::new(|| match build_onescript_language() {
    Ok(language) => language,
    Err(e) => panic!("{}", failure_message(&e)),
});

/// Текст ошибки сборки языка с перечнем виновных правил
fn failure_message(error: &LanguageError) -> String {
    let rules = match error {
        LanguageError::Generation { source, .. } => source.rule_names(),
        _ => Vec::new(),
    };
    if rules.is_empty() {
        error.to_string()
    } else {
        format!("{} [rules: {}]", error, rules.join(", "))
    }
}

/// Shared OneScript language descriptor.
///
/// Every call returns the same instance.
pub fn language() -> &'static Language {
    &ONESCRIPT_LANGUAGE
}

/// Generates the OneScript tables and compiles a fresh descriptor.
pub fn build_onescript_language() -> Result<Language, LanguageError> {
    let generation_error = |source: GenerateError| LanguageError::Generation {
        name: grammar::onescript::GRAMMAR_NAME.to_string(),
        source,
    };
    let grammar = grammar::onescript::grammar().map_err(|e| generation_error(e.into()))?;
    let tables = generate(&grammar).map_err(generation_error)?;
    Language::new(tables, &scanner::ONESCRIPT_SCANNER)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_is_a_singleton() {
        assert!(std::ptr::eq(language(), language()));
        assert_eq!(language().version(), LANGUAGE_VERSION);
        assert_eq!(language().name(), "onescript");
    }

    #[test]
    fn test_failure_message_names_rules() {
        let error = LanguageError::Generation {
            name: "onescript".to_string(),
            source: GenerateError::UnreachableRules(vec!["orphan".to_string()]),
        };
        assert!(failure_message(&error).ends_with("[rules: orphan]"));

        let error = LanguageError::InvalidArtifact("truncated".to_string());
        assert_eq!(failure_message(&error), error.to_string());
    }

    #[test]
    fn test_fresh_language_matches_shared_tables() {
        let fresh = build_onescript_language().unwrap();
        assert_eq!(fresh.to_bytes().unwrap(), language().to_bytes().unwrap());
    }
}
