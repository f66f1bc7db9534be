//! Table generation: determinism and build-time rejections.

use onescript_syntax::grammar::{onescript, pattern, prec_left, sym, GrammarBuilder};
use onescript_syntax::language::tables::Action;
use onescript_syntax::{choice, seq};
use onescript_syntax::{generate, GenerateError, Language, TableStats};

#[test]
fn test_generation_is_deterministic() {
    let grammar = onescript::grammar().unwrap();
    let first = generate(&grammar).unwrap();
    let second = generate(&onescript::grammar().unwrap()).unwrap();
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    assert_eq!(TableStats::from(&first), TableStats::from(&second));
}

#[test]
fn test_ambiguity_names_both_rules() {
    let grammar = GrammarBuilder::new("ambiguous")
        .rule("start", choice![sym("first"), sym("second")])
        .rule("first", seq!["x", "y"])
        .rule("second", seq!["x", "y"])
        .build()
        .unwrap();
    let err = generate(&grammar).unwrap_err();
    assert!(matches!(err, GenerateError::UnresolvedConflicts(_)));
    assert_eq!(
        err.rule_names(),
        vec!["first".to_string(), "second".to_string()]
    );
    let message = err.to_string();
    assert!(message.contains("first") && message.contains("second"), "{}", message);
}

#[test]
fn test_conflict_entry_accepts_ambiguity() {
    let grammar = GrammarBuilder::new("declared")
        .rule("start", choice![sym("first"), sym("second")])
        .rule("first", seq!["x", "y"])
        .rule("second", seq!["x", "y"])
        .conflict(&["first", "second"])
        .build()
        .unwrap();
    assert!(generate(&grammar).is_ok());
}

#[test]
fn test_unreachable_rule_rejected() {
    let grammar = GrammarBuilder::new("orphans")
        .rule("start", seq!["x", sym("number")])
        .rule("number", pattern("[0-9]+"))
        .rule("orphan", seq!["y", "z"])
        .build()
        .unwrap();
    match generate(&grammar) {
        Err(GenerateError::UnreachableRules(rules)) => {
            assert_eq!(rules, vec!["orphan".to_string()])
        }
        other => panic!("expected unreachable rules, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_precedence_resolves_operators() {
    let grammar = GrammarBuilder::new("calc")
        .rule(
            "expr",
            choice![
                prec_left(1, seq![sym("expr"), "+", sym("expr")]),
                prec_left(2, seq![sym("expr"), "*", sym("expr")]),
                sym("number"),
            ],
        )
        .rule("number", pattern("[0-9]+"))
        .build()
        .unwrap();
    let tables = generate(&grammar).unwrap();
    assert!(tables.actions.iter().any(|a| matches!(a, Action::Accept)));
}

#[test]
fn test_onescript_tables_load() {
    let tables = generate(&onescript::grammar().unwrap()).unwrap();
    let stats = TableStats::from(&tables);
    assert!(stats.states > 100);
    assert!(stats.terminals > 50);
    let language = Language::new(tables, &onescript_syntax::scanner::ONESCRIPT_SCANNER).unwrap();
    assert_eq!(language.symbol_name(language.start_symbol()), "source_file");
}
