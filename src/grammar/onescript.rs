//! Грамматика OneScript
//!
//! Модуль состоит из объявлений переменных, методов и областей, за которыми
//! следует тело модуля. Операторы разделяются `;`, после последнего оператора
//! блока точка с запятой необязательна.
//!
//! Приоритеты операций соответствуют платформе 1С: `Или` < `И` < `Не` <
//! сравнения < сложение < умножение < унарные `-` и `+`.

use super::keywords::onescript_keywords;
use super::{
    alias, alias_anonymous, comma_sep1, field, immediate, kw, optional, pattern, prec, prec_left,
    repeat, repeat1, sym, token, Grammar, GrammarBuilder, Rule,
};
use crate::core::GrammarError;
use crate::{choice, seq};

pub const GRAMMAR_NAME: &str = "onescript";

/// Индексы внешних токенов в порядке объявления
pub mod externals {
    pub const REGION_START: usize = 0;
    pub const REGION_END: usize = 1;
    pub const STRING: usize = 2;
    pub const DATE: usize = 3;

    pub const NAMES: [&str; 4] = ["region_start", "region_end", "string", "date_literal"];
}

mod precedence {
    pub const OR: i32 = 1;
    pub const AND: i32 = 2;
    pub const NOT: i32 = 3;
    pub const RELATIONAL: i32 = 4;
    pub const ADD: i32 = 5;
    pub const MULTIPLY: i32 = 6;
    pub const UNARY: i32 = 7;
}

fn binary(prec: i32, operator: Rule) -> Rule {
    prec_left(
        prec,
        seq![
            field("left", sym("_expression")),
            field("operator", operator),
            field("right", sym("_expression")),
        ],
    )
}

/// Маркер области виден как безымянный узел: в именованных потомках
/// `region` остаются только имя и содержимое.
fn region_marker(external: &str, kind: &str) -> Rule {
    alias_anonymous(sym(external), kind)
}

fn method(keyword: &str, end_keyword: &str) -> Rule {
    seq![
        repeat(sym("annotation")),
        kw(keyword),
        field("name", sym("identifier")),
        field("parameters", sym("parameters")),
        optional(field("export", alias(kw("Export"), "export"))),
        optional(field("variables", sym("var_block"))),
        optional(field("body", sym("block"))),
        kw(end_keyword),
    ]
}

fn handler_statement(keyword: &str) -> Rule {
    seq![
        kw(keyword),
        field("event", sym("_expression")),
        ",",
        field("handler", sym("_expression")),
    ]
}

/// Builds the OneScript grammar.
pub fn grammar() -> Result<Grammar, GrammarError> {
    let mut builder = GrammarBuilder::new(GRAMMAR_NAME)
        .word("identifier")
        .extra(sym("comment"))
        .extra(sym("preprocessor_directive"))
        .keywords(onescript_keywords())
        .conflict(&["region", "code_region"]);
    for name in externals::NAMES {
        builder = builder.external(name);
    }

    builder
        // Модуль
        .rule(
            "source_file",
            seq![repeat(sym("_declaration")), optional(sym("_statements"))],
        )
        .rule(
            "_declaration",
            choice![
                sym("module_var_declaration"),
                sym("procedure_declaration"),
                sym("function_declaration"),
                sym("region"),
            ],
        )
        .rule(
            "module_var_declaration",
            seq![
                repeat(sym("annotation")),
                kw("Var"),
                comma_sep1(sym("variable")),
                ";",
            ],
        )
        .rule(
            "variable",
            seq![
                field("name", sym("identifier")),
                optional(field("export", alias(kw("Export"), "export"))),
            ],
        )
        .rule(
            "annotation",
            seq![
                "&",
                field("name", immediate(sym("identifier"))),
                optional(field("arguments", sym("annotation_arguments"))),
            ],
        )
        .rule(
            "annotation_arguments",
            seq!["(", optional(comma_sep1(sym("annotation_argument"))), ")"],
        )
        .rule(
            "annotation_argument",
            choice![
                seq![
                    field("name", sym("identifier")),
                    optional(seq!["=", field("value", sym("_literal"))]),
                ],
                field("value", sym("_literal")),
            ],
        )
        .rule("procedure_declaration", method("Procedure", "EndProcedure"))
        .rule("function_declaration", method("Function", "EndFunction"))
        .rule(
            "parameters",
            seq!["(", optional(comma_sep1(sym("parameter"))), ")"],
        )
        .rule(
            "parameter",
            seq![
                repeat(sym("annotation")),
                optional(field("val", alias(kw("Val"), "val"))),
                field("name", sym("identifier")),
                optional(seq!["=", field("default", sym("_default_value"))]),
            ],
        )
        .rule(
            "_default_value",
            choice![sym("_literal"), sym("unary_expression")],
        )
        .rule("var_block", repeat1(sym("var_declaration")))
        .rule(
            "var_declaration",
            seq![kw("Var"), comma_sep1(field("name", sym("identifier"))), ";"],
        )
        // Области
        .rule(
            "region",
            seq![
                region_marker("region_start", "#Region"),
                field("name", sym("identifier")),
                repeat(sym("_declaration")),
                optional(sym("_statements")),
                region_marker("region_end", "#EndRegion"),
            ],
        )
        .rule(
            "code_region",
            seq![
                region_marker("region_start", "#Region"),
                field("name", sym("identifier")),
                optional(sym("_statements")),
                region_marker("region_end", "#EndRegion"),
            ],
        )
        // Операторы
        .rule("block", sym("_statements"))
        .rule(
            "_statements",
            choice![
                seq![repeat1(sym("_terminated_statement")), optional(sym("_statement"))],
                sym("_statement"),
            ],
        )
        .rule(
            "_terminated_statement",
            choice![
                seq![sym("_statement"), ";"],
                ";",
                alias(sym("code_region"), "region"),
            ],
        )
        .rule(
            "_statement",
            choice![
                sym("assignment"),
                sym("call_statement"),
                sym("if_statement"),
                sym("while_loop"),
                sym("for_loop"),
                sym("for_each_loop"),
                sym("try_statement"),
                sym("return_statement"),
                sym("raise_operator"),
                sym("break_statement"),
                sym("continue_statement"),
                sym("add_handler"),
                sym("remove_handler"),
            ],
        )
        .rule(
            "assignment",
            seq![
                field("left", sym("_lvalue")),
                "=",
                field("right", sym("_expression")),
            ],
        )
        .rule("call_statement", field("call", sym("method_call")))
        .rule(
            "if_statement",
            seq![
                kw("If"),
                field("condition", sym("_expression")),
                kw("Then"),
                optional(field("consequence", sym("block"))),
                repeat(sym("elsif_clause")),
                optional(field("alternative", sym("else_clause"))),
                kw("EndIf"),
            ],
        )
        .rule(
            "elsif_clause",
            seq![
                kw("ElsIf"),
                field("condition", sym("_expression")),
                kw("Then"),
                optional(field("consequence", sym("block"))),
            ],
        )
        .rule(
            "else_clause",
            seq![kw("Else"), optional(field("body", sym("block")))],
        )
        .rule(
            "while_loop",
            seq![
                kw("While"),
                field("condition", sym("_expression")),
                kw("Do"),
                optional(field("body", sym("block"))),
                kw("EndDo"),
            ],
        )
        .rule(
            "for_loop",
            seq![
                kw("For"),
                field("variable", sym("identifier")),
                "=",
                field("start", sym("_expression")),
                kw("To"),
                field("end", sym("_expression")),
                kw("Do"),
                optional(field("body", sym("block"))),
                kw("EndDo"),
            ],
        )
        .rule(
            "for_each_loop",
            seq![
                kw("For"),
                kw("Each"),
                field("variable", sym("identifier")),
                kw("In"),
                field("collection", sym("_expression")),
                kw("Do"),
                optional(field("body", sym("block"))),
                kw("EndDo"),
            ],
        )
        .rule(
            "try_statement",
            seq![
                kw("Try"),
                optional(field("body", sym("block"))),
                kw("Except"),
                optional(field("handler", sym("block"))),
                kw("EndTry"),
            ],
        )
        .rule(
            "return_statement",
            seq![kw("Return"), optional(field("value", sym("_expression")))],
        )
        .rule(
            "raise_operator",
            seq![kw("Raise"), optional(field("value", sym("_expression")))],
        )
        .rule("break_statement", kw("Break"))
        .rule("continue_statement", kw("Continue"))
        .rule("add_handler", handler_statement("AddHandler"))
        .rule("remove_handler", handler_statement("RemoveHandler"))
        // Выражения
        .rule(
            "_expression",
            choice![
                sym("_lvalue"),
                sym("_literal"),
                sym("unary_expression"),
                sym("binary_expression"),
                sym("ternary_expression"),
                sym("new_expression"),
                sym("parenthesized_expression"),
            ],
        )
        .rule(
            "_lvalue",
            choice![
                sym("identifier"),
                sym("member_access"),
                sym("index_access"),
                sym("method_call"),
            ],
        )
        .rule(
            "member_access",
            seq![
                field("object", sym("_lvalue")),
                ".",
                field("property", sym("identifier")),
            ],
        )
        .rule(
            "index_access",
            seq![
                field("object", sym("_lvalue")),
                "[",
                field("index", sym("_expression")),
                "]",
            ],
        )
        .rule(
            "method_call",
            seq![
                field("function", sym("_lvalue")),
                field("arguments", sym("arguments")),
            ],
        )
        .rule("arguments", seq!["(", optional(sym("_argument_list")), ")"])
        .rule(
            "_argument_list",
            choice![
                seq![
                    sym("_expression"),
                    repeat(seq![",", optional(sym("_expression"))]),
                ],
                repeat1(seq![",", optional(sym("_expression"))]),
            ],
        )
        .rule(
            "unary_expression",
            choice![
                prec(
                    precedence::UNARY,
                    seq![
                        field("operator", choice!["-", "+"]),
                        field("operand", sym("_expression")),
                    ],
                ),
                prec(
                    precedence::NOT,
                    seq![
                        field("operator", kw("Not")),
                        field("operand", sym("_expression")),
                    ],
                ),
            ],
        )
        .rule(
            "binary_expression",
            choice![
                binary(precedence::OR, kw("Or")),
                binary(precedence::AND, kw("And")),
                binary(
                    precedence::RELATIONAL,
                    choice!["=", "<>", "<", "<=", ">", ">="],
                ),
                binary(precedence::ADD, choice!["+", "-"]),
                binary(precedence::MULTIPLY, choice!["*", "/", "%"]),
            ],
        )
        .rule(
            "ternary_expression",
            seq![
                "?",
                "(",
                field("condition", sym("_expression")),
                ",",
                field("consequence", sym("_expression")),
                ",",
                field("alternative", sym("_expression")),
                ")",
            ],
        )
        .rule(
            "new_expression",
            choice![
                seq![
                    kw("New"),
                    field("type", sym("identifier")),
                    optional(field("arguments", sym("arguments"))),
                ],
                seq![
                    kw("New"),
                    "(",
                    field("type", sym("_expression")),
                    optional(seq![",", field("arguments", sym("_expression"))]),
                    ")",
                ],
            ],
        )
        .rule(
            "parenthesized_expression",
            seq!["(", sym("_expression"), ")"],
        )
        .rule(
            "_literal",
            choice![
                sym("number"),
                sym("string"),
                sym("date_literal"),
                alias(kw("True"), "true_literal"),
                alias(kw("False"), "false_literal"),
                alias(kw("Undefined"), "undefined_literal"),
                alias(kw("Null"), "null_literal"),
            ],
        )
        // Лексемы
        .rule("identifier", pattern(r"[\p{L}_][\p{L}\p{N}_]*"))
        .rule(
            "number",
            token(seq![pattern("[0-9]+"), optional(seq![".", pattern("[0-9]+")])]),
        )
        .rule("comment", pattern(r"//[^\r\n]*"))
        .rule("preprocessor_directive", pattern(r"#[^\r\n]*"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grammar_builds() {
        let grammar = grammar().unwrap();
        assert_eq!(grammar.start_rule(), Some("source_file"));
        assert_eq!(grammar.externals, externals::NAMES.to_vec());
        assert_eq!(grammar.word.as_deref(), Some("identifier"));
        assert!(grammar.keyword("If").is_some());
    }

    #[test]
    fn test_every_referenced_rule_is_defined() {
        let grammar = grammar().unwrap();
        for (name, rule) in &grammar.rules {
            for symbol in rule.referenced_symbols() {
                assert!(
                    grammar.rules.contains_key(symbol)
                        || grammar.externals.iter().any(|e| e == symbol),
                    "{} references {}",
                    name,
                    symbol
                );
            }
        }
    }
}
