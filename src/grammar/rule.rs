//! Rule expressions of the grammar DSL.
//!
//! Конструкторы повторяют привычный набор примитивов генераторов парсеров:
//! `seq`, `choice`, `optional`, `repeat`, `prec_left` и т.д.

use serde::{Deserialize, Serialize};

/// Ассоциативность продукции с одинаковым приоритетом
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Associativity {
    Left,
    Right,
}

/// A rule expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Matches empty input.
    Blank,
    /// Literal text, an anonymous token.
    String(String),
    /// Regular expression in `regex` crate syntax.
    Pattern(String),
    /// Collapses a lexical sub-expression into one token.
    Token(Box<Rule>),
    /// Reference to a keyword by its canonical name.
    Keyword(String),
    /// Reference to a named rule or an external token.
    Symbol(String),
    Seq(Vec<Rule>),
    Choice(Vec<Rule>),
    Optional(Box<Rule>),
    Repeat(Box<Rule>),
    Repeat1(Box<Rule>),
    Prec {
        value: i32,
        associativity: Option<Associativity>,
        rule: Box<Rule>,
    },
    /// Tie-breaker applied only after static precedence and associativity.
    DynamicPrec { value: i32, rule: Box<Rule> },
    Field { name: String, rule: Box<Rule> },
    Alias {
        value: String,
        named: bool,
        rule: Box<Rule>,
    },
    /// The wrapped token must start right after the previous one, with no
    /// whitespace or extras in between.
    Immediate(Box<Rule>),
}

impl From<&str> for Rule {
    fn from(text: &str) -> Self {
        Rule::String(text.to_string())
    }
}

impl Rule {
    /// Symbol names this expression refers to, in order of appearance.
    pub fn referenced_symbols(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Rule::Symbol(name) => out.push(name),
            Rule::Seq(items) | Rule::Choice(items) => {
                for item in items {
                    item.collect_symbols(out);
                }
            }
            Rule::Token(rule)
            | Rule::Optional(rule)
            | Rule::Repeat(rule)
            | Rule::Repeat1(rule)
            | Rule::Immediate(rule)
            | Rule::Prec { rule, .. }
            | Rule::DynamicPrec { rule, .. }
            | Rule::Field { rule, .. }
            | Rule::Alias { rule, .. } => rule.collect_symbols(out),
            Rule::Blank | Rule::String(_) | Rule::Pattern(_) | Rule::Keyword(_) => {}
        }
    }

    /// Whether a named rule with this body is a lexical (token) rule.
    pub fn is_lexical(&self) -> bool {
        matches!(self, Rule::String(_) | Rule::Pattern(_) | Rule::Token(_))
    }
}

pub fn blank() -> Rule {
    Rule::Blank
}

pub fn pattern(regex: &str) -> Rule {
    Rule::Pattern(regex.to_string())
}

pub fn sym(name: &str) -> Rule {
    Rule::Symbol(name.to_string())
}

pub fn kw(canonical: &str) -> Rule {
    Rule::Keyword(canonical.to_string())
}

pub fn token(rule: impl Into<Rule>) -> Rule {
    Rule::Token(Box::new(rule.into()))
}

pub fn immediate(rule: impl Into<Rule>) -> Rule {
    Rule::Immediate(Box::new(rule.into()))
}

pub fn optional(rule: impl Into<Rule>) -> Rule {
    Rule::Optional(Box::new(rule.into()))
}

pub fn repeat(rule: impl Into<Rule>) -> Rule {
    Rule::Repeat(Box::new(rule.into()))
}

pub fn repeat1(rule: impl Into<Rule>) -> Rule {
    Rule::Repeat1(Box::new(rule.into()))
}

pub fn prec(value: i32, rule: impl Into<Rule>) -> Rule {
    Rule::Prec {
        value,
        associativity: None,
        rule: Box::new(rule.into()),
    }
}

pub fn prec_left(value: i32, rule: impl Into<Rule>) -> Rule {
    Rule::Prec {
        value,
        associativity: Some(Associativity::Left),
        rule: Box::new(rule.into()),
    }
}

pub fn prec_right(value: i32, rule: impl Into<Rule>) -> Rule {
    Rule::Prec {
        value,
        associativity: Some(Associativity::Right),
        rule: Box::new(rule.into()),
    }
}

pub fn prec_dynamic(value: i32, rule: impl Into<Rule>) -> Rule {
    Rule::DynamicPrec {
        value,
        rule: Box::new(rule.into()),
    }
}

pub fn field(name: &str, rule: impl Into<Rule>) -> Rule {
    Rule::Field {
        name: name.to_string(),
        rule: Box::new(rule.into()),
    }
}

/// Renames the node produced by `rule` to the named kind `value`.
pub fn alias(rule: impl Into<Rule>, value: &str) -> Rule {
    Rule::Alias {
        value: value.to_string(),
        named: true,
        rule: Box::new(rule.into()),
    }
}

/// Renames the node produced by `rule` to the anonymous kind `value`.
pub fn alias_anonymous(rule: impl Into<Rule>, value: &str) -> Rule {
    Rule::Alias {
        value: value.to_string(),
        named: false,
        rule: Box::new(rule.into()),
    }
}

/// `rule ("," rule)*`
pub fn comma_sep1(rule: impl Into<Rule>) -> Rule {
    let rule = rule.into();
    Rule::Seq(vec![
        rule.clone(),
        repeat(Rule::Seq(vec![Rule::from(","), rule])),
    ])
}

/// Builds a [`Rule::Seq`]; string literals are accepted as items.
#[macro_export]
macro_rules! seq {
    ($($item:expr),+ $(,)?) => {
        $crate::grammar::Rule::Seq(vec![$($crate::grammar::Rule::from($item)),+])
    };
}

/// Builds a [`Rule::Choice`]; string literals are accepted as items.
#[macro_export]
macro_rules! choice {
    ($($item:expr),+ $(,)?) => {
        $crate::grammar::Rule::Choice(vec![$($crate::grammar::Rule::from($item)),+])
    };
}
