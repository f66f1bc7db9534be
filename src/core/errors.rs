/*!
# Error types for grammar generation, descriptors and parsing

Build-time problems are reported in full: a failed generation lists every
offending rule instead of stopping at the first one.
*/

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ошибки структуры грамматики, обнаруженные до построения автомата
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("grammar `{0}` has no rules")]
    Empty(String),

    #[error("rule `{0}` is defined more than once")]
    DuplicateRule(String),

    #[error("rule `{rule}` references undefined symbol `{symbol}`")]
    UndefinedSymbol { rule: String, symbol: String },

    #[error("rule `{rule}` references undeclared keyword `{keyword}`")]
    UndefinedKeyword { rule: String, keyword: String },

    #[error("keyword `{0}` has no spellings")]
    EmptyKeyword(String),

    #[error("spelling `{spelling}` is shared by keywords `{first}` and `{second}`")]
    DuplicateKeywordSpelling {
        spelling: String,
        first: String,
        second: String,
    },

    #[error("malformed precedence in rule `{rule}`: {reason}")]
    MalformedPrecedence { rule: String, reason: String },

    #[error("malformed alias in rule `{rule}`: {reason}")]
    MalformedAlias { rule: String, reason: String },

    #[error("repeat in rule `{0}` can match empty input")]
    EmptyRepeat(String),

    #[error("conflict entry #{index} is malformed: {reason}")]
    MalformedConflictEntry { index: usize, reason: String },

    #[error("word token `{0}` must name a lexical rule")]
    InvalidWordToken(String),

    #[error("`immediate` in rule `{0}` must wrap a single token")]
    InvalidImmediate(String),

    #[error("rule `{rule}` cannot be turned into a single token: {reason}")]
    InvalidToken { rule: String, reason: String },

    #[error("pattern `{pattern}` in rule `{rule}` is invalid: {source}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern `{pattern}` in rule `{rule}` matches empty input")]
    EmptyPattern { rule: String, pattern: String },

    #[error("external token `{0}` is declared more than once")]
    DuplicateExternal(String),

    #[error("grammar declares {0} external tokens, at most 64 are supported")]
    TooManyExternals(usize),
}

/// Вид неразрешённого конфликта LR-автомата
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::ShiftReduce => write!(f, "shift/reduce"),
            ConflictKind::ReduceReduce => write!(f, "reduce/reduce"),
        }
    }
}

/// A conflict that no precedence, associativity or conflict entry resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub state: usize,
    /// Display name of the lookahead terminal.
    pub lookahead: String,
    /// Rule names involved, sorted and deduplicated.
    pub rules: Vec<String>,
    /// Items in dotted form, one per competing action.
    pub items: Vec<String>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.rules.iter().map(|r| format!("`{}`", r)).collect();
        write!(
            f,
            "unresolved {} conflict on `{}` (state {}) between rules {}",
            self.kind,
            self.lookahead,
            self.state,
            rules.join(", ")
        )?;
        for item in &self.items {
            write!(f, "\n    {}", item)?;
        }
        Ok(())
    }
}

fn format_conflicts(conflicts: &[Conflict]) -> String {
    let mut out = format!("{} unresolved conflict(s)", conflicts.len());
    for conflict in conflicts {
        out.push_str("\n  ");
        out.push_str(&conflict.to_string().replace('\n', "\n  "));
    }
    out.push_str("\nadd precedence, associativity or a conflict entry naming these rules");
    out
}

/// Ошибки генератора таблиц
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("unreachable rules: {}", .0.join(", "))]
    UnreachableRules(Vec<String>),

    #[error("{}", format_conflicts(.0))]
    UnresolvedConflicts(Vec<Conflict>),
}

impl GenerateError {
    /// Names of the rules the diagnostic is about.
    pub fn rule_names(&self) -> Vec<String> {
        match self {
            GenerateError::Grammar(_) => Vec::new(),
            GenerateError::UnreachableRules(rules) => rules.clone(),
            GenerateError::UnresolvedConflicts(conflicts) => {
                let mut names: Vec<String> = conflicts
                    .iter()
                    .flat_map(|c| c.rules.iter().cloned())
                    .collect();
                names.sort();
                names.dedup();
                names
            }
        }
    }
}

/// Ошибки загрузки и проверки дескриптора языка
#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("language version mismatch: runtime expects {expected}, artifact has {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("invalid language artifact: {0}")]
    InvalidArtifact(String),

    #[error("invalid lexical pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("inconsistent language tables: {0}")]
    Inconsistent(String),

    #[error("failed to generate language `{name}`: {source}")]
    Generation {
        name: String,
        #[source]
        source: GenerateError,
    },
}

/// Ошибки сеанса разбора
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no language is attached to the parser")]
    NoLanguage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message_lists_rules() {
        let err = GenerateError::UnresolvedConflicts(vec![Conflict {
            kind: ConflictKind::ReduceReduce,
            state: 3,
            lookahead: "end".to_string(),
            rules: vec!["a".to_string(), "b".to_string()],
            items: vec!["a → \"x\" •".to_string(), "b → \"x\" •".to_string()],
        }]);
        let text = err.to_string();
        assert!(text.contains("reduce/reduce"));
        assert!(text.contains("`a`, `b`"));
        assert_eq!(err.rule_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_version_mismatch_message() {
        let err = LanguageError::VersionMismatch {
            expected: 3,
            found: 2,
        };
        assert!(err.to_string().contains("expects 3"));
    }
}
