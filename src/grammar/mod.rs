/*!
# Grammar Rule Set

Declarative description of a language: named rules built from [`Rule`]
expressions, extras, external tokens, bilingual keywords and explicit
conflict entries. The first rule is the start rule; rules whose name starts
with `_` are hidden in syntax trees.

```ignore
let grammar = GrammarBuilder::new("calc")
    .rule("expr", choice![prec_left(1, seq![sym("expr"), "+", sym("expr")]), sym("number")])
    .rule("number", pattern("[0-9]+"))
    .build()?;
```
*/

use indexmap::IndexMap;

use crate::core::GrammarError;

pub mod keywords;
pub mod onescript;
pub mod rule;

pub use keywords::{canonical_keyword, fold_case};
pub use rule::*;

/// Ключевое слово: каноническое имя терминала и его написания
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordDef {
    pub name: String,
    pub spellings: Vec<String>,
}

/// A complete grammar description.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub name: String,
    pub rules: IndexMap<String, Rule>,
    /// Tokens allowed anywhere between other tokens (comments and the like).
    /// Whitespace is always skipped and needs no entry.
    pub extras: Vec<Rule>,
    /// External tokens in the order the external scanner numbers them.
    pub externals: Vec<String>,
    pub keywords: Vec<KeywordDef>,
    /// Lexical rule whose matches are checked against the keyword table.
    pub word: Option<String>,
    /// Ordered rule names; earlier names win an otherwise unresolved conflict.
    pub conflicts: Vec<Vec<String>>,
}

impl Grammar {
    pub fn start_rule(&self) -> Option<&str> {
        self.rules.keys().next().map(String::as_str)
    }

    pub fn keyword(&self, name: &str) -> Option<&KeywordDef> {
        self.keywords.iter().find(|k| k.name == name)
    }
}

/// Builder that records structural mistakes and reports them from `build`.
#[derive(Debug)]
pub struct GrammarBuilder {
    grammar: Grammar,
    duplicate_rule: Option<String>,
    duplicate_external: Option<String>,
}

impl GrammarBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            grammar: Grammar {
                name: name.to_string(),
                rules: IndexMap::new(),
                extras: Vec::new(),
                externals: Vec::new(),
                keywords: Vec::new(),
                word: None,
                conflicts: Vec::new(),
            },
            duplicate_rule: None,
            duplicate_external: None,
        }
    }

    pub fn rule(mut self, name: &str, body: impl Into<Rule>) -> Self {
        if self.grammar.rules.insert(name.to_string(), body.into()).is_some()
            && self.duplicate_rule.is_none()
        {
            self.duplicate_rule = Some(name.to_string());
        }
        self
    }

    pub fn extra(mut self, rule: impl Into<Rule>) -> Self {
        self.grammar.extras.push(rule.into());
        self
    }

    pub fn external(mut self, name: &str) -> Self {
        if self.grammar.externals.iter().any(|e| e == name) && self.duplicate_external.is_none() {
            self.duplicate_external = Some(name.to_string());
        }
        self.grammar.externals.push(name.to_string());
        self
    }

    pub fn keyword(mut self, name: &str, spellings: &[&str]) -> Self {
        self.grammar.keywords.push(KeywordDef {
            name: name.to_string(),
            spellings: spellings.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn keywords(mut self, defs: impl IntoIterator<Item = KeywordDef>) -> Self {
        self.grammar.keywords.extend(defs);
        self
    }

    pub fn word(mut self, name: &str) -> Self {
        self.grammar.word = Some(name.to_string());
        self
    }

    pub fn conflict(mut self, rules: &[&str]) -> Self {
        self.grammar
            .conflicts
            .push(rules.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Grammar, GrammarError> {
        if self.grammar.rules.is_empty() {
            return Err(GrammarError::Empty(self.grammar.name));
        }
        if let Some(name) = self.duplicate_rule {
            return Err(GrammarError::DuplicateRule(name));
        }
        if let Some(name) = self.duplicate_external {
            return Err(GrammarError::DuplicateExternal(name));
        }
        if self.grammar.externals.len() > 64 {
            return Err(GrammarError::TooManyExternals(self.grammar.externals.len()));
        }
        if let Some(def) = self.grammar.keywords.iter().find(|k| k.spellings.is_empty()) {
            return Err(GrammarError::EmptyKeyword(def.name.clone()));
        }
        Ok(self.grammar)
    }
}
