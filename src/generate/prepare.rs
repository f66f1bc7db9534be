//! Normalisation of a [`Grammar`] into numbered symbols and flat productions.
//!
//! Choices and optionals are expanded into alternatives, repetitions become
//! left-recursive auxiliary rules (one per distinct repeated expression),
//! and metadata (precedence, fields, aliases) is attached to the individual
//! steps of each production.

use indexmap::IndexMap;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::core::{GenerateError, GrammarError};
use crate::grammar::{fold_case, Associativity, Grammar, Rule};
use crate::language::tables::{
    FieldId, LexicalTable, SymbolId, SymbolInfo, SymbolKind, END_SYMBOL,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TerminalKey {
    End,
    Literal(String),
    Pattern(String),
    Named(String),
    Keyword(String),
    Immediate(Box<TerminalKey>),
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    None,
    Literal(String),
    Regex(String),
    Keyword,
}

#[derive(Debug, Clone)]
struct TerminalDef {
    name: String,
    named: bool,
    visible: bool,
    extra: bool,
    lexeme: Lexeme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SymRef {
    Terminal(usize),
    Rule(usize),
    Aux(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawStep {
    symbol: SymRef,
    precedence: Option<i32>,
    associativity: Option<Associativity>,
    field: Option<String>,
    alias: Option<(String, bool)>,
}

impl RawStep {
    fn new(symbol: SymRef) -> Self {
        Self {
            symbol,
            precedence: None,
            associativity: None,
            field: None,
            alias: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Alt {
    steps: Vec<RawStep>,
    dynamic_precedence: i32,
}

impl Alt {
    fn single(symbol: SymRef) -> Self {
        Alt {
            steps: vec![RawStep::new(symbol)],
            dynamic_precedence: 0,
        }
    }
}

#[derive(Debug)]
struct RawProduction {
    lhs: SymRef,
    alt: Alt,
}

#[derive(Debug)]
struct AuxDef {
    name: String,
    origin: String,
}

/// One step of a prepared production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedStep {
    pub symbol: SymbolId,
    pub precedence: i32,
    pub associativity: Option<Associativity>,
    pub field: Option<FieldId>,
    pub alias: Option<SymbolId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedProduction {
    pub lhs: SymbolId,
    pub steps: Vec<PreparedStep>,
    pub dynamic_precedence: i32,
}

impl PreparedProduction {
    /// Static precedence of the production: that of its last step.
    pub fn precedence(&self) -> i32 {
        self.steps.last().map(|s| s.precedence).unwrap_or(0)
    }

    pub fn associativity(&self) -> Option<Associativity> {
        self.steps.last().and_then(|s| s.associativity)
    }
}

/// Grammar with numbered symbols, ready for automaton construction.
#[derive(Debug)]
pub(crate) struct PreparedGrammar {
    pub name: String,
    pub symbols: Vec<SymbolInfo>,
    pub terminal_count: usize,
    /// Terminals plus nonterminals (named and auxiliary).
    pub table_symbol_count: usize,
    pub productions: Vec<PreparedProduction>,
    /// Production indices per nonterminal, indexed by `symbol - terminal_count`.
    pub productions_by_lhs: Vec<Vec<usize>>,
    pub start: SymbolId,
    pub fields: Vec<String>,
    pub lexical: LexicalTable,
    pub conflicts: Vec<Vec<String>>,
    /// Rule name each nonterminal belongs to (auxiliary rules map to the
    /// rule that introduced them).
    pub origins: Vec<String>,
}

impl PreparedGrammar {
    pub fn is_terminal(&self, symbol: SymbolId) -> bool {
        (symbol as usize) < self.terminal_count
    }

    pub fn productions_of(&self, nonterminal: SymbolId) -> &[usize] {
        &self.productions_by_lhs[nonterminal as usize - self.terminal_count]
    }

    pub fn origin(&self, nonterminal: SymbolId) -> &str {
        &self.origins[nonterminal as usize - self.terminal_count]
    }

    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        &self.symbols[symbol as usize].name
    }

    /// Production in dotted form, for diagnostics.
    pub fn display_item(&self, production: usize, dot: usize) -> String {
        let p = &self.productions[production];
        let mut out = format!("{} →", self.origin(p.lhs));
        for (i, step) in p.steps.iter().enumerate() {
            if i == dot {
                out.push_str(" •");
            }
            let symbol = &self.symbols[step.symbol as usize];
            if symbol.named || symbol.kind != SymbolKind::Terminal {
                out.push(' ');
                out.push_str(&symbol.name);
            } else {
                out.push_str(&format!(" \"{}\"", symbol.name));
            }
        }
        if dot >= p.steps.len() {
            out.push_str(" •");
        }
        out
    }
}

/// Validates and normalises `grammar`.
pub(crate) fn prepare(grammar: &Grammar) -> Result<PreparedGrammar, GenerateError> {
    validate(grammar)?;
    check_reachability(grammar)?;
    let mut builder = Builder::new(grammar);
    builder.intern_fixed_terminals()?;
    builder.flatten_rules()?;
    Ok(builder.finish()?)
}

fn validate(grammar: &Grammar) -> Result<(), GrammarError> {
    for (name, rule) in &grammar.rules {
        for symbol in rule.referenced_symbols() {
            if !grammar.rules.contains_key(symbol) && !grammar.externals.iter().any(|e| e == symbol)
            {
                return Err(GrammarError::UndefinedSymbol {
                    rule: name.clone(),
                    symbol: symbol.to_string(),
                });
            }
        }
    }

    if let Some(word) = &grammar.word {
        match grammar.rules.get(word) {
            Some(rule) if rule.is_lexical() => {}
            _ => return Err(GrammarError::InvalidWordToken(word.clone())),
        }
    }

    let mut spellings: HashMap<String, &str> = HashMap::new();
    for def in &grammar.keywords {
        for spelling in &def.spellings {
            if let Some(first) = spellings.insert(fold_case(spelling), &def.name) {
                if first != def.name {
                    return Err(GrammarError::DuplicateKeywordSpelling {
                        spelling: spelling.clone(),
                        first: first.to_string(),
                        second: def.name.clone(),
                    });
                }
            }
        }
    }

    for (index, entry) in grammar.conflicts.iter().enumerate() {
        if entry.len() < 2 {
            return Err(GrammarError::MalformedConflictEntry {
                index,
                reason: "an entry must name at least two rules".to_string(),
            });
        }
        for name in entry {
            match grammar.rules.get(name) {
                Some(rule) if !rule.is_lexical() => {}
                Some(_) => {
                    return Err(GrammarError::MalformedConflictEntry {
                        index,
                        reason: format!("`{}` is a token, not a syntactic rule", name),
                    })
                }
                None => {
                    return Err(GrammarError::MalformedConflictEntry {
                        index,
                        reason: format!("unknown rule `{}`", name),
                    })
                }
            }
        }
    }
    Ok(())
}

/// Every named rule must be reachable from the start rule, the extras or the
/// word token.
fn check_reachability(grammar: &Grammar) -> Result<(), GenerateError> {
    let mut reached: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    if let Some(start) = grammar.start_rule() {
        queue.push_back(start);
    }
    if let Some(word) = &grammar.word {
        queue.push_back(word);
    }
    for extra in &grammar.extras {
        queue.extend(extra.referenced_symbols());
    }
    while let Some(name) = queue.pop_front() {
        if !reached.insert(name) {
            continue;
        }
        if let Some(rule) = grammar.rules.get(name) {
            queue.extend(rule.referenced_symbols());
        }
    }
    let unreachable: Vec<String> = grammar
        .rules
        .keys()
        .filter(|name| !reached.contains(name.as_str()))
        .cloned()
        .collect();
    if unreachable.is_empty() {
        Ok(())
    } else {
        Err(GenerateError::UnreachableRules(unreachable))
    }
}

/// Turns a lexical rule expression into a regular expression.
fn to_regex(rule: &Rule, rule_name: &str) -> Result<String, GrammarError> {
    let invalid = |reason: &str| GrammarError::InvalidToken {
        rule: rule_name.to_string(),
        reason: reason.to_string(),
    };
    Ok(match rule {
        Rule::Blank => String::new(),
        Rule::String(text) => regex::escape(text),
        Rule::Pattern(pattern) => format!("(?:{})", pattern),
        Rule::Token(inner)
        | Rule::Prec { rule: inner, .. }
        | Rule::DynamicPrec { rule: inner, .. } => to_regex(inner, rule_name)?,
        Rule::Seq(items) => items
            .iter()
            .map(|item| to_regex(item, rule_name))
            .collect::<Result<Vec<_>, _>>()?
            .concat(),
        Rule::Choice(items) => {
            let parts = items
                .iter()
                .map(|item| to_regex(item, rule_name))
                .collect::<Result<Vec<_>, _>>()?;
            format!("(?:{})", parts.join("|"))
        }
        Rule::Optional(inner) => format!("(?:{})?", to_regex(inner, rule_name)?),
        Rule::Repeat(inner) => format!("(?:{})*", to_regex(inner, rule_name)?),
        Rule::Repeat1(inner) => format!("(?:{})+", to_regex(inner, rule_name)?),
        Rule::Symbol(_) => return Err(invalid("tokens cannot reference other rules")),
        Rule::Keyword(_) => return Err(invalid("tokens cannot contain keywords")),
        Rule::Field { .. } | Rule::Alias { .. } | Rule::Immediate(_) => {
            return Err(invalid("tokens cannot carry fields, aliases or immediate marks"))
        }
    })
}

fn check_pattern(pattern: &str, rule_name: &str) -> Result<(), GrammarError> {
    let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|source| {
        GrammarError::InvalidPattern {
            rule: rule_name.to_string(),
            pattern: pattern.to_string(),
            source,
        }
    })?;
    if regex.is_match("") {
        return Err(GrammarError::EmptyPattern {
            rule: rule_name.to_string(),
            pattern: pattern.to_string(),
        });
    }
    Ok(())
}

struct Builder<'g> {
    grammar: &'g Grammar,
    terminals: IndexMap<TerminalKey, TerminalDef>,
    rule_index: IndexMap<String, usize>,
    aux: Vec<AuxDef>,
    aux_by_content: HashMap<Rule, usize>,
    aux_counter: HashMap<String, usize>,
    anonymous_counter: HashMap<String, usize>,
    productions: Vec<RawProduction>,
    fields: BTreeSet<String>,
}

impl<'g> Builder<'g> {
    fn new(grammar: &'g Grammar) -> Self {
        let rule_index = grammar
            .rules
            .iter()
            .filter(|(_, rule)| !rule.is_lexical())
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
        Self {
            grammar,
            terminals: IndexMap::new(),
            rule_index,
            aux: Vec::new(),
            aux_by_content: HashMap::new(),
            aux_counter: HashMap::new(),
            anonymous_counter: HashMap::new(),
            productions: Vec::new(),
            fields: BTreeSet::new(),
        }
    }

    fn intern(&mut self, key: TerminalKey, def: impl FnOnce() -> TerminalDef) -> usize {
        if let Some(index) = self.terminals.get_index_of(&key) {
            return index;
        }
        self.terminals.insert_full(key, def()).0
    }

    fn intern_named_token(&mut self, name: &str) -> Result<usize, GrammarError> {
        let key = TerminalKey::Named(name.to_string());
        if let Some(index) = self.terminals.get_index_of(&key) {
            return Ok(index);
        }
        let rule = &self.grammar.rules[name];
        let lexeme = match rule {
            Rule::String(text) => Lexeme::Literal(text.clone()),
            Rule::Pattern(pattern) => {
                check_pattern(pattern, name)?;
                Lexeme::Regex(pattern.clone())
            }
            other => {
                let pattern = to_regex(other, name)?;
                check_pattern(&pattern, name)?;
                Lexeme::Regex(pattern)
            }
        };
        let def = TerminalDef {
            name: name.to_string(),
            named: true,
            visible: !name.starts_with('_'),
            extra: false,
            lexeme,
        };
        Ok(self.terminals.insert_full(key, def).0)
    }

    fn intern_anonymous_pattern(&mut self, pattern: String, rule_name: &str) -> Result<usize, GrammarError> {
        check_pattern(&pattern, rule_name)?;
        let key = TerminalKey::Pattern(pattern.clone());
        if let Some(index) = self.terminals.get_index_of(&key) {
            return Ok(index);
        }
        let counter = self.anonymous_counter.entry(rule_name.to_string()).or_insert(0);
        *counter += 1;
        let name = format!("{}_token{}", rule_name, counter);
        Ok(self.intern(key, || TerminalDef {
            name,
            named: false,
            visible: false,
            extra: false,
            lexeme: Lexeme::Regex(pattern),
        }))
    }

    fn intern_fixed_terminals(&mut self) -> Result<(), GrammarError> {
        self.intern(TerminalKey::End, || TerminalDef {
            name: "end".to_string(),
            named: false,
            visible: false,
            extra: false,
            lexeme: Lexeme::None,
        });
        let grammar = self.grammar;
        if let Some(word) = &grammar.word {
            self.intern_named_token(word)?;
        }
        for name in &grammar.externals {
            let name = name.clone();
            let visible = !name.starts_with('_');
            self.intern(TerminalKey::External(name.clone()), || TerminalDef {
                name,
                named: true,
                visible,
                extra: false,
                lexeme: Lexeme::None,
            });
        }
        for extra in &grammar.extras {
            let index = match extra {
                Rule::Symbol(name) => match grammar.rules.get(name) {
                    Some(rule) if rule.is_lexical() => self.intern_named_token(name)?,
                    _ => {
                        return Err(GrammarError::InvalidToken {
                            rule: name.clone(),
                            reason: "extras must be tokens".to_string(),
                        })
                    }
                },
                Rule::String(text) => {
                    let text = text.clone();
                    self.intern(TerminalKey::Literal(text.clone()), || TerminalDef {
                        name: text.clone(),
                        named: false,
                        visible: true,
                        extra: false,
                        lexeme: Lexeme::Literal(text),
                    })
                }
                Rule::Pattern(pattern) => self.intern_anonymous_pattern(pattern.clone(), "extra")?,
                _ => {
                    return Err(GrammarError::InvalidToken {
                        rule: "extras".to_string(),
                        reason: "extras must be tokens".to_string(),
                    })
                }
            };
            self.terminals[index].extra = true;
        }
        Ok(())
    }

    fn flatten_rules(&mut self) -> Result<(), GrammarError> {
        let grammar = self.grammar;
        for (name, rule) in &grammar.rules {
            let Some(&index) = self.rule_index.get(name) else {
                continue;
            };
            let alts = self.flatten(rule, name)?;
            for alt in dedup(alts) {
                self.productions.push(RawProduction {
                    lhs: SymRef::Rule(index),
                    alt,
                });
            }
        }
        Ok(())
    }

    fn flatten(&mut self, rule: &Rule, rule_name: &str) -> Result<Vec<Alt>, GrammarError> {
        Ok(match rule {
            Rule::Blank => vec![Alt::default()],
            Rule::String(text) => {
                let text = text.clone();
                let index = self.intern(TerminalKey::Literal(text.clone()), || TerminalDef {
                    name: text.clone(),
                    named: false,
                    visible: true,
                    extra: false,
                    lexeme: Lexeme::Literal(text),
                });
                vec![Alt::single(SymRef::Terminal(index))]
            }
            Rule::Pattern(pattern) => {
                let index = self.intern_anonymous_pattern(pattern.clone(), rule_name)?;
                vec![Alt::single(SymRef::Terminal(index))]
            }
            Rule::Token(inner) => {
                let pattern = to_regex(inner, rule_name)?;
                let index = self.intern_anonymous_pattern(pattern, rule_name)?;
                vec![Alt::single(SymRef::Terminal(index))]
            }
            Rule::Keyword(name) => {
                if self.grammar.keyword(name).is_none() {
                    return Err(GrammarError::UndefinedKeyword {
                        rule: rule_name.to_string(),
                        keyword: name.clone(),
                    });
                }
                let name = name.clone();
                let index = self.intern(TerminalKey::Keyword(name.clone()), || TerminalDef {
                    name,
                    named: false,
                    visible: true,
                    extra: false,
                    lexeme: Lexeme::Keyword,
                });
                vec![Alt::single(SymRef::Terminal(index))]
            }
            Rule::Symbol(name) => vec![Alt::single(self.resolve_symbol(name, rule_name)?)],
            Rule::Seq(items) => {
                let mut acc = vec![Alt::default()];
                for item in items {
                    let alts = self.flatten(item, rule_name)?;
                    let mut next = Vec::with_capacity(acc.len() * alts.len());
                    for prefix in &acc {
                        for alt in &alts {
                            let mut steps = prefix.steps.clone();
                            steps.extend(alt.steps.iter().cloned());
                            next.push(Alt {
                                steps,
                                dynamic_precedence: stronger(
                                    prefix.dynamic_precedence,
                                    alt.dynamic_precedence,
                                ),
                            });
                        }
                    }
                    acc = next;
                }
                acc
            }
            Rule::Choice(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(self.flatten(item, rule_name)?);
                }
                out
            }
            Rule::Optional(inner) => {
                let mut out = self.flatten(inner, rule_name)?;
                out.push(Alt::default());
                out
            }
            Rule::Repeat1(inner) => {
                let aux = self.repeat_aux(inner, rule_name)?;
                vec![Alt::single(SymRef::Aux(aux))]
            }
            Rule::Repeat(inner) => {
                let aux = self.repeat_aux(inner, rule_name)?;
                vec![Alt::single(SymRef::Aux(aux)), Alt::default()]
            }
            Rule::Prec {
                value,
                associativity,
                rule,
            } => {
                let mut alts = self.flatten(rule, rule_name)?;
                if alts.iter().all(|alt| alt.steps.is_empty()) {
                    return Err(GrammarError::MalformedPrecedence {
                        rule: rule_name.to_string(),
                        reason: "precedence wraps a rule that matches nothing".to_string(),
                    });
                }
                for step in alts.iter_mut().flat_map(|alt| alt.steps.iter_mut()) {
                    if step.precedence.is_none() {
                        step.precedence = Some(*value);
                        step.associativity = *associativity;
                    }
                }
                alts
            }
            Rule::DynamicPrec { value, rule } => {
                let mut alts = self.flatten(rule, rule_name)?;
                for alt in &mut alts {
                    alt.dynamic_precedence = stronger(alt.dynamic_precedence, *value);
                }
                alts
            }
            Rule::Field { name, rule } => {
                let mut alts = self.flatten(rule, rule_name)?;
                self.fields.insert(name.clone());
                for step in alts.iter_mut().flat_map(|alt| alt.steps.iter_mut()) {
                    if step.field.is_none() {
                        step.field = Some(name.clone());
                    }
                }
                alts
            }
            Rule::Alias { value, named, rule } => {
                let mut alts = self.flatten(rule, rule_name)?;
                for alt in &mut alts {
                    if alt.steps.len() != 1 {
                        return Err(GrammarError::MalformedAlias {
                            rule: rule_name.to_string(),
                            reason: format!("alias `{}` must wrap exactly one symbol", value),
                        });
                    }
                    alt.steps[0].alias = Some((value.clone(), *named));
                }
                alts
            }
            Rule::Immediate(inner) => {
                let mut alts = self.flatten(inner, rule_name)?;
                for alt in &mut alts {
                    let base = match alt.steps.as_slice() {
                        [step] => match step.symbol {
                            SymRef::Terminal(index) if index != 0 => index,
                            _ => return Err(GrammarError::InvalidImmediate(rule_name.to_string())),
                        },
                        _ => return Err(GrammarError::InvalidImmediate(rule_name.to_string())),
                    };
                    let (base_key, base_def) = match self.terminals.get_index(base) {
                        Some((key, def)) => (key.clone(), def.clone()),
                        None => return Err(GrammarError::InvalidImmediate(rule_name.to_string())),
                    };
                    if matches!(base_key, TerminalKey::External(_)) {
                        return Err(GrammarError::InvalidImmediate(rule_name.to_string()));
                    }
                    let twin = self.intern(TerminalKey::Immediate(Box::new(base_key)), || {
                        TerminalDef {
                            extra: false,
                            lexeme: Lexeme::None,
                            ..base_def
                        }
                    });
                    alt.steps[0].symbol = SymRef::Terminal(twin);
                }
                alts
            }
        })
    }

    fn resolve_symbol(&mut self, name: &str, rule_name: &str) -> Result<SymRef, GrammarError> {
        if let Some(&index) = self.rule_index.get(name) {
            return Ok(SymRef::Rule(index));
        }
        if self.grammar.rules.contains_key(name) {
            return Ok(SymRef::Terminal(self.intern_named_token(name)?));
        }
        let key = TerminalKey::External(name.to_string());
        match self.terminals.get_index_of(&key) {
            Some(index) => Ok(SymRef::Terminal(index)),
            None => Err(GrammarError::UndefinedSymbol {
                rule: rule_name.to_string(),
                symbol: name.to_string(),
            }),
        }
    }

    /// Auxiliary rule `aux → aux item | item` for a repeated expression.
    fn repeat_aux(&mut self, content: &Rule, rule_name: &str) -> Result<usize, GrammarError> {
        if let Some(&index) = self.aux_by_content.get(content) {
            return Ok(index);
        }
        let counter = self.aux_counter.entry(rule_name.to_string()).or_insert(0);
        *counter += 1;
        let index = self.aux.len();
        self.aux.push(AuxDef {
            name: format!("{}_repeat{}", rule_name, counter),
            origin: rule_name.to_string(),
        });
        self.aux_by_content.insert(content.clone(), index);

        let alts = dedup(self.flatten(content, rule_name)?);
        if alts.iter().any(|alt| alt.steps.is_empty()) {
            return Err(GrammarError::EmptyRepeat(rule_name.to_string()));
        }
        for alt in &alts {
            let mut steps = vec![RawStep::new(SymRef::Aux(index))];
            steps.extend(alt.steps.iter().cloned());
            self.productions.push(RawProduction {
                lhs: SymRef::Aux(index),
                alt: Alt {
                    steps,
                    dynamic_precedence: alt.dynamic_precedence,
                },
            });
        }
        for alt in alts {
            self.productions.push(RawProduction {
                lhs: SymRef::Aux(index),
                alt,
            });
        }
        Ok(index)
    }

    fn finish(self) -> Result<PreparedGrammar, GrammarError> {
        let grammar = self.grammar;

        // Terminal numbering: end, ordinary tokens in discovery order, externals.
        let mut order: Vec<usize> = Vec::with_capacity(self.terminals.len());
        order.push(0);
        for (index, key) in self.terminals.keys().enumerate().skip(1) {
            if !matches!(key, TerminalKey::External(_)) {
                order.push(index);
            }
        }
        for name in &grammar.externals {
            if let Some(index) = self.terminals.get_index_of(&TerminalKey::External(name.clone())) {
                order.push(index);
            }
        }
        let mut terminal_ids = vec![0 as SymbolId; self.terminals.len()];
        for (id, &index) in order.iter().enumerate() {
            terminal_ids[index] = id as SymbolId;
        }

        let terminal_count = order.len();
        let rule_count = self.rule_index.len();
        let table_symbol_count = terminal_count + rule_count + self.aux.len();
        let symbol_id = |symbol: SymRef| -> SymbolId {
            match symbol {
                SymRef::Terminal(index) => terminal_ids[index],
                SymRef::Rule(index) => (terminal_count + index) as SymbolId,
                SymRef::Aux(index) => (terminal_count + rule_count + index) as SymbolId,
            }
        };

        let mut symbols: Vec<SymbolInfo> = Vec::with_capacity(table_symbol_count);
        for &index in &order {
            let (key, def) = match self.terminals.get_index(index) {
                Some(entry) => entry,
                None => continue,
            };
            symbols.push(SymbolInfo {
                name: def.name.clone(),
                kind: SymbolKind::Terminal,
                named: def.named,
                visible: def.visible,
                extra: def.extra,
                external: matches!(key, TerminalKey::External(_)),
                public: 0,
            });
        }
        for name in self.rule_index.keys() {
            symbols.push(SymbolInfo {
                name: name.clone(),
                kind: SymbolKind::Nonterminal,
                named: true,
                visible: !name.starts_with('_'),
                extra: false,
                external: false,
                public: 0,
            });
        }
        for aux in &self.aux {
            symbols.push(SymbolInfo {
                name: aux.name.clone(),
                kind: SymbolKind::Auxiliary,
                named: false,
                visible: false,
                extra: false,
                external: false,
                public: 0,
            });
        }

        let fields: Vec<String> = self.fields.iter().cloned().collect();
        let field_id = |name: &str| fields.iter().position(|f| f == name).map(|i| i as FieldId);

        // Aliases collapse onto an existing visible kind with the same name,
        // or get a kind of their own after all table symbols.
        let mut alias_ids: IndexMap<(String, bool), SymbolId> = IndexMap::new();
        let mut productions = Vec::with_capacity(self.productions.len());
        for raw in &self.productions {
            let mut steps = Vec::with_capacity(raw.alt.steps.len());
            for step in &raw.alt.steps {
                let alias = match &step.alias {
                    None => None,
                    Some((value, named)) => {
                        let existing = symbols.iter().position(|s| {
                            s.visible && s.named == *named && &s.name == value && s.kind != SymbolKind::Alias
                        });
                        Some(match existing {
                            Some(id) => id as SymbolId,
                            None => {
                                let next = (table_symbol_count + alias_ids.len()) as SymbolId;
                                *alias_ids.entry((value.clone(), *named)).or_insert(next)
                            }
                        })
                    }
                };
                steps.push(PreparedStep {
                    symbol: symbol_id(step.symbol),
                    precedence: step.precedence.unwrap_or(0),
                    associativity: step.associativity,
                    field: step.field.as_deref().and_then(field_id),
                    alias,
                });
            }
            productions.push(PreparedProduction {
                lhs: symbol_id(raw.lhs),
                steps,
                dynamic_precedence: raw.alt.dynamic_precedence,
            });
        }
        for (value, named) in alias_ids.keys() {
            symbols.push(SymbolInfo {
                name: value.clone(),
                kind: SymbolKind::Alias,
                named: *named,
                visible: true,
                extra: false,
                external: false,
                public: 0,
            });
        }

        let mut canonical: HashMap<(String, bool), SymbolId> = HashMap::new();
        for (id, symbol) in symbols.iter_mut().enumerate() {
            symbol.public = if symbol.visible && id != END_SYMBOL as usize {
                *canonical
                    .entry((symbol.name.clone(), symbol.named))
                    .or_insert(id as SymbolId)
            } else {
                id as SymbolId
            };
        }

        productions.sort_by_key(|p| p.lhs);
        let mut productions_by_lhs = vec![Vec::new(); table_symbol_count - terminal_count];
        for (index, production) in productions.iter().enumerate() {
            productions_by_lhs[production.lhs as usize - terminal_count].push(index);
        }

        let mut origins: Vec<String> = self.rule_index.keys().cloned().collect();
        origins.extend(self.aux.iter().map(|aux| aux.origin.clone()));

        let lexical = self.lexical_table(&terminal_ids);
        let start_name = grammar.start_rule().unwrap_or_default();
        let start = match self.rule_index.get(start_name) {
            Some(&index) => (terminal_count + index) as SymbolId,
            None => {
                return Err(GrammarError::InvalidToken {
                    rule: start_name.to_string(),
                    reason: "the start rule must be a syntactic rule".to_string(),
                })
            }
        };

        debug!(
            terminals = terminal_count,
            nonterminals = table_symbol_count - terminal_count,
            productions = productions.len(),
            "grammar prepared"
        );

        Ok(PreparedGrammar {
            name: grammar.name.clone(),
            symbols,
            terminal_count,
            table_symbol_count,
            productions,
            productions_by_lhs,
            start,
            fields,
            lexical,
            conflicts: grammar.conflicts.clone(),
            origins,
        })
    }

    fn lexical_table(&self, terminal_ids: &[SymbolId]) -> LexicalTable {
        let mut table = LexicalTable::default();
        for (index, (key, def)) in self.terminals.iter().enumerate() {
            let id = terminal_ids[index];
            match (&def.lexeme, key) {
                (Lexeme::Literal(text), _) => table.literals.push((text.clone(), id)),
                (Lexeme::Regex(pattern), _) => table.patterns.push((pattern.clone(), id)),
                (Lexeme::Keyword, TerminalKey::Keyword(name)) => {
                    if let Some(def) = self.grammar.keyword(name) {
                        for spelling in &def.spellings {
                            table.keywords.push((fold_case(spelling), id));
                        }
                    }
                }
                (Lexeme::None, TerminalKey::Immediate(base)) => {
                    if let Some(base) = self.terminals.get_index_of(base.as_ref()) {
                        table.immediate_twins.push((terminal_ids[base], id));
                    }
                }
                _ => {}
            }
            if def.extra {
                table.extras.push(id);
            }
        }
        table.literals.sort();
        table.patterns.sort_by_key(|(_, id)| *id);
        table.keywords.sort();
        table.keywords.dedup();
        table.extras.sort_unstable();
        table.immediate_twins.sort_unstable();
        table.word = self
            .grammar
            .word
            .as_ref()
            .and_then(|w| self.terminals.get_index_of(&TerminalKey::Named(w.clone())))
            .map(|index| terminal_ids[index]);
        for name in &self.grammar.externals {
            if let Some(index) = self.terminals.get_index_of(&TerminalKey::External(name.clone())) {
                table.externals.push(terminal_ids[index]);
            }
        }
        table
    }
}

fn stronger(a: i32, b: i32) -> i32 {
    if b.abs() > a.abs() {
        b
    } else {
        a
    }
}

fn dedup(alts: Vec<Alt>) -> Vec<Alt> {
    let mut out: Vec<Alt> = Vec::with_capacity(alts.len());
    for alt in alts {
        if !out.contains(&alt) {
            out.push(alt);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{optional, pattern, prec, repeat, sym, GrammarBuilder};
    use crate::{choice, seq};

    fn prepared(builder: GrammarBuilder) -> PreparedGrammar {
        prepare(&builder.build().unwrap()).unwrap()
    }

    #[test]
    fn test_optional_expands_into_alternatives() {
        let g = prepared(
            GrammarBuilder::new("t")
                .rule("start", seq!["a", optional("b"), "c"])
        );
        assert_eq!(g.productions.len(), 2);
        assert_eq!(g.productions[0].steps.len(), 3);
        assert_eq!(g.productions[1].steps.len(), 2);
    }

    #[test]
    fn test_repeats_are_shared_by_content() {
        let g = prepared(
            GrammarBuilder::new("t")
                .rule("start", choice![sym("x"), sym("y")])
                .rule("x", seq!["(", repeat(sym("item")), ")"])
                .rule("y", seq!["[", repeat(sym("item")), "]"])
                .rule("item", pattern("[a-z]+")),
        );
        let aux: Vec<_> = g
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Auxiliary)
            .collect();
        assert_eq!(aux.len(), 1);
        assert_eq!(aux[0].name, "x_repeat1");
    }

    #[test]
    fn test_symbol_ids_are_grouped_by_kind() {
        let g = prepared(
            GrammarBuilder::new("t")
                .external("ext")
                .rule("start", seq![sym("ext"), sym("name"), repeat1_rule()])
                .rule("name", pattern("[a-z]+")),
        );
        assert_eq!(g.symbols[0].name, "end");
        let ext = g.symbols.iter().position(|s| s.name == "ext").unwrap();
        assert_eq!(ext, g.terminal_count - 1);
        assert!(g.symbols[g.terminal_count..]
            .iter()
            .all(|s| s.kind != SymbolKind::Terminal));
    }

    fn repeat1_rule() -> Rule {
        crate::grammar::repeat1(";")
    }

    #[test]
    fn test_precedence_around_blank_rejected() {
        let grammar = GrammarBuilder::new("t")
            .rule("start", seq!["a", prec(1, crate::grammar::blank())])
            .build()
            .unwrap();
        assert!(matches!(
            prepare(&grammar),
            Err(GenerateError::Grammar(GrammarError::MalformedPrecedence { .. }))
        ));
    }

    #[test]
    fn test_alias_on_sequence_rejected() {
        let grammar = GrammarBuilder::new("t")
            .rule("start", crate::grammar::alias(seq!["a", "b"], "pair"))
            .build()
            .unwrap();
        assert!(matches!(
            prepare(&grammar),
            Err(GenerateError::Grammar(GrammarError::MalformedAlias { .. }))
        ));
    }

    #[test]
    fn test_undefined_symbol_rejected() {
        let grammar = GrammarBuilder::new("t")
            .rule("start", sym("missing"))
            .build()
            .unwrap();
        match prepare(&grammar) {
            Err(GenerateError::Grammar(GrammarError::UndefinedSymbol { symbol, .. })) => {
                assert_eq!(symbol, "missing")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_matching_pattern_rejected() {
        let grammar = GrammarBuilder::new("t")
            .rule("start", sym("word"))
            .rule("word", pattern("[a-z]*"))
            .build()
            .unwrap();
        assert!(matches!(
            prepare(&grammar),
            Err(GenerateError::Grammar(GrammarError::EmptyPattern { .. }))
        ));
    }

    #[test]
    fn test_dotted_item_display() {
        let g = prepared(GrammarBuilder::new("t").rule("start", seq!["a", "b"]));
        assert_eq!(g.display_item(0, 1), "start → \"a\" • \"b\"");
    }
}
