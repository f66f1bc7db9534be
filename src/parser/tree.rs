//! Syntax trees and the node view over them.
//!
//! A [`Node`] is a cheap view: the shared subtree plus its absolute position
//! and the alias and field it has in its parent. Hidden rules never show up
//! as nodes; their children are lifted into the nearest visible ancestor and
//! inherit the hidden child's field.

use std::fmt;
use std::ops::Range;

use super::incremental::InputEdit;
use super::subtree::{Subtree, SubtreeRef};
use crate::core::{LineIndex, Position};
use crate::language::{FieldId, Language, SymbolId, ERROR_SYMBOL};

#[derive(Clone)]
pub struct Tree {
    root: SubtreeRef,
    language: &'static Language,
    edits: Vec<InputEdit>,
}

impl Tree {
    pub(crate) fn new(root: SubtreeRef, language: &'static Language) -> Self {
        Self {
            root,
            language,
            edits: Vec::new(),
        }
    }

    pub fn language(&self) -> &'static Language {
        self.language
    }

    pub fn root_node(&self) -> Node<'_> {
        Node {
            tree: self,
            subtree: &self.root,
            start: 0,
            alias: None,
            field: None,
        }
    }

    /// Records an edit of the source text for the next incremental parse.
    ///
    /// Node positions keep describing the text this tree was parsed from.
    pub fn edit(&mut self, edit: &InputEdit) {
        self.edits.push(*edit);
    }

    pub fn edits(&self) -> &[InputEdit] {
        &self.edits
    }

    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    pub(crate) fn root_subtree(&self) -> &SubtreeRef {
        &self.root
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("language", &self.language.name())
            .field("root", &self.root_node())
            .field("edits", &self.edits)
            .finish()
    }
}

#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    /// Absolute offset of the padding before the node.
    start: usize,
    alias: Option<SymbolId>,
    field: Option<FieldId>,
}

impl<'tree> Node<'tree> {
    fn language(&self) -> &'static Language {
        self.tree.language
    }

    fn symbol(&self) -> SymbolId {
        self.alias.unwrap_or(self.subtree.symbol)
    }

    /// Canonical id of the node kind; [`ERROR_SYMBOL`] for errors.
    pub fn kind_id(&self) -> SymbolId {
        if self.subtree.flags.error {
            ERROR_SYMBOL
        } else {
            self.language().public_symbol(self.symbol())
        }
    }

    pub fn kind(&self) -> &'static str {
        self.language().symbol_name(self.kind_id())
    }

    pub fn is_named(&self) -> bool {
        if self.subtree.flags.error {
            // Нераспознанный символ внутри ERROR безымянный
            return !self.subtree.is_leaf();
        }
        self.language()
            .symbol_info(self.symbol())
            .map_or(false, |info| info.named)
    }

    fn is_visible(&self) -> bool {
        self.subtree.flags.error
            || self.alias.is_some()
            || self
                .language()
                .symbol_info(self.subtree.symbol)
                .map_or(false, |info| info.visible)
    }

    pub fn is_extra(&self) -> bool {
        self.subtree.flags.extra && !self.subtree.flags.error
    }

    pub fn is_error(&self) -> bool {
        self.subtree.flags.error
    }

    pub fn is_missing(&self) -> bool {
        self.subtree.flags.missing
    }

    /// Whether the node is or contains an ERROR or MISSING node.
    pub fn has_error(&self) -> bool {
        self.subtree.contains_error()
    }

    pub fn start_byte(&self) -> usize {
        self.start + self.subtree.padding
    }

    pub fn end_byte(&self) -> usize {
        self.start_byte() + self.subtree.size
    }

    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte()..self.end_byte()
    }

    pub fn start_position(&self, index: &LineIndex) -> Position {
        index.to_position(self.start_byte())
    }

    pub fn end_position(&self, index: &LineIndex) -> Position {
        index.to_position(self.end_byte())
    }

    pub fn utf8_text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.byte_range()).unwrap_or("")
    }

    /// Field this node has in its parent.
    pub fn field_name(&self) -> Option<&'static str> {
        self.field.and_then(|field| self.language().field_name(field))
    }

    pub fn children(&self) -> Vec<Node<'tree>> {
        let mut out = Vec::new();
        collect_visible(self.tree, self.subtree, self.start, None, &mut out);
        out
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, index: usize) -> Option<Node<'tree>> {
        self.children().into_iter().nth(index)
    }

    pub fn named_children(&self) -> Vec<Node<'tree>> {
        self.children().into_iter().filter(Node::is_named).collect()
    }

    pub fn named_child_count(&self) -> usize {
        self.named_children().len()
    }

    pub fn named_child(&self, index: usize) -> Option<Node<'tree>> {
        self.named_children().into_iter().nth(index)
    }

    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'tree>> {
        self.children_by_field_name(name).into_iter().next()
    }

    pub fn children_by_field_name(&self, name: &str) -> Vec<Node<'tree>> {
        let Some(field) = self.language().field_id_for_name(name) else {
            return Vec::new();
        };
        self.children()
            .into_iter()
            .filter(|child| child.field == Some(field))
            .collect()
    }

    /// S-expression of the named, missing and error nodes.
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out);
        out
    }

    fn write_sexp(&self, out: &mut String) {
        if self.is_missing() {
            if self.is_named() {
                out.push_str(&format!("(MISSING {})", self.kind()));
            } else {
                out.push_str(&format!("(MISSING \"{}\")", self.kind()));
            }
            return;
        }
        out.push('(');
        out.push_str(self.kind());
        for child in self.children() {
            if !child.is_named() && !child.is_missing() {
                continue;
            }
            out.push(' ');
            if let Some(field) = child.field_name() {
                out.push_str(field);
                out.push_str(": ");
            }
            child.write_sexp(out);
        }
        out.push(')');
    }
}

/// Visible children of `subtree`, descending through hidden ones.
fn collect_visible<'tree>(
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    start: usize,
    inherited_field: Option<FieldId>,
    out: &mut Vec<Node<'tree>>,
) {
    let language = tree.language;
    let production = subtree.production;
    let fields = production
        .and_then(|p| language.production(p))
        .map(|info| info.fields.as_slice())
        .unwrap_or(&[]);

    let mut offset = start;
    let mut structural = 0;
    for child in &subtree.children {
        let (alias, field) = if child.flags.extra {
            (None, None)
        } else {
            let index = structural;
            structural += 1;
            (
                production.and_then(|p| language.alias_at(p, index)),
                fields.get(index).copied().flatten(),
            )
        };
        let node = Node {
            tree,
            subtree: child,
            start: offset,
            alias,
            // extras never inherit the field of a hidden parent
            field: if child.flags.extra {
                None
            } else {
                field.or(inherited_field)
            },
        };
        if node.is_visible() {
            out.push(node);
        } else if !child.is_leaf() {
            collect_visible(tree, child, offset, node.field, out);
        }
        offset += child.total_len();
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.subtree, other.subtree) && self.start == other.start
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Node {} {:?}}}", self.kind(), self.byte_range())
    }
}

#[cfg(test)]
mod tests {
    use crate::generate::generate;
    use crate::grammar::{field, pattern, sym, GrammarBuilder};
    use crate::language::{Language, ValidExternals};
    use crate::parser::Parser;
    use crate::scanner::{ExternalScanner, ScanOutcome, ScannerState};
    use crate::seq;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> crate::parser::Tree {
        let mut parser = Parser::new();
        parser.set_language(crate::language()).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn test_positions_and_text() {
        let source = "  Перем Х;\nХ = \"строка\";";
        let tree = parse(source);
        let root = tree.root_node();
        let children = root.named_children();
        assert_eq!(children.len(), 2);
        let declaration = children[0];
        assert_eq!(declaration.kind(), "module_var_declaration");
        assert_eq!(declaration.utf8_text(source), "Перем Х;");
        let assignment = children[1];
        let right = assignment.child_by_field_name("right").unwrap();
        assert_eq!(right.kind(), "string");
        assert_eq!(right.utf8_text(source), "\"строка\"");
    }

    #[test]
    fn test_anonymous_children_are_listed() {
        let source = "А = Б + 1;";
        let tree = parse(source);
        let assignment = tree.root_node().child(0).unwrap();
        let kinds: Vec<&str> = assignment.children().iter().map(|c| c.kind()).collect();
        assert_eq!(kinds, vec!["identifier", "=", "binary_expression"]);
        let binary = assignment.child_by_field_name("right").unwrap();
        let operator = binary.child_by_field_name("operator").unwrap();
        assert!(!operator.is_named());
        assert_eq!(operator.utf8_text(source), "+");
    }

    #[derive(Debug)]
    struct NoExternals;

    impl ExternalScanner for NoExternals {
        fn token_count(&self) -> usize {
            0
        }

        fn scan(
            &self,
            _input: &str,
            _offset: usize,
            _valid: ValidExternals,
            _state: &ScannerState,
        ) -> ScanOutcome {
            ScanOutcome::Decline { examined: 0 }
        }
    }

    static NO_EXTERNALS: NoExternals = NoExternals;

    #[test]
    fn test_extras_inside_hidden_node_have_no_field() {
        let grammar = GrammarBuilder::new("fields")
            .rule("document", seq![field("value", sym("_group")), ";"])
            .rule("_group", seq!["(", sym("number"), ")"])
            .rule("number", pattern("[0-9]+"))
            .rule("note", pattern(r"\{[a-z]*\}"))
            .extra(sym("note"))
            .build()
            .unwrap();
        let tables = generate(&grammar).unwrap();
        let language: &'static Language =
            Box::leak(Box::new(Language::new(tables, &NO_EXTERNALS).unwrap()));
        let mut parser = Parser::new();
        parser.set_language(language).unwrap();

        let tree = parser.parse("({x}1);", None).unwrap();
        assert_eq!(tree.to_sexp(), "(document (note) value: (number))");
        let root = tree.root_node();
        let note = root.named_child(0).unwrap();
        assert!(note.is_extra());
        assert_eq!(note.field_name(), None);
        assert_eq!(root.named_child(1).unwrap().field_name(), Some("value"));
    }

    #[test]
    fn test_children_by_field_name() {
        let source = "Перем А Экспорт, Б;";
        let tree = parse(source);
        let declaration = tree.root_node().child(0).unwrap();
        let variables = declaration.named_children();
        assert_eq!(variables.len(), 2);
        let exported = variables[0].child_by_field_name("export").unwrap();
        assert_eq!(exported.kind(), "export");
        assert!(variables[1].child_by_field_name("export").is_none());
        assert!(declaration.children_by_field_name("no_such_field").is_empty());
    }
}
