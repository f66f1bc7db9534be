// Диагностика синтаксических ошибок
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::{LineIndex, Span};
use crate::parser::{Node, Tree};

/// Longest excerpt of source text quoted in a message.
const EXCERPT_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Info => "info",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// OS001
    SyntaxError,
    /// OS002
    MissingToken,
    /// OS003
    UnexpectedCharacter,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::SyntaxError => "OS001",
            DiagnosticCode::MissingToken => "OS002",
            DiagnosticCode::UnexpectedCharacter => "OS003",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Span,
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: String, span: Span) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            code,
            message,
            span,
            file: None,
        }
    }

    pub fn with_file(mut self, file: Option<&Path>) -> Self {
        self.file = file.map(Path::to_path_buf);
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file.display())?;
        }
        write!(
            f,
            "{}: {}[{}]: {}",
            self.span.start, self.level, self.code, self.message
        )
    }
}

/// Turns the ERROR and MISSING nodes of `tree` into diagnostics ordered by
/// position.
///
/// An ERROR node made only of unrecognised characters is reported as
/// `OS003` per character; any other ERROR node is one `OS001`.
pub fn collect_syntax_diagnostics(tree: &Tree, source: &str, file: Option<&Path>) -> Vec<Diagnostic> {
    let index = LineIndex::new(source);
    let mut diagnostics = Vec::new();
    let root = tree.root_node();
    if root.has_error() {
        visit(root, source, &index, false, &mut diagnostics);
    }
    diagnostics.sort_by_key(|d| (d.span.start.offset, d.span.end.offset));
    diagnostics
        .into_iter()
        .map(|d| d.with_file(file))
        .collect()
}

fn visit(node: Node<'_>, source: &str, index: &LineIndex, inside_error: bool, out: &mut Vec<Diagnostic>) {
    let span = index.span(node.start_byte(), node.end_byte());

    if node.is_missing() {
        out.push(Diagnostic::error(
            DiagnosticCode::MissingToken,
            format!("missing `{}`", node.kind()),
            span,
        ));
        return;
    }

    if node.is_error() {
        let children = node.children();
        if children.is_empty() {
            out.push(Diagnostic::error(
                DiagnosticCode::UnexpectedCharacter,
                format!("unexpected character `{}`", node.utf8_text(source)),
                span,
            ));
            return;
        }
        let only_characters = children
            .iter()
            .all(|child| child.is_error() && child.child_count() == 0);
        if !only_characters && !inside_error {
            out.push(Diagnostic::error(
                DiagnosticCode::SyntaxError,
                format!("unexpected `{}`", excerpt(node.utf8_text(source))),
                span,
            ));
        }
        for child in children {
            if child.has_error() {
                visit(child, source, index, true, out);
            }
        }
        return;
    }

    for child in node.children() {
        if child.has_error() {
            visit(child, source, index, inside_error, out);
        }
    }
}

/// Первая строка фрагмента, обрезанная до `EXCERPT_CHARS` символов
fn excerpt(text: &str) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > EXCERPT_CHARS {
        let cut: String = line.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn diagnostics(source: &str) -> Vec<Diagnostic> {
        let mut parser = Parser::new();
        parser.set_language(crate::language()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        collect_syntax_diagnostics(&tree, source, None)
    }

    #[test]
    fn test_clean_source_has_no_diagnostics() {
        assert!(diagnostics("Если А Тогда\n  Б = 1;\nКонецЕсли;").is_empty());
    }

    #[test]
    fn test_missing_token_is_os002() {
        let found = diagnostics("Если А = Тогда\nКонецЕсли;");
        assert!(!found.is_empty());
        assert!(found.iter().any(|d| d.code == DiagnosticCode::MissingToken));
        assert!(found.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn test_unexpected_character_is_os003() {
        let found = diagnostics("А = 1;\n§\nБ = 2;");
        assert_eq!(found.len(), 1);
        let diagnostic = &found[0];
        assert_eq!(diagnostic.code, DiagnosticCode::UnexpectedCharacter);
        assert_eq!(diagnostic.span.start.line, 1);
        assert_eq!(diagnostic.span.start.column, 0);
        assert!(diagnostic.message.contains('§'));
    }

    #[test]
    fn test_display_includes_file_and_code() {
        let source = "§";
        let mut parser = Parser::new();
        parser.set_language(crate::language()).unwrap();
        let tree = parser.parse(source, None).unwrap();
        let found = collect_syntax_diagnostics(&tree, source, Some(Path::new("Модуль.os")));
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].to_string(),
            "Модуль.os:1:1: error[OS003]: unexpected character `§`"
        );
    }

    #[test]
    fn test_excerpt_is_truncated() {
        let long = "а".repeat(100);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
        assert_eq!(excerpt("А Б\nВ"), "А Б");
    }
}
