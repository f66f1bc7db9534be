//! Immutable syntax tree nodes shared between trees.
//!
//! Positions are relative: a subtree knows the whitespace before it
//! (`padding`) and its own length (`size`); absolute offsets are recomputed
//! while walking from the root. That makes a subtree reusable at a shifted
//! position after an edit.

use std::sync::Arc;

use crate::language::tables::{ProductionId, StateId, SymbolId, ValidExternals, ERROR_SYMBOL};
use crate::scanner::ScannerState;

pub(crate) type SubtreeRef = Arc<Subtree>;

/// Lookahead token that was current when a node was reduced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LookaheadInfo {
    pub raw: SymbolId,
    pub symbol: SymbolId,
    pub mode: ValidExternals,
    /// `false` for MISSING and error tokens and for tokens lexed ahead during
    /// recovery.
    pub reusable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SubtreeFlags {
    pub extra: bool,
    pub missing: bool,
    /// ERROR node or unrecognised character.
    pub error: bool,
    pub has_error: bool,
    /// Contains a token lexed ahead during error recovery.
    pub fragile: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Subtree {
    pub symbol: SymbolId,
    /// Lexed symbol before keyword and immediate-token resolution.
    pub raw: SymbolId,
    pub padding: usize,
    pub size: usize,
    pub children: Vec<SubtreeRef>,
    pub production: Option<ProductionId>,
    /// State the parser was in when this subtree's first token was shifted.
    pub parse_state: StateId,
    pub lookahead: Option<LookaheadInfo>,
    /// Bytes past the end that lexing of this subtree (and its lookahead)
    /// examined.
    pub lookahead_bytes: usize,
    pub flags: SubtreeFlags,
    pub lex_mode: ValidExternals,
    pub scanner_before: ScannerState,
    pub scanner_after: ScannerState,
}

impl Subtree {
    pub fn leaf(symbol: SymbolId, raw: SymbolId, padding: usize, size: usize) -> Self {
        Self {
            symbol,
            raw,
            padding,
            size,
            children: Vec::new(),
            production: None,
            parse_state: 0,
            lookahead: None,
            lookahead_bytes: 0,
            flags: SubtreeFlags::default(),
            lex_mode: ValidExternals::default(),
            scanner_before: ScannerState::default(),
            scanner_after: ScannerState::default(),
        }
    }

    /// Internal node over `children`.
    pub fn node(symbol: SymbolId, production: Option<ProductionId>, children: Vec<SubtreeRef>) -> Self {
        let padding = children.first().map_or(0, |c| c.padding);
        let total: usize = children.iter().map(|c| c.padding + c.size).sum();
        let mut flags = SubtreeFlags {
            error: symbol == ERROR_SYMBOL,
            ..SubtreeFlags::default()
        };
        for child in &children {
            flags.has_error |= child.flags.has_error || child.flags.error || child.flags.missing;
            flags.fragile |= child.flags.fragile;
        }
        Self {
            symbol,
            raw: symbol,
            padding,
            size: total - padding,
            children,
            production,
            parse_state: 0,
            lookahead: None,
            lookahead_bytes: 0,
            flags,
            lex_mode: ValidExternals::default(),
            scanner_before: ScannerState::default(),
            scanner_after: ScannerState::default(),
        }
    }

    /// ERROR node wrapping `children`.
    pub fn error(children: Vec<SubtreeRef>) -> Self {
        let mut node = Self::node(ERROR_SYMBOL, None, children);
        node.flags.extra = true;
        node
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.production.is_none()
    }

    pub fn total_len(&self) -> usize {
        self.padding + self.size
    }

    pub fn contains_error(&self) -> bool {
        self.flags.error || self.flags.missing || self.flags.has_error
    }

    /// First token of the subtree, skipping empty nodes.
    pub fn first_leaf(&self) -> Option<&Subtree> {
        if self.is_leaf() {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.first_leaf())
    }

    /// Last real token of the subtree.
    pub fn last_leaf(&self) -> Option<&Subtree> {
        if self.is_leaf() {
            return (!self.flags.extra).then_some(self);
        }
        self.children.iter().rev().find_map(|c| c.last_leaf())
    }

    /// Whether an incremental parse may take this node over unchanged.
    pub fn is_reusable(&self) -> bool {
        self.production.is_some()
            && self.size > 0
            && !self.contains_error()
            && !self.flags.fragile
            && !self.flags.extra
            && self.lookahead.as_ref().map_or(false, |l| l.reusable)
            && self.first_leaf().map_or(false, |leaf| leaf.padding == self.padding)
    }
}
