//! Edits and the index of subtrees an incremental parse may take over.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::subtree::SubtreeRef;

/// Замена байтов `start_byte..old_end_byte` текстом до `new_end_byte`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputEdit {
    pub start_byte: usize,
    pub old_end_byte: usize,
    pub new_end_byte: usize,
}

impl InputEdit {
    /// Edit turning `old` into `new` by replacing their differing middle.
    pub fn between(old: &str, new: &str) -> Self {
        let prefix = old
            .char_indices()
            .zip(new.chars())
            .find(|((_, a), b)| a != b)
            .map_or(old.len().min(new.len()), |((i, _), _)| i);
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix: usize = old[prefix..]
            .chars()
            .rev()
            .zip(new[prefix..].chars().rev())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.len_utf8())
            .scan(0, |total, len| {
                *total += len;
                Some(*total)
            })
            .take_while(|total| *total <= max_suffix)
            .last()
            .unwrap_or(0);
        Self {
            start_byte: prefix,
            old_end_byte: old.len() - suffix,
            new_end_byte: new.len() - suffix,
        }
    }

    fn delta(&self) -> isize {
        self.new_end_byte as isize - self.old_end_byte as isize
    }

    /// Where a range `start..dependency_end` of the old text lands after the
    /// edit, or `None` when the edit touches it.
    fn map_range(&self, start: usize, dependency_end: usize) -> Option<(usize, usize)> {
        if dependency_end <= self.start_byte {
            Some((start, dependency_end))
        } else if start >= self.old_end_byte {
            let shift = |offset: usize| (offset as isize + self.delta()) as usize;
            Some((shift(start), shift(dependency_end)))
        } else {
            None
        }
    }
}

/// Reusable subtrees of an old tree keyed by the new offset of their first
/// token, outermost first.
#[derive(Debug, Default)]
pub(crate) struct ReuseIndex {
    by_start: HashMap<usize, Vec<SubtreeRef>>,
}

impl ReuseIndex {
    pub fn new(root: &SubtreeRef, edits: &[InputEdit]) -> Self {
        let mut index = Self::default();
        index.visit(root, 0, edits);
        index
    }

    fn visit(&mut self, subtree: &SubtreeRef, start: usize, edits: &[InputEdit]) {
        if subtree.is_reusable() {
            let dependency_end = start + subtree.total_len() + subtree.lookahead_bytes;
            let mapped = edits
                .iter()
                .try_fold((start, dependency_end), |(s, e), edit| edit.map_range(s, e));
            if let Some((new_start, _)) = mapped {
                self.by_start
                    .entry(new_start + subtree.padding)
                    .or_default()
                    .push(subtree.clone());
            }
        }
        let mut offset = start;
        for child in &subtree.children {
            if !child.is_leaf() {
                self.visit(child, offset, edits);
            }
            offset += child.total_len();
        }
    }

    pub fn candidates(&self, content_start: usize) -> &[SubtreeRef] {
        self.by_start
            .get(&content_start)
            .map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.by_start.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_between() {
        let edit = InputEdit::between("А = 1;", "А = 12;");
        assert_eq!(
            edit,
            InputEdit {
                start_byte: "А = 1".len(),
                old_end_byte: "А = 1".len(),
                new_end_byte: "А = 12".len(),
            }
        );
        let same = InputEdit::between("abc", "abc");
        assert_eq!(same.start_byte, same.old_end_byte);
        assert_eq!(same.old_end_byte, same.new_end_byte);
    }

    #[test]
    fn test_edit_between_repeated_text() {
        // "aa" -> "aaa": prefix and suffix must not overlap
        let edit = InputEdit::between("aa", "aaa");
        assert_eq!(edit.start_byte, 2);
        assert_eq!(edit.old_end_byte, 2);
        assert_eq!(edit.new_end_byte, 3);
    }

    #[test]
    fn test_map_range() {
        let edit = InputEdit {
            start_byte: 10,
            old_end_byte: 12,
            new_end_byte: 15,
        };
        assert_eq!(edit.map_range(0, 10), Some((0, 10)));
        assert_eq!(edit.map_range(12, 20), Some((15, 23)));
        assert_eq!(edit.map_range(5, 11), None);
        assert_eq!(edit.map_range(11, 13), None);
    }
}
