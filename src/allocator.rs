//! Filename Allocation
//!
//! Turns posting labels into filesystem-safe, run-unique base names.
//! The allocator owns the set of names handed out so far; every name used in
//! a run must come from the same `FilenameAllocator`.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Longest base name kept after sanitizing (in characters).
pub const MAX_BASE_NAME_CHARS: usize = 200;

/// Used when a label sanitizes down to nothing.
const FALLBACK_BASE_NAME: &str = "untitled";

const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Replace each forbidden character with `_`, collapse whitespace runs to a
/// single space, trim, then truncate to [`MAX_BASE_NAME_CHARS`].
pub fn sanitize_label(label: &str) -> String {
    let replaced: String = label
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let collapsed = WHITESPACE_RUN.replace_all(&replaced, " ");
    collapsed.trim().chars().take(MAX_BASE_NAME_CHARS).collect()
}

#[derive(Debug, Default)]
pub struct FilenameAllocator {
    seen: HashSet<String>,
}

impl FilenameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a base name for `label`.
    ///
    /// Collisions get ` (1)`, ` (2)`, ... appended, using the smallest suffix
    /// not yet taken. The returned name is recorded before returning.
    pub fn allocate(&mut self, label: &str) -> String {
        let mut base = sanitize_label(label);
        if base.is_empty() {
            base = FALLBACK_BASE_NAME.to_string();
        }

        let name = if self.seen.contains(&base) {
            let mut n = 1;
            loop {
                let candidate = format!("{} ({})", base, n);
                if !self.seen.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            }
        } else {
            base
        };

        self.seen.insert(name.clone());
        name
    }
}
