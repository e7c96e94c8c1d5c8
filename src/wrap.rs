// Greedy word wrapping with a reusable cache

use std::collections::HashMap;

/// Memoizes wrapped text by `(text, width)`; pass one instance through a run.
#[derive(Debug, Default)]
pub struct WrapCache {
    entries: HashMap<(String, usize), Vec<String>>,
}

impl WrapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, text: &str, width: usize) -> &[String] {
        self.entries
            .entry((text.to_string(), width))
            .or_insert_with(|| wrap(text, width))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Break `text` into lines of at most `width` characters.
///
/// Explicit newlines are kept. Words longer than `width` are split hard.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let len = current.chars().count();
            if len > 0 && len + 1 + word.len() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
        }
        if !current.is_empty() || paragraph.trim().is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
