//! Label table: class ids to symbol names, and how each symbol is recognized.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{anyhow, Result};

/// How a symbol is recognized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// Emitted directly from the classifier.
    Static,
    /// Needs trajectory confirmation.
    Motion,
    /// Needs two simultaneous detections.
    Composite,
    /// Synthesized from screen position, never produced by the classifier.
    Directional,
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    name: String,
    kind: SymbolKind,
}

/// Ordered symbol names indexed by class id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelTable {
    entries: Vec<Entry>,
}

impl LabelTable {
    /// Build a table where every symbol is static.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .map(|name| Entry {
                name: name.into(),
                kind: SymbolKind::Static,
            })
            .collect();
        Self { entries }
    }

    /// Parse newline separated labels. Entries are trimmed and blank lines skipped.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read label file {}: {}", path.display(), e))?;
        let table = Self::parse(&text);
        if table.is_empty() {
            return Err(anyhow!("label file {} has no labels", path.display()));
        }
        log::info!("loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    /// Mark the named symbols as motion-dependent. Unknown names are ignored.
    pub fn with_motion<S: AsRef<str>>(self, names: &[S]) -> Self {
        self.with_kind(names, SymbolKind::Motion)
    }

    /// Mark the named symbols as two-hand composites. Unknown names are ignored.
    pub fn with_composite<S: AsRef<str>>(self, names: &[S]) -> Self {
        self.with_kind(names, SymbolKind::Composite)
    }

    fn with_kind<S: AsRef<str>>(mut self, names: &[S], kind: SymbolKind) -> Self {
        for entry in &mut self.entries {
            if names.iter().any(|name| name.as_ref() == entry.name) {
                entry.kind = kind;
            }
        }
        self
    }

    /// Same names with every symbol treated as static.
    pub fn static_only(mut self) -> Self {
        for entry in &mut self.entries {
            entry.kind = SymbolKind::Static;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbol name for a class id; out-of-range ids render as the numeric id.
    pub fn name(&self, class_id: usize) -> Cow<'_, str> {
        match self.entries.get(class_id) {
            Some(entry) => Cow::Borrowed(entry.name.as_str()),
            None => Cow::Owned(class_id.to_string()),
        }
    }

    /// Recognition kind for a class id. Unknown ids are treated as static.
    pub fn kind(&self, class_id: usize) -> SymbolKind {
        self.entries
            .get(class_id)
            .map(|entry| entry.kind)
            .unwrap_or(SymbolKind::Static)
    }

    /// First symbol of the given kind, if any.
    pub fn first_of(&self, kind: SymbolKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.name.as_str())
    }
}
