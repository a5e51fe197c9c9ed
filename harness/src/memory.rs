//! Memory documents
//!
//! Four independently overwritable text blobs. Absence is distinct from empty
//! content: [`MemorySnapshot`] only holds the documents that exist on disk.

use crate::error::HarnessError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// The fixed set of memory document kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Goals,
    Progress,
    Decisions,
    Blockers,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 4] = [
        MemoryKind::Goals,
        MemoryKind::Progress,
        MemoryKind::Decisions,
        MemoryKind::Blockers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::Progress => "progress",
            Self::Decisions => "decisions",
            Self::Blockers => "blockers",
        }
    }

    /// File name inside the memory directory
    pub fn file_name(&self) -> String {
        format!("{}.md", self.as_str())
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MemoryKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HarnessError::unknown_memory_kind(s))
    }
}

/// The memory documents that currently exist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    documents: BTreeMap<MemoryKind, String>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: MemoryKind) -> Option<&str> {
        self.documents.get(&kind).map(String::as_str)
    }

    pub fn insert(&mut self, kind: MemoryKind, content: impl Into<String>) {
        self.documents.insert(kind, content.into());
    }

    pub fn contains(&self, kind: MemoryKind) -> bool {
        self.documents.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Document content, or `fallback` when the document does not exist
    pub fn get_or<'a>(&'a self, kind: MemoryKind, fallback: &'a str) -> &'a str {
        self.get(kind).unwrap_or(fallback)
    }
}
