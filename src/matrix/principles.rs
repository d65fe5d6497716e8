//! Inventive principle names, one per line.

use std::path::Path;

use crate::error::{ResolverError, Result};

/// Principle names where line N names principle N.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipleCatalog {
    names: Vec<String>,
}

impl PrincipleCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ResolverError::io(path, e))?;
        let mut names: Vec<String> = raw
            .trim_start_matches('\u{feff}')
            .lines()
            .map(|l| l.trim().to_string())
            .collect();
        while names.last().is_some_and(|n| n.is_empty()) {
            names.pop();
        }
        Ok(Self { names })
    }

    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Name of principle `position` (1-based).
    pub fn name_of(&self, position: u32) -> Result<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.names.get(i as usize))
            .map(String::as_str)
            .ok_or(ResolverError::PositionOutOfRange {
                position,
                len: self.names.len(),
            })
    }

    /// Translate positions in order, keeping duplicates.
    pub fn names_of(&self, positions: &[u32]) -> Result<Vec<String>> {
        positions
            .iter()
            .map(|&p| self.name_of(p).map(str::to_string))
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
