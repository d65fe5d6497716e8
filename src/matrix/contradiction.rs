//! Sparse contradiction matrix loaded from a delimited table.
//!
//! Row r, column c of the table holds the principles for improving
//! parameter r while parameter c worsens. Cells list principle positions
//! separated by commas; empty cells are simply absent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::PrincipleCatalog;
use crate::error::{ResolverError, Result};

/// Shape of the source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixLayout {
    /// Cell separator; `;` leaves `,` free for the principle lists
    pub delimiter: char,
    /// Leading lines to skip (column titles)
    pub header_rows: usize,
    /// Leading cells per row to skip (row titles)
    pub label_columns: usize,
}

impl Default for MatrixLayout {
    fn default() -> Self {
        Self {
            delimiter: ';',
            header_rows: 0,
            label_columns: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContradictionMatrix {
    cells: HashMap<(u32, u32), Vec<u32>>,
}

impl ContradictionMatrix {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, MatrixLayout::default())
    }

    pub fn load_with(path: impl AsRef<Path>, layout: MatrixLayout) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ResolverError::io(path, e))?;
        Self::parse(&source, layout, path)
    }

    /// Parse table text. `origin` only labels errors.
    pub fn parse(source: &str, layout: MatrixLayout, origin: impl Into<PathBuf>) -> Result<Self> {
        let origin = origin.into();
        let mut cells = HashMap::new();
        // Spreadsheet exports often start with a byte-order mark.
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);

        for (row_idx, line) in source.lines().skip(layout.header_rows).enumerate() {
            let row = row_idx + 1;
            for (col_idx, cell) in split_row(line, layout.delimiter)
                .into_iter()
                .skip(layout.label_columns)
                .enumerate()
            {
                let column = col_idx + 1;
                if cell.trim().is_empty() {
                    continue;
                }
                let principles = cell
                    .split(',')
                    .map(|token| {
                        let token = token.trim();
                        token.parse::<u32>().map_err(|_| ResolverError::MalformedMatrix {
                            path: origin.clone(),
                            row,
                            column,
                            token: token.to_string(),
                        })
                    })
                    .collect::<Result<Vec<u32>>>()?;
                cells.insert((row as u32, column as u32), principles);
            }
        }

        Ok(Self { cells })
    }

    /// Principles for the (positive, negative) pair; empty when none apply.
    pub fn lookup(&self, positive: u32, negative: u32) -> &[u32] {
        self.cells
            .get(&(positive, negative))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Highest principle position referenced anywhere.
    pub fn max_principle(&self) -> Option<u32> {
        self.cells.values().flatten().copied().max()
    }

    /// Fail with `PositionOutOfRange` if any cell references a principle
    /// the catalog cannot name.
    pub fn check_catalog(&self, catalog: &PrincipleCatalog) -> Result<()> {
        let len = catalog.len();
        match self
            .cells
            .values()
            .flatten()
            .copied()
            .find(|&p| p == 0 || p as usize > len)
        {
            Some(position) => Err(ResolverError::PositionOutOfRange { position, len }),
            None => Ok(()),
        }
    }
}

/// Split one line on `delimiter`, honouring double-quoted cells so that a
/// comma-delimited table can still carry `"1,3"` lists.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => cells.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    cells.push(current);
    cells
}
