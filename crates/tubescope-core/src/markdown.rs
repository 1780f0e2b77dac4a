//! Classification of generated Markdown into document blocks.
//!
//! Reports come back from the model as loosely formatted Markdown. Word has no
//! notion of Markdown, so before export every line is classified as a heading,
//! bullet, paragraph or table row, and runs of table rows are normalized into
//! rectangular [`StructuredTable`]s.
//!
//! Classification never fails: irregular input degrades into fewer table rows
//! or plain paragraphs.

use serde::{Deserialize, Serialize};

/// A rectangular grid of text cells. Every row has exactly [`columns`](Self::columns) cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredTable {
    rows: Vec<Vec<String>>,
    columns: usize,
}

impl StructuredTable {
    /// Build a table from parsed rows, dropping separator rows. The first
    /// surviving row fixes the column count; longer rows are truncated and
    /// shorter ones padded with empty cells. Returns `None` when no row survives.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Option<Self> {
        let mut rows = rows.into_iter().filter(|row| !is_separator_row(row));
        let first = rows.next()?;
        let columns = first.len();

        let mut table = vec![first];
        for mut row in rows {
            row.resize(columns, String::new());
            table.push(row);
        }

        Some(Self {
            rows: table,
            columns,
        })
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> usize {
        self.columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentBlock {
    Heading { level: u8, text: String },
    Bullet(String),
    Paragraph(String),
    Table(StructuredTable),
}

/// True when the trimmed line belongs to a Markdown table.
pub fn is_table_line(line: &str) -> bool {
    line.trim().starts_with('|')
}

/// Split one table line into trimmed cells, discarding the empty fields
/// produced by leading and trailing pipes.
pub fn split_table_row(line: &str) -> Vec<String> {
    line.trim()
        .trim_matches('|')
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Header separator rows (`|---|:---:|`) are made only of `-`, `:`, `|` and spaces.
pub fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .flat_map(|cell| cell.chars())
        .all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

/// A GFM delimiter row: every cell is `:?-{3,}:?`.
fn is_delimiter_row(cells: &[String]) -> bool {
    !cells.is_empty()
        && cells.iter().all(|cell| {
            let dashes = cell.strip_prefix(':').unwrap_or(cell);
            let dashes = dashes.strip_suffix(':').unwrap_or(dashes);
            dashes.len() >= 3 && dashes.chars().all(|c| c == '-')
        })
}

/// Convert a block of contiguous table lines into tables.
///
/// A well-formed block yields one table. When two tables sit on consecutive
/// lines with nothing between them, the second header's delimiter row starts
/// a new table whose header is the row just above it. Blank or placeholder
/// rows inside a body (`| | |`, `| - | - |`) never split; they are dropped.
pub fn tables_from_block(lines: &[&str]) -> Vec<StructuredTable> {
    let mut groups: Vec<Vec<Vec<String>>> = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();
    let mut seen_delimiter = false;

    for line in lines {
        let cells = split_table_row(line);
        if is_delimiter_row(&cells) {
            let header_above = current
                .last()
                .filter(|row| !is_separator_row(row) && row.len() == cells.len());
            if seen_delimiter && header_above.is_some() && current.len() > 1 {
                if let Some(header) = current.pop() {
                    groups.push(std::mem::take(&mut current));
                    current.push(header);
                }
            }
            seen_delimiter = true;
        }
        current.push(cells);
    }
    groups.push(current);

    groups
        .into_iter()
        .filter_map(StructuredTable::from_rows)
        .collect()
}

fn classify_line(line: &str) -> Option<DocumentBlock> {
    if line.is_empty() {
        return None;
    }

    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=3).contains(&hashes) {
        if let Some(text) = line[hashes..].strip_prefix(' ') {
            return Some(DocumentBlock::Heading {
                level: hashes as u8,
                text: text.trim().to_string(),
            });
        }
    }

    if let Some(text) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(DocumentBlock::Bullet(text.trim().to_string()));
    }

    Some(DocumentBlock::Paragraph(line.to_string()))
}

/// Classify every line of `text` into document blocks, in order.
pub fn parse_document(text: &str) -> Vec<DocumentBlock> {
    let mut blocks = Vec::new();
    let mut table_buffer: Vec<&str> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if is_table_line(line) {
            table_buffer.push(line);
            continue;
        }

        if !table_buffer.is_empty() {
            blocks.extend(
                tables_from_block(&table_buffer)
                    .into_iter()
                    .map(DocumentBlock::Table),
            );
            table_buffer.clear();
        }

        if let Some(block) = classify_line(line) {
            blocks.push(block);
        }
    }

    if !table_buffer.is_empty() {
        blocks.extend(
            tables_from_block(&table_buffer)
                .into_iter()
                .map(DocumentBlock::Table),
        );
    }

    blocks
}

/// Only the tables found in `text`.
pub fn extract_tables(text: &str) -> Vec<StructuredTable> {
    parse_document(text)
        .into_iter()
        .filter_map(|block| match block {
            DocumentBlock::Table(table) => Some(table),
            _ => None,
        })
        .collect()
}
