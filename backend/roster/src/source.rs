//! # Roster Source
//!
//! House rosters arrive as an 8-column table exported from the school
//! spreadsheet: a grade/label column and a name column for each house, in the
//! order Albemarle, Lambert, Hobler, Ettl. The first row is a header.
//!
//! ```text
//! AlbemarleGrade,Albemarle,LambertGrade,Lambert,HoblerGrade,Hobler,EttlGrade,Ettl
//! 12,Jane Doe,F,Kenneth Jones,11,Tony (Jia Hao) (Zhang),,
//! ```
//!
//! The grade column holds either a numeric grade or a staff label containing
//! `F` (faculty) or `S` (staff).
use std::{io::Read, time::Duration};

use csv::ReaderBuilder;
use reqwest::Client;

use crate::{
    descriptor::House,
    error::{Result, RosterError},
};

pub const COLUMNS: usize = House::ALL.len() * 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterCell {
    pub grade: Option<String>,
    pub name: Option<String>,
}

/// One spreadsheet row, one cell per house in [`House::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterRow {
    /// 1-based spreadsheet row, header included.
    pub line: usize,
    pub cells: [RosterCell; 4],
}

impl RosterRow {
    pub fn houses(&self) -> impl Iterator<Item = (House, &RosterCell)> {
        House::ALL.into_iter().zip(self.cells.iter())
    }
}

fn cell(value: &str) -> Option<String> {
    let trimmed = value.trim();

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RosterRow>> {
    let mut table = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = table
        .headers()
        .map_err(|e| RosterError::source_format(1, e.to_string()))?;

    match header.len() {
        0 => return Err(RosterError::source_format(1, "missing header row")),
        COLUMNS => {}
        found => {
            return Err(RosterError::source_format(
                1,
                format!("expected {COLUMNS} header columns, found {found}"),
            ));
        }
    }

    let mut rows = Vec::new();

    for (index, record) in table.records().enumerate() {
        let line = index + 2;
        let record = record.map_err(|e| RosterError::source_format(line, e.to_string()))?;

        if record.len() != COLUMNS {
            return Err(RosterError::source_format(
                line,
                format!("expected {COLUMNS} columns, found {}", record.len()),
            ));
        }

        let mut row = RosterRow {
            line,
            ..Default::default()
        };

        for (house_index, target) in row.cells.iter_mut().enumerate() {
            *target = RosterCell {
                grade: cell(&record[house_index * 2]),
                name: cell(&record[house_index * 2 + 1]),
            };
        }

        rows.push(row);
    }

    Ok(rows)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Reads rows from a local path or an `http(s)` URL.
pub async fn load_source(location: &str, timeout: Duration) -> Result<Vec<RosterRow>> {
    let bytes = if is_remote(location) {
        let client = Client::builder().timeout(timeout).build()?;

        client
            .get(location)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    } else {
        tokio::fs::read(location)
            .await
            .map_err(|source| RosterError::SourceRead {
                location: location.to_string(),
                source,
            })?
    };

    read_rows(bytes.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "AlbemarleGrade,Albemarle,LambertGrade,Lambert,HoblerGrade,Hobler,EttlGrade,Ettl\n";

    #[test]
    fn test_reads_cells_per_house() {
        let source = format!("{HEADER}12,Jane Doe,F,Kenneth Jones,, ,9,Wei Chen\n");
        let rows = read_rows(source.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);

        let cells: Vec<_> = rows[0].houses().collect();
        assert_eq!(cells[0].0, House::Albemarle);
        assert_eq!(cells[0].1.name.as_deref(), Some("Jane Doe"));
        assert_eq!(cells[1].1.grade.as_deref(), Some("F"));
        assert_eq!(cells[2].1, &RosterCell::default());
        assert_eq!(cells[3].0, House::Ettl);
        assert_eq!(cells[3].1.grade.as_deref(), Some("9"));
    }

    #[test]
    fn test_header_only() {
        assert!(read_rows(HEADER.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_shape_fails() {
        let source = format!("{HEADER}12,Jane Doe,F,Kenneth Jones\n");

        match read_rows(source.as_bytes()) {
            Err(RosterError::SourceFormat { row, reason }) => {
                assert_eq!(row, 2);
                assert!(reason.contains("expected 8 columns"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_empty_source_fails() {
        match read_rows("".as_bytes()) {
            Err(RosterError::SourceFormat { row, reason }) => {
                assert_eq!(row, 1);
                assert!(reason.contains("missing header"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_short_header_fails() {
        let source = "AlbemarleGrade,Albemarle,LambertGrade,Lambert\n12,Jane Doe,F,Kenneth Jones\n";

        assert!(matches!(
            read_rows(source.as_bytes()),
            Err(RosterError::SourceFormat { row: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_local_source() {
        let result = load_source("/definitely/not/here.csv", Duration::from_secs(1)).await;

        assert!(matches!(result, Err(RosterError::SourceRead { .. })));
    }
}
