//! Decoding of comma-separated external table files.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvError {
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecord {
    /// 1-based line of the record within the file.
    pub line: usize,
    pub cells: Vec<String>,
}

/// A header row plus data records. Blank lines are skipped; ragged records are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub records: Vec<CsvRecord>,
}

impl CsvTable {
    /// Returns the records as `(line, [(column, cell)])` pairs, pairing cells with header names.
    ///
    /// Empty header names are skipped; missing trailing cells read as the empty string.
    pub fn keyed_records(&self) -> impl Iterator<Item = (usize, Vec<(&str, &str)>)> + '_ {
        self.records.iter().map(move |record| {
            let cells = self
                .header
                .iter()
                .enumerate()
                .filter(|(_, key)| !key.is_empty())
                .map(|(idx, key)| {
                    let cell = record.cells.get(idx).map(String::as_str).unwrap_or("");
                    (key.as_str(), cell)
                })
                .collect();
            (record.line, cells)
        })
    }
}

pub fn parse_csv(text: &str) -> Result<CsvTable, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut table = CsvTable::default();
    let mut saw_header = false;
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(0);
        if !saw_header {
            table.header = record.iter().map(|h| h.trim().to_string()).collect();
            saw_header = true;
            continue;
        }
        table.records.push(CsvRecord {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_header_and_records() {
        let table = parse_csv("id, name ,qty\r\n1,\"Widget, large\",3\n\n2,\"say \"\"hi\"\"\",\n").unwrap();
        assert_eq!(table.header, vec!["id", "name", "qty"]);
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].line, 2);
        assert_eq!(table.records[0].cells[1], "Widget, large");
        assert_eq!(table.records[1].line, 4);
        assert_eq!(table.records[1].cells[1], "say \"hi\"");
    }

    #[test]
    fn keyed_records_fill_missing_cells() {
        let table = parse_csv("a,,c\n1,2\n").unwrap();
        let rows: Vec<_> = table.keyed_records().collect();
        assert_eq!(rows, vec![(2, vec![("a", "1"), ("c", "")])]);
    }

    #[test]
    fn empty_input_has_no_header() {
        let table = parse_csv("\n\n").unwrap();
        assert!(table.header.is_empty());
        assert!(table.records.is_empty());
    }
}
