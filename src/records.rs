use csv::{ReaderBuilder, StringRecord};
use std::fs;
use std::path::Path;

use crate::error::GeneratorError;

/// Column holding the channel name in every CSV this crate reads.
pub const NAME_COLUMN: usize = 1;

/// A CSV record together with the 1-based line it starts on.
#[derive(Debug, Clone)]
pub struct NumberedRecord {
    pub line: u64,
    pub record: StringRecord,
}

/// One usable row of the channel mapping CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRow {
    /// Identifier of the channel on the Slack side of the bridge.
    pub external_id: String,
    /// Channel name as written in the CSV, trimmed.
    pub raw_name: String,
    /// 1-based source line, used in error messages.
    pub line: u64,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Number of `\n` in `bytes`.
fn count_newlines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Number of `\n` in the run of line terminators that ends `bytes`.
fn trailing_newlines(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rev()
        .take_while(|&&b| b == b'\n' || b == b'\r')
        .filter(|&&b| b == b'\n')
        .count()
}

/// Append `count` empty records for the blank lines starting at `first_line`.
fn push_blank_lines(records: &mut Vec<NumberedRecord>, first_line: usize, count: usize) {
    for offset in 0..count {
        records.push(NumberedRecord {
            line: (first_line + offset) as u64,
            record: StringRecord::new(),
        });
    }
}

/// Read every record of a header-less CSV file. Rows may have differing lengths.
///
/// Blank lines are kept as empty records, and every record carries the
/// physical line it starts on, so a blank line never shifts what comes after.
pub fn read_records(csv_path: &Path) -> Result<Vec<NumberedRecord>, csv::Error> {
    let raw = fs::read(csv_path)?;
    let contents = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw[..]);
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(contents);
    let mut result: Vec<NumberedRecord> = Vec::new();
    let mut previous_start: Option<usize> = None;
    for record in reader.records() {
        let record = record?;
        // The reported offset may sit before skipped blank lines; a record
        // never starts with a line terminator, so step over them.
        let reported = record
            .position()
            .map_or(previous_start.unwrap_or(0), |p| p.byte() as usize)
            .min(contents.len());
        let start = reported
            + contents[reported..]
                .iter()
                .take_while(|&&b| b == b'\n' || b == b'\r')
                .count();
        let line = count_newlines(&contents[..start]) + 1;
        let blanks = match previous_start {
            // The previous record's own terminator is not a blank line.
            Some(previous) => trailing_newlines(&contents[previous..start]).saturating_sub(1),
            None => trailing_newlines(&contents[..start]),
        };
        push_blank_lines(&mut result, line - blanks, blanks);
        result.push(NumberedRecord {
            line: line as u64,
            record,
        });
        previous_start = Some(start);
    }
    if let Some(previous) = previous_start {
        let blanks = trailing_newlines(&contents[previous..]).saturating_sub(1);
        push_blank_lines(&mut result, count_newlines(contents) - blanks + 1, blanks);
    } else {
        push_blank_lines(&mut result, 1, trailing_newlines(contents));
    }
    Ok(result)
}

/// The trimmed channel name of a record, if it has a non-blank one.
pub fn channel_name(record: &StringRecord) -> Option<&str> {
    record
        .get(NAME_COLUMN)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Whether the first row of the file should be treated as a header.
///
/// The decision looks at the second row of the file: only when it exists and
/// every one of its cells is filled in is the first row skipped. A blank
/// second line counts as a row with no cells.
fn has_header_row(records: &[NumberedRecord]) -> bool {
    records.get(1).is_some_and(|second| {
        !second.record.is_empty() && second.record.iter().all(|cell| !cell.trim().is_empty())
    })
}

/// Read the channel mapping rows the config generator works on.
pub fn read_channels(csv_path: &Path) -> Result<Vec<ChannelRow>, GeneratorError> {
    let records = read_records(csv_path).map_err(|source| GeneratorError::CsvRead {
        path: csv_path.to_path_buf(),
        source,
    })?;
    if records.is_empty() {
        return Err(GeneratorError::CsvEmpty);
    }
    let use_header = has_header_row(&records);
    tracing::debug!(use_header, rows = records.len(), "parsed channel CSV");
    let data_rows = if use_header { &records[1..] } else { &records[..] };

    let channels: Vec<ChannelRow> = data_rows
        .iter()
        .filter(|row| row.record.len() >= 2)
        .filter_map(|row| {
            channel_name(&row.record).map(|name| ChannelRow {
                external_id: name.to_string(),
                raw_name: name.to_string(),
                line: row.line,
            })
        })
        .collect();
    if channels.is_empty() {
        return Err(GeneratorError::NoChannelRows);
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("channels.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_read_channels_with_header() {
        let (_dir, path) = write_csv("id,name\nC01,General\nC02,Random\n");
        let rows = read_channels(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].raw_name, "General");
        assert_eq!(rows[0].external_id, "General");
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].raw_name, "Random");
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn test_read_channels_without_header() {
        // Second row has a blank cell, so the first row counts as data.
        let (_dir, path) = write_csv("C01,General\n,Random\nC03,Ops\n");
        let rows = read_channels(&path).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.raw_name.as_str()).collect();
        assert_eq!(names, vec!["General", "Random", "Ops"]);
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn test_read_channels_single_row() {
        let (_dir, path) = write_csv("C01,Solo\n");
        let rows = read_channels(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn test_read_channels_skips_short_and_blank() {
        let (_dir, path) = write_csv("a,b\n,\nonly-one\nC02,   \nC03, Team A \n");
        let rows = read_channels(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].raw_name, "b");
        assert_eq!(rows[1].raw_name, "Team A");
        assert_eq!(rows[1].line, 5);
    }

    #[test]
    fn test_read_channels_blank_second_line() {
        // A blank second line means no header, and later rows keep their lines.
        let (_dir, path) = write_csv("name,title\n\nC1,Team\n");
        let rows = read_channels(&path).unwrap();
        let found: Vec<(&str, u64)> = rows.iter().map(|r| (r.raw_name.as_str(), r.line)).collect();
        assert_eq!(found, vec![("title", 1), ("Team", 3)]);
    }

    #[test]
    fn test_read_channels_lines_after_blank_lines() {
        let (_dir, path) = write_csv("id,name\nC1,One\n\n\r\nC2,Two\n\n");
        let rows = read_channels(&path).unwrap();
        let found: Vec<(&str, u64)> = rows.iter().map(|r| (r.raw_name.as_str(), r.line)).collect();
        assert_eq!(found, vec![("One", 2), ("Two", 5)]);
    }

    #[test]
    fn test_read_records_blank_lines_as_empty_rows() {
        let (_dir, path) = write_csv("\nC1,\"multi\nline\"\n\nC2,x\n\n");
        let records = read_records(&path).unwrap();
        let shape: Vec<(u64, usize)> = records.iter().map(|r| (r.line, r.record.len())).collect();
        assert_eq!(shape, vec![(1, 0), (2, 2), (4, 0), (5, 2), (6, 0)]);
    }

    #[test]
    fn test_read_records_strips_bom() {
        let (_dir, path) = write_csv("\u{feff}C1,General\nC2,Ops\n");
        let records = read_records(&path).unwrap();
        assert_eq!(records[0].record.get(0), Some("C1"));
        assert_eq!(records[1].line, 2);
    }

    #[test]
    fn test_read_channels_empty_file() {
        let (_dir, path) = write_csv("");
        assert!(matches!(read_channels(&path), Err(GeneratorError::CsvEmpty)));
    }

    #[test]
    fn test_read_channels_only_blank_lines() {
        let (_dir, path) = write_csv("\n\n");
        assert!(matches!(read_channels(&path), Err(GeneratorError::NoChannelRows)));
    }

    #[test]
    fn test_read_channels_no_usable_rows() {
        let (_dir, path) = write_csv("a\nb\n");
        let err = read_channels(&path).unwrap_err();
        assert!(matches!(err, GeneratorError::NoChannelRows));
        assert_eq!(err.to_string(), "No channel rows detected in CSV");
    }

    #[test]
    fn test_read_channels_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_channels(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, GeneratorError::CsvRead { .. }));
    }
}
