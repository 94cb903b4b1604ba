//! The in-memory call dataset and its CSV and spreadsheet readers.
//!
//! A [`Dataset`] is built once per session and never mutated afterwards;
//! every aggregate is a view computed from it.

use crate::error::{Result, SacError};
use crate::types::{CallDuration, CallRecord};
use calamine::{open_workbook_auto, Data, Reader};
use csv::{ReaderBuilder, Trim};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

/// Header spellings accepted for each canonical column.
const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("attendant", &["attendant", "atendente", "agent"]),
    ("sentiment", &["sentiment", "sentimento"]),
    ("duration", &["duration", "duracao", "duração", "tempo"]),
    ("transcript", &["transcript", "transcricao", "transcrição", "texto"]),
];

/// File extensions read as a workbook instead of CSV.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Immutable set of call records.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<CallRecord>,
}

/// What happened while reading a CSV body or a worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Data rows seen, including dropped ones.
    pub rows_read: usize,
    /// Rows dropped because they could not be decoded or lack an
    /// attendant or sentiment.
    pub dropped_rows: usize,
    /// Kept rows whose duration cannot be parsed.
    pub unparseable_durations: usize,
}

/// Positions of the canonical columns within a header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    attendant: usize,
    sentiment: usize,
    duration: Option<usize>,
    transcript: Option<usize>,
}

impl Columns {
    /// Headers are matched case-insensitively against [`COLUMN_ALIASES`];
    /// the attendant and sentiment columns are required.
    fn resolve<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let canonical: Vec<String> = headers.into_iter().map(canonical_column).collect();
        let position = |name: &str| canonical.iter().position(|h| h == name);
        let required = |name: &str| {
            position(name).ok_or_else(|| SacError::Malformed(format!("missing '{}' column", name)))
        };

        Ok(Self {
            attendant: required("attendant")?,
            sentiment: required("sentiment")?,
            duration: position("duration"),
            transcript: position("transcript"),
        })
    }
}

/// Turns raw rows into records while keeping the [`ParseReport`] tally.
struct RowCollector {
    columns: Columns,
    records: Vec<CallRecord>,
    report: ParseReport,
}

impl RowCollector {
    fn new(columns: Columns) -> Self {
        Self {
            columns,
            records: Vec::new(),
            report: ParseReport::default(),
        }
    }

    fn push(&mut self, fields: &[&str]) {
        self.report.rows_read += 1;

        let field = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        let (Some(attendant), Some(sentiment)) = (
            field(Some(self.columns.attendant)),
            field(Some(self.columns.sentiment)),
        ) else {
            self.report.dropped_rows += 1;
            return;
        };

        let record = CallRecord {
            attendant: attendant.to_string(),
            sentiment: sentiment.to_string(),
            duration: field(self.columns.duration).unwrap_or_default().to_string(),
            transcript: field(self.columns.transcript).map(String::from),
        };
        if record.elapsed().is_none() {
            self.report.unparseable_durations += 1;
        }
        self.records.push(record);
    }

    /// Count a row that could not be decoded at all.
    fn skip(&mut self, reason: impl std::fmt::Display) {
        self.report.rows_read += 1;
        self.report.dropped_rows += 1;
        tracing::warn!("Skipping unreadable row: {}", reason);
    }

    fn finish(self) -> (Dataset, ParseReport) {
        let report = self.report;
        if report.dropped_rows > 0 {
            tracing::warn!(
                "Dropped {} of {} rows",
                report.dropped_rows,
                report.rows_read
            );
        }
        if report.unparseable_durations > 0 {
            tracing::debug!(
                "{} rows have an unparseable duration",
                report.unparseable_durations
            );
        }
        (Dataset::new(self.records), report)
    }
}

impl Dataset {
    pub fn new(records: Vec<CallRecord>) -> Self {
        Self { records }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a CSV body. A row that fails to decode (bad UTF-8, for one)
    /// is dropped and counted; only an unreadable header or an I/O error
    /// fails the whole body.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<(Self, ParseReport)> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let columns = Columns::resolve(rdr.headers()?.iter())?;
        let mut rows = RowCollector::new(columns);

        for row in rdr.records() {
            match row {
                Ok(record) => {
                    let fields: Vec<&str> = record.iter().collect();
                    rows.push(&fields);
                }
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => rows.skip(e),
            }
        }

        Ok(rows.finish())
    }

    pub fn from_csv_str(body: &str) -> Result<(Self, ParseReport)> {
        Self::from_csv_reader(body.as_bytes())
    }

    /// Read the first worksheet of a workbook (`.xlsx`, `.xls`, `.ods`, ...).
    /// The first row is the header; fully blank rows are ignored.
    pub fn from_workbook_path(path: &Path) -> Result<(Self, ParseReport)> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SacError::Malformed("workbook has no worksheets".into()))??;

        let mut sheet_rows = range.rows();
        let header: Vec<String> = sheet_rows
            .next()
            .ok_or_else(|| SacError::Malformed("worksheet is empty".into()))?
            .iter()
            .map(cell_text)
            .collect();
        let columns = Columns::resolve(header.iter().map(String::as_str))?;
        let mut rows = RowCollector::new(columns);

        for sheet_row in sheet_rows {
            let cells: Vec<String> = sheet_row.iter().map(cell_text).collect();
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            let fields: Vec<&str> = cells.iter().map(String::as_str).collect();
            rows.push(&fields);
        }

        Ok(rows.finish())
    }

    pub fn records(&self) -> &[CallRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct attendants, sorted.
    pub fn attendants(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.attendant.as_str()))
    }

    /// Distinct sentiment labels, sorted.
    pub fn sentiments(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.sentiment.as_str()))
    }

    pub fn contains_attendant(&self, attendant: &str) -> bool {
        self.records.iter().any(|r| r.attendant == attendant)
    }
}

/// Whether `path` names a workbook rather than a CSV file.
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn canonical_column(header: &str) -> String {
    let lower = header.trim_start_matches('\u{feff}').trim().to_lowercase();
    COLUMN_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&lower.as_str()))
        .map(|(name, _)| (*name).to_string())
        .unwrap_or(lower)
}

/// Cell as text. Time-formatted cells hold a fraction of a day and are
/// rendered as `HH:MM:SS` so [`CallDuration::parse`] can read them.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(dt) => {
            let secs = (dt.as_f64() * 86_400.0).round();
            if secs.is_finite() && secs >= 0.0 {
                CallDuration::from_secs(secs as u64).to_string()
            } else {
                String::new()
            }
        }
        other => other.to_string(),
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook};

    #[test]
    fn test_parse_canonical_headers() {
        let body = "attendant,sentiment,duration\nAna,Positivo,00:06:00\nBruno,Negativo,00:02:00\n";
        let (dataset, report) = Dataset::from_csv_str(body).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.dropped_rows, 0);
        assert_eq!(dataset.records()[0], CallRecord::new("Ana", "Positivo", "00:06:00"));
    }

    #[test]
    fn test_parse_portuguese_headers_any_case() {
        let body = "\u{feff}Atendente, SENTIMENTO ,Duração,Transcrição,extra\n\
                    Ana,Positivo,00:06:00,Bom dia,x\n";
        let (dataset, _) = Dataset::from_csv_str(body).unwrap();
        let record = &dataset.records()[0];
        assert_eq!(record.attendant, "Ana");
        assert_eq!(record.sentiment, "Positivo");
        assert_eq!(record.duration, "00:06:00");
        assert_eq!(record.transcript.as_deref(), Some("Bom dia"));
    }

    #[test]
    fn test_missing_required_column() {
        let err = Dataset::from_csv_str("attendant,duration\nAna,00:01:00\n").unwrap_err();
        assert!(matches!(err, SacError::Malformed(_)));
        assert!(err.to_string().contains("sentiment"));
    }

    #[test]
    fn test_missing_duration_column_is_allowed() {
        let (dataset, report) = Dataset::from_csv_str("attendant,sentiment\nAna,Neutro\n").unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records()[0].duration, "");
        assert_eq!(report.unparseable_durations, 1);
    }

    #[test]
    fn test_rows_missing_fields_are_dropped() {
        let body = "attendant,sentiment,duration\n\
                    Ana,Positivo,00:06:00\n\
                    ,Negativo,00:07:00\n\
                    Bruno,  ,00:08:00\n\
                    Carla\n\
                    Carla,Neutro,garbage\n";
        let (dataset, report) = Dataset::from_csv_str(body).unwrap();
        assert_eq!(report.rows_read, 5);
        assert_eq!(report.dropped_rows, 3);
        assert_eq!(report.unparseable_durations, 1);
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_invalid_utf8_row_is_dropped_not_fatal() {
        let body: &[u8] = b"attendant,sentiment,duration\n\
                            Ana,Positivo,00:06:00\n\
                            Bruno,Neg\xe1tivo,00:07:00\n\
                            Carla,Neutro,00:08:00\n";
        let (dataset, report) = Dataset::from_csv_reader(body).unwrap();
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(dataset.attendants(), vec!["Ana", "Carla"]);
    }

    #[test]
    fn test_distinct_accessors() {
        let dataset = Dataset::new(vec![
            CallRecord::new("Bruno", "Positivo", "00:01:00"),
            CallRecord::new("Ana", "Negativo", "00:01:00"),
            CallRecord::new("Ana", "Positivo", "00:01:00"),
        ]);
        assert_eq!(dataset.attendants(), vec!["Ana", "Bruno"]);
        assert_eq!(dataset.sentiments(), vec!["Negativo", "Positivo"]);
        assert!(dataset.contains_attendant("Ana"));
        assert!(!dataset.contains_attendant("Zed"));
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = Dataset::empty();
        assert!(dataset.is_empty());
        assert!(dataset.attendants().is_empty());
    }

    #[test]
    fn test_is_spreadsheet() {
        assert!(is_spreadsheet(Path::new("DF.xlsx")));
        assert!(is_spreadsheet(Path::new("/data/DF.XLS")));
        assert!(!is_spreadsheet(Path::new("DF.csv")));
        assert!(!is_spreadsheet(Path::new("DF")));
    }

    /// Workbook with Portuguese headers, one text duration, one
    /// time-formatted duration and one row missing its sentiment.
    fn write_workbook(path: &Path) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in ["Atendente", "Sentimento", "Duração", "Transcrição"]
            .iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, *header).unwrap();
        }

        sheet.write_string(1, 0, "Ana").unwrap();
        sheet.write_string(1, 1, "Positivo").unwrap();
        sheet.write_string(1, 2, "00:06:00").unwrap();
        sheet.write_string(1, 3, "Bom dia").unwrap();

        let time = Format::new().set_num_format("hh:mm:ss");
        sheet.write_string(2, 0, "Bruno").unwrap();
        sheet.write_string(2, 1, "Negativo").unwrap();
        sheet.write_number_with_format(2, 2, 450.0 / 86_400.0, &time).unwrap();

        sheet.write_string(3, 0, "Carla").unwrap();
        sheet.write_string(3, 2, "00:01:00").unwrap();

        workbook.save(path).unwrap();
    }

    #[test]
    fn test_workbook_first_sheet() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("DF.xlsx");
        write_workbook(&path);

        let (dataset, report) = Dataset::from_workbook_path(&path).unwrap();
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(dataset.len(), 2);

        let ana = &dataset.records()[0];
        assert_eq!(ana, &CallRecord::new("Ana", "Positivo", "00:06:00").with_transcript("Bom dia"));

        let bruno = &dataset.records()[1];
        assert_eq!(bruno.attendant, "Bruno");
        assert_eq!(bruno.transcript, None);
        assert_eq!(bruno.elapsed().map(|d| d.as_secs()), Some(450));
    }

    #[test]
    fn test_workbook_missing_file() {
        let err = Dataset::from_workbook_path(Path::new("/nonexistent/DF.xlsx")).unwrap_err();
        assert!(matches!(err, SacError::Spreadsheet(_)));
    }
}
