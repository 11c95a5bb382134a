#![cfg(not(tarpaulin_include))]

use crate::error::{DashboardError, Result};
use crate::record::{CampaignRecord, Column};
use crate::table::RecordTable;
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{Days, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::path::Path;

/// Upload formats the loader understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Workbook,
}

impl SourceKind {
    /// Detect the format from a file name's extension.
    pub fn from_file_name(file_name: &str) -> Result<SourceKind> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(SourceKind::Csv),
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => Ok(SourceKind::Workbook),
            Some(ext) => Err(DashboardError::parse(format!(
                "unsupported file extension: {}",
                ext
            ))),
            None => Err(DashboardError::parse("file has no extension")),
        }
    }
}

/// A cell as read from either source, before typing.
#[derive(Clone, Debug, PartialEq)]
enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

/// Load campaign records from a file on disk
///
/// Detects the format from the extension and delegates to [`load_upload`].
///
/// # Arguments
/// * `filepath` - Path to a `.csv`, `.xlsx`, `.xlsm`, `.xls` or `.ods` export
///
/// # Returns
/// * `Result<RecordTable>` - The typed (not yet normalized) records
///
/// # Examples
/// ```no_run
/// use campaign_analytics::loader::load_records;
///
/// match load_records("campanhas.xlsx") {
///     Ok(table) => println!("Loaded {} rows", table.len()),
///     Err(e) => eprintln!("Error loading export: {}", e),
/// }
/// ```
pub fn load_records(filepath: impl AsRef<Path>) -> Result<RecordTable> {
    let path = filepath.as_ref();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| DashboardError::parse("file has no name"))?;
    let bytes = std::fs::read(path)?;
    load_upload(file_name, &bytes)
}

/// Load campaign records from uploaded bytes
///
/// # Arguments
/// * `file_name` - Name of the uploaded file, used to pick the format
/// * `bytes` - File content
///
/// # Errors
/// * `Parse` if the format is unsupported, the file is unreadable, or a cell
///   cannot be converted
/// * `MissingColumn` naming the first required header that is absent
pub fn load_upload(file_name: &str, bytes: &[u8]) -> Result<RecordTable> {
    let kind = SourceKind::from_file_name(file_name)?;
    let table = match kind {
        SourceKind::Csv => from_csv(bytes)?,
        SourceKind::Workbook => from_workbook(bytes)?,
    };
    log::info!(
        "loaded {} rows from {} ({:?}, audience columns: {})",
        table.len(),
        file_name,
        kind,
        table.has_column(Column::AgeBracket) || table.has_column(Column::Gender)
    );
    Ok(table)
}

/// Parse a CSV export. The delimiter (`,` or `;`) is sniffed from the
/// header line.
pub fn from_csv(bytes: &[u8]) -> Result<RecordTable> {
    let delimiter = sniff_delimiter(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DashboardError::parse(format!("invalid CSV header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();
    let layout = HeaderLayout::from_headers(&headers)?;

    let mut records = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let row = result.map_err(|e| DashboardError::parse(format!("row {}: {}", line, e)))?;
        let cells: Vec<RawCell> = row
            .iter()
            .map(|field| {
                let field = field.trim();
                if field.is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(field.to_string())
                }
            })
            .collect();
        if let Some(record) = layout.build_record(line, &cells)? {
            records.push(record);
        }
    }

    Ok(RecordTable::new(layout.columns(), records))
}

/// Parse the first worksheet of an XLSX/XLS/ODS workbook.
pub fn from_workbook(bytes: &[u8]) -> Result<RecordTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DashboardError::parse(format!("not a readable workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DashboardError::parse("no sheets found in workbook"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| DashboardError::parse(format!("failed to read sheet {}: {}", sheet_name, e)))?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| DashboardError::parse("workbook sheet is empty"))?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell {
            Data::String(s) => s.clone(),
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect();
    let layout = HeaderLayout::from_headers(&headers)?;

    let mut records = Vec::new();
    for (index, row) in rows.enumerate() {
        let line = index + 2;
        let cells: Vec<RawCell> = row.iter().map(raw_from_data).collect();
        if let Some(record) = layout.build_record(line, &cells)? {
            records.push(record);
        }
    }

    Ok(RecordTable::new(layout.columns(), records))
}

fn raw_from_data(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::String(s) if s.trim().is_empty() => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.trim().to_string()),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(RawCell::Date)
            .unwrap_or(RawCell::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(_) => RawCell::Empty,
    }
}

/// Column positions found in the header row.
struct HeaderLayout {
    positions: BTreeMap<Column, usize>,
}

impl HeaderLayout {
    fn from_headers(headers: &[String]) -> Result<Self> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(DashboardError::parse("file has no header row"));
        }

        let mut positions = BTreeMap::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(column) = Column::from_header(header) {
                positions.entry(column).or_insert(index);
            }
        }

        if let Some(missing) = Column::ALL
            .into_iter()
            .find(|c| c.is_required() && !positions.contains_key(c))
        {
            return Err(DashboardError::missing_column(missing.header()));
        }

        Ok(HeaderLayout { positions })
    }

    fn columns(&self) -> BTreeSet<Column> {
        self.positions.keys().copied().collect()
    }

    fn cell<'c>(&self, cells: &'c [RawCell], column: Column) -> &'c RawCell {
        self.positions
            .get(&column)
            .and_then(|&index| cells.get(index))
            .unwrap_or(&RawCell::Empty)
    }

    /// Type one row. Returns `None` for rows whose known cells are all blank.
    fn build_record(&self, line: usize, cells: &[RawCell]) -> Result<Option<CampaignRecord>> {
        if self
            .positions
            .keys()
            .all(|&c| *self.cell(cells, c) == RawCell::Empty)
        {
            log::debug!("skipping empty row {}", line);
            return Ok(None);
        }

        let day = parse_day(self.cell(cells, Column::Day))
            .ok_or_else(|| cell_error(line, Column::Day, self.cell(cells, Column::Day)))?;

        // Measures are finite and non-negative.
        let measure = |column: Column| -> Result<Option<f64>> {
            let cell = self.cell(cells, column);
            let value = match cell {
                RawCell::Empty => return Ok(None),
                RawCell::Number(n) => Some(*n),
                RawCell::Text(text) => parse_number(text),
                RawCell::Date(_) => None,
            };
            match value {
                Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
                _ => Err(cell_error(line, column, cell)),
            }
        };
        let text = |column: Column| -> Option<String> { text_of(self.cell(cells, column)) };

        Ok(Some(CampaignRecord {
            day,
            campaign_name: text(Column::CampaignName).unwrap_or_default(),
            ad_set_name: text(Column::AdSetName).unwrap_or_default(),
            ad_name: text(Column::AdName).unwrap_or_default(),
            delivery_status: text(Column::DeliveryStatus).unwrap_or_default(),
            result_type: text(Column::ResultType),
            impressions: measure(Column::Impressions)?,
            link_clicks: measure(Column::LinkClicks)?,
            amount_spent: measure(Column::AmountSpent)?,
            results: measure(Column::Results)?,
            frequency: measure(Column::Frequency)?,
            age_bracket: text(Column::AgeBracket),
            gender: text(Column::Gender),
        }))
    }
}

fn cell_error(line: usize, column: Column, cell: &RawCell) -> DashboardError {
    DashboardError::parse(format!(
        "row {}: invalid value {:?} in column `{}`",
        line,
        cell,
        column.header()
    ))
}

fn text_of(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Empty => None,
        RawCell::Text(s) => Some(s.clone()),
        RawCell::Number(n) if n.fract() == 0.0 => Some(format!("{:.0}", n)),
        RawCell::Number(n) => Some(n.to_string()),
        RawCell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
    }
}

/// Pick `;` when the header line has more semicolons than commas.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let semicolons = header.iter().filter(|&&b| b == b';').count();
    let commas = header.iter().filter(|&&b| b == b',').count();
    if semicolons > commas { b';' } else { b',' }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

fn parse_day(cell: &RawCell) -> Option<NaiveDate> {
    match cell {
        RawCell::Date(d) => Some(*d),
        RawCell::Number(serial) => excel_serial_to_date(*serial),
        RawCell::Text(text) => parse_date_text(text),
        RawCell::Empty => None,
    }
}

pub(crate) fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Spreadsheet serial day numbers count from 1899-12-30.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Parse a numeric cell written either `1234.56`, `1,234.56` or `1.234,56`,
/// optionally prefixed with `R$`.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };
    normalized.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_formats() {
        assert_eq!(parse_number("1234.5"), Some(1234.5));
        assert_eq!(parse_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_number("1,234.56"), Some(1234.56));
        assert_eq!(parse_number("R$ 12,50"), Some(12.5));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29);
        assert_eq!(parse_date_text("2024-02-29"), expected);
        assert_eq!(parse_date_text("29/02/2024"), expected);
        assert_eq!(parse_date_text("2024-02-29 00:00:00"), expected);
        assert_eq!(parse_date_text("yesterday"), None);
    }

    #[test]
    fn test_excel_serial_dates() {
        assert_eq!(
            excel_serial_to_date(45351.0),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(excel_serial_to_date(-1.0), None);
    }

    #[test]
    fn test_delimiter_sniffing() {
        assert_eq!(sniff_delimiter(b"Dia;Nome da campanha;Valor usado (BRL)\n1,2;3"), b';');
        assert_eq!(sniff_delimiter(b"Dia,Nome da campanha\n"), b',');
    }

    #[test]
    fn test_extension_detection() {
        assert_eq!(SourceKind::from_file_name("a.CSV").unwrap(), SourceKind::Csv);
        assert_eq!(
            SourceKind::from_file_name("export.xlsx").unwrap(),
            SourceKind::Workbook
        );
        assert!(SourceKind::from_file_name("notes.txt").is_err());
        assert!(SourceKind::from_file_name("README").is_err());
    }
}
