#![cfg(not(tarpaulin_include))]

use crate::error::{DashboardError, Result};
use crate::metrics::{AggregatedRow, AggregatedView, Indicator};

const DERIVED: [Indicator; 4] = [Indicator::Cpc, Indicator::Ctr, Indicator::Cpm, Indicator::Cpl];

/// Header cells for an aggregated view: one per grouping dimension, one per
/// summed measure, then the four derived metrics.
fn header_row(view: &AggregatedView) -> Vec<String> {
    view.dimensions
        .iter()
        .map(|d| d.label().to_string())
        .chain(view.measures.iter().map(|m| m.label().to_string()))
        .chain(DERIVED.iter().map(|i| i.name().to_string()))
        .collect()
}

/// Numeric cells of one row, `None` where the value is not finite.
fn value_cells(view: &AggregatedView, row: &AggregatedRow) -> Vec<Option<f64>> {
    view.measures
        .iter()
        .map(|m| row.metrics.measure(*m))
        .chain(DERIVED.iter().map(|i| Some(row.value(*i))))
        .map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

/// Convert an aggregated view to CSV
///
/// Writes a header row followed by one line per group. Undefined ratios
/// (zero denominators) are written as empty fields.
///
/// # Arguments
/// * `view` - The aggregated view to export
///
/// # Returns
/// * `Result<String>` - CSV content
///
/// # Examples
/// ```
/// use campaign_analytics::downloader::to_csv;
/// use campaign_analytics::metrics::AggregatedView;
///
/// let csv = to_csv(&AggregatedView::default()).unwrap();
/// assert_eq!(csv.trim(), "CPC,CTR,CPM,CPL");
/// ```
pub fn to_csv(view: &AggregatedView) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let export_error = |e: csv::Error| DashboardError::Export(e.to_string());

    writer.write_record(header_row(view)).map_err(export_error)?;

    for row in &view.rows {
        let fields: Vec<String> = row
            .key
            .iter()
            .map(|k| k.to_string())
            .chain(
                value_cells(view, row)
                    .into_iter()
                    .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
            )
            .collect();
        writer.write_record(&fields).map_err(export_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DashboardError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DashboardError::Export(e.to_string()))
}

/// Convert an aggregated view to XLSX format
///
/// Same layout as [`to_csv`] in a single worksheet; undefined ratios are left
/// blank.
///
/// # Returns
/// * `Result<Vec<u8>>` - XLSX file content as bytes
#[cfg(feature = "web")]
pub fn to_xlsx(view: &AggregatedView) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

    let export_error = |e: XlsxError| DashboardError::Export(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, header) in header_row(view).iter().enumerate() {
        worksheet
            .write_string(0, c as u16, header)
            .map_err(export_error)?;
    }

    for (r, row) in view.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        let mut c: u16 = 0;
        for key in &row.key {
            worksheet
                .write_string(r, c, &key.to_string())
                .map_err(export_error)?;
            c += 1;
        }
        for value in value_cells(view, row) {
            if let Some(value) = value {
                worksheet.write_number(r, c, value).map_err(export_error)?;
            }
            c += 1;
        }
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(export_error)
}
