use crate::error::Result;
use crate::record::Column;
use crate::table::RecordTable;
use std::collections::HashMap;

/// Fill absent result types from each campaign's canonical result type.
///
/// The canonical value is the first non-absent `result_type` seen for the
/// campaign in input row order. Rows that already carry a result type keep
/// it; campaigns with no result type anywhere stay absent.
///
/// # Errors
/// * `MissingColumn` if the table lacks the campaign or result-type column
pub fn normalize_result_types(mut table: RecordTable) -> Result<RecordTable> {
    table.require(Column::CampaignName)?;
    table.require(Column::ResultType)?;

    let canonical = table
        .records
        .iter()
        .fold(HashMap::<String, String>::new(), |mut acc, record| {
            if let Some(result_type) = &record.result_type {
                acc.entry(record.campaign_name.clone())
                    .or_insert_with(|| result_type.clone());
            }
            acc
        });

    let mut filled = 0usize;
    for record in table.records.iter_mut().filter(|r| r.result_type.is_none()) {
        if let Some(result_type) = canonical.get(&record.campaign_name) {
            record.result_type = Some(result_type.clone());
            filled += 1;
        }
    }

    log::debug!(
        "normalized result types: {} campaigns with a canonical type, {} rows filled",
        canonical.len(),
        filled
    );

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::record::CampaignRecord;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn record(campaign: &str, result_type: Option<&str>) -> CampaignRecord {
        let mut r = CampaignRecord::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), campaign);
        r.result_type = result_type.map(str::to_string);
        r
    }

    #[test]
    fn test_first_seen_result_type_wins() {
        let table = RecordTable::with_standard_columns(
            vec![
                record("A", None),
                record("A", Some("Leads")),
                record("A", Some("Conversas")),
                record("A", None),
            ],
            false,
        );

        let table = normalize_result_types(table).unwrap();
        let types: Vec<_> = table
            .records
            .iter()
            .map(|r| r.result_type.as_deref())
            .collect();

        // Explicit values are kept; blanks take the first one seen.
        assert_eq!(
            types,
            vec![Some("Leads"), Some("Leads"), Some("Conversas"), Some("Leads")]
        );
    }

    #[test]
    fn test_campaign_without_result_type_stays_absent() {
        let table = RecordTable::with_standard_columns(
            vec![record("A", None), record("B", Some("Leads")), record("A", None)],
            false,
        );

        let table = normalize_result_types(table).unwrap();

        assert!(
            table
                .records
                .iter()
                .filter(|r| r.campaign_name == "A")
                .all(|r| r.result_type.is_none())
        );
        assert_eq!(table.records[1].result_type.as_deref(), Some("Leads"));
    }

    #[test]
    fn test_missing_result_type_column_is_rejected() {
        let columns: BTreeSet<Column> = [Column::Day, Column::CampaignName].into_iter().collect();
        let table = RecordTable::new(columns, vec![record("A", None)]);

        match normalize_result_types(table) {
            Err(DashboardError::MissingColumn { column }) => {
                assert_eq!(column, "Tipo de resultado")
            }
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }
}
