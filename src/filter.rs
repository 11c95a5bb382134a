use crate::metrics::Indicator;
use crate::record::{CampaignRecord, Column};
use crate::table::{RecordTable, TableView};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Categorical columns offered as filter dimensions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    ResultType,
    Campaign,
    AdSet,
    Ad,
    DeliveryStatus,
}

impl Facet {
    pub const ALL: [Facet; 5] = [
        Facet::ResultType,
        Facet::Campaign,
        Facet::AdSet,
        Facet::Ad,
        Facet::DeliveryStatus,
    ];

    pub fn column(self) -> Column {
        match self {
            Facet::ResultType => Column::ResultType,
            Facet::Campaign => Column::CampaignName,
            Facet::AdSet => Column::AdSetName,
            Facet::Ad => Column::AdName,
            Facet::DeliveryStatus => Column::DeliveryStatus,
        }
    }

    fn value_of(self, record: &CampaignRecord) -> Option<&str> {
        record.text(self.column())
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column().header())
    }
}

/// The user's facet selections and chosen indicator.
///
/// An empty (or missing) set for a facet means "no restriction". Facets
/// combine with AND; values within one facet combine with OR.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub facets: BTreeMap<Facet, BTreeSet<String>>,
    #[serde(default)]
    pub indicator: Indicator,
}

impl FilterSelection {
    pub fn new(indicator: Indicator) -> Self {
        FilterSelection {
            facets: BTreeMap::new(),
            indicator,
        }
    }

    /// Adds `value` to the selected values of `facet`.
    pub fn select(&mut self, facet: Facet, value: impl Into<String>) -> &mut Self {
        self.facets.entry(facet).or_default().insert(value.into());
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.facets.values().all(BTreeSet::is_empty)
    }

    pub fn matches(&self, record: &CampaignRecord) -> bool {
        self.matches_except(record, None)
    }

    fn matches_except(&self, record: &CampaignRecord, skip: Option<Facet>) -> bool {
        self.facets
            .iter()
            .filter(|(facet, values)| Some(**facet) != skip && !values.is_empty())
            .all(|(facet, values)| {
                facet
                    .value_of(record)
                    .is_some_and(|value| values.contains(value))
            })
    }

    /// The rows of `table` matching every facet selection.
    pub fn apply<'a>(&self, table: &'a RecordTable) -> TableView<'a> {
        let rows = table
            .records
            .iter()
            .filter(|record| self.matches(record))
            .collect::<Vec<_>>();
        log::debug!(
            "filter kept {} of {} rows (indicator {})",
            rows.len(),
            table.len(),
            self.indicator.name()
        );
        TableView {
            columns: &table.columns,
            rows,
        }
    }
}

/// Distinct values of `facet` across the whole table, ascending.
pub fn distinct_values(table: &RecordTable, facet: Facet) -> Vec<String> {
    table
        .records
        .iter()
        .filter_map(|record| facet.value_of(record))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Options to offer for every facet given the current selection.
///
/// Each facet's options are the distinct values among rows that match the
/// selections of all *other* facets, so picking a campaign narrows the ad
/// set list to that campaign's ad sets.
pub fn facet_options(
    table: &RecordTable,
    selection: &FilterSelection,
) -> BTreeMap<Facet, Vec<String>> {
    Facet::ALL
        .into_iter()
        .map(|facet| {
            let values = table
                .records
                .iter()
                .filter(|record| selection.matches_except(record, Some(facet)))
                .filter_map(|record| facet.value_of(record))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(str::to_string)
                .collect();
            (facet, values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(campaign: &str, ad_set: &str, result_type: Option<&str>) -> CampaignRecord {
        let mut r = CampaignRecord::new(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), campaign);
        r.ad_set_name = ad_set.to_string();
        r.result_type = result_type.map(str::to_string);
        r
    }

    fn table() -> RecordTable {
        RecordTable::with_standard_columns(
            vec![
                record("Black Friday", "Lookalike", Some("Leads")),
                record("Black Friday", "Remarketing", Some("Leads")),
                record("Natal", "Interesses", None),
            ],
            false,
        )
    }

    #[test]
    fn test_values_within_facet_are_ored() {
        let table = table();
        let mut selection = FilterSelection::default();
        selection
            .select(Facet::AdSet, "Lookalike")
            .select(Facet::AdSet, "Interesses");

        assert_eq!(selection.apply(&table).len(), 2);
    }

    #[test]
    fn test_facets_are_anded() {
        let table = table();
        let mut selection = FilterSelection::default();
        selection
            .select(Facet::Campaign, "Natal")
            .select(Facet::AdSet, "Lookalike");

        assert!(selection.apply(&table).is_empty());
    }

    #[test]
    fn test_absent_value_never_matches_a_restricted_facet() {
        let table = table();
        let mut selection = FilterSelection::default();
        selection.select(Facet::ResultType, "Leads");

        let view = selection.apply(&table);
        assert_eq!(view.len(), 2);
        assert!(view.iter().all(|r| r.campaign_name == "Black Friday"));
    }

    #[test]
    fn test_empty_value_set_is_unrestricted() {
        let table = table();
        let mut selection = FilterSelection::default();
        selection.facets.insert(Facet::Campaign, BTreeSet::new());

        assert!(selection.is_unrestricted());
        assert_eq!(selection.apply(&table).len(), table.len());
    }

    #[test]
    fn test_facet_options_narrow_by_other_facets() {
        let table = table();
        let mut selection = FilterSelection::default();
        selection.select(Facet::Campaign, "Black Friday");

        let options = facet_options(&table, &selection);

        assert_eq!(options[&Facet::AdSet], vec!["Lookalike", "Remarketing"]);
        // A facet's own selection does not narrow its options.
        assert_eq!(options[&Facet::Campaign], vec!["Black Friday", "Natal"]);
        assert_eq!(options[&Facet::ResultType], vec!["Leads"]);
    }

    #[test]
    fn test_distinct_values_skip_absent() {
        assert_eq!(distinct_values(&table(), Facet::ResultType), vec!["Leads"]);
    }
}
