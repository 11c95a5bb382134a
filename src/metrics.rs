use crate::error::{DashboardError, Result};
use crate::record::{CampaignRecord, Column};
use crate::table::TableView;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Columns a view can be grouped by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Day,
    Campaign,
    AdSet,
    Ad,
    DeliveryStatus,
    ResultType,
    Age,
    Gender,
}

impl Dimension {
    pub fn column(self) -> Column {
        match self {
            Dimension::Day => Column::Day,
            Dimension::Campaign => Column::CampaignName,
            Dimension::AdSet => Column::AdSetName,
            Dimension::Ad => Column::AdName,
            Dimension::DeliveryStatus => Column::DeliveryStatus,
            Dimension::ResultType => Column::ResultType,
            Dimension::Age => Column::AgeBracket,
            Dimension::Gender => Column::Gender,
        }
    }

    pub fn label(self) -> &'static str {
        self.column().header()
    }

    fn key_of(self, record: &CampaignRecord) -> Option<KeyValue> {
        match self {
            Dimension::Day => Some(KeyValue::Day(record.day)),
            other => record
                .text(other.column())
                .map(|s| KeyValue::Text(s.to_string())),
        }
    }
}

/// Directly summed quantities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Impressions,
    LinkClicks,
    AmountSpent,
    Results,
    Frequency,
}

/// Measures summed by every dashboard view.
pub const BASE_MEASURES: [Measure; 4] = [
    Measure::Impressions,
    Measure::LinkClicks,
    Measure::AmountSpent,
    Measure::Results,
];

impl Measure {
    pub fn column(self) -> Column {
        match self {
            Measure::Impressions => Column::Impressions,
            Measure::LinkClicks => Column::LinkClicks,
            Measure::AmountSpent => Column::AmountSpent,
            Measure::Results => Column::Results,
            Measure::Frequency => Column::Frequency,
        }
    }

    pub fn label(self) -> &'static str {
        self.column().header()
    }
}

/// The metric plotted on chart value axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    #[default]
    #[serde(rename = "impressions")]
    Impressions,
    #[serde(rename = "link_clicks")]
    LinkClicks,
    #[serde(rename = "amount_spent")]
    AmountSpent,
    #[serde(rename = "CPC")]
    Cpc,
    #[serde(rename = "CTR")]
    Ctr,
    #[serde(rename = "CPM")]
    Cpm,
    #[serde(rename = "results")]
    Results,
    #[serde(rename = "CPL")]
    Cpl,
}

impl Indicator {
    /// Selection order offered to the user; the first entry is the default.
    pub const ALL: [Indicator; 8] = [
        Indicator::Impressions,
        Indicator::LinkClicks,
        Indicator::AmountSpent,
        Indicator::Cpc,
        Indicator::Ctr,
        Indicator::Cpm,
        Indicator::Results,
        Indicator::Cpl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Indicator::Impressions => "impressions",
            Indicator::LinkClicks => "link_clicks",
            Indicator::AmountSpent => "amount_spent",
            Indicator::Cpc => "CPC",
            Indicator::Ctr => "CTR",
            Indicator::Cpm => "CPM",
            Indicator::Results => "results",
            Indicator::Cpl => "CPL",
        }
    }

    /// Axis label, using the export's own header for base measures.
    pub fn label(self) -> &'static str {
        match self {
            Indicator::Impressions => Measure::Impressions.label(),
            Indicator::LinkClicks => Measure::LinkClicks.label(),
            Indicator::AmountSpent => Measure::AmountSpent.label(),
            Indicator::Results => Measure::Results.label(),
            derived => derived.name(),
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Indicator {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Indicator::ALL
            .into_iter()
            .find(|i| i.name().eq_ignore_ascii_case(s) || i.label() == s)
            .ok_or_else(|| DashboardError::parse(format!("unknown indicator: {}", s)))
    }
}

/// One grouping-key component. Dates order chronologically, text
/// lexicographically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Day(NaiveDate),
    Text(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
            KeyValue::Text(text) => f.write_str(text),
        }
    }
}

/// Summed base measures and the ratios derived from them.
///
/// A measure that was not requested is `None`; a derived metric depending on
/// it is NaN. Zero denominators yield infinities or NaN, never an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub impressions: Option<f64>,
    pub link_clicks: Option<f64>,
    pub amount_spent: Option<f64>,
    pub results: Option<f64>,
    pub frequency: Option<f64>,
    #[serde(rename = "CPC")]
    pub cpc: f64,
    #[serde(rename = "CTR")]
    pub ctr: f64,
    #[serde(rename = "CPM")]
    pub cpm: f64,
    #[serde(rename = "CPL")]
    pub cpl: f64,
}

impl MetricValues {
    pub fn measure(&self, measure: Measure) -> Option<f64> {
        match measure {
            Measure::Impressions => self.impressions,
            Measure::LinkClicks => self.link_clicks,
            Measure::AmountSpent => self.amount_spent,
            Measure::Results => self.results,
            Measure::Frequency => self.frequency,
        }
    }

    fn measure_mut(&mut self, measure: Measure) -> &mut Option<f64> {
        match measure {
            Measure::Impressions => &mut self.impressions,
            Measure::LinkClicks => &mut self.link_clicks,
            Measure::AmountSpent => &mut self.amount_spent,
            Measure::Results => &mut self.results,
            Measure::Frequency => &mut self.frequency,
        }
    }

    pub fn indicator(&self, indicator: Indicator) -> f64 {
        match indicator {
            Indicator::Impressions => self.impressions.unwrap_or(f64::NAN),
            Indicator::LinkClicks => self.link_clicks.unwrap_or(f64::NAN),
            Indicator::AmountSpent => self.amount_spent.unwrap_or(f64::NAN),
            Indicator::Results => self.results.unwrap_or(f64::NAN),
            Indicator::Cpc => self.cpc,
            Indicator::Ctr => self.ctr,
            Indicator::Cpm => self.cpm,
            Indicator::Cpl => self.cpl,
        }
    }

    fn derive(&mut self) {
        let spend = self.amount_spent.unwrap_or(f64::NAN);
        let clicks = self.link_clicks.unwrap_or(f64::NAN);
        let impressions = self.impressions.unwrap_or(f64::NAN);
        let results = self.results.unwrap_or(f64::NAN);

        self.cpc = spend / clicks;
        self.ctr = (clicks / impressions) * 100.0;
        self.cpm = spend / (impressions / 1000.0);
        self.cpl = spend / results;
    }
}

/// One output row: the grouping key and its metrics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub key: Vec<KeyValue>,
    #[serde(flatten)]
    pub metrics: MetricValues,
}

impl AggregatedRow {
    pub fn value(&self, indicator: Indicator) -> f64 {
        self.metrics.indicator(indicator)
    }
}

/// Table keyed by `dimensions`, rows in ascending key order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedView {
    pub dimensions: Vec<Dimension>,
    pub measures: Vec<Measure>,
    pub rows: Vec<AggregatedRow>,
}

impl AggregatedView {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of a measure over every group.
    pub fn total(&self, measure: Measure) -> f64 {
        self.rows
            .iter()
            .filter_map(|row| row.metrics.measure(measure))
            .sum()
    }
}

/// Group `view` by `dimensions` and sum `measures`, then derive CPC, CTR,
/// CPM and CPL from the sums.
///
/// Rows whose value for any grouping dimension is absent are left out, as
/// with a standard group-by. Blank measure cells are skipped by the sums.
///
/// # Errors
/// * `MissingColumn` if a grouping or measure column is not in the table
pub fn aggregate(
    view: &TableView<'_>,
    dimensions: &[Dimension],
    measures: &[Measure],
) -> Result<AggregatedView> {
    for dimension in dimensions {
        view.require(dimension.column())?;
    }
    for measure in measures {
        view.require(measure.column())?;
    }

    let mut groups: BTreeMap<Vec<KeyValue>, MetricValues> = BTreeMap::new();

    'rows: for record in view.iter() {
        let mut key = Vec::with_capacity(dimensions.len());
        for dimension in dimensions {
            match dimension.key_of(record) {
                Some(value) => key.push(value),
                None => continue 'rows,
            }
        }

        let entry = groups.entry(key).or_default();
        for &measure in measures {
            let sum = entry.measure_mut(measure);
            let current = sum.get_or_insert(0.0);
            if let Some(value) = record.measure(measure.column()) {
                *current += value;
            }
        }
    }

    let rows = groups
        .into_iter()
        .map(|(key, mut metrics)| {
            metrics.derive();
            AggregatedRow { key, metrics }
        })
        .collect::<Vec<_>>();

    log::debug!(
        "aggregated {} rows by {:?} into {} groups",
        view.len(),
        dimensions,
        rows.len()
    );

    Ok(AggregatedView {
        dimensions: dimensions.to_vec(),
        measures: measures.to_vec(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RecordTable;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_indicator_parsing_accepts_names_and_labels() {
        assert_eq!("cpc".parse::<Indicator>().unwrap(), Indicator::Cpc);
        assert_eq!("CTR".parse::<Indicator>().unwrap(), Indicator::Ctr);
        assert_eq!(
            "Valor usado (BRL)".parse::<Indicator>().unwrap(),
            Indicator::AmountSpent
        );
        assert_eq!(
            "link_clicks".parse::<Indicator>().unwrap(),
            Indicator::LinkClicks
        );
        assert!("reach".parse::<Indicator>().is_err());
        assert_eq!(Indicator::default(), Indicator::Impressions);
    }

    #[test]
    fn test_unrequested_measure_leaves_derived_metric_nan() {
        let mut r = CampaignRecord::new(day(1), "A");
        r.amount_spent = Some(10.0);
        r.link_clicks = Some(5.0);
        let table = RecordTable::with_standard_columns(vec![r], false);

        let view = aggregate(
            &table.view(),
            &[Dimension::Campaign],
            &[Measure::AmountSpent, Measure::LinkClicks],
        )
        .unwrap();

        let metrics = &view.rows[0].metrics;
        assert_eq!(metrics.cpc, 2.0);
        assert!(metrics.cpl.is_nan());
        assert_eq!(metrics.impressions, None);
        assert!(view.rows[0].value(Indicator::Impressions).is_nan());
    }

    #[test]
    fn test_rows_with_absent_key_are_dropped() {
        let mut with_type = CampaignRecord::new(day(1), "A");
        with_type.result_type = Some("Leads".into());
        with_type.impressions = Some(100.0);
        let mut without_type = CampaignRecord::new(day(1), "B");
        without_type.impressions = Some(50.0);
        let table = RecordTable::with_standard_columns(vec![with_type, without_type], false);

        let view = aggregate(
            &table.view(),
            &[Dimension::ResultType],
            &[Measure::Impressions],
        )
        .unwrap();

        assert_eq!(view.len(), 1);
        assert_eq!(view.rows[0].key, vec![KeyValue::Text("Leads".into())]);
        assert_eq!(view.rows[0].metrics.impressions, Some(100.0));
    }

    #[test]
    fn test_all_blank_measure_sums_to_zero() {
        let table = RecordTable::with_standard_columns(
            vec![CampaignRecord::new(day(2), "A"), CampaignRecord::new(day(2), "A")],
            false,
        );

        let view = aggregate(&table.view(), &[Dimension::Day], &BASE_MEASURES).unwrap();

        assert_eq!(view.rows[0].metrics.results, Some(0.0));
        assert!(view.rows[0].metrics.cpl.is_nan());
    }

    #[test]
    fn test_key_values_display() {
        assert_eq!(KeyValue::Day(day(9)).to_string(), "2024-05-09");
        assert_eq!(KeyValue::Text("Feminino".into()).to_string(), "Feminino");
    }
}
