use crate::error::Result;
use crate::metrics::{AggregatedView, BASE_MEASURES, Dimension, Indicator, aggregate};
use crate::record::{CampaignRecord, Column};
use crate::table::TableView;
use serde::{Deserialize, Serialize};

/// Number of normalized rows shown as a data preview after upload.
pub const PREVIEW_ROWS: usize = 5;

/// Scalar totals and overall ratios for the filtered rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub impressions: f64,
    pub link_clicks: f64,
    pub ctr: f64,
    pub amount_spent: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub cpl: f64,
    pub mean_frequency: f64,
    pub results: f64,
}

impl CampaignSummary {
    /// Cards in display order, three per line.
    pub fn cards(&self) -> Vec<SummaryCard> {
        vec![
            SummaryCard::new("Impressões", format_count(self.impressions)),
            SummaryCard::new("Cliques", format_count(self.link_clicks)),
            SummaryCard::new("(%) CTR", format_percent(self.ctr)),
            SummaryCard::new("Valor Usado (BRL)", format_currency(self.amount_spent)),
            SummaryCard::new("Custo por Clique", format_currency(self.cpc)),
            SummaryCard::new("Resultados", format_decimal(self.results)),
            SummaryCard::new("CPM", format_currency(self.cpm)),
            SummaryCard::new("CPL", format_decimal(self.cpl)),
            SummaryCard::new("Frequência Média", format_decimal(self.mean_frequency)),
        ]
    }
}

/// A labelled scalar ready for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCard {
    pub label: String,
    pub value: String,
}

impl SummaryCard {
    fn new(label: &str, value: String) -> Self {
        SummaryCard {
            label: label.to_string(),
            value,
        }
    }
}

/// Placeholder for values that are undefined (zero denominators).
pub const UNDEFINED: &str = "—";

pub fn format_count(value: f64) -> String {
    if value.is_finite() {
        format!("{:.0}", value)
    } else {
        UNDEFINED.to_string()
    }
}

pub fn format_decimal(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        UNDEFINED.to_string()
    }
}

pub fn format_currency(value: f64) -> String {
    if value.is_finite() {
        format!("R${:.2}", value)
    } else {
        UNDEFINED.to_string()
    }
}

pub fn format_percent(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}%", value)
    } else {
        UNDEFINED.to_string()
    }
}

/// Totals over the view. Blank cells are skipped; mean frequency averages the
/// non-blank values only and is NaN when there are none.
pub fn summarize(view: &TableView<'_>) -> CampaignSummary {
    let total = |column: Column| -> f64 { view.iter().filter_map(|r| r.measure(column)).sum() };

    let impressions = total(Column::Impressions);
    let link_clicks = total(Column::LinkClicks);
    let amount_spent = total(Column::AmountSpent);
    let results = total(Column::Results);

    let frequencies: Vec<f64> = view.iter().filter_map(|r| r.frequency).collect();
    let mean_frequency = if frequencies.is_empty() {
        f64::NAN
    } else {
        frequencies.iter().sum::<f64>() / frequencies.len() as f64
    };

    CampaignSummary {
        impressions,
        link_clicks,
        ctr: link_clicks / impressions * 100.0,
        amount_spent,
        cpc: amount_spent / link_clicks,
        cpm: amount_spent / impressions * 1000.0,
        cpl: amount_spent / results,
        mean_frequency,
        results,
    }
}

/// Audience breakdowns; each is present only when its columns are.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceViews {
    pub by_age: Option<AggregatedView>,
    pub by_gender: Option<AggregatedView>,
    pub by_age_gender: Option<AggregatedView>,
}

impl AudienceViews {
    pub fn is_empty(&self) -> bool {
        self.by_age.is_none() && self.by_gender.is_none() && self.by_age_gender.is_none()
    }
}

/// Every dataset behind the dashboard widgets, computed fresh from one
/// filtered view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub indicator: Indicator,
    pub summary: CampaignSummary,
    pub cards: Vec<SummaryCard>,
    pub time_series: AggregatedView,
    pub campaign_series: AggregatedView,
    pub campaign_totals: AggregatedView,
    pub ad_set_series: AggregatedView,
    pub ad_set_totals: AggregatedView,
    pub audience: AudienceViews,
}

impl Dashboard {
    /// The dataset behind `chart`, `None` for an audience chart whose columns
    /// are absent.
    pub fn dataset(&self, chart: ChartKind) -> Option<&AggregatedView> {
        match chart {
            ChartKind::TimeSeries => Some(&self.time_series),
            ChartKind::CampaignSeries => Some(&self.campaign_series),
            ChartKind::CampaignTotals => Some(&self.campaign_totals),
            ChartKind::AdSetSeries => Some(&self.ad_set_series),
            ChartKind::AdSetTotals => Some(&self.ad_set_totals),
            ChartKind::Age => self.audience.by_age.as_ref(),
            ChartKind::Gender => self.audience.by_gender.as_ref(),
            ChartKind::AgeGender => self.audience.by_age_gender.as_ref(),
        }
    }

    /// Charts that have data to draw, in page order.
    pub fn charts(&self) -> Vec<ChartKind> {
        ChartKind::ALL
            .into_iter()
            .filter(|chart| self.dataset(*chart).is_some())
            .collect()
    }
}

/// Build every dashboard dataset for `view`.
///
/// # Errors
/// * `MissingColumn` if the view lacks a column a fixed view groups or sums by
pub fn build_dashboard(view: &TableView<'_>, indicator: Indicator) -> Result<Dashboard> {
    let by = |dimensions: &[Dimension]| aggregate(view, dimensions, &BASE_MEASURES);

    let has_age = view.has_column(Column::AgeBracket);
    let has_gender = view.has_column(Column::Gender);

    let audience = AudienceViews {
        by_age: if has_age { Some(by(&[Dimension::Age])?) } else { None },
        by_gender: if has_gender {
            Some(by(&[Dimension::Gender])?)
        } else {
            None
        },
        by_age_gender: if has_age && has_gender {
            Some(by(&[Dimension::Age, Dimension::Gender])?)
        } else {
            None
        },
    };

    let summary = summarize(view);

    log::debug!(
        "built dashboard over {} rows (indicator {}, audience views: {})",
        view.len(),
        indicator.name(),
        !audience.is_empty()
    );

    Ok(Dashboard {
        indicator,
        summary,
        cards: summary.cards(),
        time_series: by(&[Dimension::Day])?,
        campaign_series: by(&[Dimension::Day, Dimension::Campaign])?,
        campaign_totals: by(&[Dimension::Campaign])?,
        ad_set_series: by(&[Dimension::Day, Dimension::AdSet])?,
        ad_set_totals: by(&[Dimension::AdSet])?,
        audience,
    })
}

/// First rows of a table for the post-upload preview.
pub fn preview<'a>(view: &TableView<'a>) -> Vec<&'a CampaignRecord> {
    view.iter().take(PREVIEW_ROWS).collect()
}

/// How a dataset is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphType {
    Line,
    Bar,
    HeatMap,
}

/// The dashboard's chart widgets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartKind {
    TimeSeries,
    CampaignSeries,
    CampaignTotals,
    AdSetSeries,
    AdSetTotals,
    Age,
    Gender,
    AgeGender,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::TimeSeries,
        ChartKind::CampaignSeries,
        ChartKind::CampaignTotals,
        ChartKind::AdSetSeries,
        ChartKind::AdSetTotals,
        ChartKind::Age,
        ChartKind::Gender,
        ChartKind::AgeGender,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            ChartKind::TimeSeries => "time-series",
            ChartKind::CampaignSeries => "campaign-series",
            ChartKind::CampaignTotals => "campaign-totals",
            ChartKind::AdSetSeries => "ad-set-series",
            ChartKind::AdSetTotals => "ad-set-totals",
            ChartKind::Age => "age",
            ChartKind::Gender => "gender",
            ChartKind::AgeGender => "age-gender",
        }
    }

    pub fn from_slug(slug: &str) -> Option<ChartKind> {
        ChartKind::ALL.into_iter().find(|c| c.slug() == slug)
    }

    pub fn graph_type(self) -> GraphType {
        match self {
            ChartKind::TimeSeries | ChartKind::CampaignSeries | ChartKind::AdSetSeries => {
                GraphType::Line
            }
            ChartKind::AgeGender => GraphType::HeatMap,
            _ => GraphType::Bar,
        }
    }

    pub fn title(self, indicator: Indicator) -> String {
        match self {
            ChartKind::TimeSeries => "Série Temporal de Indicadores".to_string(),
            ChartKind::CampaignSeries => "Série Temporal de Indicadores por Campanha".to_string(),
            ChartKind::CampaignTotals => "Comparativo de Indicadores por Campanha".to_string(),
            ChartKind::AdSetSeries => {
                "Série Temporal de Indicadores por Conjunto de Anúncios".to_string()
            }
            ChartKind::AdSetTotals => {
                "Comparativo de Indicadores por Conjunto de Anúncios".to_string()
            }
            ChartKind::Age => format!("Comparativo de {} por Idade", indicator),
            ChartKind::Gender => format!("Comparativo de {} por Gênero", indicator),
            ChartKind::AgeGender => format!("Comparativo de {} por Idade e Gênero", indicator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_values_render_as_placeholder() {
        assert_eq!(format_currency(f64::INFINITY), UNDEFINED);
        assert_eq!(format_percent(f64::NAN), UNDEFINED);
        assert_eq!(format_count(f64::NEG_INFINITY), UNDEFINED);
        assert_eq!(format_currency(12.346), "R$12.35");
        assert_eq!(format_percent(4.0 / 3.0), "1.33%");
        assert_eq!(format_count(3000.0), "3000");
    }

    #[test]
    fn test_chart_slugs_round_trip() {
        for chart in ChartKind::ALL {
            assert_eq!(ChartKind::from_slug(chart.slug()), Some(chart));
        }
        assert_eq!(ChartKind::from_slug("pie"), None);
    }

    #[test]
    fn test_audience_titles_name_the_indicator() {
        assert_eq!(
            ChartKind::Age.title(Indicator::Cpc),
            "Comparativo de CPC por Idade"
        );
        assert_eq!(ChartKind::AgeGender.graph_type(), GraphType::HeatMap);
    }
}
