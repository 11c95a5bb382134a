use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Columns of an ads-manager export that the dashboard understands.
///
/// The declaration order is the catalogue order used when reporting the
/// first missing column of an upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Day,
    CampaignName,
    AdSetName,
    AdName,
    DeliveryStatus,
    ResultType,
    Impressions,
    LinkClicks,
    AmountSpent,
    Results,
    Frequency,
    AgeBracket,
    Gender,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Day,
        Column::CampaignName,
        Column::AdSetName,
        Column::AdName,
        Column::DeliveryStatus,
        Column::ResultType,
        Column::Impressions,
        Column::LinkClicks,
        Column::AmountSpent,
        Column::Results,
        Column::Frequency,
        Column::AgeBracket,
        Column::Gender,
    ];

    /// Header text as it appears in the spreadsheet export.
    pub fn header(self) -> &'static str {
        match self {
            Column::Day => "Dia",
            Column::CampaignName => "Nome da campanha",
            Column::AdSetName => "Nome do conjunto de anúncios",
            Column::AdName => "Nome do anúncio",
            Column::DeliveryStatus => "Status de veiculação",
            Column::ResultType => "Tipo de resultado",
            Column::Impressions => "Impressões",
            Column::LinkClicks => "Cliques no link",
            Column::AmountSpent => "Valor usado (BRL)",
            Column::Results => "Resultados",
            Column::Frequency => "Frequência",
            Column::AgeBracket => "Idade",
            Column::Gender => "Gênero",
        }
    }

    /// Audience breakdown columns are the only optional ones.
    pub fn is_required(self) -> bool {
        !matches!(self, Column::AgeBracket | Column::Gender)
    }

    pub fn from_header(header: &str) -> Option<Column> {
        let header = header.trim().trim_start_matches('\u{feff}');
        Column::ALL.into_iter().find(|c| c.header() == header)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// One row of the export: a (day, campaign, ad set, ad[, audience segment])
/// combination with its delivery measures.
///
/// Measures are `None` where the source cell was blank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub day: NaiveDate,
    pub campaign_name: String,
    pub ad_set_name: String,
    pub ad_name: String,
    pub delivery_status: String,
    pub result_type: Option<String>,
    pub impressions: Option<f64>,
    pub link_clicks: Option<f64>,
    pub amount_spent: Option<f64>,
    pub results: Option<f64>,
    pub frequency: Option<f64>,
    pub age_bracket: Option<String>,
    pub gender: Option<String>,
}

impl CampaignRecord {
    /// A record for `day` and `campaign_name` with every other field blank.
    pub fn new(day: NaiveDate, campaign_name: impl Into<String>) -> Self {
        CampaignRecord {
            day,
            campaign_name: campaign_name.into(),
            ad_set_name: String::new(),
            ad_name: String::new(),
            delivery_status: String::new(),
            result_type: None,
            impressions: None,
            link_clicks: None,
            amount_spent: None,
            results: None,
            frequency: None,
            age_bracket: None,
            gender: None,
        }
    }

    /// Categorical value of a text column, `None` when absent.
    pub fn text(&self, column: Column) -> Option<&str> {
        match column {
            Column::CampaignName => Some(&self.campaign_name),
            Column::AdSetName => Some(&self.ad_set_name),
            Column::AdName => Some(&self.ad_name),
            Column::DeliveryStatus => Some(&self.delivery_status),
            Column::ResultType => self.result_type.as_deref(),
            Column::AgeBracket => self.age_bracket.as_deref(),
            Column::Gender => self.gender.as_deref(),
            _ => None,
        }
    }

    /// Numeric value of a measure column, `None` when blank.
    pub fn measure(&self, column: Column) -> Option<f64> {
        match column {
            Column::Impressions => self.impressions,
            Column::LinkClicks => self.link_clicks,
            Column::AmountSpent => self.amount_spent,
            Column::Results => self.results,
            Column::Frequency => self.frequency,
            _ => None,
        }
    }
}
