#![cfg(not(tarpaulin_include))]

use campaign_analytics::dashboard::{ChartKind, build_dashboard, format_decimal};
use campaign_analytics::downloader::to_csv;
use campaign_analytics::error::DashboardError;
use campaign_analytics::filter::{Facet, FilterSelection, distinct_values};
use campaign_analytics::loader::load_records;
use campaign_analytics::metrics::Indicator;
use campaign_analytics::normalizer::normalize_result_types;
use clap::Parser;
use std::path::PathBuf;

/// Summarize a campaign export from the terminal.
#[derive(Debug, Parser)]
#[command(name = "dashboard-cli", about = "Campaign analytics from the command line")]
struct Args {
    /// CSV or workbook export to analyse
    path: PathBuf,

    /// Keep only these campaigns (repeatable)
    #[arg(long)]
    campaign: Vec<String>,

    /// Keep only these result types (repeatable)
    #[arg(long)]
    result_type: Vec<String>,

    /// Keep only these ad sets (repeatable)
    #[arg(long)]
    ad_set: Vec<String>,

    /// Keep only these ads (repeatable)
    #[arg(long)]
    ad: Vec<String>,

    /// Keep only these delivery statuses (repeatable)
    #[arg(long)]
    status: Vec<String>,

    /// Indicator shown in the per-campaign listing
    #[arg(long, default_value = "impressions")]
    indicator: Indicator,

    /// Print every dataset as JSON
    #[arg(long)]
    json: bool,

    /// Print one aggregated view as CSV (e.g. `campaign-totals`)
    #[arg(long, value_name = "VIEW")]
    export: Option<String>,

    /// List the distinct values of a facet in the whole file and exit
    #[arg(long, value_enum, value_name = "FACET")]
    values: Option<Facet>,
}

impl Args {
    fn selection(&self) -> FilterSelection {
        let mut selection = FilterSelection::new(self.indicator);
        let facets = [
            (Facet::Campaign, &self.campaign),
            (Facet::ResultType, &self.result_type),
            (Facet::AdSet, &self.ad_set),
            (Facet::Ad, &self.ad),
            (Facet::DeliveryStatus, &self.status),
        ];
        for (facet, values) in facets {
            for value in values {
                selection.select(facet, value.as_str());
            }
        }
        selection
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let table = normalize_result_types(load_records(&args.path)?)?;

    if let Some(facet) = args.values {
        for value in distinct_values(&table, facet) {
            println!("{}", value);
        }
        return Ok(());
    }

    let selection = args.selection();
    let view = selection.apply(&table);
    let dashboard = build_dashboard(&view, args.indicator)?;

    if let Some(slug) = &args.export {
        let chart = ChartKind::from_slug(slug)
            .ok_or_else(|| DashboardError::parse(format!("unknown view `{}`", slug)))?;
        let dataset = dashboard.dataset(chart).ok_or_else(|| {
            DashboardError::parse(format!("view `{}` has no data for this file", slug))
        })?;
        print!("{}", to_csv(dataset)?);
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    println!(
        "{}: {} of {} rows",
        args.path.display(),
        view.len(),
        table.len()
    );
    for card in &dashboard.cards {
        println!("  {:<20} {}", card.label, card.value);
    }

    println!();
    println!("{} por campanha:", args.indicator);
    for row in &dashboard.campaign_totals.rows {
        let name = row
            .key
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("  {:<30} {}", name, format_decimal(row.value(args.indicator)));
    }

    Ok(())
}
