/*!
# Campaign Analytics Dashboard

A browser-based dashboard for advertising campaign exports, built in Rust.

## Overview

Users upload a campaign export (one row per day × campaign × ad set × ad,
optionally split by age bracket and gender), narrow it with facet filters,
pick an indicator, and get summary cards, time series and comparison charts
for the rows that remain.

## Architecture

The application follows a client-server architecture:

### Frontend Layer
- **Technologies**: HTML, CSS, JavaScript (`fetch`)
- **Key Components**:
  - Upload form - Sends the export to the server
  - Filter sidebar - Multi-select facets whose options narrow as others are chosen
  - Summary cards - Totals and overall ratios, `—` when undefined
  - Chart grid - SVG charts with CSV/XLSX download links

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Loader - Reads CSV and workbook files into typed records
  - Row Normalizer - Gives every campaign a single result type
  - Metric Aggregator - Group-by sums plus CPC, CTR, CPM and CPL
  - Filter Selector - Facet selections and dynamic facet options
  - Orchestrator - Builds every dashboard dataset from one filtered view
  - Session Store - One isolated context per browser session

## Modules

- **error**: `DashboardError` and the crate `Result` alias
- **record**: Column catalogue and the typed `CampaignRecord`
- **table**: Record tables and borrowed filtered views
- **loader**: CSV and workbook parsing
- **normalizer**: Canonical result type per campaign
- **metrics**: Dimensions, measures, indicators and aggregation
- **filter**: Facet selections and options
- **dashboard**: Summary cards and the chart catalogue
- **downloader**: Export functionality (CSV, XLSX)
- **graph**: Chart rendering to SVG (feature `web`)
- **session**: Per-session context and the pure `render` function
- **config**: Server command line configuration
- **app**: Routing, session cookies and handlers (feature `web`)

## REST API Endpoints

- `GET /` - Dashboard page
- `GET /api/view` - Current view as JSON
- `POST /api/upload` - Multipart upload (field `file`)
- `POST /api/filters` - Replace the filter selection and indicator
- `POST /api/page` - Navigate between pages
- `GET /api/chart/{kind}` - SVG chart for the current selection
- `GET /api/export/{kind}?format=csv|xlsx` - Download an aggregated view
*/

pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod loader;
pub mod metrics;
pub mod normalizer;
pub mod record;
pub mod session;
pub mod table;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use dashboard::{ChartKind, Dashboard, build_dashboard};
pub use error::{DashboardError, Result};
pub use filter::{Facet, FilterSelection, facet_options};
pub use loader::{load_records, load_upload};
pub use metrics::{AggregatedView, Dimension, Indicator, Measure, aggregate};
pub use normalizer::normalize_result_types;
pub use record::{CampaignRecord, Column};
pub use session::{SessionContext, View, render};
pub use table::{RecordTable, TableView};
