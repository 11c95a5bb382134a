use crate::dashboard::{ChartKind, Dashboard, build_dashboard, preview};
use crate::error::Result;
use crate::filter::{Facet, FilterSelection, facet_options};
use crate::loader::load_upload;
use crate::metrics::Indicator;
use crate::normalizer::normalize_result_types;
use crate::record::CampaignRecord;
use crate::table::RecordTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical pages of the application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Home,
}

/// A normalized upload and the name it arrived under.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedFile {
    pub file_name: String,
    pub table: RecordTable,
}

/// Everything one user's dashboard needs between interactions.
///
/// Each handler receives the context of its own session; nothing here is
/// shared across sessions.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    pub page: Page,
    pub upload: Option<LoadedFile>,
    pub selection: FilterSelection,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse, normalize and install an uploaded file.
    ///
    /// On error the previously loaded table and selection are kept. On
    /// success facet selections are reset; the indicator is kept.
    ///
    /// # Returns
    /// * `Result<usize>` - number of rows loaded
    pub fn upload(&mut self, file_name: &str, bytes: &[u8]) -> Result<usize> {
        let table = load_upload(file_name, bytes)?;
        self.install(file_name, table)
    }

    /// Normalize and install an already-parsed table.
    pub fn install(&mut self, file_name: &str, table: RecordTable) -> Result<usize> {
        let table = normalize_result_types(table)?;
        let rows = table.len();
        self.upload = Some(LoadedFile {
            file_name: file_name.to_string(),
            table,
        });
        self.selection = FilterSelection::new(self.selection.indicator);
        Ok(rows)
    }

    pub fn set_selection(&mut self, selection: FilterSelection) {
        self.selection = selection;
    }

    pub fn navigate(&mut self, page: Page) {
        self.page = page;
    }

    /// Datasets for the current selection, `None` before any upload.
    pub fn dashboard(&self) -> Result<Option<Dashboard>> {
        match &self.upload {
            Some(loaded) => {
                let view = self.selection.apply(&loaded.table);
                build_dashboard(&view, self.selection.indicator).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// What the page shows for a given session state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum View {
    UploadPrompt { page: Page, message: String },
    Dashboard(Box<DashboardPage>),
}

/// The full dashboard page: filter widgets, preview, cards and datasets.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardPage {
    pub page: Page,
    pub file_name: String,
    pub row_count: usize,
    pub filtered_row_count: usize,
    pub selection: FilterSelection,
    pub facets: BTreeMap<Facet, Vec<String>>,
    pub indicators: Vec<Indicator>,
    pub preview: Vec<CampaignRecord>,
    pub charts: Vec<ChartKind>,
    pub dashboard: Dashboard,
}

pub const UPLOAD_PROMPT: &str =
    "Insira abaixo o arquivo em Excel (.xlsx) ou CSV com os dados da campanha.";

/// Render the page for `ctx`. Pure: the same context always yields the same
/// view.
pub fn render(ctx: &SessionContext) -> Result<View> {
    let Some(loaded) = &ctx.upload else {
        return Ok(View::UploadPrompt {
            page: ctx.page,
            message: UPLOAD_PROMPT.to_string(),
        });
    };

    let all_rows = loaded.table.view();
    let filtered = ctx.selection.apply(&loaded.table);
    let dashboard = build_dashboard(&filtered, ctx.selection.indicator)?;

    Ok(View::Dashboard(Box::new(DashboardPage {
        page: ctx.page,
        file_name: loaded.file_name.clone(),
        row_count: loaded.table.len(),
        filtered_row_count: filtered.len(),
        selection: ctx.selection.clone(),
        facets: facet_options(&loaded.table, &ctx.selection),
        indicators: Indicator::ALL.to_vec(),
        preview: preview(&all_rows).into_iter().cloned().collect(),
        charts: dashboard.charts(),
        dashboard,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;

    const CSV: &str = "Dia,Nome da campanha,Nome do conjunto de anúncios,Nome do anúncio,Status de veiculação,Tipo de resultado,Impressões,Cliques no link,Valor usado (BRL),Resultados,Frequência\n\
2024-01-01,Alpha,Set A,Ad 1,active,Leads,1000,10,5,2,1.1\n\
2024-01-02,Alpha,Set A,Ad 1,active,,2000,30,15,4,1.3\n";

    #[test]
    fn test_upload_prompt_before_any_file() {
        let ctx = SessionContext::new();
        match render(&ctx).unwrap() {
            View::UploadPrompt { page, message } => {
                assert_eq!(page, Page::Home);
                assert_eq!(message, UPLOAD_PROMPT);
            }
            other => panic!("expected upload prompt, got {:?}", other),
        }
    }

    #[test]
    fn test_upload_normalizes_and_renders_dashboard() {
        let mut ctx = SessionContext::new();
        assert_eq!(ctx.upload("export.csv", CSV.as_bytes()).unwrap(), 2);

        let View::Dashboard(page) = render(&ctx).unwrap() else {
            panic!("expected dashboard");
        };
        assert_eq!(page.row_count, 2);
        assert_eq!(page.preview.len(), 2);
        assert!(
            page.preview
                .iter()
                .all(|r| r.result_type.as_deref() == Some("Leads"))
        );
        assert_eq!(page.dashboard.summary.impressions, 3000.0);
        assert_eq!(page.charts.len(), 5);
    }

    #[test]
    fn test_failed_upload_keeps_previous_state() {
        let mut ctx = SessionContext::new();
        ctx.upload("export.csv", CSV.as_bytes()).unwrap();
        ctx.selection.indicator = Indicator::Cpl;

        let err = ctx.upload("broken.csv", b"Dia,Impressoes\n2024-01-01,1\n").unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { .. }));

        let loaded = ctx.upload.as_ref().unwrap();
        assert_eq!(loaded.file_name, "export.csv");
        assert_eq!(loaded.table.len(), 2);
        assert_eq!(ctx.selection.indicator, Indicator::Cpl);
    }

    #[test]
    fn test_new_upload_resets_facets_but_keeps_indicator() {
        let mut ctx = SessionContext::new();
        ctx.upload("export.csv", CSV.as_bytes()).unwrap();
        let mut selection = FilterSelection::new(Indicator::Ctr);
        selection.select(Facet::Campaign, "Alpha");
        ctx.set_selection(selection);

        ctx.upload("again.csv", CSV.as_bytes()).unwrap();

        assert!(ctx.selection.is_unrestricted());
        assert_eq!(ctx.selection.indicator, Indicator::Ctr);
    }
}
