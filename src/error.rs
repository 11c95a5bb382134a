use thiserror::Error;

/// Errors surfaced by the dashboard pipeline.
///
/// Non-finite derived metrics (division by zero) are deliberately *not*
/// represented here; they flow through as `f64` infinities or NaN.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// A required column is absent from the uploaded table, or a grouping /
    /// measure was requested on a table that does not carry it.
    #[error("missing required column `{column}`")]
    MissingColumn { column: String },

    /// The upload is not a readable spreadsheet or a cell could not be parsed.
    #[error("could not parse upload: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export failed: {0}")]
    Export(String),

    #[error("chart rendering failed: {0}")]
    Render(String),
}

impl DashboardError {
    pub fn missing_column(column: impl Into<String>) -> Self {
        DashboardError::MissingColumn {
            column: column.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        DashboardError::Parse(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
