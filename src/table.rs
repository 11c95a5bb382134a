use crate::error::{DashboardError, Result};
use crate::record::{CampaignRecord, Column};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// In-memory table of campaign records plus the columns the source carried.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTable {
    pub columns: BTreeSet<Column>,
    pub records: Vec<CampaignRecord>,
}

impl RecordTable {
    pub fn new(columns: BTreeSet<Column>, records: Vec<CampaignRecord>) -> Self {
        RecordTable { columns, records }
    }

    /// A table carrying every required column, and the audience columns too
    /// when `with_audience` is set.
    pub fn with_standard_columns(records: Vec<CampaignRecord>, with_audience: bool) -> Self {
        let columns = Column::ALL
            .into_iter()
            .filter(|c| with_audience || c.is_required())
            .collect();
        RecordTable { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn require(&self, column: Column) -> Result<()> {
        require_column(&self.columns, column)
    }

    /// A view over every row of the table.
    pub fn view(&self) -> TableView<'_> {
        TableView {
            columns: &self.columns,
            rows: self.records.iter().collect(),
        }
    }
}

/// Borrowed subset of a table's rows. Filtering produces views; row content
/// is never copied or altered.
#[derive(Clone, Debug)]
pub struct TableView<'a> {
    pub columns: &'a BTreeSet<Column>,
    pub rows: Vec<&'a CampaignRecord>,
}

impl<'a> TableView<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn require(&self, column: Column) -> Result<()> {
        require_column(self.columns, column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a CampaignRecord> + '_ {
        self.rows.iter().copied()
    }
}

fn require_column(columns: &BTreeSet<Column>, column: Column) -> Result<()> {
    if columns.contains(&column) {
        Ok(())
    } else {
        Err(DashboardError::missing_column(column.header()))
    }
}
