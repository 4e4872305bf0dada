use crate::manifest::Manifest;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Tabled)]
struct BackendRow {
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Emitted")]
    emitted: usize,
    #[tabled(rename = "Suppressed")]
    suppressed: usize,
    #[tabled(rename = "Gaps")]
    gaps: usize,
    #[tabled(rename = "Ambiguities")]
    ambiguities: usize,
}

/// One row per backend section of a manifest
pub fn backend_table(manifest: &Manifest) -> String {
    let rows: Vec<BackendRow> = manifest
        .backends
        .iter()
        .map(|(backend, section)| BackendRow {
            backend: backend.display_name().to_string(),
            version: section.version.to_string(),
            emitted: section.emitted.len(),
            suppressed: section.suppressed.len(),
            gaps: section.gaps.len(),
            ambiguities: section.ambiguities.len(),
        })
        .collect();
    Table::new(&rows).with(Style::rounded()).to_string()
}
