//! Item records and CSV ingestion.
//!
//! Row order of the dataset is the row index used by the vector space, the
//! similarity matrix and the title index. A corpus is never reordered.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cleaning::{self, ColumnKind};
use crate::config::DatasetConfig;
use crate::errors::{Error, Result};

/// A cleaned cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Row index in the corpus
    pub id: usize,
    pub title: String,
    /// May be empty
    pub description: String,
    /// Cleaned values of every kept column other than title and description
    pub attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    /// Kept column names, in file order (after renames)
    columns: Vec<String>,
    title_column: String,
    description_column: String,
    items: Vec<Item>,
}

impl Corpus {
    /// Create an empty corpus with the given schema.
    ///
    /// Title and description columns are added to the schema if missing.
    pub fn new(title_column: &str, description_column: &str, columns: Vec<String>) -> Self {
        let mut columns = columns;
        for required in [title_column, description_column] {
            if !columns.iter().any(|c| c == required) {
                columns.push(required.to_string());
            }
        }

        Self {
            columns,
            title_column: title_column.to_string(),
            description_column: description_column.to_string(),
            items: vec![],
        }
    }

    /// Append an item, returning its row index.
    pub fn push(
        &mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        attributes: BTreeMap<String, AttrValue>,
    ) -> usize {
        let id = self.items.len();
        self.items.push(Item {
            id,
            title: title.into(),
            description: description.into(),
            attributes,
        });
        id
    }

    /// Read a dataset CSV, applying the configured cleaning rules.
    pub fn from_csv(path: &Path, dataset: &DatasetConfig) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|err| Error::BuildFailure(format!("cannot open {}: {err}", path.display())))?;

        Self::from_reader(reader, dataset)
    }

    pub fn from_reader<R: Read>(mut reader: csv::Reader<R>, dataset: &DatasetConfig) -> Result<Self> {
        let headers = reader.headers()?.clone();

        let position = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                Error::BuildFailure(format!("dataset has no '{name}' column"))
            })
        };
        let title_idx = position(&dataset.title_column)?;
        let description_idx = position(&dataset.description_column)?;

        // (column index, schema name, kind) for every kept attribute column
        let mut plan: Vec<(usize, String, ColumnKind)> = vec![];
        let mut columns: Vec<String> = vec![];

        for (idx, header) in headers.iter().enumerate() {
            if idx == title_idx || idx == description_idx {
                columns.push(header.to_string());
                continue;
            }
            if cleaning::is_index_column(header) {
                continue;
            }

            let rule = dataset.rule_for(header);
            if rule.kind == ColumnKind::Drop {
                continue;
            }

            let name = rule.rename.unwrap_or_else(|| header.to_string());
            if columns.contains(&name) {
                return Err(Error::BuildFailure(format!(
                    "duplicate column '{name}' after cleaning"
                )));
            }
            columns.push(name.clone());
            plan.push((idx, name, rule.kind));
        }

        let mut corpus = Self::new(&dataset.title_column, &dataset.description_column, columns);

        for record in reader.records() {
            let record = record.map_err(|err| {
                let line = err.position().map(|p| p.line()).unwrap_or_default();
                Error::BuildFailure(format!("malformed row at line {line}: {err}"))
            })?;

            let title = record.get(title_idx).unwrap_or_default();
            let description = record.get(description_idx).unwrap_or_default();

            let attributes = plan
                .iter()
                .filter_map(|(idx, name, kind)| {
                    let raw = record.get(*idx).unwrap_or_default();
                    cleaning::clean_cell(*kind, raw).map(|value| (name.clone(), value))
                })
                .collect();

            corpus.push(title, description, attributes);
        }

        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, row: usize) -> Option<&Item> {
        self.items.get(row)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Value of `column` for the item at `row`.
    ///
    /// `None` when the column is not part of the schema.
    pub fn value(&self, row: usize, column: &str) -> Option<AttrValue> {
        if !self.has_column(column) {
            return None;
        }
        let item = self.items.get(row)?;

        let value = if column == self.title_column {
            AttrValue::Text(item.title.clone())
        } else if column == self.description_column {
            AttrValue::Text(item.description.clone())
        } else {
            item.attributes
                .get(column)
                .cloned()
                .unwrap_or(AttrValue::Unknown)
        };

        Some(value)
    }

    /// Structural checks used when a corpus is read back from an artifact.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (row, item) in self.items.iter().enumerate() {
            if item.id != row {
                return Err(format!("item at row {row} has id {}", item.id));
            }
        }
        if !self.has_column(&self.title_column) || !self.has_column(&self.description_column) {
            return Err("schema is missing the title or description column".to_string());
        }
        Ok(())
    }
}

/// Hex SHA-256 of a dataset file, recorded in the model metadata.
pub fn dataset_fingerprint(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}
