//! Form schema types and the local schema cache.
//!
//! Schemas are fetched elsewhere and handed to the core; this module owns
//! their shape. Parsing is strict: a schema object must carry `id`, `title`
//! and `fields`, and cached entries that fail the shape check are treated
//! as absent rather than silently passed along corrupted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging;
use crate::store::{LocalStore, Partition, StoreError};

/// Cache key for the forms list, distinguished from `draft_*` keys in the
/// same partition.
const FORMS_LIST_KEY: &str = "__forms_list__";

/// Errors from schema parsing and cache access.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid schema shape: {0}")]
    InvalidShape(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A single field definition within a form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
}

/// A form's schema as served by the remote schema source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSchema {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl FormSchema {
    /// Parse a schema from a raw JSON value, enforcing the required shape
    /// `{ id, title, fields: [...] }`.
    pub fn parse(value: serde_json::Value) -> Result<Self, SchemaError> {
        let schema: FormSchema = serde_json::from_value(value)
            .map_err(|e| SchemaError::InvalidShape(e.to_string()))?;
        if schema.id.trim().is_empty() || schema.title.trim().is_empty() {
            return Err(SchemaError::InvalidShape(
                "schema id and title must be non-empty".to_string(),
            ));
        }
        Ok(schema)
    }
}

/// One entry in the forms list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub field_count: usize,
}

/// The list of available forms as served by `GET /forms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormsList {
    pub forms: Vec<FormSummary>,
    pub count: usize,
}

impl FormsList {
    /// Parse a forms list from a raw JSON value, enforcing the required
    /// shape `{ forms: [...], count }`.
    pub fn parse(value: serde_json::Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value).map_err(|e| SchemaError::InvalidShape(e.to_string()))
    }
}

/// Read-through cache accessors for schemas and the forms list.
pub struct SchemaCache {
    store: Arc<LocalStore>,
}

impl SchemaCache {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Cache a schema under its form id.
    pub fn save(&self, schema: &FormSchema) -> Result<(), SchemaError> {
        self.store.put(Partition::Schemas, &schema.id, schema)?;
        Ok(())
    }

    /// Load a cached schema. Entries that fail the shape check are treated
    /// as absent.
    pub fn get(&self, form_id: &str) -> Result<Option<FormSchema>, SchemaError> {
        let raw: Option<serde_json::Value> = self.store.get(Partition::Schemas, form_id)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match FormSchema::parse(raw) {
            Ok(schema) => Ok(Some(schema)),
            Err(_e) => {
                logging::warn!(form_id = form_id, error = %_e, "cached schema failed shape check, treating as absent");
                Ok(None)
            }
        }
    }

    /// Cache the forms list.
    pub fn save_list(&self, list: &FormsList) -> Result<(), SchemaError> {
        self.store.put(Partition::Forms, FORMS_LIST_KEY, list)?;
        Ok(())
    }

    /// Load the cached forms list, if present and well-shaped.
    pub fn get_list(&self) -> Result<Option<FormsList>, SchemaError> {
        let raw: Option<serde_json::Value> = self.store.get(Partition::Forms, FORMS_LIST_KEY)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match FormsList::parse(raw) {
            Ok(list) => Ok(Some(list)),
            Err(_e) => {
                logging::warn!(error = %_e, "cached forms list failed shape check, treating as absent");
                Ok(None)
            }
        }
    }
}
