//! DTOs for the parts of the vault API that have a fixed shape.
//!
//! Documents are free-form JSON and stay `serde_json::Value`; vaults and
//! schemas are typed. Unknown fields are ignored so server additions do not
//! break parsing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vault {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

/// A schema describes which document fields are indexed for search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    #[serde(default)]
    pub index: bool,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl Schema {
    /// A schema that has not been stored yet.
    pub fn new(name: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            fields,
        }
    }
}

impl SchemaField {
    pub fn indexed(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: true,
            field_type: field_type.into(),
        }
    }
}
