use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::doc_comment::HandlerInfo;
use crate::schema::Schema;

/// The request payload a handler binds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub content_type: String,
    pub schema: Schema,
    pub example: Value,
    pub required: bool,
}

/// One response a handler may emit, keyed by status code in
/// [`HandlerMetadata::responses`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    pub content_type: String,
}

/// Everything derived about one handler. All fields empty means "no
/// documentation available", which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerMetadata {
    #[serde(default)]
    pub info: HandlerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Status code string -> response. `BTreeMap` keeps output ordering
    /// stable across runs.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub responses: BTreeMap<String, Response>,
}

/// A discovered handler and where it was declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerRecord {
    pub file_path: PathBuf,
    pub func_name: String,
    /// Normalized receiver type name, empty for free functions
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub receiver: String,
    pub start_line: usize,
    pub metadata: HandlerMetadata,
}

/// The completed analysis of one directory: lowercased handler name ->
/// records, in discovery order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PackageAnalysis {
    pub handlers: std::collections::HashMap<String, Vec<HandlerRecord>>,
}

impl PackageAnalysis {
    pub fn records(&self, func_name: &str) -> Option<&Vec<HandlerRecord>> {
        self.handlers.get(&func_name.to_lowercase())
    }

    pub fn insert(&mut self, record: HandlerRecord) {
        self.handlers
            .entry(record.func_name.to_lowercase())
            .or_default()
            .push(record);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}
