//! Uniform response envelope: `{message, data?, error?, meta?}`.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::ServiceError;
use crate::pagination::{PageMeta, Paginated};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T = JsonValue> {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T> Envelope<T> {
    /// Success with a message only.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            error: None,
            meta: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::message(message)
        }
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn page(message: impl Into<String>, page: Paginated<T>) -> Self {
        Self {
            message: message.into(),
            data: Some(page.data),
            error: None,
            meta: Some(page.meta),
        }
    }
}

impl Envelope<JsonValue> {
    /// Failure envelope; `error.kind` carries the stable category.
    pub fn failure(err: &ServiceError) -> Self {
        Self {
            message: err.public_message(),
            data: None,
            error: Some(serde_json::json!({ "kind": err.kind() })),
            meta: None,
        }
    }
}
