//! Error taxonomy for the field engine.
//!
//! Recoverable editor conditions (schema drift, malformed stored JSON,
//! missing rich-text capability, lookup transport failure) are handled
//! in-band and never surface here; these types cover schema-load
//! failures and programmer errors only.

use crate::fragment::NodeId;

/// Errors raised while normalizing a raw field definition
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Unknown field type: {0}")]
    UnknownKind(String),
    #[error("Invalid field definition: {0}")]
    InvalidDefinition(String),
    #[error("Schema nesting exceeds maximum depth of {0}")]
    DepthExceeded(u32),
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Errors raised while rendering or serializing a field
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Composite fragment has no hidden carrier")]
    MissingCarrier,
    #[error("Node {0:?} is not an editable control")]
    NotAControl(NodeId),
    #[error("Failed to serialize canonical value: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors raised by the block template registry
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("No template registered for block type '{0}'")]
    UnknownBlock(String),
    #[error("Node {0:?} is not an item list")]
    NotAList(NodeId),
}

/// Errors raised by the reorder controller
#[derive(Debug, thiserror::Error)]
pub enum ReorderError {
    #[error("Item is already at the list boundary")]
    AtBoundary,
    #[error("Node {0:?} is not a list item")]
    NotAnItem(NodeId),
}

/// Umbrella error for field session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
}

/// Errors raised by the slug availability collaborator
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Availability lookup transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Availability lookup returned an invalid payload: {0}")]
    InvalidResponse(String),
}
