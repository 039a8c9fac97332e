//! # Error Types
//!
//! Domain-specific error types for vault-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vault-core errors (this file)                                         │
//! │  ├── CoreError        - Umbrella for the three below                   │
//! │  ├── ValidationError  - Entity violates the binary field schema        │
//! │  ├── FormatError      - Snapshot document is malformed                 │
//! │  └── CodecError       - Text is not valid base64                       │
//! │                                                                         │
//! │  vault-db errors (separate crate)                                      │
//! │  └── DbError          - Local store failures                           │
//! │                                                                         │
//! │  vault-sync errors (separate crate)                                    │
//! │  └── SyncError        - Remote / orchestration failures                │
//! │                                                                         │
//! │  Flow: CodecError → FormatError → DbError → SyncError → user message   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Umbrella error for callers that do not care which pure step failed.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// An entity does not satisfy the store's invariants.
///
/// Raised by `put` before anything is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The entity key is empty.
    #[error("Entity id must not be empty")]
    EmptyId,

    /// `id` was placed among the regular fields.
    #[error("Field '{field}' is reserved")]
    ReservedField { field: String },

    /// A binary field holds something other than bytes.
    #[error("Field '{field}' must hold binary data or null, found {found}")]
    NotBinary { field: String, found: &'static str },

    /// A MIME type field holds something other than text.
    #[error("Field '{field}' must hold a MIME type string or null, found {found}")]
    NotMimeType { field: String, found: &'static str },

    /// Exactly one side of a binary/MIME pair is set.
    ///
    /// ## Example
    /// ```text
    /// { "image": <bytes>, "imageMimeType": null }   ← rejected
    /// { "image": null,    "imageMimeType": null }   ← fine
    /// ```
    #[error("Field '{field}' and '{mime_field}' must be set or cleared together")]
    UnpairedBinary { field: String, mime_field: String },

    /// Bytes found in a field that is not a declared binary field.
    #[error("Field '{field}' is not a binary field")]
    UnexpectedBinary { field: String },

    /// A grimoire's page list is not an array.
    #[error("Field 'entries' must be an array, found {found}")]
    PagesNotArray { found: &'static str },

    /// A grimoire page entry is not a map.
    #[error("Page entry {index} must be an object")]
    InvalidPageEntry { index: usize },
}

// =============================================================================
// Format Error
// =============================================================================

/// A snapshot document cannot be turned back into entities.
///
/// Always raised before the store is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    /// The bytes are not JSON at all.
    #[error("Snapshot is not valid JSON: {0}")]
    InvalidJson(String),

    /// The top level is not an object.
    #[error("Snapshot must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    /// A known collection key does not map to an array.
    #[error("Collection '{collection}' must be an array, found {found}")]
    CollectionNotArray {
        collection: String,
        found: &'static str,
    },

    /// An element of a collection array is not an object.
    #[error("Entry {index} of '{collection}' must be an object")]
    EntityNotObject { collection: String, index: usize },

    /// An entity has no usable `id`.
    #[error("Entry {index} of '{collection}' has no string id")]
    MissingId { collection: String, index: usize },

    /// A binary field is neither base64 text nor null.
    #[error("Field '{field}' of '{collection}/{id}' is not valid base64: {reason}")]
    InvalidBinary {
        collection: String,
        id: String,
        field: String,
        reason: String,
    },

    /// The decoded entity violates the store's invariants.
    #[error("Entity '{collection}/{id}' is invalid: {source}")]
    InvalidEntity {
        collection: String,
        id: String,
        #[source]
        source: ValidationError,
    },
}

// =============================================================================
// Codec Error
// =============================================================================

/// Text could not be decoded as base64.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid base64: {0}")]
pub struct CodecError(pub String);
