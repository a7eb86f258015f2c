//! Menu Node Data Structures
//!
//! This module contains the single entity of the menu tree and the value
//! types used to create and patch it:
//!
//! - [`MenuNode`] - a persisted node (id assigned by the store)
//! - [`NewMenuNode`] - an unsaved node handed to the store for insertion
//! - [`MenuNodeUpdate`] - sparse update using the double-Option pattern
//! - [`DeleteResult`] - ids removed by a cascading delete
//!
//! # Hierarchy Model
//!
//! A node only knows its `parent_id`. Children are never stored on the node;
//! they are derived by querying all nodes whose `parent_id` equals the node's
//! `id`. Sibling position is an integer `order` that is dense (`0..k-1`) within
//! each parent group, the root group (`parent_id = NULL`) included.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Validation errors for menu node input
///
/// Raised before any repository read, so a rejected request never touches
/// the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Invalid node ID: {0}")]
    InvalidId(i64),

    #[error("Invalid sibling order: {0}")]
    InvalidOrder(i64),
}

/// A persisted node of the menu tree.
///
/// # Fields
///
/// - `id`: Store-assigned identifier, immutable after creation
/// - `title`: Required, non-empty label
/// - `url`: Optional link target (no format constraint)
/// - `order`: Position among siblings sharing `parent_id`
/// - `parent_id`: Parent reference (`None` means this node is a root)
/// - `created_at` / `updated_at`: Store-maintained timestamps
///
/// # Examples
///
/// ```rust
/// # use menutree_core::models::MenuNode;
/// # use chrono::Utc;
/// let node = MenuNode {
///     id: 1,
///     title: "Products".to_string(),
///     url: Some("/products".to_string()),
///     order: 0,
///     parent_id: None,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
/// assert!(node.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNode {
    /// Unique identifier assigned by the store
    pub id: i64,

    /// Display label
    pub title: String,

    /// Optional link target
    #[serde(default)]
    pub url: Option<String>,

    /// Presentation position within the sibling group
    pub order: i64,

    /// Parent node ID (back-reference, not ownership)
    #[serde(default)]
    pub parent_id: Option<i64>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl MenuNode {
    /// Validate the persisted invariants that can be checked on a single row
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` is not positive
    /// - `title` is blank
    /// - `order` is negative
    /// - the node references itself as parent
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_id(self.id)?;
        validate_title(&self.title)?;
        validate_order(self.order)?;

        if self.parent_id == Some(self.id) {
            return Err(ValidationError::InvalidId(self.id));
        }

        Ok(())
    }
}

/// An unsaved node, handed to the repository which assigns `id` and timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMenuNode {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

impl NewMenuNode {
    /// Create a root-level node description
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: None,
            parent_id: None,
        }
    }

    /// Set the link target
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Place the node under `parent_id`
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Check the input before any repository access
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        if let Some(parent_id) = self.parent_id {
            validate_id(parent_id)?;
        }
        Ok(())
    }
}

/// Custom deserializer for Option<Option<T>> that distinguishes missing from null
///
/// - Missing field → None (don't update)
/// - null → Some(None) (set to NULL)
/// - value → Some(Some(value))
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update
///
/// Only provided fields are changed.
///
/// # Double-Option Pattern for Nullable Fields
///
/// `url` and `parent_id` may legitimately be NULL, so they use
/// `Option<Option<T>>`:
/// - `None`: leave the field unchanged
/// - `Some(None)`: set the field to NULL (for `parent_id`: detach to root)
/// - `Some(Some(v))`: set the field to `v`
///
/// # Examples
///
/// ```rust
/// # use menutree_core::models::MenuNodeUpdate;
/// // Rename only
/// let update = MenuNodeUpdate {
///     title: Some("About us".to_string()),
///     ..Default::default()
/// };
///
/// // Detach to the root group and clear the link
/// let update = MenuNodeUpdate {
///     url: Some(None),
///     parent_id: Some(None),
///     ..Default::default()
/// };
/// assert!(!update.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub url: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<i64>>,
}

impl MenuNodeUpdate {
    /// Whether the update carries no changes at all
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.url.is_none() && self.parent_id.is_none()
    }

    /// Check the input before any repository access
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(Some(parent_id)) = self.parent_id {
            validate_id(parent_id)?;
        }
        Ok(())
    }
}

/// Result of a cascading delete
///
/// Lists the deleted node first, followed by every descendant the cascade
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted_ids: Vec<i64>,
}

impl DeleteResult {
    /// Number of rows removed, the target included
    pub fn deleted_count(&self) -> usize {
        self.deleted_ids.len()
    }
}

/// Reject blank titles
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

/// Reject non-positive ids (store ids start at 1)
pub fn validate_id(id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::InvalidId(id));
    }
    Ok(())
}

/// Reject negative sibling positions
pub fn validate_order(order: i64) -> Result<(), ValidationError> {
    if order < 0 {
        return Err(ValidationError::InvalidOrder(order));
    }
    Ok(())
}
