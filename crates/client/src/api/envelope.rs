//! Normalization of list responses.
//!
//! The backend is inconsistent about list endpoints: some return a bare
//! array, some a Spring-style page (`{"content": [...], "totalElements": n}`),
//! some `{"items": [...]}`, and a few a single object when exactly one
//! record exists. Everything is flattened to `Vec<T>` here.

use serde::Deserialize;

/// Any of the list shapes the backend produces.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    /// `[...]`
    List(Vec<T>),
    /// `{"content": [...]}`
    Page { content: Vec<T> },
    /// `{"items": [...]}`
    Items { items: Vec<T> },
    /// A single record.
    Single(T),
    /// `null`
    Empty,
}

impl<T> ListEnvelope<T> {
    /// Flatten into a vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::List(items) | Self::Page { content: items } | Self::Items { items } => items,
            Self::Single(item) => vec![item],
            Self::Empty => Vec::new(),
        }
    }
}

impl<T> From<ListEnvelope<T>> for Vec<T> {
    fn from(envelope: ListEnvelope<T>) -> Self {
        envelope.into_vec()
    }
}
