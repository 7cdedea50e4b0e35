//! Record and operation types.
//!
//! Defines [`Item`] (a stored record), [`SearchItem`] (an item with an optional
//! similarity score), the closed [`Op`] union accepted by
//! [`Store::batch`](crate::store::Store::batch), and the matching [`OpResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Hierarchical partition key, e.g. `["memories", "user42"]`.
pub type Namespace = Vec<String>;

/// Separator used when a namespace is stored as a single SQL column.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Wildcard segment in a [`MatchCondition`] path.
pub const WILDCARD: &str = "*";

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Build a namespace from string-like segments.
pub fn namespace<I, S>(segments: I) -> Namespace
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    segments.into_iter().map(Into::into).collect()
}

/// Check that a namespace can be written and round-tripped through storage.
pub fn validate_namespace(namespace: &[String]) -> Result<()> {
    if namespace.is_empty() {
        return Err(StoreError::Validation("namespace cannot be empty".into()));
    }
    for segment in namespace {
        if segment.is_empty() {
            return Err(StoreError::Validation(format!(
                "namespace {namespace:?} contains an empty segment"
            )));
        }
        if segment.contains(NAMESPACE_SEPARATOR) {
            return Err(StoreError::Validation(format!(
                "namespace segment {segment:?} in {namespace:?} must not contain '{NAMESPACE_SEPARATOR}'"
            )));
        }
    }
    Ok(())
}

/// A stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    /// Arbitrary JSON object.
    pub value: Map<String, Value>,
    /// Set on first write, preserved across updates.
    pub created_at: DateTime<Utc>,
    /// Set on every write.
    pub updated_at: DateTime<Utc>,
}

/// An item returned from a search, with its similarity score when ranking ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchItem {
    #[serde(flatten)]
    pub item: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl SearchItem {
    pub fn unscored(item: Item) -> Self {
        Self { item, score: None }
    }
}

/// Per-write control over embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Indexing {
    /// Use the store's configured index fields (no-op without a provider).
    #[default]
    Default,
    /// Store the value without any vectors.
    Disabled,
    /// Embed these field paths instead of the configured ones.
    Fields(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetOp {
    pub namespace: Namespace,
    pub key: String,
}

/// Upsert when `value` is `Some`, delete when `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct PutOp {
    pub namespace: Namespace,
    pub key: String,
    pub value: Option<Map<String, Value>>,
    pub index: Indexing,
}

impl PutOp {
    pub fn upsert(namespace: Namespace, key: impl Into<String>, value: Map<String, Value>) -> Self {
        Self {
            namespace,
            key: key.into(),
            value: Some(value),
            index: Indexing::Default,
        }
    }

    pub fn delete(namespace: Namespace, key: impl Into<String>) -> Self {
        Self {
            namespace,
            key: key.into(),
            value: None,
            index: Indexing::Default,
        }
    }

    pub fn with_index(mut self, index: Indexing) -> Self {
        self.index = index;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOp {
    pub namespace_prefix: Namespace,
    pub filter: Option<Map<String, Value>>,
    pub query: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchOp {
    pub fn new(namespace_prefix: Namespace) -> Self {
        Self {
            namespace_prefix,
            filter: None,
            query: None,
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }

    pub fn with_filter(mut self, filter: Map<String, Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Which end of a namespace a [`MatchCondition`] is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceMatchType {
    Prefix,
    Suffix,
}

impl NamespaceMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Suffix => "suffix",
        }
    }
}

impl std::fmt::Display for NamespaceMatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NamespaceMatchType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "prefix" => Ok(Self::Prefix),
            "suffix" => Ok(Self::Suffix),
            _ => Err(StoreError::Validation(format!(
                "unsupported match type: {s} (expected 'prefix' or 'suffix')"
            ))),
        }
    }
}

/// A namespace pattern; `*` segments match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCondition {
    pub match_type: NamespaceMatchType,
    pub path: Vec<String>,
}

impl MatchCondition {
    pub fn prefix<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            match_type: NamespaceMatchType::Prefix,
            path: namespace(path),
        }
    }

    pub fn suffix<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            match_type: NamespaceMatchType::Suffix,
            path: namespace(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListNamespacesOp {
    pub match_conditions: Vec<MatchCondition>,
    pub max_depth: Option<usize>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListNamespacesOp {
    fn default() -> Self {
        Self {
            match_conditions: Vec::new(),
            max_depth: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl ListNamespacesOp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, condition: MatchCondition) -> Self {
        self.match_conditions.push(condition);
        self
    }

    pub fn with_prefix<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_condition(MatchCondition::prefix(path))
    }

    pub fn with_suffix<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_condition(MatchCondition::suffix(path))
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// One operation in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Get(GetOp),
    Put(PutOp),
    Search(SearchOp),
    ListNamespaces(ListNamespacesOp),
}

/// The result of one [`Op`], at the same position in the batch output.
#[derive(Debug, Clone, PartialEq)]
pub enum OpResult {
    Item(Option<Item>),
    Search(Vec<SearchItem>),
    Namespaces(Vec<Namespace>),
    Done,
}
