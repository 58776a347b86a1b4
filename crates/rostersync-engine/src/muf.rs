//! Multi-user filter (MUF) compilation.
//!
//! A roster row carries its data filter as JSON written with attribute and
//! value names:
//!
//! ```json
//! [{"attribute": "attr.region.name", "operator": "IN", "value": ["EMEA", "APAC"]}]
//! ```
//!
//! Compilation swaps every name for its Directory URI and assembles the
//! provider expression `[attrUri] IN ([valUri1],[valUri2])`. Each expression
//! is then materialized as a remote filter object whose URI gets attached to
//! the user.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::services::{AttributeEntry, DirectoryService};

/// Row-level filter failures. Each becomes an audit `ERROR`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MufError {
    #[error("Invalid MUF json: {0}")]
    Json(String),

    #[error("Key '{0}' is missing in MUF json.")]
    MissingField(&'static str),

    #[error("Attribute values must be a non-empty list.")]
    ValueNotList,

    #[error("Unique value must be provided for operator '{operator}', got {count} values.")]
    OperatorArity { operator: String, count: usize },

    #[error("Attribute {0} is not in the project.")]
    UnknownAttribute(String),

    #[error("Attribute {0} has no URI.")]
    AttributeWithoutUri(String),

    #[error("Attribute {attribute} has no value {value}.")]
    UnknownValue { attribute: String, value: String },

    #[error("Could not obtain values for attribute {attribute_uri}: {message}")]
    ValueLookup {
        attribute_uri: String,
        message: String,
    },

    #[error("Attribute lists are not yet supported.")]
    UnsupportedExpression,

    #[error("Could not create MUF. Received: {0}")]
    Materialize(String),
}

/// Attribute identifier to URI table of the target project.
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
    attributes: HashMap<String, String>,
}

impl AttributeCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = AttributeEntry>) -> Self {
        Self {
            attributes: entries
                .into_iter()
                .map(|e| (e.identifier, e.uri))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn uri_for(&self, attribute: &str) -> Result<&str, MufError> {
        match self.attributes.get(attribute) {
            None => Err(MufError::UnknownAttribute(attribute.to_string())),
            Some(uri) if uri.trim().is_empty() => {
                Err(MufError::AttributeWithoutUri(attribute.to_string()))
            }
            Some(uri) => Ok(uri),
        }
    }
}

/// One validated filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    pub attribute: String,
    /// Operator as written, e.g. `=`, `IN`, `NOT IN`. Matching is
    /// case-sensitive.
    pub operator: String,
    pub values: Vec<String>,
}

fn is_set_operator(operator: &str) -> bool {
    operator == "IN" || operator == "NOT IN"
}

/// A parsed, validated filter specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MufSpec {
    pub terms: Vec<FilterTerm>,
}

impl MufSpec {
    /// Parse and validate filter JSON. `[]` (or blank text) is the empty
    /// spec: no restriction.
    pub fn parse(text: &str) -> Result<Self, MufError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw: Vec<Value> =
            serde_json::from_str(text).map_err(|e| MufError::Json(e.to_string()))?;

        let terms = raw
            .iter()
            .map(parse_term)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn parse_term(term: &Value) -> Result<FilterTerm, MufError> {
    let object = term
        .as_object()
        .ok_or_else(|| MufError::Json(format!("filter term must be an object, got {term}")))?;

    let attribute = object
        .get("attribute")
        .ok_or(MufError::MissingField("attribute"))?;
    let value = object.get("value").ok_or(MufError::MissingField("value"))?;
    let operator = object
        .get("operator")
        .ok_or(MufError::MissingField("operator"))?;

    let values: Vec<String> = match value {
        Value::Array(items) if !items.is_empty() => items.iter().map(scalar_text).collect(),
        _ => return Err(MufError::ValueNotList),
    };

    let operator = scalar_text(operator);
    if values.len() > 1 && !is_set_operator(&operator) {
        return Err(MufError::OperatorArity {
            operator,
            count: values.len(),
        });
    }

    let attribute = match attribute {
        Value::String(name) => name.clone(),
        Value::Array(_) => return Err(MufError::UnsupportedExpression),
        other => return Err(MufError::UnknownAttribute(other.to_string())),
    };

    Ok(FilterTerm {
        attribute,
        operator,
        values,
    })
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A filter term with every name replaced by its URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    pub attribute_uri: String,
    pub operator: String,
    pub value_uris: Vec<String>,
}

impl CompiledExpression {
    /// Provider expression text.
    pub fn to_expression(&self) -> String {
        let operand = if is_set_operator(&self.operator) {
            let items: Vec<String> = self.value_uris.iter().map(|v| format!("[{v}]")).collect();
            format!("({})", items.join(","))
        } else {
            format!("[{}]", self.value_uris.concat())
        };
        format!("[{}] {} {}", self.attribute_uri, self.operator, operand)
    }
}

/// Attribute value lookup with a per-compile cache.
///
/// The first lookup for an attribute follows the page cursor until the
/// service reports no further page; later lookups hit the cache.
pub struct ValueResolver<'a> {
    directory: &'a dyn DirectoryService,
    cache: HashMap<String, HashMap<String, String>>,
}

impl<'a> ValueResolver<'a> {
    pub fn new(directory: &'a dyn DirectoryService) -> Self {
        Self {
            directory,
            cache: HashMap::new(),
        }
    }

    pub async fn values(
        &mut self,
        attribute_uri: &str,
    ) -> Result<&HashMap<String, String>, MufError> {
        match self.cache.entry(attribute_uri.to_string()) {
            Entry::Occupied(cached) => Ok(cached.into_mut()),
            Entry::Vacant(slot) => {
                let fetched = fetch_all_values(self.directory, attribute_uri).await?;
                Ok(slot.insert(fetched))
            }
        }
    }
}

async fn fetch_all_values(
    directory: &dyn DirectoryService,
    attribute_uri: &str,
) -> Result<HashMap<String, String>, MufError> {
    let mut values = HashMap::new();
    let mut cursor: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = directory
            .list_attribute_values(attribute_uri, cursor.as_deref())
            .await
            .map_err(|e| MufError::ValueLookup {
                attribute_uri: attribute_uri.to_string(),
                message: e.to_string(),
            })?;
        pages += 1;

        for value in page.values {
            values.insert(value.title, value.uri);
        }

        match page.next {
            Some(next) if !next.is_empty() => {
                if !seen.insert(next.clone()) {
                    return Err(MufError::ValueLookup {
                        attribute_uri: attribute_uri.to_string(),
                        message: format!("paging cursor {next} was returned twice"),
                    });
                }
                cursor = Some(next);
            }
            _ => break,
        }
    }

    debug!(
        attribute_uri = %attribute_uri,
        pages,
        count = values.len(),
        "Fetched attribute values"
    );
    Ok(values)
}

/// Resolve every term of `spec` against the catalog and the value resolver.
pub async fn compile(
    spec: &MufSpec,
    catalog: &AttributeCatalog,
    resolver: &mut ValueResolver<'_>,
) -> Result<Vec<CompiledExpression>, MufError> {
    let mut compiled = Vec::with_capacity(spec.terms.len());

    for term in &spec.terms {
        let attribute_uri = catalog.uri_for(&term.attribute)?.to_string();
        let known = resolver.values(&attribute_uri).await?;

        let value_uris = term
            .values
            .iter()
            .map(|value| {
                known.get(value).cloned().ok_or_else(|| MufError::UnknownValue {
                    attribute: term.attribute.clone(),
                    value: value.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        compiled.push(CompiledExpression {
            attribute_uri,
            operator: term.operator.clone(),
            value_uris,
        });
    }

    Ok(compiled)
}

/// Deterministic title of the `index`-th (1-based) filter created for a user.
pub fn filter_title(login: &str, run_id: &str, index: usize) -> String {
    format!("muf-{login}-{run_id}-{index}")
}

/// Create one remote filter object per expression and return their URIs.
///
/// The first failed creation aborts the rest; filters created before it are
/// left in place.
pub async fn materialize(
    expressions: &[CompiledExpression],
    login: &str,
    run_id: &str,
    directory: &dyn DirectoryService,
) -> Result<Vec<String>, MufError> {
    let mut uris = Vec::with_capacity(expressions.len());
    for (i, expression) in expressions.iter().enumerate() {
        let title = filter_title(login, run_id, i + 1);
        let uri = directory
            .create_filter(&expression.to_expression(), &title)
            .await
            .map_err(|e| MufError::Materialize(e.to_string()))?;
        uris.push(uri);
    }
    Ok(uris)
}
