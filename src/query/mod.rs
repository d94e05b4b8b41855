//! Structured query construction from flat filter and aggregation strings
//!
//! Filters have the form `field=value1,value2` and aggregations the form
//! `name=field`. The builder turns them into the bool/terms query body understood
//! by the store:
//!
//! ```
//! use portal_export::query::QueryBuilder;
//!
//! let body = QueryBuilder::new()
//!     .filter("organism.text=Sus scrofa,Gallus gallus").unwrap()
//!     .aggregation("organisms=organism.text").unwrap()
//!     .build();
//!
//! assert_eq!(body["query"]["bool"]["must"][0]["terms"]["organism.text"][1], "Gallus gallus");
//! assert_eq!(body["aggs"]["organisms"]["terms"]["size"], 25);
//! ```

use serde_json::{Map, Value, json};

use crate::error::{PortalError, Result};

/// Maximum number of buckets returned per terms aggregation
pub const AGGREGATION_BUCKETS: u64 = 25;

/// Aggregation name that also gets a companion "missing" aggregation
const PAPER_PUBLISHED: &str = "paper_published";
const PAPER_PUBLISHED_FIELD: &str = "paperPublished";

/// A parsed filter clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterClause {
    /// Field must equal one of the values
    Include { field: String, values: Vec<String> },
    /// Field must not equal `true`
    ExcludeTrue { field: String },
}

impl FilterClause {
    /// Parse a `field=value1,value2` filter string
    pub fn parse(raw: &str) -> Result<Self> {
        let (field, values) = split_term(raw, "filter")?;
        let values: Vec<String> = values.split(',').map(str::to_string).collect();

        if values[0] == "false" {
            Ok(FilterClause::ExcludeTrue {
                field: field.to_string(),
            })
        } else {
            Ok(FilterClause::Include {
                field: field.to_string(),
                values,
            })
        }
    }

    fn to_terms(&self) -> Value {
        match self {
            FilterClause::Include { field, values } => json!({ "terms": { field: values } }),
            FilterClause::ExcludeTrue { field } => json!({ "terms": { field: ["true"] } }),
        }
    }
}

/// A parsed `name=field` aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub name: String,
    pub field: String,
}

impl Aggregation {
    /// Parse a `name=field` aggregation string
    pub fn parse(raw: &str) -> Result<Self> {
        let (name, field) = split_term(raw, "aggregation")?;
        if field.contains('=') {
            return Err(PortalError::InvalidQuerySpec(format!(
                "aggregation '{raw}' must have the form name=field"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            field: field.to_string(),
        })
    }
}

fn split_term<'a>(raw: &'a str, kind: &str) -> Result<(&'a str, &'a str)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        PortalError::InvalidQuerySpec(format!("{kind} '{raw}' is missing '='"))
    })?;
    if key.is_empty() {
        return Err(PortalError::InvalidQuerySpec(format!(
            "{kind} '{raw}' has an empty field name"
        )));
    }
    if value.is_empty() {
        return Err(PortalError::InvalidQuerySpec(format!(
            "{kind} '{raw}' has no value"
        )));
    }
    Ok((key, value))
}

/// Builder for store query bodies
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    filters: Vec<FilterClause>,
    aggregations: Vec<Aggregation>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query body from raw filter and aggregation strings
    ///
    /// # Arguments
    /// * `filters` - Filter strings, `field=value1,value2`
    /// * `aggs` - Aggregation strings, `name=field`
    ///
    /// # Returns
    /// * `Result<Value>` - Query body, or `InvalidQuerySpec` for the first malformed term
    pub fn from_strings<F, A>(filters: &[F], aggs: &[A]) -> Result<Value>
    where
        F: AsRef<str>,
        A: AsRef<str>,
    {
        let mut builder = Self::new();
        for filter in filters {
            builder = builder.filter(filter.as_ref())?;
        }
        for agg in aggs {
            builder = builder.aggregation(agg.as_ref())?;
        }
        Ok(builder.build())
    }

    /// Add a filter string
    pub fn filter(mut self, raw: &str) -> Result<Self> {
        self.filters.push(FilterClause::parse(raw)?);
        Ok(self)
    }

    /// Add an aggregation string
    pub fn aggregation(mut self, raw: &str) -> Result<Self> {
        self.aggregations.push(Aggregation::parse(raw)?);
        Ok(self)
    }

    /// Produce the query body
    pub fn build(&self) -> Value {
        let mut body = Map::new();

        let must: Vec<Value> = self
            .filters
            .iter()
            .filter(|f| matches!(f, FilterClause::Include { .. }))
            .map(FilterClause::to_terms)
            .collect();
        let must_not: Vec<Value> = self
            .filters
            .iter()
            .filter(|f| matches!(f, FilterClause::ExcludeTrue { .. }))
            .map(FilterClause::to_terms)
            .collect();

        let mut bool_query = Map::new();
        if !must.is_empty() {
            bool_query.insert("must".to_string(), Value::Array(must));
        }
        if !must_not.is_empty() {
            bool_query.insert("must_not".to_string(), Value::Array(must_not));
        }
        if !bool_query.is_empty() {
            body.insert("query".to_string(), json!({ "bool": bool_query }));
        }

        let mut aggs = Map::new();
        for agg in &self.aggregations {
            aggs.insert(
                agg.name.clone(),
                json!({ "terms": { "field": agg.field, "size": AGGREGATION_BUCKETS } }),
            );
            if agg.name == PAPER_PUBLISHED {
                aggs.insert(
                    format!("{PAPER_PUBLISHED}_missing"),
                    json!({ "missing": { "field": PAPER_PUBLISHED_FIELD } }),
                );
            }
        }
        body.insert("aggs".to_string(), Value::Object(aggs));

        Value::Object(body)
    }
}
