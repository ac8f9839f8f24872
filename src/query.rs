//! Encoded query construction and offset pagination.
//!
//! ServiceNow filters are a single `sysparm_query` string whose conditions
//! are joined by `^` (AND), e.g. `active=true^discover=IP`. Ordering is
//! expressed inside the same string as `ORDERBYfield` / `ORDERBYDESCfield`.

use crate::error::SnowError;
use crate::models::WireRecord;
use crate::snow_client::SnowClient;

/// Default page size for table queries.
pub const DEFAULT_LIMIT: u32 = 100;

/// Default page ceiling for [`paginate`].
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// A filter value rendered into an encoded query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterValue<'a> {
    /// Used verbatim.
    Text(&'a str),
    /// Rendered as `true` / `false`.
    Bool(bool),
}

impl<'a> From<&'a str> for FilterValue<'a> {
    fn from(value: &'a str) -> Self {
        FilterValue::Text(value)
    }
}

impl From<bool> for FilterValue<'_> {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Builds an encoded query from ordered `field=value` filters.
///
/// `None` values are skipped. Returns `None` when no filter is active.
///
/// ```
/// use snow_discovery::query::{build_query, FilterValue};
///
/// let query = build_query(&[
///     ("active", Some(FilterValue::Bool(true))),
///     ("state", Some(FilterValue::Text("Completed"))),
///     ("name", None),
/// ]);
/// assert_eq!(query.as_deref(), Some("active=true^state=Completed"));
/// ```
pub fn build_query(filters: &[(&str, Option<FilterValue<'_>>)]) -> Option<String> {
    join_conditions(
        filters
            .iter()
            .filter_map(|(field, value)| {
                value.map(|value| match value {
                    FilterValue::Text(text) => format!("{}={}", field, text),
                    FilterValue::Bool(flag) => format!("{}={}", field, flag),
                })
            })
            .collect(),
    )
}

/// Joins pre-rendered conditions with `^`, or `None` when there are none.
///
/// Used for conditions with operators other than `=` (`>=`, `LIKE`, `IN`).
pub fn join_conditions(conditions: Vec<String>) -> Option<String> {
    if conditions.is_empty() {
        None
    } else {
        Some(conditions.join("^"))
    }
}

/// Renders an ordering clause: `-field` sorts descending.
pub fn order_clause(order_by: &str) -> String {
    match order_by.strip_prefix('-') {
        Some(field) => format!("ORDERBYDESC{}", field),
        None => format!("ORDERBY{}", order_by),
    }
}

/// Parameters for a table query.
///
/// Use the builder methods to set filters, field selection, paging and
/// ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    query: Option<String>,
    fields: Vec<String>,
    limit: u32,
    offset: u32,
    order_by: Option<String>,
}

impl Default for TableQuery {
    fn default() -> Self {
        TableQuery {
            query: None,
            fields: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            order_by: None,
        }
    }
}

impl TableQuery {
    /// Creates a query with no filter, all fields, limit 100, offset 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encoded query. Blank strings clear it.
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    /// Restricts the returned columns.
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the number of rows to skip.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the ordering field; prefix with `-` for descending.
    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into()).filter(|o| !o.is_empty());
        self
    }

    /// The page size.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// The final `sysparm_query`, with the ordering clause appended.
    pub fn encoded_query(&self) -> Option<String> {
        let order = self.order_by.as_deref().map(order_clause);
        match (self.query.clone(), order) {
            (Some(query), Some(order)) => Some(format!("{}^{}", query, order)),
            (Some(query), None) => Some(query),
            (None, order) => order,
        }
    }

    /// Converts to `sysparm_*` request parameters.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("sysparm_limit", self.limit.to_string()),
            ("sysparm_offset", self.offset.to_string()),
        ];
        if let Some(query) = self.encoded_query() {
            params.push(("sysparm_query", query));
        }
        if !self.fields.is_empty() {
            params.push(("sysparm_fields", self.fields.join(",")));
        }
        params
    }
}

/// Fetches pages of `query.limit()` rows until a page comes back empty or
/// short, or `max_pages` pages have been read. The query's own offset is
/// replaced by `page * limit`.
pub async fn paginate(
    client: &SnowClient,
    table: &str,
    query: &TableQuery,
    max_pages: u32,
) -> Result<Vec<WireRecord>, SnowError> {
    let limit = query.limit();
    let mut all_records = Vec::new();

    for page in 0..max_pages {
        let page_query = query.clone().with_offset(page * limit);
        let records = client.query_table(table, &page_query).await?;
        let fetched = records.len();

        all_records.extend(records);

        if fetched == 0 || fetched < limit as usize {
            break;
        }
    }

    tracing::debug!(
        table = table,
        records = all_records.len(),
        "Pagination finished"
    );

    Ok(all_records)
}
