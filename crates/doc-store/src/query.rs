use crate::Document;

/// Builder for querying one collection.
///
/// Filters are exact equality matches on top-level body fields and are
/// combined with AND. Results are ordered by document id.
#[derive(Debug, Clone)]
pub struct DocumentQuery {
    /// Collection to search.
    pub collection: String,

    /// Required `(field, value)` pairs.
    pub filters: Vec<(String, serde_json::Value)>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query returning every document in a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Requires `field` to equal `value`.
    pub fn field_eq(
        mut self,
        field: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Sets the maximum number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of results to skip.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the document satisfies the collection and every filter.
    pub fn matches(&self, document: &Document) -> bool {
        document.key.collection == self.collection
            && self
                .filters
                .iter()
                .all(|(field, value)| document.body.get(field) == Some(value))
    }

    /// Returns the filters as a JSON object suitable for containment matching.
    pub fn filter_object(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .filters
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        serde_json::Value::Object(map)
    }
}
