//! Document store collaborator.
//!
//! [`DocumentStore`] is the narrow driver interface the document adapter
//! consumes. [`MemoryDocumentStore`] keeps collections in process and
//! understands the filter subset UQL compiles to: `$and`, `$or`, `$gt`,
//! `$lt`, `$exists` and plain equality.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Value as JsonValue, json};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{QueryError, QueryResult};
use crate::models::Record;

/// Counts returned by `update_many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCounts {
    pub matched: u64,
    pub modified: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Documents in `collection` matching `filter`, `_id` rendered as a string.
    async fn find(&self, collection: &str, filter: &JsonValue) -> QueryResult<Vec<Record>>;

    /// Insert one document and return its id.
    async fn insert_one(&self, collection: &str, document: Record) -> QueryResult<String>;

    /// Set `values` on every matching document.
    async fn update_many(
        &self,
        collection: &str,
        filter: &JsonValue,
        values: &Record,
    ) -> QueryResult<UpdateCounts>;

    async fn delete_many(&self, collection: &str, filter: &JsonValue) -> QueryResult<u64>;

    async fn ping(&self) -> QueryResult<JsonValue>;

    async fn list_databases(&self) -> QueryResult<Vec<String>>;
}

/// In-process document store for one database name.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    database: String,
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryDocumentStore {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: &str, filter: &JsonValue) -> QueryResult<Vec<Record>> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for doc in docs {
            if matches(doc, filter)? {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    async fn insert_one(&self, collection: &str, mut document: Record) -> QueryResult<String> {
        let id = match document.get("_id") {
            Some(JsonValue::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        document.insert("_id".to_string(), JsonValue::String(id.clone()));
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(id)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &JsonValue,
        values: &Record,
    ) -> QueryResult<UpdateCounts> {
        let mut counts = UpdateCounts {
            matched: 0,
            modified: 0,
        };
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(counts);
        };
        for doc in docs.iter_mut() {
            if !matches(doc, filter)? {
                continue;
            }
            counts.matched += 1;
            let mut changed = false;
            for (key, value) in values {
                if doc.get(key) != Some(value) {
                    doc.insert(key.clone(), value.clone());
                    changed = true;
                }
            }
            if changed {
                counts.modified += 1;
            }
        }
        Ok(counts)
    }

    async fn delete_many(&self, collection: &str, filter: &JsonValue) -> QueryResult<u64> {
        let mut collections = self.collections.write();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        // evaluate every filter first so a bad operator deletes nothing
        let mut keep = Vec::with_capacity(docs.len());
        for doc in docs.iter() {
            keep.push(!matches(doc, filter)?);
        }
        let before = docs.len();
        let mut flags = keep.into_iter();
        docs.retain(|_| flags.next().unwrap_or(true));
        Ok((before - docs.len()) as u64)
    }

    async fn ping(&self) -> QueryResult<JsonValue> {
        Ok(json!({ "ok": 1.0 }))
    }

    async fn list_databases(&self) -> QueryResult<Vec<String>> {
        Ok(vec![self.database.clone()])
    }
}

/// Evaluate a filter document against one document.
pub fn matches(doc: &Record, filter: &JsonValue) -> QueryResult<bool> {
    let JsonValue::Object(filter) = filter else {
        return Err(QueryError::validation("Filter must be a document"));
    };
    for (key, condition) in filter {
        let ok = match key.as_str() {
            "$and" => {
                let mut all = true;
                for part in branches(key, condition)? {
                    all &= matches(doc, part)?;
                }
                all
            }
            "$or" => {
                let mut any = false;
                for part in branches(key, condition)? {
                    any |= matches(doc, part)?;
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(QueryError::validation(format!(
                    "Unsupported filter operator: {}",
                    op
                )));
            }
            field => field_matches(doc.get(field), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn branches<'a>(key: &str, condition: &'a JsonValue) -> QueryResult<&'a Vec<JsonValue>> {
    condition
        .as_array()
        .ok_or_else(|| QueryError::validation(format!("{} expects an array", key)))
}

fn field_matches(actual: Option<&JsonValue>, condition: &JsonValue) -> QueryResult<bool> {
    let operators = match condition {
        JsonValue::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
        expected => return Ok(actual.is_some_and(|a| values_equal(a, expected))),
    };
    for (op, expected) in operators {
        let ok = match (op.as_str(), actual) {
            ("$exists", actual) => actual.is_some() == expected.as_bool().unwrap_or(true),
            (_, None) => false,
            ("$eq", Some(a)) => values_equal(a, expected),
            ("$gt", Some(a)) => compare_values(a, expected) == Some(Ordering::Greater),
            ("$lt", Some(a)) => compare_values(a, expected) == Some(Ordering::Less),
            (other, _) => {
                return Err(QueryError::validation(format!(
                    "Unsupported filter operator: {}",
                    other
                )));
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(_), JsonValue::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Numbers compare numerically, strings lexically; anything else is unordered.
fn compare_values(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(value: JsonValue) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_operators() {
        let d = doc(json!({"name": "Veeresh", "age": 23, "active": true}));
        assert!(matches(&d, &json!({})).unwrap());
        assert!(matches(&d, &json!({"age": 23.0})).unwrap());
        assert!(matches(&d, &json!({"age": {"$gt": 20}})).unwrap());
        assert!(!matches(&d, &json!({"age": {"$lt": 20}})).unwrap());
        assert!(matches(&d, &json!({"name": {"$exists": true}})).unwrap());
        assert!(matches(&d, &json!({"email": {"$exists": false}})).unwrap());
        assert!(!matches(&d, &json!({"email": "x"})).unwrap());
        assert!(
            matches(
                &d,
                &json!({"$or": [{"age": {"$gt": 30}}, {"$and": [{"active": true}, {"name": "Veeresh"}]}]})
            )
            .unwrap()
        );
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let d = doc(json!({"age": 1}));
        assert!(matches(&d, &json!({"age": {"$regex": "1"}})).is_err());
        assert!(matches(&d, &json!({"$nor": []})).is_err());
        assert!(matches(&d, &json!({"$or": {}})).is_err());
    }

    #[tokio::test]
    async fn test_insert_find_update_delete() {
        let store = MemoryDocumentStore::new("udom");
        let id = store
            .insert_one("user", doc(json!({"name": "A", "age": 23})))
            .await
            .unwrap();
        store
            .insert_one("user", doc(json!({"name": "B", "age": 40})))
            .await
            .unwrap();

        let found = store.find("user", &json!({"age": {"$lt": 30}})).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], json!(id));

        let counts = store
            .update_many("user", &json!({}), &doc(json!({"age": 40})))
            .await
            .unwrap();
        assert_eq!(counts, UpdateCounts { matched: 2, modified: 1 });

        assert_eq!(store.delete_many("user", &json!({"name": "A"})).await.unwrap(), 1);
        assert_eq!(store.find("user", &json!({})).await.unwrap().len(), 1);
        assert_eq!(store.delete_many("missing", &json!({})).await.unwrap(), 0);
        assert_eq!(store.list_databases().await.unwrap(), vec!["udom"]);
    }
}
