use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};

use super::{DocumentCollection, InsertOutcome, UpdateOutcome};
use crate::models::*;

/// In-process collection used by tests and dry runs.
///
/// Filters support top-level equality plus the comparison operators `$eq`,
/// `$ne`, `$lt`, `$lte`, `$gt`, `$gte` and `$not`; updates support `$set`,
/// `$setOnInsert`, `$push` and `$inc`. Sorting uses the first key of the sort
/// document.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    name: String,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    documents: Vec<Document>,
    unique_fields: Vec<String>,
}

impl MemoryCollection {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), inner: Mutex::new(Inner::default()) }
    }

    pub fn with_unique_index(name: &str, field: &str) -> Self {
        let inner = Inner { documents: Vec::new(), unique_fields: vec![field.to_string()] };
        Self { name: name.to_string(), inner: Mutex::new(inner) }
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn violates_unique(&self, candidate: &Document, skip: Option<usize>) -> bool {
        self.unique_fields.iter().any(|field| {
            let Some(value) = candidate.get(field) else { return false };
            self.documents
                .iter()
                .enumerate()
                .any(|(i, d)| Some(i) != skip && d.get(field) == Some(value))
        })
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match expected {
        Bson::Document(ops) if is_operator_doc(ops) => matches_operators(document.get(key), ops),
        _ => match document.get(key) {
            Some(actual) => values_equal(actual, expected),
            None => matches!(expected, Bson::Null),
        },
    })
}

fn is_operator_doc(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

// A missing field only satisfies `$ne` and a negated condition
fn matches_operators(actual: Option<&Bson>, ops: &Document) -> bool {
    ops.iter().all(|(op, operand)| match op.as_str() {
        "$not" => match operand {
            Bson::Document(inner) => !matches_operators(actual, inner),
            _ => false,
        },
        "$ne" => !actual.is_some_and(|a| values_equal(a, operand)),
        "$eq" => actual.is_some_and(|a| values_equal(a, operand)),
        "$lt" => compare(actual, operand).is_some_and(Ordering::is_lt),
        "$lte" => compare(actual, operand).is_some_and(Ordering::is_le),
        "$gt" => compare(actual, operand).is_some_and(Ordering::is_gt),
        "$gte" => compare(actual, operand).is_some_and(Ordering::is_ge),
        _ => false,
    })
}

fn compare(actual: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
    as_f64(actual?)?.partial_cmp(&as_f64(operand)?)
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn compare_field(a: &Document, b: &Document, field: &str) -> Ordering {
    let key = |d: &Document| d.get(field).and_then(as_f64);
    key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal)
}

fn apply_update(document: &mut Document, update: &Document, inserting: bool) -> Result<()> {
    for (operator, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(CrawlerError::Store(format!("{operator} expects a document")));
        };
        match operator.as_str() {
            "$set" => {
                for (k, v) in fields {
                    document.insert(k.clone(), v.clone());
                }
            }
            "$setOnInsert" if inserting => {
                for (k, v) in fields {
                    document.insert(k.clone(), v.clone());
                }
            }
            "$setOnInsert" => {}
            "$push" => {
                for (k, v) in fields {
                    match document.get_mut(k) {
                        Some(Bson::Array(items)) => items.push(v.clone()),
                        Some(_) => {
                            return Err(CrawlerError::Store(format!("$push target {k} is not an array")));
                        }
                        None => {
                            document.insert(k.clone(), Bson::Array(vec![v.clone()]));
                        }
                    }
                }
            }
            "$inc" => {
                for (k, v) in fields {
                    let incremented = increment(document.get(k), v)
                        .ok_or_else(|| CrawlerError::Store(format!("$inc on non-numeric field {k}")))?;
                    document.insert(k.clone(), incremented);
                }
            }
            other => return Err(CrawlerError::Store(format!("unsupported update operator {other}"))),
        }
    }
    Ok(())
}

fn increment(current: Option<&Bson>, by: &Bson) -> Option<Bson> {
    match (current, by) {
        (None, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => Some(by.clone()),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => Some(Bson::Int32(a.checked_add(*b)?)),
        (Some(Bson::Int32(a)), Bson::Int64(b)) => Some(Bson::Int64(i64::from(*a).checked_add(*b)?)),
        (Some(Bson::Int64(a)), Bson::Int32(b)) => Some(Bson::Int64(a.checked_add(i64::from(*b))?)),
        (Some(Bson::Int64(a)), Bson::Int64(b)) => Some(Bson::Int64(a.checked_add(*b)?)),
        (Some(a), b) => Some(Bson::Double(as_f64(a)? + as_f64(b)?)),
        (None, _) => None,
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, filter: Document, sort: Option<Document>) -> Result<Option<Document>> {
        let inner = self.lock();
        let mut candidates = inner.documents.iter().filter(|d| matches(d, &filter));
        let sort_key = sort.as_ref().and_then(|s| s.iter().next()).map(|(field, direction)| {
            let descending = as_f64(direction).map(|v| v < 0.0).unwrap_or(false);
            (field.clone(), descending)
        });
        let found = match sort_key {
            Some((field, true)) => candidates.max_by(|a, b| compare_field(a, b, &field)),
            Some((field, false)) => candidates.min_by(|a, b| compare_field(a, b, &field)),
            None => candidates.next(),
        };
        Ok(found.cloned())
    }

    async fn find(&self, filter: Document, limit: Option<i64>) -> Result<Vec<Document>> {
        let inner = self.lock();
        let limit = limit.filter(|l| *l > 0).map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(inner
            .documents
            .iter()
            .filter(|d| matches(d, &filter))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_one(&self, mut document: Document) -> Result<InsertOutcome> {
        let mut inner = self.lock();
        if inner.violates_unique(&document, None) {
            return Ok(InsertOutcome::DuplicateKey);
        }
        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        inner.documents.push(document);
        Ok(InsertOutcome::Inserted)
    }

    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> Result<UpdateOutcome> {
        let mut inner = self.lock();
        if let Some(index) = inner.documents.iter().position(|d| matches(d, &filter)) {
            let mut updated = inner.documents[index].clone();
            apply_update(&mut updated, &update, false)?;
            if inner.violates_unique(&updated, Some(index)) {
                return Err(CrawlerError::Store("update would violate a unique index".to_string()));
            }
            let modified = updated != inner.documents[index];
            inner.documents[index] = updated;
            return Ok(UpdateOutcome { matched: 1, modified: u64::from(modified), upserted: false });
        }
        if !upsert {
            return Ok(UpdateOutcome::default());
        }
        let mut created = filter.clone();
        apply_update(&mut created, &update, true)?;
        if inner.violates_unique(&created, None) {
            return Err(CrawlerError::Store("upsert would violate a unique index".to_string()));
        }
        created.insert("_id", ObjectId::new());
        inner.documents.push(created);
        Ok(UpdateOutcome { matched: 0, modified: 0, upserted: true })
    }

    async fn create_unique_index(&self, field: &str) -> Result<()> {
        let mut inner = self.lock();
        if !inner.unique_fields.iter().any(|f| f == field) {
            inner.unique_fields.push(field.to_string());
        }
        Ok(())
    }

    async fn count_documents(&self, filter: Document) -> Result<u64> {
        let inner = self.lock();
        Ok(inner.documents.iter().filter(|d| matches(d, &filter)).count() as u64)
    }

    async fn drop_collection(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.documents.clear();
        inner.unique_fields.clear();
        Ok(())
    }
}
