//! Queries and the snapshots they produce.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Value};

use rtdb_types::normalize_path;

use crate::error::{StoreError, StoreResult};

/// A path-addressed query: optional order-by-child and limit-to-last.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Query {
    path: String,
    order_by_child: Option<String>,
    limit_to_last: Option<usize>,
}

impl Query {
    /// Query the whole value at `path`. The path is normalized.
    pub fn at(path: &str) -> StoreResult<Self> {
        let path = normalize_path(path).map_err(|e| StoreError::invalid_path(path, e))?;
        Ok(Self {
            path,
            order_by_child: None,
            limit_to_last: None,
        })
    }

    /// Order children by the value of `child` (a slash-separated sub-path).
    pub fn order_by_child(mut self, child: impl Into<String>) -> Self {
        self.order_by_child = Some(child.into());
        self
    }

    /// Keep only the last `n` children after ordering.
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit_to_last = Some(n);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn order_key(&self) -> Option<&str> {
        self.order_by_child.as_deref()
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit_to_last
    }

    /// Path segments of the queried location.
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').collect()
    }

    /// Materialize a snapshot of `node`, the current value at this query's
    /// path (or `None` when nothing is stored there).
    ///
    /// Children are ordered by the order-by child using store value ordering
    /// (absent/null, `false`, `true`, numbers, strings, then objects), ties
    /// broken by key. Without an order-by clause children are ordered by
    /// key.
    pub fn apply(&self, node: Option<&Value>) -> Snapshot {
        let node = match node {
            None | Some(Value::Null) => return Snapshot::missing(&self.path),
            Some(node) => node,
        };

        let Value::Object(map) = node else {
            return Snapshot {
                path: self.path.clone(),
                value: node.clone(),
                children: Vec::new(),
            };
        };

        let mut children: Vec<(String, Value)> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        if let Some(order_key) = &self.order_by_child {
            children.sort_by(|(ka, va), (kb, vb)| {
                compare_values(child_at(va, order_key), child_at(vb, order_key))
                    .then_with(|| ka.cmp(kb))
            });
        } else {
            children.sort_by(|(ka, _), (kb, _)| ka.cmp(kb));
        }

        if let Some(limit) = self.limit_to_last {
            let skip = children.len().saturating_sub(limit);
            children.drain(..skip);
        }

        let value: Map<String, Value> = children.iter().cloned().collect();
        Snapshot {
            path: self.path.clone(),
            value: Value::Object(value),
            children,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(key) = &self.order_by_child {
            write!(f, "?orderBy={key}")?;
        }
        if let Some(n) = self.limit_to_last {
            write!(f, "&limitToLast={n}")?;
        }
        Ok(())
    }
}

fn child_at<'a>(value: &'a Value, sub_path: &str) -> Option<&'a Value> {
    sub_path
        .split('/')
        .filter(|s| !s.is_empty())
        .try_fold(value, |node, segment| node.get(segment))
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Bool(true)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) | Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Point-in-time materialization of a queried location.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    path: String,
    value: Value,
    children: Vec<(String, Value)>,
}

impl Snapshot {
    /// A snapshot of a location with nothing stored.
    pub fn missing(path: &str) -> Self {
        Self {
            path: path.to_string(),
            value: Value::Null,
            children: Vec::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `true` if anything is stored at the location.
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// The full value, `Value::Null` when nothing is stored.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Children in query order. Empty for leaf values.
    pub fn children(&self) -> &[(String, Value)] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}
