//! Object-store boundary.
//!
//! The evaluator reads and writes materialised [`GraphObject`]s through
//! [`ObjectStore`] and never persists anything itself. `commit` is the only
//! point where state leaves the process; callers that share a store across
//! runs must serialise access to it.

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::graph::GraphObject;
use crate::value::{ObjectId, Value};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialise object: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("object {0} not found")]
    Missing(ObjectId),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait ObjectStore {
    fn get(&self, id: ObjectId) -> Option<&GraphObject>;

    /// Mutable access; the object is marked dirty and queued for commit.
    fn get_mut(&mut self, id: ObjectId) -> Option<&mut GraphObject>;

    fn has(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Insert or replace an object and queue it for commit.
    fn save(&mut self, obj: GraphObject);

    fn destroy(&mut self, id: ObjectId) -> Option<GraphObject>;

    fn get_global(&self, name: &str) -> Option<&Value>;

    fn save_global(&mut self, name: &str, value: Value);

    fn destroy_global(&mut self, name: &str) -> Option<Value>;

    /// Every global, in definition order.
    fn globals(&self) -> Vec<(String, Value)>;

    /// Flush pending writes. Returns how many objects were written.
    fn commit(&mut self) -> StoreResult<usize>;
}

/// In-process store. Committed state is kept as JSON snapshots.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: FxHashMap<ObjectId, GraphObject>,
    globals: IndexMap<String, Value>,
    pending: FxHashSet<ObjectId>,
    removed: FxHashSet<ObjectId>,
    committed: FxHashMap<ObjectId, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects written but not yet committed.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The committed JSON form of an object.
    pub fn snapshot(&self, id: ObjectId) -> Option<&str> {
        self.committed.get(&id).map(String::as_str)
    }

    /// Materialise an object from its committed JSON form.
    pub fn load_snapshot(&mut self, json: &str) -> StoreResult<ObjectId> {
        let mut obj: GraphObject = serde_json::from_str(json)?;
        obj.dirty = false;
        let id = obj.id;
        self.committed.insert(id, json.to_string());
        self.objects.insert(id, obj);
        Ok(id)
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, id: ObjectId) -> Option<&GraphObject> {
        self.objects.get(&id)
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut GraphObject> {
        let obj = self.objects.get_mut(&id)?;
        obj.dirty = true;
        self.pending.insert(id);
        Some(obj)
    }

    fn save(&mut self, mut obj: GraphObject) {
        obj.dirty = true;
        self.pending.insert(obj.id);
        self.removed.remove(&obj.id);
        self.objects.insert(obj.id, obj);
    }

    fn destroy(&mut self, id: ObjectId) -> Option<GraphObject> {
        self.pending.remove(&id);
        self.removed.insert(id);
        self.objects.remove(&id)
    }

    fn get_global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    fn save_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    fn destroy_global(&mut self, name: &str) -> Option<Value> {
        self.globals.shift_remove(name)
    }

    fn globals(&self) -> Vec<(String, Value)> {
        self.globals
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn commit(&mut self) -> StoreResult<usize> {
        let mut written = 0;
        for id in std::mem::take(&mut self.pending) {
            let Some(obj) = self.objects.get_mut(&id) else {
                continue;
            };
            let json = serde_json::to_string(obj)?;
            obj.dirty = false;
            self.committed.insert(id, json);
            written += 1;
        }
        for id in std::mem::take(&mut self.removed) {
            self.committed.remove(&id);
        }
        tracing::debug!(target: "jac::store", written, "committed");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_snapshots_dirty_objects() {
        let mut store = MemoryStore::new();
        let mut obj = GraphObject::node("person", "default");
        obj.context.insert("name".into(), Value::str("ada"));
        let id = obj.id;
        store.save(obj);
        assert_eq!(store.pending(), 1);

        assert_eq!(store.commit().unwrap(), 1);
        assert_eq!(store.pending(), 0);
        assert!(!store.get(id).unwrap().dirty);
        let snap: serde_json::Value = serde_json::from_str(store.snapshot(id).unwrap()).unwrap();
        assert_eq!(snap["j_type"], "node");
        assert_eq!(snap["context"]["name"], "ada");
    }

    #[test]
    fn get_mut_marks_dirty() {
        let mut store = MemoryStore::new();
        let obj = GraphObject::node("a", "default");
        let id = obj.id;
        store.save(obj);
        store.commit().unwrap();
        store.get_mut(id).unwrap().context.insert("x".into(), Value::Int(1));
        assert!(store.get(id).unwrap().dirty);
        assert_eq!(store.commit().unwrap(), 1);
    }

    #[test]
    fn globals_keep_definition_order() {
        let mut store = MemoryStore::new();
        store.save_global("b", Value::Int(1));
        store.save_global("a", Value::Int(2));
        store.save_global("c", Value::Int(3));
        assert_eq!(store.destroy_global("a"), Some(Value::Int(2)));
        assert_eq!(store.destroy_global("a"), None);
        let names: Vec<String> = store.globals().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn snapshot_round_trip_keeps_references() {
        let mut store = MemoryStore::new();
        let other = ObjectId::new();
        let mut obj = GraphObject::node("a", "default");
        obj.context.insert("friend".into(), Value::Ref(other));
        let id = obj.id;
        store.save(obj.clone());
        store.commit().unwrap();
        let json = store.snapshot(id).unwrap().to_string();
        assert!(json.contains(&format!("jac:uuid:{}", other.urn().trim_start_matches("urn:uuid:"))));

        let mut fresh = MemoryStore::new();
        assert_eq!(fresh.load_snapshot(&json).unwrap(), id);
        let mut expected = obj;
        expected.dirty = false;
        assert_eq!(fresh.get(id), Some(&expected));
    }

    #[test]
    fn destroy_drops_committed_snapshot() {
        let mut store = MemoryStore::new();
        let obj = GraphObject::node("a", "default");
        let id = obj.id;
        store.save(obj);
        store.commit().unwrap();
        store.destroy(id);
        store.commit().unwrap();
        assert!(store.snapshot(id).is_none());
        assert!(!store.has(id));
    }
}
