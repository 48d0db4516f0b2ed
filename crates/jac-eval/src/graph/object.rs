//! Graph objects: nodes, edges and walkers.
//!
//! Objects never own each other. Edge sets and endpoints hold ids, and
//! every cross-object hop goes back through the object store.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::value::{ObjectId, Value};

/// What an architype declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchKind {
    Node,
    Edge,
    Walker,
    Graph,
}

impl ArchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Walker => "walker",
            Self::Graph => "graph",
        }
    }
}

/// Edge direction, relative to endpoint `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDir {
    /// `a -> b`
    To,
    /// `b -> a`
    From,
    Bidirected,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub outbound: IndexSet<ObjectId>,
    pub inbound: IndexSet<ObjectId>,
    pub bidirected: IndexSet<ObjectId>,
}

impl NodeData {
    pub fn remove_edge(&mut self, edge: ObjectId) {
        self.outbound.shift_remove(&edge);
        self.inbound.shift_remove(&edge);
        self.bidirected.shift_remove(&edge);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Unset until the edge is attached.
    pub a: Option<ObjectId>,
    pub b: Option<ObjectId>,
    pub dir: EdgeDir,
}

impl EdgeData {
    /// `(source, target)` in arrow order.
    pub fn ends(&self) -> Option<(ObjectId, ObjectId)> {
        let (a, b) = (self.a?, self.b?);
        Some(match self.dir {
            EdgeDir::From => (b, a),
            EdgeDir::To | EdgeDir::Bidirected => (a, b),
        })
    }

    /// The endpoint across from `node`.
    pub fn opposing(&self, node: ObjectId) -> Option<ObjectId> {
        match (self.a, self.b) {
            (Some(a), Some(b)) if a == node => Some(b),
            (Some(a), Some(b)) if b == node => Some(a),
            _ => None,
        }
    }
}

/// Walker controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkerPhase {
    #[default]
    Unprimed,
    Primed,
    Visiting,
    Finished,
    Disengaged,
}

/// Traversal state persisted with a walker so a yielded walker can resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkerState {
    pub phase: WalkerPhase,
    pub current_node: Option<ObjectId>,
    pub next: VecDeque<ObjectId>,
    pub ignored: IndexSet<ObjectId>,
    pub visited: IndexSet<ObjectId>,
    pub step: u64,
    /// A `take` ran during the current visit.
    pub took: bool,
    pub yielded: bool,
    /// Walkers this walker spawned that yielded, by name.
    pub yielded_walkers: IndexMap<String, ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "j_type", rename_all = "lowercase")]
pub enum ObjectBody {
    Node(NodeData),
    Edge(EdgeData),
    Walker(WalkerState),
}

/// A persistent graph object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphObject {
    pub id: ObjectId,
    /// Architype name.
    pub name: String,
    pub context: IndexMap<String, Value>,
    pub realm: String,
    #[serde(skip)]
    pub dirty: bool,
    #[serde(flatten)]
    pub body: ObjectBody,
}

impl GraphObject {
    fn with_body(name: &str, realm: &str, body: ObjectBody) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.to_string(),
            context: IndexMap::new(),
            realm: realm.to_string(),
            dirty: true,
            body,
        }
    }

    pub fn node(name: &str, realm: &str) -> Self {
        Self::with_body(name, realm, ObjectBody::Node(NodeData::default()))
    }

    pub fn edge(name: &str, realm: &str) -> Self {
        Self::with_body(
            name,
            realm,
            ObjectBody::Edge(EdgeData {
                a: None,
                b: None,
                dir: EdgeDir::To,
            }),
        )
    }

    pub fn walker(name: &str, realm: &str) -> Self {
        Self::with_body(name, realm, ObjectBody::Walker(WalkerState::default()))
    }

    pub fn j_type(&self) -> &'static str {
        match self.body {
            ObjectBody::Node(_) => "node",
            ObjectBody::Edge(_) => "edge",
            ObjectBody::Walker(_) => "walker",
        }
    }

    pub fn as_node(&self) -> Option<&NodeData> {
        match &self.body {
            ObjectBody::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodeData> {
        match &mut self.body {
            ObjectBody::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeData> {
        match &self.body {
            ObjectBody::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_edge_mut(&mut self) -> Option<&mut EdgeData> {
        match &mut self.body {
            ObjectBody::Edge(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_walker(&self) -> Option<&WalkerState> {
        match &self.body {
            ObjectBody::Walker(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_walker_mut(&mut self) -> Option<&mut WalkerState> {
        match &mut self.body {
            ObjectBody::Walker(w) => Some(w),
            _ => None,
        }
    }

    /// `.info`: `{name, kind, jid, j_type, context}`.
    pub fn info(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("name".to_string(), Value::str(&self.name));
        map.insert("kind".to_string(), Value::str(self.j_type()));
        map.insert("jid".to_string(), Value::Str(self.id.urn()));
        map.insert("j_type".to_string(), Value::str(self.j_type()));
        map.insert("context".to_string(), Value::Dict(self.context.clone()));
        Value::Dict(map)
    }

    /// `.details`: the info mapping plus edge ids or endpoint ids.
    pub fn details(&self) -> Value {
        let Value::Dict(mut map) = self.info() else {
            return Value::Null;
        };
        let urns = |set: &IndexSet<ObjectId>| {
            Value::List(set.iter().map(|id| Value::Str(id.urn())).collect())
        };
        let urn_or_null = |id: Option<ObjectId>| id.map_or(Value::Null, |id| Value::Str(id.urn()));
        match &self.body {
            ObjectBody::Node(n) => {
                map.insert("outbound".to_string(), urns(&n.outbound));
                map.insert("inbound".to_string(), urns(&n.inbound));
                map.insert("bidirected".to_string(), urns(&n.bidirected));
            }
            ObjectBody::Edge(e) => {
                let ends = e.ends();
                map.insert("from_node_id".to_string(), urn_or_null(ends.map(|(s, _)| s)));
                map.insert("to_node_id".to_string(), urn_or_null(ends.map(|(_, t)| t)));
                map.insert("bidirected".to_string(), Value::Bool(e.dir == EdgeDir::Bidirected));
            }
            ObjectBody::Walker(w) => {
                map.insert("step".to_string(), Value::Int(w.step as i64));
                map.insert("yielded".to_string(), Value::Bool(w.yielded));
            }
        }
        Value::Dict(map)
    }
}
