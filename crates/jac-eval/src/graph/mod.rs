//! Graph object model and the edge operations that keep it consistent.
//!
//! An edge id lives in exactly one set of each endpoint:
//!
//! | direction    | `a`          | `b`          |
//! |--------------|--------------|--------------|
//! | `To`         | `outbound`   | `inbound`    |
//! | `From`       | `inbound`    | `outbound`   |
//! | `Bidirected` | `bidirected` | `bidirected` |

mod object;

pub use object::{
    ArchKind, EdgeData, EdgeDir, GraphObject, NodeData, ObjectBody, WalkerPhase, WalkerState,
};

use thiserror::Error;

use crate::store::ObjectStore;
use crate::value::ObjectId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Object {0} not found")]
    Missing(ObjectId),
    #[error("{0} is not a node")]
    NotANode(ObjectId),
    #[error("{0} is not an edge")]
    NotAnEdge(ObjectId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Which of a node's edges an edge reference walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeQuery {
    /// `-->`: outbound and bidirected.
    To,
    /// `<--`: inbound and bidirected.
    From,
    /// `<-->`: every attached edge.
    Any,
}

fn node_data(store: &dyn ObjectStore, id: ObjectId) -> GraphResult<&NodeData> {
    store
        .get(id)
        .ok_or(GraphError::Missing(id))?
        .as_node()
        .ok_or(GraphError::NotANode(id))
}

fn edge_data(store: &dyn ObjectStore, id: ObjectId) -> GraphResult<&EdgeData> {
    store
        .get(id)
        .ok_or(GraphError::Missing(id))?
        .as_edge()
        .ok_or(GraphError::NotAnEdge(id))
}

fn node_data_mut(store: &mut dyn ObjectStore, id: ObjectId) -> GraphResult<&mut NodeData> {
    store
        .get_mut(id)
        .ok_or(GraphError::Missing(id))?
        .as_node_mut()
        .ok_or(GraphError::NotANode(id))
}

pub fn is_node(store: &dyn ObjectStore, id: ObjectId) -> bool {
    store.get(id).is_some_and(|o| o.as_node().is_some())
}

pub fn is_edge(store: &dyn ObjectStore, id: ObjectId) -> bool {
    store.get(id).is_some_and(|o| o.as_edge().is_some())
}

/// Attach stored edge `edge` between nodes `a` and `b`.
pub fn attach_edge(
    store: &mut dyn ObjectStore,
    a: ObjectId,
    b: ObjectId,
    edge: ObjectId,
    dir: EdgeDir,
) -> GraphResult<()> {
    node_data(store, a)?;
    node_data(store, b)?;
    edge_data(store, edge)?;

    let data = store
        .get_mut(edge)
        .and_then(GraphObject::as_edge_mut)
        .ok_or(GraphError::NotAnEdge(edge))?;
    data.a = Some(a);
    data.b = Some(b);
    data.dir = dir;

    match dir {
        EdgeDir::To => {
            node_data_mut(store, a)?.outbound.insert(edge);
            node_data_mut(store, b)?.inbound.insert(edge);
        }
        EdgeDir::From => {
            node_data_mut(store, a)?.inbound.insert(edge);
            node_data_mut(store, b)?.outbound.insert(edge);
        }
        EdgeDir::Bidirected => {
            node_data_mut(store, a)?.bidirected.insert(edge);
            node_data_mut(store, b)?.bidirected.insert(edge);
        }
    }
    Ok(())
}

/// Remove `edge` from both endpoints and destroy it.
pub fn detach_edge(store: &mut dyn ObjectStore, edge: ObjectId) -> GraphResult<()> {
    let data = edge_data(store, edge)?.clone();
    for end in [data.a, data.b].into_iter().flatten() {
        // a half-destroyed neighbour leaves nothing to unlink
        if let Ok(node) = node_data_mut(store, end) {
            node.remove_edge(edge);
        }
    }
    store.destroy(edge);
    Ok(())
}

/// Destroy any object. A node's edges are detached and destroyed first.
pub fn destroy_object(store: &mut dyn ObjectStore, id: ObjectId) -> GraphResult<()> {
    let j_type = store.get(id).ok_or(GraphError::Missing(id))?.j_type();
    match j_type {
        "node" => {
            for edge in attached_edges(store, id, EdgeQuery::Any)? {
                detach_edge(store, edge)?;
            }
            store.destroy(id);
        }
        "edge" => detach_edge(store, id)?,
        _ => {
            store.destroy(id);
        }
    }
    tracing::debug!(target: "jac::graph", object = %id, "destroyed");
    Ok(())
}

/// Edge ids of `node` selected by `query`, in declaration order within each
/// set: outbound, then inbound, then bidirected.
pub fn attached_edges(
    store: &dyn ObjectStore,
    node: ObjectId,
    query: EdgeQuery,
) -> GraphResult<Vec<ObjectId>> {
    let data = node_data(store, node)?;
    let mut edges = Vec::new();
    if matches!(query, EdgeQuery::To | EdgeQuery::Any) {
        edges.extend(data.outbound.iter().copied());
    }
    if matches!(query, EdgeQuery::From | EdgeQuery::Any) {
        edges.extend(data.inbound.iter().copied());
    }
    edges.extend(data.bidirected.iter().copied());
    Ok(edges)
}

/// The endpoint of `edge` across from `node`.
pub fn opposing(store: &dyn ObjectStore, edge: ObjectId, node: ObjectId) -> GraphResult<Option<ObjectId>> {
    Ok(edge_data(store, edge)?.opposing(node))
}

/// Nodes reachable from `node` over edges selected by `query`, in edge order.
pub fn neighbors(store: &dyn ObjectStore, node: ObjectId, query: EdgeQuery) -> GraphResult<Vec<ObjectId>> {
    let mut out = Vec::new();
    for edge in attached_edges(store, node, query)? {
        if let Some(other) = opposing(store, edge, node)? {
            if !out.contains(&other) {
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// Edges attached to `a` whose opposite end is `b`.
pub fn edges_between(store: &dyn ObjectStore, a: ObjectId, b: ObjectId) -> GraphResult<Vec<ObjectId>> {
    let mut out = Vec::new();
    for edge in attached_edges(store, a, EdgeQuery::Any)? {
        if opposing(store, edge, a)? == Some(b) {
            out.push(edge);
        }
    }
    Ok(out)
}
