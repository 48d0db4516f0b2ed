//! Jac tree-walking evaluator.
//!
//! Runs Jac programs over a graph of nodes and edges held in an
//! [`ObjectStore`]. Walkers traverse the graph and execute the abilities of
//! the nodes they visit; everything they `report` is collected into a
//! [`RunReport`].
//!
//! ```ignore
//! let program = jac_parser::parse_source(&source)?;
//! let registry = Registry::load(&program, &source)?;
//! let mut runtime = Runtime::new(registry, MemoryStore::new())?;
//! let report = runtime.run_walker("init", None, IndexMap::new())?;
//! ```

pub mod architype;
pub mod binding;
pub mod builtins;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod runtime;
pub mod scope;
pub mod store;
pub mod value;

pub use architype::{Action, ActionRef, Architype, Registry};
pub use binding::{Binding, BindingError};
pub use config::{ConfigError, RunConfig};
pub use error::{EvalError, EvalResult, ExceptionInfo};
pub use evaluator::{Evaluator, Output};
pub use graph::{ArchKind, EdgeDir, GraphError, GraphObject, WalkerPhase};
pub use runtime::{Outcome, RunReport, Runtime, RuntimeError};
pub use store::{MemoryStore, ObjectStore, StoreError};
pub use value::{ObjectId, TypeTag, Value};
