//! Scope chain.
//!
//! Scopes are shared (`Rc<RefCell<_>>`) because a [`Binding`] rooted at a
//! local keeps a handle to the scope that owns it. Only ability calls and
//! walker steps open a scope; blocks, loops and `if` bodies write into the
//! enclosing one.
//!
//! [`Binding`]: crate::binding::Binding

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::architype::{Action, ActionRef};
use crate::binding::Root;
use crate::value::{ObjectId, Value};

pub type ScopeRef = Rc<RefCell<Scope>>;

/// Actions visible by bare name, bound to the object they run against.
#[derive(Debug, Clone)]
pub struct ActionSet {
    pub target: Option<ObjectId>,
    pub actions: Vec<Arc<Action>>,
}

pub struct Scope {
    pub parent: Option<ScopeRef>,
    /// The object whose fields are readable by bare name.
    pub subject: Option<ObjectId>,
    pub locals: IndexMap<String, Value>,
    pub action_sets: Vec<ActionSet>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("subject", &self.subject)
            .field("locals", &self.locals)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Scope {
    pub fn root(subject: Option<ObjectId>) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: None,
            subject,
            locals: IndexMap::new(),
            action_sets: Vec::new(),
        }))
    }

    pub fn child(parent: &ScopeRef, subject: Option<ObjectId>) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent.clone()),
            subject,
            locals: IndexMap::new(),
            action_sets: Vec::new(),
        }))
    }

    /// Find the slot `name` refers to.
    ///
    /// Each level checks its locals, then its subject's fields (through
    /// `has_field`), then defers to its parent. With `create`, an unresolved
    /// name is bound to null in `scope` itself.
    pub fn resolve(
        scope: &ScopeRef,
        name: &str,
        create: bool,
        has_field: &dyn Fn(ObjectId, &str) -> bool,
    ) -> Option<Root> {
        let mut current = Some(scope.clone());
        while let Some(level) = current {
            let borrowed = level.borrow();
            if borrowed.locals.contains_key(name) {
                drop(borrowed);
                return Some(Root::Local(level, name.to_string()));
            }
            if let Some(subject) = borrowed.subject {
                if has_field(subject, name) {
                    return Some(Root::Field(subject, name.to_string()));
                }
            }
            current = borrowed.parent.clone();
        }
        if create {
            scope.borrow_mut().locals.insert(name.to_string(), Value::Null);
            return Some(Root::Local(scope.clone(), name.to_string()));
        }
        None
    }

    pub fn local(scope: &ScopeRef, name: &str) -> Option<Value> {
        let mut current = Some(scope.clone());
        while let Some(level) = current {
            if let Some(v) = level.borrow().locals.get(name) {
                return Some(v.clone());
            }
            current = level.borrow().parent.clone();
        }
        None
    }

    /// Make `actions` callable by bare name, bound to `target`.
    pub fn add_action_set(scope: &ScopeRef, target: Option<ObjectId>, actions: Vec<Arc<Action>>) {
        scope
            .borrow_mut()
            .action_sets
            .push(ActionSet { target, actions });
    }

    /// Innermost action called `name`, ascending through parents.
    pub fn find_action(scope: &ScopeRef, name: &str) -> Option<ActionRef> {
        let mut current = Some(scope.clone());
        while let Some(level) = current {
            let borrowed = level.borrow();
            for set in borrowed.action_sets.iter().rev() {
                if let Some(action) = set.actions.iter().find(|a| a.answers_to(name)) {
                    return Some(ActionRef {
                        action: action.clone(),
                        target: set.target,
                    });
                }
            }
            current = borrowed.parent.clone();
        }
        None
    }
}
