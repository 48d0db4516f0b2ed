//! Architypes and the registry built from a program tree.
//!
//! Loading resolves super-architype inheritance once, up front: every
//! [`Architype`] carries its full field list, ability list and lineage, so
//! the evaluator never walks the inheritance chain at run time.

use std::sync::Arc;

use indexmap::IndexMap;
use jac_types::ast::kind;
use jac_types::{AstNode, Diagnostics, ErrorCode, JacError, SourceFile, Span};

use crate::builtins::BuiltinAction;
use crate::graph::ArchKind;
use crate::value::ObjectId;

/// Architype name of the implicit root node.
pub const ROOT_NODE: &str = "root";
/// Architype name of the edge used when a connect names none.
pub const GENERIC_EDGE: &str = "generic";

// ══════════════════════════════════════════════════════════════════════════════
// Actions
// ══════════════════════════════════════════════════════════════════════════════

/// Lifecycle event an ability is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Entry,
    Exit,
    Activity,
}

impl Event {
    fn from_kind(kind_name: &str) -> Option<Self> {
        match kind_name {
            kind::KW_ENTRY => Some(Self::Entry),
            kind::KW_EXIT => Some(Self::Exit),
            kind::KW_ACTIVITY => Some(Self::Activity),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ActionBody {
    Builtin(BuiltinAction),
    /// A `code_block`.
    Code(AstNode),
}

/// Preset in/out of a builtin ability: `::args::> out`.
#[derive(Debug, Clone)]
pub struct Preset {
    /// `param_list` evaluated on trigger.
    pub args: Option<AstNode>,
    /// Assignable expression receiving the result.
    pub out: Option<AstNode>,
}

/// A named ability owned by one architype.
#[derive(Debug)]
pub struct Action {
    pub name: String,
    /// Name of the declaring architype.
    pub owner: String,
    /// `None` for abilities only callable by name.
    pub event: Option<Event>,
    /// Architype names allowed to trigger this ability; empty admits all.
    pub access_list: Vec<String>,
    pub body: ActionBody,
    pub preset: Option<Preset>,
}

impl Action {
    /// A dotted builtin answers to its full name and its last segment.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.name.rsplit('.').next() == Some(name)
    }

    /// Whether an object whose lineage is `lineage` may trigger this action.
    pub fn admits<S: AsRef<str>>(&self, lineage: &[S]) -> bool {
        self.access_list.is_empty()
            || lineage
                .iter()
                .any(|n| self.access_list.iter().any(|a| a == n.as_ref()))
    }
}

/// An action bound to the object it runs against.
#[derive(Debug, Clone)]
pub struct ActionRef {
    pub action: Arc<Action>,
    pub target: Option<ObjectId>,
}

impl PartialEq for ActionRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.action, &other.action) && self.target == other.target
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Architypes
// ══════════════════════════════════════════════════════════════════════════════

/// A `has` field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub default: Option<AstNode>,
    pub anchor: bool,
}

/// The body of a `graph` architype.
#[derive(Debug, Clone)]
pub struct GraphBody {
    /// Local that holds the root of the spawned subgraph.
    pub anchor: String,
    pub block: AstNode,
}

#[derive(Debug)]
pub struct Architype {
    pub name: String,
    pub kind: ArchKind,
    pub supers: Vec<String>,
    /// This architype's name followed by every transitive super.
    pub lineage: Vec<String>,
    /// Inherited fields first; an override keeps the inherited position.
    pub fields: Vec<Field>,
    pub abilities: Vec<Arc<Action>>,
    /// The `walker_block` of a walker.
    pub walker_body: Option<AstNode>,
    pub graph: Option<GraphBody>,
}

impl Architype {
    fn implicit(kind: ArchKind, name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            supers: Vec::new(),
            lineage: vec![name.to_string()],
            fields: Vec::new(),
            abilities: Vec::new(),
            walker_body: None,
            graph: None,
        }
    }

    pub fn is_instance(&self, name: &str) -> bool {
        self.lineage.iter().any(|n| n == name)
    }

    /// Name of the `has anchor` field, if any.
    pub fn anchor(&self) -> Option<&str> {
        self.fields.iter().find(|f| f.anchor).map(|f| f.name.as_str())
    }

    pub fn ability(&self, name: &str) -> Option<&Arc<Action>> {
        self.abilities.iter().find(|a| a.answers_to(name))
    }

    /// Abilities bound to `event`, in declaration order.
    pub fn abilities_for(&self, event: Event) -> impl Iterator<Item = &Arc<Action>> + '_ {
        self.abilities
            .iter()
            .filter(move |a| a.event == Some(event))
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Registry
// ══════════════════════════════════════════════════════════════════════════════

type Key = (ArchKind, String);

/// Every architype and global of one program.
#[derive(Debug)]
pub struct Registry {
    pub file: String,
    architypes: IndexMap<Key, Architype>,
    globals: Vec<(String, AstNode)>,
    builtins: Vec<Arc<Action>>,
    /// Non-fatal load diagnostics (duplicate declarations).
    pub warnings: Diagnostics,
}

impl Registry {
    /// Build the registry from a `start` tree.
    ///
    /// Unknown super architypes (E200) and unknown builtin actions (E201)
    /// fail the load. A duplicate declaration (E202) is a warning and the
    /// later definition wins.
    pub fn load(program: &AstNode, source: &SourceFile) -> Result<Self, Diagnostics> {
        let mut loader = Loader {
            source,
            diags: Diagnostics::empty(),
            built: IndexMap::new(),
        };
        let (decls, globals) = loader.collect(program);
        for key in decls.keys() {
            loader.build(key, &decls, &mut Vec::new());
        }
        for (kind, name) in [(ArchKind::Node, ROOT_NODE), (ArchKind::Edge, GENERIC_EDGE)] {
            loader
                .built
                .entry((kind, name.to_string()))
                .or_insert_with(|| Architype::implicit(kind, name));
        }
        if loader.diags.has_errors() {
            return Err(loader.diags);
        }
        tracing::debug!(
            target: "jac::registry",
            architypes = loader.built.len(),
            globals = globals.len(),
            "registry loaded"
        );
        Ok(Self {
            file: source.name.clone(),
            architypes: loader.built,
            globals,
            builtins: BuiltinAction::ALL
                .into_iter()
                .map(|b| {
                    Arc::new(Action {
                        name: b.name().to_string(),
                        owner: String::new(),
                        event: None,
                        access_list: Vec::new(),
                        body: ActionBody::Builtin(b),
                        preset: None,
                    })
                })
                .collect(),
            warnings: loader.diags,
        })
    }

    pub fn get(&self, kind: ArchKind, name: &str) -> Option<&Architype> {
        self.architypes.get(&(kind, name.to_string()))
    }

    pub fn architypes(&self) -> impl Iterator<Item = &Architype> {
        self.architypes.values()
    }

    /// `global NAME = expr` declarations, in source order.
    pub fn globals(&self) -> &[(String, AstNode)] {
        &self.globals
    }

    /// Shared action wrapping a `std.*` builtin, for calls like `std.log(x)`.
    pub fn builtin_action(&self, builtin: BuiltinAction) -> Option<Arc<Action>> {
        self.builtins
            .iter()
            .find(|a| matches!(a.body, ActionBody::Builtin(b) if b == builtin))
            .cloned()
    }
}

/// A declaration awaiting inheritance resolution.
struct Decl<'p> {
    supers: Vec<String>,
    attrs: Vec<&'p AstNode>,
    walker_body: Option<AstNode>,
    graph: Option<GraphBody>,
    span: Span,
}

struct Loader<'s> {
    source: &'s SourceFile,
    diags: Diagnostics,
    built: IndexMap<Key, Architype>,
}

impl<'s> Loader<'s> {
    fn error(&self, code: ErrorCode, message: String, span: Span) -> JacError {
        let line = self.source.line(span.start_line).unwrap_or_default();
        JacError::new(self.source.name.clone(), code, message, span, line)
    }

    fn collect<'p>(&mut self, program: &'p AstNode) -> (IndexMap<Key, Decl<'p>>, Vec<(String, AstNode)>) {
        let mut decls: IndexMap<Key, Decl<'p>> = IndexMap::new();
        let mut globals: Vec<(String, AstNode)> = Vec::new();
        for element in &program.kids {
            let (key, decl) = match element.kind.as_str() {
                kind::GLOBAL_VAR => {
                    for pair in element.kids.chunks(2) {
                        let [name, expr] = pair else { continue };
                        let name = name.token_text().to_string();
                        if let Some(pos) = globals.iter().position(|(n, _)| *n == name) {
                            self.duplicate(&format!("global '{name}'"), element.span);
                            globals.remove(pos);
                        }
                        globals.push((name, expr.clone()));
                    }
                    continue;
                }
                kind::ARCHITYPE => match self.architype_decl(element) {
                    Some(found) => found,
                    None => continue,
                },
                kind::WALKER => {
                    let (Some(name), Some(block)) = (element.kid(1), element.kid(2)) else {
                        continue;
                    };
                    let attrs = block.kids.iter().filter(|k| k.is(kind::ATTR_STMT)).collect();
                    let decl = Decl {
                        supers: Vec::new(),
                        attrs,
                        walker_body: Some(block.clone()),
                        graph: None,
                        span: element.span,
                    };
                    ((ArchKind::Walker, name.token_text().to_string()), decl)
                }
                _ => continue,
            };
            if decls.contains_key(&key) {
                self.duplicate(&format!("{} '{}'", key.0.as_str(), key.1), decl.span);
            }
            decls.insert(key, decl);
        }
        (decls, globals)
    }

    fn architype_decl<'p>(&mut self, element: &'p AstNode) -> Option<(Key, Decl<'p>)> {
        let arch_kind = match element.kid(0)?.kind.as_str() {
            kind::KW_NODE => ArchKind::Node,
            kind::KW_EDGE => ArchKind::Edge,
            _ => ArchKind::Graph,
        };
        let name = element.kid(1)?.token_text().to_string();
        let body = element.kids.last()?;
        let mut decl = Decl {
            supers: Vec::new(),
            attrs: Vec::new(),
            walker_body: None,
            graph: None,
            span: element.span,
        };
        if body.is(kind::GRAPH_BLOCK) {
            decl.graph = Some(GraphBody {
                anchor: body.kid(0)?.token_text().to_string(),
                block: body.kid(1)?.clone(),
            });
        } else {
            decl.supers = element.kids[2..element.kids.len() - 1]
                .iter()
                .map(|n| n.token_text().to_string())
                .collect();
            decl.attrs = body.kids.iter().collect();
        }
        Some(((arch_kind, name), decl))
    }

    fn duplicate(&mut self, what: &str, span: Span) {
        tracing::warn!(target: "jac::registry", "duplicate declaration of {what}, later one wins");
        let warning = self.error(
            ErrorCode::DUPLICATE_DECLARATION,
            format!("duplicate declaration of {what}"),
            span,
        );
        self.diags.push_warning(warning);
    }

    /// Resolve `key` and its supers into `self.built`.
    fn build(&mut self, key: &Key, decls: &IndexMap<Key, Decl<'_>>, stack: &mut Vec<Key>) -> bool {
        if self.built.contains_key(key) {
            return true;
        }
        let Some(decl) = decls.get(key) else {
            return false;
        };
        let (arch_kind, name) = key;
        let mut arch = Architype::implicit(*arch_kind, name);
        arch.supers = decl.supers.clone();
        arch.walker_body = decl.walker_body.clone();
        arch.graph = decl.graph.clone();

        stack.push(key.clone());
        for super_name in &decl.supers {
            let super_key = (*arch_kind, super_name.clone());
            if stack.contains(&super_key) {
                let err = self.error(
                    ErrorCode::UNKNOWN_ARCHITYPE,
                    format!("cyclic inheritance through '{super_name}'"),
                    decl.span,
                );
                self.diags.push_error(err);
                continue;
            }
            if !decls.contains_key(&super_key) {
                let err = self.error(
                    ErrorCode::UNKNOWN_ARCHITYPE,
                    format!("unknown {} architype '{super_name}'", arch_kind.as_str()),
                    decl.span,
                );
                self.diags.push_error(err.with_suggestion(format!(
                    "declare `{} {super_name}` before using it as a super",
                    arch_kind.as_str()
                )));
                continue;
            }
            if !self.build(&super_key, decls, stack) {
                continue;
            }
            if let Some(parent) = self.built.get(&super_key) {
                for field in &parent.fields {
                    merge_field(&mut arch.fields, field.clone());
                }
                for ability in &parent.abilities {
                    merge_ability(&mut arch.abilities, ability.clone());
                }
                for n in &parent.lineage {
                    if !arch.lineage.contains(n) {
                        arch.lineage.push(n.clone());
                    }
                }
            }
        }
        stack.pop();

        for attr in &decl.attrs {
            let Some(inner) = attr.kid(0) else { continue };
            if inner.is(kind::HAS_STMT) {
                for assign in &inner.kids {
                    merge_field(&mut arch.fields, field_from(assign));
                }
            } else if inner.is(kind::CAN_STMT) {
                if let Some(action) = self.action_from(inner, name) {
                    merge_ability(&mut arch.abilities, Arc::new(action));
                }
            }
        }
        self.built.insert(key.clone(), arch);
        true
    }

    fn action_from(&mut self, can: &AstNode, owner: &str) -> Option<Action> {
        let head = can.kid(0)?;
        let event_clause = can.find(kind::EVENT_CLAUSE);
        let (event, access_list) = match event_clause {
            Some(clause) => {
                let access = clause
                    .find(kind::NAME_LIST)
                    .map(|l| l.kids.iter().map(|n| n.token_text().to_string()).collect())
                    .unwrap_or_default();
                let event = clause.kids.last().and_then(|k| Event::from_kind(&k.kind));
                (event, access)
            }
            None => (None, Vec::new()),
        };

        if head.is(kind::NAME) {
            let block = can.find(kind::CODE_BLOCK)?.clone();
            return Some(Action {
                name: head.token_text().to_string(),
                owner: owner.to_string(),
                event,
                access_list,
                body: ActionBody::Code(block),
                preset: None,
            });
        }

        let dotted: Vec<&str> = head.kids.iter().map(AstNode::token_text).collect();
        let dotted = dotted.join(".");
        let Some(builtin) = BuiltinAction::from_name(&dotted) else {
            let err = self.error(
                ErrorCode::UNKNOWN_ACTION,
                format!("unknown builtin action '{dotted}'"),
                can.span,
            );
            self.diags.push_error(err);
            return None;
        };
        let preset = can.find(kind::PRESET_IN_OUT).map(|p| Preset {
            args: p.find(kind::PARAM_LIST).cloned(),
            out: p
                .kids
                .iter()
                .position(|k| k.is(kind::COLON_OUT))
                .and_then(|i| p.kid(i + 1))
                .cloned(),
        });
        Some(Action {
            name: dotted,
            owner: owner.to_string(),
            event,
            access_list,
            body: ActionBody::Builtin(builtin),
            preset,
        })
    }
}

fn field_from(assign: &AstNode) -> Field {
    let anchor = assign.kid(0).is_some_and(|k| k.is(kind::KW_ANCHOR));
    let rest = &assign.kids[usize::from(anchor)..];
    Field {
        name: rest.first().map(|n| n.token_text().to_string()).unwrap_or_default(),
        default: rest.get(1).cloned(),
        anchor,
    }
}

fn merge_field(fields: &mut Vec<Field>, field: Field) {
    match fields.iter_mut().find(|f| f.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

fn merge_ability(abilities: &mut Vec<Arc<Action>>, action: Arc<Action>) {
    match abilities.iter_mut().find(|a| a.name == action.name) {
        Some(existing) => *existing = action,
        None => abilities.push(action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> AstNode {
        AstNode::leaf(kind::NAME, text, Span::point(1, 1))
    }

    fn has(field: &str) -> AstNode {
        AstNode::branch(
            kind::ATTR_STMT,
            vec![AstNode::branch(
                kind::HAS_STMT,
                vec![AstNode::branch(kind::HAS_ASSIGN, vec![name(field)], Span::point(1, 1))],
                Span::point(1, 1),
            )],
            Span::point(1, 1),
        )
    }

    fn node_decl(arch: &str, supers: &[&str], attrs: Vec<AstNode>) -> AstNode {
        let mut kids = vec![AstNode::leaf(kind::KW_NODE, "node", Span::point(1, 1)), name(arch)];
        kids.extend(supers.iter().map(|s| name(s)));
        kids.push(AstNode::branch(kind::ATTR_BLOCK, attrs, Span::point(1, 1)));
        AstNode::branch(kind::ARCHITYPE, kids, Span::point(1, 1))
    }

    fn load(elements: Vec<AstNode>) -> Result<Registry, Diagnostics> {
        let program = AstNode::branch(kind::START, elements, Span::point(1, 1));
        Registry::load(&program, &SourceFile::new("test.jac", "node x;"))
    }

    #[test]
    fn implicit_root_and_generic() {
        let registry = load(Vec::new()).unwrap();
        assert!(registry.get(ArchKind::Node, ROOT_NODE).is_some());
        assert!(registry.get(ArchKind::Edge, GENERIC_EDGE).is_some());
    }

    #[test]
    fn supers_contribute_fields_first() {
        let registry = load(vec![
            node_decl("person", &["animal"], vec![has("name")]),
            node_decl("animal", &[], vec![has("legs")]),
        ])
        .unwrap();
        let person = registry.get(ArchKind::Node, "person").unwrap();
        let fields: Vec<&str> = person.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, ["legs", "name"]);
        assert!(person.is_instance("animal"));
        assert!(!registry.get(ArchKind::Node, "animal").unwrap().is_instance("person"));
    }

    #[test]
    fn unknown_super_is_e200() {
        let err = load(vec![node_decl("a", &["ghost"], Vec::new())]).unwrap_err();
        assert_eq!(err.errors[0].code, ErrorCode::UNKNOWN_ARCHITYPE);
    }

    #[test]
    fn duplicate_is_warning_and_later_wins() {
        let registry = load(vec![
            node_decl("a", &[], vec![has("x")]),
            node_decl("a", &[], vec![has("y")]),
        ])
        .unwrap();
        assert_eq!(registry.warnings.warnings[0].code, ErrorCode::DUPLICATE_DECLARATION);
        let a = registry.get(ArchKind::Node, "a").unwrap();
        assert_eq!(a.fields[0].name, "y");
    }

    #[test]
    fn dotted_builtin_answers_to_last_segment() {
        let action = Action {
            name: "std.log".into(),
            owner: "a".into(),
            event: None,
            access_list: vec!["person".into()],
            body: ActionBody::Builtin(BuiltinAction::Log),
            preset: None,
        };
        assert!(action.answers_to("log") && action.answers_to("std.log"));
        assert!(!action.answers_to("std"));
        assert!(action.admits(&["person"]) && !action.admits(&["dog"]));
    }
}
