//! The binding graph.
//!
//! Every expression, variable, parameter and return value gets a
//! [`BindingNode`] in one arena. A node depends on upstream nodes and derives
//! its type from theirs (the union, by default). When a node's type changes,
//! its observers are re-entered: dependent nodes recompute, call sites
//! recalculate their targets.
//!
//! The graph only stores edges and derives types. Propagation, which needs
//! the call sites, lives in [`InferenceContext`](super::InferenceContext).

use std::fmt;

use crate::span::Span;
use crate::types::{TypeId, Universe};

use super::call::CallId;

/// Index of a node in the [`BindingGraph`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Something re-entered when a node's type changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observer {
    Node(NodeId),
    Call(CallId),
}

/// How a node's type follows from its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derive {
    /// Union of all typed dependencies.
    Union,
    /// Always the given type once any dependency is typed; used for the
    /// parameters of a typed definition, which keep their matched type.
    Pinned(TypeId),
    /// Metaclass of the dependencies' union (`expr.class`).
    MetaclassOf,
    /// `Array(T)` of the dependencies' union (array literals).
    ArrayOf,
    /// A function with fixed parameter types returning the dependencies' union.
    FunOf(Vec<TypeId>),
}

/// A vertex of the inference graph.
#[derive(Debug, Clone)]
pub struct BindingNode {
    pub ty: Option<TypeId>,
    /// Upstream nodes, in binding order, without duplicates.
    pub dependencies: Vec<NodeId>,
    pub observers: Vec<Observer>,
    pub derive: Derive,
    /// A frozen node rejects any later change of type.
    pub frozen: bool,
    pub span: Span,
}

/// Arena of binding nodes.
#[derive(Debug, Default)]
pub struct BindingGraph {
    nodes: Vec<BindingNode>,
}

impl BindingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate an untyped node.
    pub fn add(&mut self, derive: Derive, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(BindingNode {
            ty: None,
            dependencies: Vec::new(),
            observers: Vec::new(),
            derive,
            frozen: false,
            span,
        });
        id
    }

    /// Allocate a node with a fixed type and no dependencies.
    pub fn add_typed(&mut self, ty: TypeId, span: Span) -> NodeId {
        let id = self.add(Derive::Pinned(ty), span);
        self.nodes[id.0 as usize].ty = Some(ty);
        id
    }

    pub fn get(&self, id: NodeId) -> &BindingNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut BindingNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn ty(&self, id: NodeId) -> Option<TypeId> {
        self.get(id).ty
    }

    /// Record that `node` depends on `dep`. Returns false if the edge existed.
    pub fn add_edge(&mut self, node: NodeId, dep: NodeId) -> bool {
        if node == dep || self.get(node).dependencies.contains(&dep) {
            return false;
        }
        self.get_mut(node).dependencies.push(dep);
        self.add_observer(dep, Observer::Node(node));
        true
    }

    /// Remove the edge `node -> dep`, if present.
    pub fn remove_edge(&mut self, node: NodeId, dep: NodeId) {
        self.get_mut(node).dependencies.retain(|d| *d != dep);
        self.get_mut(dep).observers.retain(|o| *o != Observer::Node(node));
    }

    pub fn add_observer(&mut self, node: NodeId, observer: Observer) {
        let observers = &mut self.get_mut(node).observers;
        if !observers.contains(&observer) {
            observers.push(observer);
        }
    }

    pub fn remove_observer(&mut self, node: NodeId, observer: Observer) {
        self.get_mut(node).observers.retain(|o| *o != observer);
    }

    /// The type `node` should have given its dependencies' current types.
    pub fn derive_type(&self, node: NodeId, universe: &mut Universe) -> Option<TypeId> {
        let entry = self.get(node);
        let typed: Vec<TypeId> = entry
            .dependencies
            .iter()
            .filter_map(|dep| self.ty(*dep))
            .collect();
        if typed.is_empty() {
            // Nodes without dependencies keep whatever was assigned directly.
            return if entry.dependencies.is_empty() { entry.ty } else { None };
        }
        match &entry.derive {
            Derive::Union => Some(universe.union_of(&typed)),
            Derive::Pinned(ty) => Some(*ty),
            Derive::MetaclassOf => {
                let ty = universe.union_of(&typed);
                Some(universe.metaclass(ty))
            }
            Derive::ArrayOf => {
                let ty = universe.union_of(&typed);
                Some(universe.array_of(ty))
            }
            Derive::FunOf(params) => {
                let ret = universe.union_of(&typed);
                Some(universe.fun_of(params.clone(), ret))
            }
        }
    }

    /// Walk from `node` through dependencies that carry `ty`, collecting the
    /// spans of the nodes on the way, newest first.
    pub fn trace(&self, node: NodeId, ty: TypeId, universe: &Universe) -> Vec<Span> {
        let mut spans = Vec::new();
        let mut visited = vec![node];
        let mut current = node;
        loop {
            let next = self.get(current).dependencies.iter().copied().find(|dep| {
                !visited.contains(dep)
                    && self
                        .ty(*dep)
                        .is_some_and(|dep_ty| universe.includes_type(dep_ty, ty))
            });
            match next {
                Some(dep) => {
                    visited.push(dep);
                    let span = self.get(dep).span;
                    if !span.is_dummy() && !spans.contains(&span) {
                        spans.push(span);
                    }
                    current = dep;
                }
                None => break,
            }
        }
        spans
    }
}
