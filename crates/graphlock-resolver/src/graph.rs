//! Activated dependency graph with snapshot and freeze semantics

use std::collections::HashMap;

use graphlock_common::GraphlockError;

/// Index of a vertex in the graph arena
pub type VertexIndex = usize;

/// Index of an edge in the graph arena
pub type EdgeIndex = usize;

/// A package vertex: its name, the activated payload if any, and the
/// requirements attached directly by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex<S, R> {
    /// Package name, unique within one graph
    pub name: String,

    /// The activated specification, absent until activation
    pub payload: Option<S>,

    /// Whether this vertex was requested at top level
    pub root: bool,

    /// Requirements given directly by the caller, in arrival order
    pub explicit_requirements: Vec<R>,

    incoming: Vec<EdgeIndex>,
    outgoing: Vec<EdgeIndex>,
}

impl<S, R> Vertex<S, R> {
    /// Indices of the edges pointing at this vertex
    pub fn incoming_edge_indices(&self) -> &[EdgeIndex] {
        &self.incoming
    }

    /// Indices of the edges leaving this vertex
    pub fn outgoing_edge_indices(&self) -> &[EdgeIndex] {
        &self.outgoing
    }
}

/// A parent→child edge carrying the requirements that flowed across it
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<R> {
    /// Arena index of the parent vertex
    pub origin: VertexIndex,

    /// Arena index of the child vertex
    pub destination: VertexIndex,

    /// Requirements the parent contributed, in arrival order
    pub requirements: Vec<R>,
}

/// Directed acyclic graph of activated packages.
///
/// Vertices and edges live in arenas and reference each other by index, so
/// parent back-references never create ownership cycles. `Clone` produces an
/// independent deep copy (a snapshot); once frozen, every mutating operation
/// fails with [`GraphlockError::FrozenGraph`].
#[derive(Debug, Clone)]
pub struct DependencyGraph<S, R> {
    vertices: Vec<Option<Vertex<S, R>>>,
    edges: Vec<Option<Edge<R>>>,
    index_by_name: HashMap<String, VertexIndex>,
    frozen: bool,
}

impl<S, R> DependencyGraph<S, R> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            index_by_name: HashMap::new(),
            frozen: false,
        }
    }

    /// Whether the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.index_by_name.is_empty()
    }

    /// Number of live vertices
    pub fn vertex_count(&self) -> usize {
        self.index_by_name.len()
    }

    /// Whether the graph rejects further mutation
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Make all subsequent mutations an error
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Look up a vertex by name
    pub fn vertex_named(&self, name: &str) -> Option<&Vertex<S, R>> {
        self.index_by_name
            .get(name)
            .and_then(|&index| self.vertex(index))
    }

    /// Look up a vertex index by name
    pub fn vertex_index_named(&self, name: &str) -> Option<VertexIndex> {
        self.index_by_name.get(name).copied()
    }

    /// Resolve a vertex index, skipping detached slots
    pub fn vertex(&self, index: VertexIndex) -> Option<&Vertex<S, R>> {
        self.vertices.get(index).and_then(|slot| slot.as_ref())
    }

    /// Resolve an edge index, skipping detached slots
    pub fn edge(&self, index: EdgeIndex) -> Option<&Edge<R>> {
        self.edges.get(index).and_then(|slot| slot.as_ref())
    }

    /// Iterate live vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<S, R>> {
        self.vertices.iter().filter_map(|slot| slot.as_ref())
    }

    /// Iterate a vertex's incoming edges in insertion order
    pub fn incoming_edges(&self, index: VertexIndex) -> impl Iterator<Item = &Edge<R>> + '_ {
        self.vertex(index)
            .map(|vertex| vertex.incoming.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |&edge_index| self.edge(edge_index))
    }

    fn vertex_mut(&mut self, index: VertexIndex) -> Option<&mut Vertex<S, R>> {
        self.vertices.get_mut(index).and_then(|slot| slot.as_mut())
    }

    fn edge_mut(&mut self, index: EdgeIndex) -> Option<&mut Edge<R>> {
        self.edges.get_mut(index).and_then(|slot| slot.as_mut())
    }

    fn ensure_mutable(&self, operation: &str) -> Result<(), GraphlockError> {
        if self.frozen {
            Err(GraphlockError::FrozenGraph(format!(
                "{operation} called on a frozen graph"
            )))
        } else {
            Ok(())
        }
    }

    /// Add a vertex, or update an existing one of the same name.
    ///
    /// Re-adding upgrades the root flag and fills an absent payload; it never
    /// downgrades either.
    pub fn add_vertex(
        &mut self,
        name: &str,
        payload: Option<S>,
        root: bool,
    ) -> Result<VertexIndex, GraphlockError> {
        self.ensure_mutable("add_vertex")?;
        if let Some(&index) = self.index_by_name.get(name) {
            if let Some(vertex) = self.vertex_mut(index) {
                vertex.root |= root;
                if vertex.payload.is_none() {
                    vertex.payload = payload;
                }
            }
            return Ok(index);
        }
        let index = self.vertices.len();
        self.vertices.push(Some(Vertex {
            name: name.to_string(),
            payload,
            root,
            explicit_requirements: Vec::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }));
        self.index_by_name.insert(name.to_string(), index);
        Ok(index)
    }

    /// Append a caller-given requirement to the named vertex
    pub fn add_explicit_requirement(
        &mut self,
        name: &str,
        requirement: R,
    ) -> Result<(), GraphlockError> {
        self.ensure_mutable("add_explicit_requirement")?;
        let index = self
            .index_by_name
            .get(name)
            .copied()
            .ok_or_else(|| GraphlockError::Graph(format!("no vertex named {name}")))?;
        if let Some(vertex) = self.vertex_mut(index) {
            vertex.explicit_requirements.push(requirement);
        }
        Ok(())
    }

    /// Activate the named vertex with a payload
    pub fn set_payload(&mut self, name: &str, payload: S) -> Result<(), GraphlockError> {
        self.ensure_mutable("set_payload")?;
        let index = self
            .index_by_name
            .get(name)
            .copied()
            .ok_or_else(|| GraphlockError::Graph(format!("no vertex named {name}")))?;
        if let Some(vertex) = self.vertex_mut(index) {
            vertex.payload = Some(payload);
        }
        Ok(())
    }

    /// Whether `to` is reachable from `from` along outgoing edges
    fn path_exists(&self, from: VertexIndex, to: VertexIndex) -> bool {
        let mut seen = vec![false; self.vertices.len()];
        let mut stack = vec![from];
        while let Some(index) = stack.pop() {
            if index == to {
                return true;
            }
            if seen.get(index).copied().unwrap_or(true) {
                continue;
            }
            seen[index] = true;
            if let Some(vertex) = self.vertex(index) {
                for &edge_index in &vertex.outgoing {
                    if let Some(edge) = self.edge(edge_index) {
                        stack.push(edge.destination);
                    }
                }
            }
        }
        false
    }

    fn add_edge(
        &mut self,
        origin: VertexIndex,
        destination: VertexIndex,
        requirement: R,
    ) -> Result<EdgeIndex, GraphlockError> {
        if origin == destination || self.path_exists(destination, origin) {
            let origin_name = self.vertex(origin).map(|v| v.name.clone()).unwrap_or_default();
            let destination_name = self
                .vertex(destination)
                .map(|v| v.name.clone())
                .unwrap_or_default();
            return Err(GraphlockError::CircularDependency(format!(
                "an edge from {origin_name} to {destination_name} would close a cycle"
            )));
        }
        // One edge per ordered pair; repeats accumulate on its requirement list.
        let existing = self.vertex(destination).and_then(|vertex| {
            vertex
                .incoming
                .iter()
                .copied()
                .find(|&edge_index| self.edge(edge_index).map_or(false, |e| e.origin == origin))
        });
        if let Some(edge_index) = existing {
            if let Some(edge) = self.edge_mut(edge_index) {
                edge.requirements.push(requirement);
            }
            return Ok(edge_index);
        }
        let edge_index = self.edges.len();
        self.edges.push(Some(Edge {
            origin,
            destination,
            requirements: vec![requirement],
        }));
        if let Some(vertex) = self.vertex_mut(origin) {
            vertex.outgoing.push(edge_index);
        }
        if let Some(vertex) = self.vertex_mut(destination) {
            vertex.incoming.push(edge_index);
        }
        Ok(edge_index)
    }

    /// Add a child vertex (idempotent on name) with an incoming edge from
    /// each named parent carrying `requirement`.
    ///
    /// Fails with [`GraphlockError::CircularDependency`] when an edge would
    /// close a cycle, and with [`GraphlockError::Graph`] when a parent does
    /// not exist.
    pub fn add_child_vertex(
        &mut self,
        name: &str,
        payload: Option<S>,
        parent_names: &[&str],
        requirement: R,
    ) -> Result<VertexIndex, GraphlockError>
    where
        R: Clone,
    {
        self.ensure_mutable("add_child_vertex")?;
        let child = self.add_vertex(name, payload, false)?;
        for parent_name in parent_names {
            let parent = self
                .index_by_name
                .get(*parent_name)
                .copied()
                .ok_or_else(|| {
                    GraphlockError::Graph(format!("no parent vertex named {parent_name}"))
                })?;
            self.add_edge(parent, child, requirement.clone())?;
        }
        Ok(child)
    }

    /// Remove the named vertex and every edge touching it, then recursively
    /// remove non-root successors left without incoming edges. Returns the
    /// names of the removed vertices.
    pub fn detach_vertex_named(&mut self, name: &str) -> Result<Vec<String>, GraphlockError> {
        self.ensure_mutable("detach_vertex_named")?;
        let mut removed = Vec::new();
        let mut queue = match self.index_by_name.get(name) {
            Some(&index) => vec![index],
            None => return Ok(removed),
        };
        while let Some(index) = queue.pop() {
            let Some(vertex) = self.vertices.get_mut(index).and_then(|slot| slot.take()) else {
                continue;
            };
            self.index_by_name.remove(&vertex.name);
            removed.push(vertex.name.clone());
            for &edge_index in &vertex.incoming {
                if let Some(edge) = self.edges.get_mut(edge_index).and_then(|slot| slot.take()) {
                    if let Some(origin) = self.vertex_mut(edge.origin) {
                        origin.outgoing.retain(|&e| e != edge_index);
                    }
                }
            }
            for &edge_index in &vertex.outgoing {
                if let Some(edge) = self.edges.get_mut(edge_index).and_then(|slot| slot.take()) {
                    if let Some(destination) = self.vertex_mut(edge.destination) {
                        destination.incoming.retain(|&e| e != edge_index);
                        if !destination.root && destination.incoming.is_empty() {
                            queue.push(edge.destination);
                        }
                    }
                }
            }
        }
        Ok(removed)
    }

    fn incoming_summaries<'a>(&'a self, vertex: &'a Vertex<S, R>) -> Vec<(&'a str, &'a [R])> {
        vertex
            .incoming
            .iter()
            .filter_map(|&edge_index| self.edge(edge_index))
            .filter_map(|edge| {
                self.vertex(edge.origin)
                    .map(|origin| (origin.name.as_str(), edge.requirements.as_slice()))
            })
            .collect()
    }
}

impl<S, R> Default for DependencyGraph<S, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Graphs compare by content: vertex names with their payloads, root flags,
/// explicit requirements, and incoming edges in order. The frozen flag and
/// arena layout are ignored.
impl<S: PartialEq, R: PartialEq> PartialEq for DependencyGraph<S, R> {
    fn eq(&self, other: &Self) -> bool {
        if self.vertex_count() != other.vertex_count() {
            return false;
        }
        self.vertices().all(|vertex| {
            let Some(peer) = other.vertex_named(&vertex.name) else {
                return false;
            };
            vertex.payload == peer.payload
                && vertex.root == peer.root
                && vertex.explicit_requirements == peer.explicit_requirements
                && self.incoming_summaries(vertex) == other.incoming_summaries(peer)
        })
    }
}
