//! Backtracking resolution state machine

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::conflict::{Conflict, ConflictMap};
use crate::error::ResolveError;
use crate::graph::DependencyGraph;
use crate::provider::SpecificationProvider;
use crate::state::{ResolutionState, StateKind};
use crate::ui::ResolverUi;

type Graph<P> = DependencyGraph<
    <P as SpecificationProvider>::Specification,
    <P as SpecificationProvider>::Requirement,
>;
type State<P> = ResolutionState<
    <P as SpecificationProvider>::Requirement,
    <P as SpecificationProvider>::Specification,
>;
type Conflicts<P> = ConflictMap<
    <P as SpecificationProvider>::Requirement,
    <P as SpecificationProvider>::Specification,
>;
type ResolverResult<P, T> = Result<
    T,
    ResolveError<
        <P as SpecificationProvider>::Requirement,
        <P as SpecificationProvider>::Specification,
    >,
>;

/// Resolves a set of requirements against domain knowledge supplied by a
/// [`SpecificationProvider`], producing a frozen graph in which every
/// activated package satisfies every requirement imposed on it.
///
/// The resolver is single-threaded and synchronous: every provider and UI
/// call is a plain blocking call, and callers cancel by not calling.
pub struct Resolver<P, U> {
    provider: P,
    ui: U,
}

impl<P: SpecificationProvider, U: ResolverUi> Resolver<P, U> {
    /// Pair a provider with a UI
    pub fn new(provider: P, ui: U) -> Self {
        Self { provider, ui }
    }

    /// Run one resolution.
    ///
    /// `base` carries pre-locked activations the result must also satisfy;
    /// it is read-only for the duration. Returns the frozen activated graph,
    /// or [`ResolveError::VersionConflict`] when no consistent assignment
    /// exists.
    pub fn resolve(
        &self,
        requested: Vec<P::Requirement>,
        base: &Graph<P>,
    ) -> ResolverResult<P, Graph<P>> {
        Resolution::new(&self.provider, &self.ui, requested, base).resolve()
    }

    /// The provider this resolver consults
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The UI this resolver reports to
    pub fn ui(&self) -> &U {
        &self.ui
    }
}

/// One in-flight resolution: the state stack plus progress bookkeeping.
struct Resolution<'a, P: SpecificationProvider, U> {
    provider: &'a P,
    ui: &'a U,
    original_requested: Vec<P::Requirement>,
    base: &'a Graph<P>,
    states: Vec<State<P>>,
    iteration_counter: u64,
    iteration_rate: Option<u64>,
    progress_rate: Duration,
    started_at: Instant,
}

impl<'a, P: SpecificationProvider, U: ResolverUi> Resolution<'a, P, U> {
    fn new(provider: &'a P, ui: &'a U, requested: Vec<P::Requirement>, base: &'a Graph<P>) -> Self {
        let progress_rate = ui.progress_rate();
        Self {
            provider,
            ui,
            original_requested: requested,
            base,
            states: Vec::new(),
            iteration_counter: 0,
            iteration_rate: None,
            progress_rate,
            started_at: Instant::now(),
        }
    }

    fn resolve(mut self) -> ResolverResult<P, Graph<P>> {
        self.started_at = Instant::now();
        self.ui.before_resolution();
        let result = self.run();
        self.ui.after_resolution();
        result
    }

    fn run(&mut self) -> ResolverResult<P, Graph<P>> {
        self.push_initial_state()?;
        while self.top_has_work() {
            self.indicate_progress();
            self.split_topmost_state();
            self.process_topmost_state()?;
        }
        let mut activated = match self.states.pop() {
            Some(state) => state.activated,
            None => DependencyGraph::new(),
        };
        activated.freeze();
        Ok(activated)
    }

    /// Whether the top state still has a requirement in hand or pending
    fn top_has_work(&self) -> bool {
        self.states
            .last()
            .map_or(false, |state| state.requirement.is_some() || !state.requirements.is_empty())
    }

    // Accessors over the topmost state. Values are cloned so callers never
    // hold borrows across the mutations that follow.

    fn top(&self) -> Option<&State<P>> {
        self.states.last()
    }

    fn depth(&self) -> usize {
        self.top().map_or(0, |state| state.depth)
    }

    fn current_name(&self) -> String {
        self.top().map(|state| state.name.clone()).unwrap_or_default()
    }

    fn current_requirement(&self) -> Option<P::Requirement> {
        self.top().and_then(|state| state.requirement.clone())
    }

    fn current_possibility(&self) -> Option<P::Specification> {
        self.top().and_then(|state| state.possibility().cloned())
    }

    fn current_conflicts(&self) -> Conflicts<P> {
        self.top().map(|state| state.conflicts.clone()).unwrap_or_default()
    }

    fn current_graph(&self) -> Graph<P> {
        self.top()
            .map(|state| state.activated.clone())
            .unwrap_or_default()
    }

    /// Build the root graph from the requested set and push the first
    /// choice point
    fn push_initial_state(&mut self) -> ResolverResult<P, ()> {
        let mut graph: Graph<P> = DependencyGraph::new();
        for requested in &self.original_requested {
            let name = self.provider.name_for(requested);
            graph.add_vertex(&name, None, true)?;
            graph.add_explicit_requirement(&name, requested.clone())?;
        }
        let requested = self.original_requested.clone();
        self.push_state_for_requirements(requested, true, graph)
    }

    /// One driver iteration's progress tick: count, latch the rate once the
    /// observation window has elapsed, then report every `rate` iterations.
    fn indicate_progress(&mut self) {
        self.iteration_counter += 1;
        if self.iteration_rate.is_none() && self.started_at.elapsed() >= self.progress_rate {
            self.iteration_rate = Some(self.iteration_counter);
        }
        if let Some(rate) = self.iteration_rate {
            if self.iteration_counter % rate == 0 {
                self.ui.indicate_progress();
            }
        }
    }

    /// If the top state is an uncommitted choice point, pop its next
    /// candidate into a derived trial state. An exhausted choice point stays
    /// on top as-is and is handled by the conflict path.
    fn split_topmost_state(&mut self) {
        let is_choice_point = self
            .states
            .last()
            .map_or(false, |state| state.kind == StateKind::Dependency);
        if !is_choice_point {
            return;
        }
        self.debug(self.depth(), || {
            format!(
                "Creating possibility state for {:?} ({} remaining)",
                self.current_requirement(),
                self.top().map_or(0, |state| state.possibilities.len())
            )
        });
        let split = self
            .states
            .last_mut()
            .and_then(|state| state.pop_possibility_state());
        if let Some(possibility_state) = split {
            self.states.push(possibility_state);
        }
    }

    /// Activate the candidate on deck, or record a conflict and unwind
    /// until a choice point with alternatives is back on top. Every
    /// exhausted choice point the unwind lands on records its own conflict,
    /// so the accumulated map keeps one entry per package that ran dry.
    fn process_topmost_state(&mut self) -> ResolverResult<P, ()> {
        if self.current_possibility().is_some() {
            self.attempt_to_activate()
        } else {
            self.create_conflict();
            while !self.unwound_to_choice_point() {
                self.unwind_for_conflict()?;
                if self.exhausted_choice_point() {
                    self.create_conflict();
                }
            }
            Ok(())
        }
    }

    fn unwound_to_choice_point(&self) -> bool {
        self.top().map_or(false, |state| {
            state.kind == StateKind::Dependency && state.possibility().is_some()
        })
    }

    /// Whether the top state is a choice point that has run out of
    /// candidates while a requirement is still in hand
    fn exhausted_choice_point(&self) -> bool {
        self.top().map_or(false, |state| {
            state.kind == StateKind::Dependency
                && state.requirement.is_some()
                && state.possibilities.is_empty()
        })
    }

    fn attempt_to_activate(&mut self) -> ResolverResult<P, ()> {
        self.debug(self.depth(), || {
            format!("Attempting to activate {:?}", self.current_possibility())
        });
        let name = self.current_name();
        let existing = self
            .top()
            .and_then(|state| state.activated.vertex_named(&name))
            .and_then(|vertex| vertex.payload.clone());
        match existing {
            Some(existing_spec) => self.attempt_to_activate_existing_spec(existing_spec),
            None => self.attempt_to_activate_new_spec(),
        }
    }

    /// The package is already activated: reuse the existing spec when it
    /// also serves the current requirement, otherwise conflict.
    fn attempt_to_activate_existing_spec(
        &mut self,
        existing: P::Specification,
    ) -> ResolverResult<P, ()> {
        let satisfied = match (self.current_requirement(), self.top()) {
            (Some(requirement), Some(state)) => {
                self.provider
                    .is_requirement_satisfied_by(&requirement, &state.activated, &existing)
            }
            _ => false,
        };
        if satisfied {
            self.debug(self.depth(), || format!("Found existing spec ({existing:?})"));
            let remaining: Vec<P::Requirement> = self
                .top()
                .map(|state| state.requirements.iter().cloned().collect())
                .unwrap_or_default();
            let graph = self.current_graph();
            self.push_state_for_requirements(remaining, true, graph)
        } else {
            self.debug(self.depth(), || {
                format!("Unsatisfied by existing spec ({existing:?})")
            });
            self.create_conflict();
            self.unwind_for_conflict()
        }
    }

    fn attempt_to_activate_new_spec(&mut self) -> ResolverResult<P, ()> {
        if self.new_spec_satisfied() {
            self.activate_new_spec()
        } else {
            self.create_conflict();
            self.unwind_for_conflict()
        }
    }

    /// The candidate must satisfy the current requirement and, when the base
    /// graph locks this package, the locked payload recast as a requirement.
    fn new_spec_satisfied(&self) -> bool {
        let (Some(state), Some(requirement), Some(possibility)) =
            (self.top(), self.current_requirement(), self.current_possibility())
        else {
            return false;
        };
        let requested_satisfied =
            self.provider
                .is_requirement_satisfied_by(&requirement, &state.activated, &possibility);
        if !requested_satisfied {
            self.debug(state.depth, || {
                format!("Unsatisfied by requested spec ({requirement:?})")
            });
            return false;
        }
        let locked_satisfied = match self.locked_specification_named(&state.name) {
            None => true,
            Some(locked) => {
                let locked_requirement = self.provider.requirement_for_specification(&locked);
                self.provider.is_requirement_satisfied_by(
                    &locked_requirement,
                    &state.activated,
                    &possibility,
                )
            }
        };
        if !locked_satisfied {
            self.debug(state.depth, || "Unsatisfied by locked spec".to_string());
        }
        locked_satisfied
    }

    fn locked_specification_named(&self, name: &str) -> Option<P::Specification> {
        self.base
            .vertex_named(name)
            .and_then(|vertex| vertex.payload.clone())
    }

    /// Commit the candidate, record its nested requirements as edges,
    /// and push the next choice point. Success clears the package's conflict.
    fn activate_new_spec(&mut self) -> ResolverResult<P, ()> {
        let name = self.current_name();
        let Some(possibility) = self.current_possibility() else {
            return Ok(());
        };
        if let Some(state) = self.states.last_mut() {
            state.conflicts.shift_remove(&name);
            state.activated.set_payload(&name, possibility.clone())?;
        }
        self.debug(self.depth(), || format!("Activated {name} at {possibility:?}"));
        self.require_nested_dependencies_for(possibility)
    }

    fn require_nested_dependencies_for(
        &mut self,
        specification: P::Specification,
    ) -> ResolverResult<P, ()> {
        let nested = self.dependencies_for(&specification)?;
        self.debug(self.depth(), || {
            format!("Requiring nested dependencies ({nested:?})")
        });
        let parent_name = self.provider.name_for_specification(&specification);
        for dependency in &nested {
            let child_name = self.provider.name_for(dependency);
            if let Some(state) = self.states.last_mut() {
                state.activated.add_child_vertex(
                    &child_name,
                    None,
                    &[parent_name.as_str()],
                    dependency.clone(),
                )?;
            }
        }
        let mut new_requirements: Vec<P::Requirement> = self
            .top()
            .map(|state| state.requirements.iter().cloned().collect())
            .unwrap_or_default();
        new_requirements.extend(nested.iter().cloned());
        let graph = self.current_graph();
        self.push_state_for_requirements(new_requirements, true, graph)
    }

    /// Sort the pending list, shift the most-preferred requirement, and push
    /// a choice point over `graph` (which the new state owns outright).
    fn push_state_for_requirements(
        &mut self,
        new_requirements: Vec<P::Requirement>,
        requires_sort: bool,
        graph: Graph<P>,
    ) -> ResolverResult<P, ()> {
        let conflicts = self.current_conflicts();
        let mut requirements = new_requirements;
        if requires_sort {
            requirements = dedup_requirements(requirements);
            requirements = self
                .provider
                .sort_dependencies(requirements, &graph, &conflicts);
        }
        let mut remaining: VecDeque<P::Requirement> = requirements.into();
        let requirement = remaining.pop_front();
        let name = requirement
            .as_ref()
            .map(|r| self.provider.name_for(r))
            .unwrap_or_default();
        let possibilities = match &requirement {
            Some(r) => self.search_for(r)?,
            None => Vec::new(),
        };
        let state = ResolutionState {
            kind: StateKind::Dependency,
            name,
            requirements: remaining,
            activated: graph,
            requirement,
            possibilities,
            depth: self.depth(),
            conflicts,
        };
        self.handle_missing_or_push(state)
    }

    /// A requirement with no candidates that the provider tolerates missing
    /// is dropped from the graph instead of becoming a conflict.
    fn handle_missing_or_push(&mut self, mut state: State<P>) -> ResolverResult<P, ()> {
        let missing_allowed = state.requirement.as_ref().map_or(false, |requirement| {
            state.possibilities.is_empty() && self.provider.allow_missing(requirement)
        });
        if missing_allowed {
            let removed = state.activated.detach_vertex_named(&state.name)?;
            self.debug(state.depth, || {
                format!("Skipping missing {} (detached {removed:?})", state.name)
            });
            let remaining: Vec<P::Requirement> = state.requirements.into_iter().collect();
            return self.push_state_for_requirements(remaining, false, state.activated);
        }
        self.debug(state.depth, || format!("Pushing state for {:?}", state.requirement));
        self.states.push(state);
        Ok(())
    }

    /// Attribute the failure on the current package to every source
    /// that imposed a requirement on it, and record it for diagnostics.
    fn create_conflict(&mut self) {
        let Some(state) = self.states.last() else { return };
        let Some(requirement) = state.requirement.clone() else { return };
        let name = state.name.clone();
        let Some(vertex_index) = state.activated.vertex_index_named(&name) else {
            return;
        };
        let Some(vertex) = state.activated.vertex(vertex_index) else { return };

        let mut grouped: IndexMap<String, Vec<P::Requirement>> = IndexMap::new();
        if !vertex.explicit_requirements.is_empty() {
            grouped.insert(
                self.provider.name_for_explicit_dependency_source(),
                vertex.explicit_requirements.clone(),
            );
        }
        if let Some(locked) = self.locked_specification_named(&name) {
            grouped.insert(
                self.provider.name_for_locking_dependency_source(),
                vec![self.provider.requirement_for_specification(&locked)],
            );
        }
        for edge in state.activated.incoming_edges(vertex_index) {
            let source = match state.activated.vertex(edge.origin) {
                Some(origin) => match &origin.payload {
                    Some(payload) => self.provider.name_for_specification(payload),
                    None => origin.name.clone(),
                },
                None => continue,
            };
            // Prepend, so edge-contributed requirements lead their bucket.
            let bucket = grouped.entry(source).or_default();
            for (offset, requirement) in edge.requirements.iter().cloned().enumerate() {
                bucket.insert(offset, requirement);
            }
        }

        let conflict = Conflict {
            requirement,
            requirements: grouped,
            existing: vertex.payload.clone(),
            possibility: state.possibility().cloned(),
        };
        if let Some(state) = self.states.last_mut() {
            state.conflicts.insert(name, conflict);
        }
    }

    /// Rewind to the deepest choice point that can still change the
    /// outcome, carrying the accumulated conflicts onto it. Exhausting the
    /// stack turns the conflicts into the terminal error.
    fn unwind_for_conflict(&mut self) -> ResolverResult<P, ()> {
        self.debug(self.depth(), || {
            format!("Unwinding for conflict: {:?}", self.current_requirement())
        });
        let conflicts = self.current_conflicts();
        match self.state_index_for_unwind() {
            Some(index) => {
                self.states.truncate(index + 2);
                self.states.pop();
                match self.states.last_mut() {
                    Some(state) => {
                        state.conflicts = conflicts;
                        Ok(())
                    }
                    None => Err(ResolveError::VersionConflict(conflicts)),
                }
            }
            None => Err(ResolveError::VersionConflict(conflicts)),
        }
    }

    /// Scan from the top for the deepest choice point where the failing
    /// package is not yet committed, or where the failing requirement was
    /// not yet under consideration. A state with no vertex for the package
    /// at all ends the scan: nothing below can change the outcome.
    fn state_index_for_unwind(&self) -> Option<usize> {
        let current = self.top()?;
        let requirement = current.requirement.as_ref()?;
        let name = current.name.clone();
        for (index, state) in self.states.iter().enumerate().rev() {
            let Some(vertex) = state.activated.vertex_named(&name) else {
                break;
            };
            if state.kind != StateKind::Dependency {
                continue;
            }
            let unpayloaded = vertex.payload.is_none();
            let not_under_consideration = state.requirement.as_ref() != Some(requirement)
                && !state.requirements.contains(requirement);
            if unpayloaded || not_under_consideration {
                return Some(index);
            }
        }
        None
    }

    // Provider calls that can fail pass through these wrappers so that a
    // missing-dependency error always carries the names of everything that
    // required the missing package.

    fn search_for(
        &self,
        requirement: &P::Requirement,
    ) -> ResolverResult<P, Vec<P::Specification>> {
        self.provider
            .search_for(requirement)
            .map_err(|error| self.enrich_missing(error))
    }

    fn dependencies_for(
        &self,
        specification: &P::Specification,
    ) -> ResolverResult<P, Vec<P::Requirement>> {
        self.provider
            .dependencies_for(specification)
            .map_err(|error| self.enrich_missing(error))
    }

    fn enrich_missing(
        &self,
        error: ResolveError<P::Requirement, P::Specification>,
    ) -> ResolveError<P::Requirement, P::Specification> {
        let (dependency, mut required_by) = match error {
            ResolveError::NoSuchDependency {
                dependency,
                required_by,
            } => (dependency, required_by),
            other => return other,
        };
        if let Some(state) = self.top() {
            let name = self.provider.name_for(&dependency);
            if let Some(index) = state.activated.vertex_index_named(&name) {
                for edge in state.activated.incoming_edges(index) {
                    if let Some(origin) = state.activated.vertex(edge.origin) {
                        required_by.push(origin.name.clone());
                    }
                }
                let has_explicit = state
                    .activated
                    .vertex(index)
                    .map_or(false, |vertex| !vertex.explicit_requirements.is_empty());
                if has_explicit {
                    required_by.push(self.provider.name_for_explicit_dependency_source());
                }
            }
        }
        ResolveError::NoSuchDependency {
            dependency,
            required_by,
        }
    }

    fn debug(&self, depth: usize, message: impl Fn() -> String) {
        self.ui.debug(depth, &message);
    }
}

/// Remove value-equal duplicates, keeping the first occurrence of each.
fn dedup_requirements<R: PartialEq>(requirements: Vec<R>) -> Vec<R> {
    let mut unique: Vec<R> = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        if !unique.contains(&requirement) {
            unique.push(requirement);
        }
    }
    unique
}
