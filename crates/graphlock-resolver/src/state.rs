//! Search frontier states for the resolution stack

use std::collections::VecDeque;

use crate::conflict::ConflictMap;
use crate::graph::DependencyGraph;

/// Discriminates an uncommitted choice point from a single-candidate trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateKind {
    /// A choice point retaining every remaining alternative
    Dependency,
    /// A trial of one specific candidate, derived from a choice point
    Possibility,
}

/// One snapshot of the search frontier.
///
/// Each state owns its graph snapshot; mutating the current state's graph
/// never affects any other state on the stack.
#[derive(Debug, Clone)]
pub(crate) struct ResolutionState<R, S> {
    pub kind: StateKind,

    /// Package name under consideration; empty when nothing is left to do
    pub name: String,

    /// Still-pending requirements, most preferred first
    pub requirements: VecDeque<R>,

    /// Snapshot of the activated graph at this point
    pub activated: DependencyGraph<S, R>,

    /// The requirement currently being worked on
    pub requirement: Option<R>,

    /// Candidates for `requirement`, lowest preference first so the last
    /// element is the next to try
    pub possibilities: Vec<S>,

    /// Logical depth, for trace indentation
    pub depth: usize,

    /// Most recent conflict recorded per package name
    pub conflicts: ConflictMap<R, S>,
}

impl<R: Clone, S: Clone> ResolutionState<R, S> {
    /// The candidate currently on deck (the last element).
    pub fn possibility(&self) -> Option<&S> {
        self.possibilities.last()
    }

    /// Derive the trial of the highest-preference remaining candidate,
    /// consuming it from this choice point. Returns `None` once every
    /// alternative has been tried, leaving this state as an exhausted
    /// choice marker.
    pub fn pop_possibility_state(&mut self) -> Option<Self> {
        debug_assert_eq!(self.kind, StateKind::Dependency);
        self.possibilities.pop().map(|possibility| Self {
            kind: StateKind::Possibility,
            name: self.name.clone(),
            requirements: self.requirements.clone(),
            activated: self.activated.clone(),
            requirement: self.requirement.clone(),
            possibilities: vec![possibility],
            depth: self.depth + 1,
            conflicts: self.conflicts.clone(),
        })
    }
}
