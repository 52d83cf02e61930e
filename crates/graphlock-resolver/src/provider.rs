//! The domain-knowledge seam consumed by the resolution engine

use std::fmt;

use crate::conflict::ConflictMap;
use crate::error::ResolveError;
use crate::graph::DependencyGraph;

/// Supplies everything the engine does not know about the domain: how to
/// find candidates, extract nested requirements, test satisfaction, and name
/// things.
///
/// The engine treats requirements and specifications as opaque values. It
/// only clones them, compares them for equality, and hands them back to the
/// provider. It never parses version strings or performs I/O.
pub trait SpecificationProvider {
    /// An opaque constraint on a single named package
    type Requirement: Clone + PartialEq + fmt::Debug;

    /// An opaque candidate that may satisfy requirements and carries its own
    /// nested requirements
    type Specification: Clone + PartialEq + fmt::Debug;

    /// Candidates that may satisfy `requirement`, ordered with the highest
    /// preference last (the engine pops from the end).
    fn search_for(
        &self,
        requirement: &Self::Requirement,
    ) -> Result<Vec<Self::Specification>, ResolveError<Self::Requirement, Self::Specification>>;

    /// Nested requirements carried by `specification`
    fn dependencies_for(
        &self,
        specification: &Self::Specification,
    ) -> Result<Vec<Self::Requirement>, ResolveError<Self::Requirement, Self::Specification>>;

    /// Whether `specification` satisfies `requirement`, given the packages
    /// activated so far
    fn is_requirement_satisfied_by(
        &self,
        requirement: &Self::Requirement,
        activated: &DependencyGraph<Self::Specification, Self::Requirement>,
        specification: &Self::Specification,
    ) -> bool;

    /// The package name `requirement` refers to
    fn name_for(&self, requirement: &Self::Requirement) -> String;

    /// The package name `specification` provides
    fn name_for_specification(&self, specification: &Self::Specification) -> String;

    /// Recast an activated specification as a requirement. Locked payloads
    /// from the base graph pass through this before being checked against
    /// new candidates.
    fn requirement_for_specification(
        &self,
        specification: &Self::Specification,
    ) -> Self::Requirement;

    /// Reserved source name for requirements given directly by the caller.
    /// Must be distinct from every real package name.
    fn name_for_explicit_dependency_source(&self) -> String {
        "user-specified dependency".to_string()
    }

    /// Reserved source name for requirements imposed by the base graph
    fn name_for_locking_dependency_source(&self) -> String {
        "Lockfile".to_string()
    }

    /// Order `dependencies` so the most constrained come first. Must be
    /// stable and deterministic for reproducible resolution.
    ///
    /// The default prefers packages that are already activated, then
    /// packages with a recorded conflict.
    fn sort_dependencies(
        &self,
        dependencies: Vec<Self::Requirement>,
        activated: &DependencyGraph<Self::Specification, Self::Requirement>,
        conflicts: &ConflictMap<Self::Requirement, Self::Specification>,
    ) -> Vec<Self::Requirement> {
        let mut dependencies = dependencies;
        dependencies.sort_by_key(|dependency| {
            let name = self.name_for(dependency);
            let activated_rank = match activated.vertex_named(&name) {
                Some(vertex) if vertex.payload.is_some() => 0,
                _ => 1,
            };
            let conflict_rank = usize::from(!conflicts.contains_key(&name));
            (activated_rank, conflict_rank)
        });
        dependencies
    }

    /// Whether the absence of any candidate for `requirement` is tolerable.
    /// When true, the engine drops the requirement's vertex instead of
    /// recording a conflict.
    fn allow_missing(&self, _requirement: &Self::Requirement) -> bool {
        false
    }
}
