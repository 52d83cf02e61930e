//! Conflict records attributing activation failures to their sources

use indexmap::IndexMap;

/// Mapping from package name to the most recent conflict recorded for it.
///
/// Insertion-ordered so that diagnostic output is deterministic.
pub type ConflictMap<R, S> = IndexMap<String, Conflict<R, S>>;

/// Attribution of an activation failure: the requirement that failed, what
/// was already activated, and every requirement imposed on the package,
/// grouped by the source that contributed it.
///
/// Two source names are reserved: one for explicit top-level requirements
/// and one for locking requirements from the base graph (see
/// [`SpecificationProvider::name_for_explicit_dependency_source`] and
/// [`SpecificationProvider::name_for_locking_dependency_source`]). Every
/// other source name is the name of an activated package. Empty buckets are
/// never recorded.
///
/// [`SpecificationProvider::name_for_explicit_dependency_source`]:
/// crate::SpecificationProvider::name_for_explicit_dependency_source
/// [`SpecificationProvider::name_for_locking_dependency_source`]:
/// crate::SpecificationProvider::name_for_locking_dependency_source
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict<R, S> {
    /// The requirement that could not be satisfied
    pub requirement: R,

    /// Requirements on the package, grouped by source name
    pub requirements: IndexMap<String, Vec<R>>,

    /// The payload already activated for the package, if any
    pub existing: Option<S>,

    /// The candidate that failed, if one was being trialed
    pub possibility: Option<S>,
}
