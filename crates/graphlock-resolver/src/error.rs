//! Resolver error taxonomy

use std::fmt;

use graphlock_common::GraphlockError;
use thiserror::Error;

use crate::conflict::ConflictMap;

/// Errors surfaced by [`Resolver::resolve`](crate::Resolver::resolve).
///
/// Internal conflicts are not errors: they are control-flow events consumed
/// by the unwind machinery. Only a conflict with no remaining choice point
/// becomes a [`ResolveError::VersionConflict`].
#[derive(Error, Debug)]
pub enum ResolveError<R, S>
where
    R: fmt::Debug,
    S: fmt::Debug,
{
    /// The search exhausted without finding a consistent assignment.
    #[error("version solving failed for {}", conflicting_names(.0))]
    VersionConflict(ConflictMap<R, S>),

    /// The provider could not locate a referenced package. The engine
    /// extends `required_by` with the names of every package that imposed a
    /// requirement on the missing one.
    #[error("unable to find a specification for {dependency:?}{}", required_by_trail(.required_by))]
    NoSuchDependency {
        dependency: R,
        required_by: Vec<String>,
    },

    /// Graph misuse or an attempted dependency cycle, propagated unchanged.
    #[error(transparent)]
    Common(#[from] GraphlockError),
}

fn conflicting_names<R, S>(conflicts: &ConflictMap<R, S>) -> String {
    conflicts.keys().cloned().collect::<Vec<_>>().join(", ")
}

fn required_by_trail(required_by: &[String]) -> String {
    if required_by.is_empty() {
        String::new()
    } else {
        format!(" (required by {})", required_by.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_dependency_display_includes_trail() {
        let error: ResolveError<&str, &str> = ResolveError::NoSuchDependency {
            dependency: "b>=2",
            required_by: vec!["a".to_string(), "c".to_string()],
        };
        let message = error.to_string();
        assert!(message.contains("b>=2"));
        assert!(message.contains("required by a, c"));
    }

    #[test]
    fn test_version_conflict_display_lists_package_names() {
        let mut conflicts: ConflictMap<&str, &str> = ConflictMap::default();
        conflicts.insert(
            "b".to_string(),
            crate::Conflict {
                requirement: "b>=5",
                requirements: Default::default(),
                existing: None,
                possibility: None,
            },
        );
        let error: ResolveError<&str, &str> = ResolveError::VersionConflict(conflicts);
        assert!(error.to_string().contains('b'));
    }
}
