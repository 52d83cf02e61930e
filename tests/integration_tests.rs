//! Integration tests for the graphlock facade

use graphlock::{
    DefaultUi, DependencyGraph, ResolveError, Resolver, ResolverConfig, SpecificationProvider,
};
use pretty_assertions::assert_eq;

/// Minimal provider: every package has exactly one version, requirements are
/// names.
struct SingleVersionProvider {
    packages: Vec<(&'static str, Vec<&'static str>)>,
}

impl SingleVersionProvider {
    fn lookup(&self, name: &str) -> Option<&(&'static str, Vec<&'static str>)> {
        self.packages.iter().find(|(package, _)| *package == name)
    }
}

impl SpecificationProvider for SingleVersionProvider {
    type Requirement = String;
    type Specification = String;

    fn search_for(
        &self,
        requirement: &String,
    ) -> Result<Vec<String>, ResolveError<String, String>> {
        match self.lookup(requirement) {
            Some((package, _)) => Ok(vec![package.to_string()]),
            None => Err(ResolveError::NoSuchDependency {
                dependency: requirement.clone(),
                required_by: Vec::new(),
            }),
        }
    }

    fn dependencies_for(
        &self,
        specification: &String,
    ) -> Result<Vec<String>, ResolveError<String, String>> {
        Ok(self
            .lookup(specification)
            .map(|(_, deps)| deps.iter().map(|dep| dep.to_string()).collect())
            .unwrap_or_default())
    }

    fn is_requirement_satisfied_by(
        &self,
        requirement: &String,
        _activated: &DependencyGraph<String, String>,
        specification: &String,
    ) -> bool {
        requirement == specification
    }

    fn name_for(&self, requirement: &String) -> String {
        requirement.clone()
    }

    fn name_for_specification(&self, specification: &String) -> String {
        specification.clone()
    }

    fn requirement_for_specification(&self, specification: &String) -> String {
        specification.clone()
    }
}

#[test]
fn test_resolves_a_small_tree_through_the_facade() {
    let provider = SingleVersionProvider {
        packages: vec![
            ("app", vec!["lib", "cli"]),
            ("lib", vec!["core"]),
            ("cli", vec!["core"]),
            ("core", vec![]),
        ],
    };
    let resolver = Resolver::new(provider, DefaultUi::default());
    let graph = resolver
        .resolve(vec!["app".to_string()], &DependencyGraph::new())
        .unwrap();

    assert!(graph.is_frozen());
    assert_eq!(graph.vertex_count(), 4);
    for name in ["app", "lib", "cli", "core"] {
        let vertex = graph.vertex_named(name).unwrap();
        assert_eq!(vertex.payload.as_deref(), Some(name));
    }
    // core is shared by lib and cli, each contributing one edge.
    let core = graph.vertex_index_named("core").unwrap();
    assert_eq!(graph.incoming_edges(core).count(), 2);
}

#[test]
fn test_missing_package_surfaces_its_requirers() {
    let provider = SingleVersionProvider {
        packages: vec![("app", vec!["ghost"])],
    };
    let resolver = Resolver::new(provider, DefaultUi::default());
    let error = resolver
        .resolve(vec!["app".to_string()], &DependencyGraph::new())
        .unwrap_err();

    let message = error.to_string();
    assert!(message.contains("ghost"));
    assert!(message.contains("required by app"));
}

#[test]
fn test_config_defaults() {
    let config = ResolverConfig::default();
    assert!(!config.debug);
    assert!(config.progress_rate().as_millis() > 0);
}
