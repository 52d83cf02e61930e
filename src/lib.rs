//! # Graphlock
//!
//! Generic backtracking dependency resolution, written in Rust.
//!
//! Graphlock takes a set of requirements plus an adapter that supplies
//! domain knowledge about packages, and produces a locked dependency graph
//! in which every activated package satisfies every requirement imposed on
//! it. The engine never inspects version strings, parses constraints, or
//! performs I/O; all of that lives behind the [`SpecificationProvider`]
//! seam.
//!
//! ```no_run
//! use graphlock::{DefaultUi, DependencyGraph, Resolver, SpecificationProvider};
//!
//! fn resolve_with<P: SpecificationProvider>(provider: P) {
//!     let resolver = Resolver::new(provider, DefaultUi::from_env());
//!     let base = DependencyGraph::new();
//!     match resolver.resolve(Vec::new(), &base) {
//!         Ok(locked) => assert!(locked.is_frozen()),
//!         Err(error) => eprintln!("{error}"),
//!     }
//! }
//! ```

pub use graphlock_common::{GraphlockError, GraphlockResult, ResolverConfig, DEBUG_ENV_VAR};
pub use graphlock_resolver::{
    Conflict, ConflictMap, DefaultUi, DependencyGraph, Edge, EdgeIndex, ResolveError, Resolver,
    ResolverUi, SpecificationProvider, Vertex, VertexIndex,
};
