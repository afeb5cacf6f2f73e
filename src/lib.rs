//! Infer JSON-Schema documentation from JavaScript syntax trees.
//!
//! Instead of sampling runtime values, the engine symbolically evaluates a
//! restricted statement subset of an esprima-shaped tree: declarations,
//! assignments and literal expressions. Every assignment contributes a
//! schema fragment, re-assignment widens by union, and the resulting global
//! bindings export as JSON-Schema documents.
//!
//! Pipeline:
//! - [`ast`]: access helpers over the raw tree plus the modeled
//!   statement/expression surface
//! - [`walk`]: generic pre-order traversal with pruning
//! - [`scope`] + [`variable`]: hoisted name bindings over a mutable
//!   variable graph
//! - [`schema`]: the schema value type and the union merge
//! - [`interp`]: statement interpretation and expression evaluation
//! - [`session`]: multi-input aggregation, warnings, export

pub mod ast;
pub mod cli;
pub mod error;
pub mod interp;
pub mod schema;
pub mod scope;
pub mod session;
pub mod variable;
pub mod walk;

pub use error::Error;
pub use schema::{Schema, TypeSet, TypeTag};
pub use session::Session;
