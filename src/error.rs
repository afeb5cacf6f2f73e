//! Error taxonomy for the inference engine.
//!
//! `UnsupportedSyntax`, `TypeMismatch` and `UnsupportedLiteral` abort the
//! current input; the session stays usable for later inputs. Undeclared
//! globals are *not* errors (they become warnings on the session).

use std::path::PathBuf;

use crate::ast::Pos;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A statement, expression or declarator shape the evaluator does not
    /// model (destructuring targets, compound assignment, calls, ...).
    #[error("unsupported syntax at {loc}: {what}")]
    UnsupportedSyntax { what: String, loc: Pos },

    /// Member access on a variable whose type set excludes both object and
    /// array.
    #[error("type mismatch at {loc}: {what}")]
    TypeMismatch { what: String, loc: Pos },

    /// A literal with no JSON-Schema representation (e.g. a regex literal).
    #[error("unsupported literal at {loc}: {what}")]
    UnsupportedLiteral { what: String, loc: Pos },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input file was not a well-formed syntax-tree JSON document.
    #[error("malformed syntax tree in {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },
}

impl Error {
    pub fn unsupported(what: impl Into<String>, loc: Pos) -> Self {
        Error::UnsupportedSyntax { what: what.into(), loc }
    }
}
