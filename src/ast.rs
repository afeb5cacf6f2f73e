//! Access helpers over esprima-shaped syntax trees.
//!
//! Trees are plain `serde_json::Value` documents: every node is an object
//! carrying a `"type"` discriminator, a `"loc"` with line/column positions,
//! and (when the parser was asked for it) a `"range"` byte-offset pair.
//! The statement/expression surface the interpreter models is closed out
//! here as `StmtKind`/`ExprKind`, so an unhandled kind is a visible gap in a
//! `match`, not a stringly default case scattered around.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

// ————————————————————————————————————————————————————————————————————————————
// POSITIONS
// ————————————————————————————————————————————————————————————————————————————

/// A line/column pair, as esprima reports it (lines 1-based, columns 0-based).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub line: u64,
    pub column: u64,
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Loc {
    pub start: Pos,
    pub end: Pos,
}

fn pos_of(v: &Value) -> Pos {
    Pos {
        line: v.get("line").and_then(Value::as_u64).unwrap_or(0),
        column: v.get("column").and_then(Value::as_u64).unwrap_or(0),
    }
}

/// Best-effort location of a node; nodes without `loc` report `0:0`.
pub fn loc_of(node: &Value) -> Loc {
    match node.get("loc") {
        Some(loc) => Loc {
            start: loc.get("start").map(pos_of).unwrap_or_default(),
            end: loc.get("end").map(pos_of).unwrap_or_default(),
        },
        None => Loc::default(),
    }
}

/// The correlation tag recorded on schemas when an expression updates a
/// variable: the expression's end position as `line:column`.
pub fn source_tag(node: &Value) -> String {
    loc_of(node).end.to_string()
}

// ————————————————————————————————————————————————————————————————————————————
// NODE KINDS
// ————————————————————————————————————————————————————————————————————————————

/// The node-kind discriminator, when present.
pub fn kind(node: &Value) -> Option<&str> {
    node.get("type").and_then(Value::as_str)
}

/// Every function-ish kind the hoisting pass recognizes. Bodies of these are
/// never descended into by the scan.
pub fn is_function_kind(kind: &str) -> bool {
    matches!(
        kind,
        "Function"
            | "FunctionDeclaration"
            | "FunctionExpression"
            | "ArrowFunctionExpression"
            | "ArrowExpression"
    )
}

/// The statement surface the interpreter models. Anything else fails with
/// `UnsupportedSyntax` at classification time.
#[derive(Debug)]
pub enum StmtKind<'a> {
    Empty,
    Block(&'a [Value]),
    VariableDeclaration(&'a [Value]),
    Expression(&'a Value),
}

impl<'a> StmtKind<'a> {
    pub fn classify(node: &'a Value) -> Result<Self, Error> {
        let loc = loc_of(node).start;
        match kind(node) {
            Some("EmptyStatement") => Ok(StmtKind::Empty),
            Some("BlockStatement") => {
                let body = node
                    .get("body")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::unsupported("BlockStatement without a body", loc))?;
                Ok(StmtKind::Block(body))
            }
            Some("VariableDeclaration") => {
                let decls = node.get("declarations").and_then(Value::as_array).ok_or_else(|| {
                    Error::unsupported("VariableDeclaration without declarations", loc)
                })?;
                Ok(StmtKind::VariableDeclaration(decls))
            }
            Some("ExpressionStatement") => {
                let expr = node
                    .get("expression")
                    .ok_or_else(|| Error::unsupported("ExpressionStatement without an expression", loc))?;
                Ok(StmtKind::Expression(expr))
            }
            Some(other) => Err(Error::unsupported(format!("statement kind {other}"), loc)),
            None => Err(Error::unsupported("node without a kind discriminator", loc)),
        }
    }
}

/// The expression surface. Evaluation handles the literal kinds directly and
/// defers `Identifier`/`Member` to variable resolution.
#[derive(Debug)]
pub enum ExprKind<'a> {
    Literal,
    Identifier(&'a str),
    Object(&'a [Value]),
    Array(&'a [Value]),
    Assignment {
        operator: &'a str,
        left: &'a Value,
        right: &'a Value,
    },
    Member {
        object: &'a Value,
        property: &'a Value,
        computed: bool,
    },
}

impl<'a> ExprKind<'a> {
    pub fn classify(node: &'a Value) -> Result<Self, Error> {
        let loc = loc_of(node).start;
        match kind(node) {
            Some("Literal") => Ok(ExprKind::Literal),
            Some("Identifier") => {
                let name = node
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::unsupported("Identifier without a name", loc))?;
                Ok(ExprKind::Identifier(name))
            }
            Some("ObjectExpression") => {
                let props = node
                    .get("properties")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::unsupported("ObjectExpression without properties", loc))?;
                Ok(ExprKind::Object(props))
            }
            Some("ArrayExpression") => {
                let elements = node
                    .get("elements")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::unsupported("ArrayExpression without elements", loc))?;
                Ok(ExprKind::Array(elements))
            }
            Some("AssignmentExpression") => {
                let operator = node
                    .get("operator")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::unsupported("assignment without an operator", loc))?;
                let left = node
                    .get("left")
                    .ok_or_else(|| Error::unsupported("assignment without a target", loc))?;
                let right = node
                    .get("right")
                    .ok_or_else(|| Error::unsupported("assignment without a source", loc))?;
                Ok(ExprKind::Assignment { operator, left, right })
            }
            Some("MemberExpression") => {
                let object = node
                    .get("object")
                    .ok_or_else(|| Error::unsupported("member access without an object", loc))?;
                let property = node
                    .get("property")
                    .ok_or_else(|| Error::unsupported("member access without a property", loc))?;
                let computed = node.get("computed").and_then(Value::as_bool).unwrap_or(false);
                Ok(ExprKind::Member { object, property, computed })
            }
            Some(other) => Err(Error::unsupported(format!("expression kind {other}"), loc)),
            None => Err(Error::unsupported("node without a kind discriminator", loc)),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LOADING
// ————————————————————————————————————————————————————————————————————————————

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at {path}: {}", err.into_inner()))
        }
    }
}

/// Parse one syntax-tree JSON document produced by an esprima-style parser.
pub fn parse_tree(src: &str) -> Result<Value, String> {
    from_str_with_path::<Value>(src)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
