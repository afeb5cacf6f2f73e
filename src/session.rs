//! Multi-input aggregation.
//!
//! A `Session` owns the variable store and one global scope shared by every
//! input, so evidence accumulates across files. Inputs are independent for
//! error purposes: a failed input contributes nothing, but state inferred
//! from earlier inputs survives and later inputs keep extending it.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::ast::{self, Pos};
use crate::error::Error;
use crate::interp::Interpreter;
use crate::schema::Schema;
use crate::scope::Scope;
use crate::variable::VarStore;
use crate::walk;

pub const DEFAULT_TITLE: &str = "Generated Documentation";

/// A name referenced without any declaration, with its first reference site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndeclaredGlobal {
    pub name: String,
    pub line: u64,
    pub column: u64,
}

/// A source comment attached to the statement it precedes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredComment {
    pub text: String,
    /// Line of the anchored node's start.
    pub line: u64,
}

pub struct Session {
    title: String,
    vars: VarStore,
    global: Scope,
    undeclared: IndexMap<String, Pos>,
    comments: Vec<AnchoredComment>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session::with_title(DEFAULT_TITLE)
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Session {
            title: title.into(),
            vars: VarStore::new(),
            global: Scope::new(),
            undeclared: IndexMap::new(),
            comments: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Read, parse and interpret one syntax-tree JSON file.
    pub fn add_file(&mut self, path: &Path) -> Result<(), Error> {
        let src = std::fs::read_to_string(path)
            .map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        let tree = ast::parse_tree(&src)
            .map_err(|detail| Error::Malformed { path: path.to_path_buf(), detail })?;
        self.add_program(&tree)
    }

    /// Interpret one parsed program against the shared global scope.
    pub fn add_program(&mut self, program: &Value) -> Result<(), Error> {
        self.anchor_comments(program);
        let mut interp = Interpreter {
            vars: &mut self.vars,
            global: &mut self.global,
            undeclared: &mut self.undeclared,
        };
        interp.run_program(program)
    }

    /// Every global binding's current schema, in declaration order.
    pub fn schemas(&self) -> IndexMap<String, Schema> {
        self.global
            .iter()
            .map(|(name, id)| (name.to_string(), self.vars.schema(id).clone()))
            .collect()
    }

    pub fn warnings(&self) -> Vec<UndeclaredGlobal> {
        self.undeclared
            .iter()
            .map(|(name, pos)| UndeclaredGlobal {
                name: name.clone(),
                line: pos.line,
                column: pos.column,
            })
            .collect()
    }

    pub fn comments(&self) -> &[AnchoredComment] {
        &self.comments
    }

    /// The full session state as one JSON document.
    pub fn export(&self) -> Value {
        let globals: IndexMap<&str, Value> = self
            .undeclared
            .iter()
            .map(|(name, pos)| (name.as_str(), json!({"line": pos.line, "column": pos.column})))
            .collect();
        json!({
            "title": self.title,
            "schemas": self.schemas(),
            "undeclaredGlobals": globals,
        })
    }

    /// Attach each comment in `program["comments"]` to the first node that
    /// starts after it. Parsers only emit that array when asked for comments
    /// and ranges; without ranges nothing anchors.
    fn anchor_comments(&mut self, program: &Value) {
        let Some(comments) = program.get("comments").and_then(Value::as_array) else {
            return;
        };
        for comment in comments {
            let Some(text) = comment.get("value").and_then(Value::as_str) else {
                continue;
            };
            let Some((_, end)) = node_range(comment) else {
                tracing::warn!(text, "comment carries no range, not anchored");
                continue;
            };
            match enclosing_node(program, end) {
                Some(node) => {
                    self.comments.push(AnchoredComment {
                        text: text.to_string(),
                        line: ast::loc_of(node).start.line,
                    });
                }
                None => tracing::warn!(text, "no node follows this comment"),
            }
        }
    }
}

fn node_range(node: &Value) -> Option<(u64, u64)> {
    let range = node.get("range")?.as_array()?;
    let start = range.first()?.as_u64()?;
    let end = range.get(1)?.as_u64()?;
    Some((start, end))
}

/// The node a comment documents: among all descendants starting at or after
/// the comment's end offset, the one starting earliest.
fn enclosing_node(root: &Value, after: u64) -> Option<&Value> {
    let mut best: Option<(u64, &Value)> = None;
    let mut stack = walk::child_nodes(root);
    while let Some(node) = stack.pop() {
        if matches!(ast::kind(node), Some("Line" | "Block")) {
            continue;
        }
        if let Some((start, _)) = node_range(node) {
            if start >= after && best.map_or(true, |(b, _)| start < b) {
                best = Some((start, node));
            }
        }
        stack.extend(walk::child_nodes(node));
    }
    best.map(|(_, node)| node)
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeTag;
    use serde_json::json;

    fn lit(value: Value) -> Value {
        json!({"type": "Literal", "value": value})
    }

    fn var_decl(name: &str, init: Value) -> Value {
        json!({"type": "VariableDeclaration", "declarations": [
            {"type": "VariableDeclarator",
             "id": {"type": "Identifier", "name": name}, "init": init}
        ]})
    }

    fn assign(left: Value, right: Value) -> Value {
        json!({"type": "ExpressionStatement", "expression": {
            "type": "AssignmentExpression", "operator": "=",
            "left": left, "right": right
        }})
    }

    fn program(stmts: Vec<Value>) -> Value {
        json!({"type": "Program", "body": stmts})
    }

    #[test]
    fn evidence_accumulates_across_inputs() {
        let mut session = Session::new();
        session
            .add_program(&program(vec![var_decl("x", lit(json!(1)))]))
            .unwrap();
        session
            .add_program(&program(vec![var_decl("x", lit(json!("a")))]))
            .unwrap();
        let schemas = session.schemas();
        let x = &schemas["x"];
        assert!(x.types.contains(TypeTag::Integer) && x.types.contains(TypeTag::String));
    }

    #[test]
    fn a_failed_input_leaves_the_session_usable() {
        let mut session = Session::new();
        session
            .add_program(&program(vec![var_decl("a", lit(json!(1)))]))
            .unwrap();
        let err = session
            .add_program(&program(vec![json!({"type": "WhileStatement"})]))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedSyntax { .. }));
        session
            .add_program(&program(vec![var_decl("b", lit(json!("x")))]))
            .unwrap();
        let schemas = session.schemas();
        assert!(schemas["a"].types.contains(TypeTag::Integer), "earlier state survives");
        assert!(schemas["b"].types.contains(TypeTag::String), "later inputs still work");
    }

    #[test]
    fn undeclared_globals_warn_once_across_inputs() {
        let mut session = Session::new();
        let reference = |line: u64| {
            program(vec![assign(
                json!({"type": "Identifier", "name": "g",
                       "loc": {"start": {"line": line, "column": 2},
                               "end": {"line": line, "column": 3}}}),
                lit(json!(1)),
            )])
        };
        session.add_program(&reference(4)).unwrap();
        session.add_program(&reference(9)).unwrap();
        let warnings = session.warnings();
        assert_eq!(
            warnings,
            vec![UndeclaredGlobal { name: "g".into(), line: 4, column: 2 }]
        );
    }

    #[test]
    fn export_shape() {
        let mut session = Session::with_title("API Notes");
        session
            .add_program(&program(vec![
                var_decl("n", lit(json!(3))),
                assign(json!({"type": "Identifier", "name": "g"}), lit(json!(true))),
            ]))
            .unwrap();
        let exported = session.export();
        assert_eq!(exported["title"], json!("API Notes"));
        assert_eq!(exported["schemas"]["n"]["type"], json!("integer"));
        assert_eq!(exported["schemas"]["n"]["enum"], json!([3]));
        assert_eq!(exported["undeclaredGlobals"]["g"], json!({"line": 0, "column": 0}));
    }

    #[test]
    fn dynamic_fold_survives_in_the_exported_schema() {
        let member = |name: &str| {
            json!({"type": "MemberExpression", "computed": false,
                   "object": {"type": "Identifier", "name": "o"},
                   "property": {"type": "Identifier", "name": name}})
        };
        let mut session = Session::new();
        session
            .add_program(&program(vec![
                var_decl("o", json!({"type": "ObjectExpression", "properties": []})),
                assign(member("a"), lit(json!(1))),
                assign(member("b"), lit(json!("x"))),
                assign(
                    json!({"type": "MemberExpression", "computed": true,
                           "object": {"type": "Identifier", "name": "o"},
                           "property": {"type": "Identifier", "name": "k"}}),
                    lit(json!(true)),
                ),
            ]))
            .unwrap();
        let schemas = session.schemas();
        let o = &schemas["o"];
        assert!(o.properties.is_empty());
        let extra = o.additional_properties.as_ref().expect("folded");
        for tag in [TypeTag::Integer, TypeTag::String, TypeTag::Boolean] {
            assert!(extra.types.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn comments_anchor_to_the_following_statement() {
        let mut session = Session::new();
        let mut tree = program(vec![json!({
            "type": "VariableDeclaration",
            "range": [20, 31],
            "loc": {"start": {"line": 3, "column": 0}, "end": {"line": 3, "column": 11}},
            "declarations": [
                {"type": "VariableDeclarator", "range": [24, 30],
                 "id": {"type": "Identifier", "name": "x", "range": [24, 25]},
                 "init": {"type": "Literal", "value": 1, "range": [28, 29]}}
            ]
        })]);
        tree["comments"] = json!([
            {"type": "Line", "value": " the answer", "range": [0, 13]},
            {"type": "Line", "value": " dangling", "range": [40, 51]}
        ]);
        session.add_program(&tree).unwrap();
        assert_eq!(
            session.comments(),
            &[AnchoredComment { text: " the answer".into(), line: 3 }]
        );
    }
}
