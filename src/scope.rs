//! Name→variable maps and the hoisting pass.
//!
//! Declared names are visible throughout their enclosing body from the
//! start, so each body gets one scan up front: named function definitions
//! register a `{type: "function"}` placeholder (their bodies are pruned, not
//! analyzed here), declarator targets register an empty placeholder titled
//! with the variable name. Bindings are committed only after the whole scan
//! succeeds, so a failure cannot leave partial names in a shared scope.

use indexmap::IndexMap;
use serde_json::Value;

use crate::ast::{self, Loc};
use crate::error::Error;
use crate::schema::{Schema, TypeTag};
use crate::variable::{VarId, VarStore};
use crate::walk::{self, Visit};

#[derive(Debug, Default)]
pub struct Scope {
    bindings: IndexMap<String, VarId>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn get(&self, name: &str) -> Option<VarId> {
        self.bindings.get(name).copied()
    }

    pub fn insert(&mut self, name: String, id: VarId) {
        self.bindings.insert(name, id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.bindings.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Scan a statement body for hoisted declarations and bind them in `scope`.
///
/// Fails with `UnsupportedSyntax` when a declarator target is not a plain
/// identifier (destructuring is not modeled). Names already bound keep their
/// existing variable: evidence only ever widens.
pub fn hoist(body: &[Value], scope: &mut Scope, vars: &mut VarStore) -> Result<(), Error> {
    let mut pending: Vec<(String, Schema, Loc)> = Vec::new();
    {
        let mut scan = |node: &Value, _pointer: &str, _ancestors: &[&Value]| -> Result<Visit, Error> {
            match ast::kind(node) {
                Some(kind) if ast::is_function_kind(kind) => {
                    let name = node
                        .get("id")
                        .and_then(|id| id.get("name"))
                        .and_then(Value::as_str);
                    if let Some(name) = name {
                        pending.push((name.to_string(), Schema::of_type(TypeTag::Function), ast::loc_of(node)));
                    }
                    Ok(Visit::Prune)
                }
                Some("VariableDeclarator") => {
                    let target = node.get("id").ok_or_else(|| {
                        Error::unsupported("declarator without a target", ast::loc_of(node).start)
                    })?;
                    if ast::kind(target) != Some("Identifier") {
                        return Err(Error::unsupported(
                            "destructuring declarator targets are not supported",
                            ast::loc_of(target).start,
                        ));
                    }
                    let name = target.get("name").and_then(Value::as_str).ok_or_else(|| {
                        Error::unsupported("declarator target without a name", ast::loc_of(target).start)
                    })?;
                    let schema = Schema {
                        title: Some(name.to_string()),
                        ..Schema::placeholder()
                    };
                    pending.push((name.to_string(), schema, ast::loc_of(node)));
                    Ok(Visit::Descend)
                }
                _ => Ok(Visit::Descend),
            }
        };
        for stmt in body {
            if !walk::is_node(stmt) {
                continue;
            }
            if scan(stmt, "", &[])? == Visit::Descend {
                walk::traverse(stmt, &mut scan)?;
            }
        }
    }
    for (name, schema, loc) in pending {
        if scope.get(&name).is_none() {
            let id = vars.alloc_named(&name, &loc, schema);
            scope.insert(name, id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(stmts: Value) -> Vec<Value> {
        stmts.as_array().expect("statement array").clone()
    }

    #[test]
    fn declarators_hoist_with_titles() {
        let stmts = body(json!([
            {"type": "VariableDeclaration", "declarations": [
                {"type": "VariableDeclarator",
                 "id": {"type": "Identifier", "name": "x"},
                 "init": {"type": "Literal", "value": 1}}
            ]}
        ]));
        let mut scope = Scope::new();
        let mut vars = VarStore::new();
        hoist(&stmts, &mut scope, &mut vars).unwrap();
        let x = scope.get("x").expect("x hoisted");
        let schema = vars.schema(x);
        assert!(schema.placeholder, "no initializer evaluated during hoisting");
        assert_eq!(schema.title.as_deref(), Some("x"));
    }

    #[test]
    fn named_functions_register_and_prune() {
        // The inner declarator must not leak out of the function body.
        let stmts = body(json!([
            {"type": "FunctionDeclaration",
             "id": {"type": "Identifier", "name": "f"},
             "params": [],
             "body": {"type": "BlockStatement", "body": [
                 {"type": "VariableDeclaration", "declarations": [
                     {"type": "VariableDeclarator",
                      "id": {"type": "Identifier", "name": "inner"}, "init": null}
                 ]}
             ]}}
        ]));
        let mut scope = Scope::new();
        let mut vars = VarStore::new();
        hoist(&stmts, &mut scope, &mut vars).unwrap();
        let f = scope.get("f").expect("f hoisted");
        assert!(vars.schema(f).types.contains(TypeTag::Function));
        assert!(scope.get("inner").is_none(), "nested bodies are pruned");
    }

    #[test]
    fn destructuring_fails_without_binding_anything() {
        let stmts = body(json!([
            {"type": "VariableDeclaration", "declarations": [
                {"type": "VariableDeclarator",
                 "id": {"type": "Identifier", "name": "ok"}, "init": null}
            ]},
            {"type": "VariableDeclaration", "declarations": [
                {"type": "VariableDeclarator",
                 "id": {"type": "ObjectPattern", "properties": []}, "init": null}
            ]}
        ]));
        let mut scope = Scope::new();
        let mut vars = VarStore::new();
        let err = hoist(&stmts, &mut scope, &mut vars).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSyntax { .. }));
        assert!(scope.is_empty(), "nothing committed on failure");
    }
}
