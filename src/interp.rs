//! Statement interpretation and expression evaluation.
//!
//! Statements are walked strictly in textual order; every right-hand side
//! resolves to a `Schema` and every assignable left-hand side to a variable,
//! creating intermediate property/item variables on demand. Anything outside
//! the modeled subset fails with `UnsupportedSyntax` ("cannot infer", never
//! a crash), and re-assignment always merges with prior inferred state.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ast::{self, ExprKind, Pos, StmtKind};
use crate::error::Error;
use crate::schema::{Schema, TypeSet, TypeTag};
use crate::scope::{self, Scope};
use crate::variable::{VarId, VarStore};

/// A literal accessor that looks like an array index.
static ARRAY_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|[1-9][0-9]*)$").expect("array index pattern"));

pub struct Interpreter<'a> {
    pub vars: &'a mut VarStore,
    pub global: &'a mut Scope,
    /// Names referenced before any declaration, with their first reference.
    pub undeclared: &'a mut IndexMap<String, Pos>,
}

impl<'a> Interpreter<'a> {
    /// Interpret one parsed program against the (shared) global scope.
    pub fn run_program(&mut self, program: &Value) -> Result<(), Error> {
        let loc = ast::loc_of(program).start;
        match ast::kind(program) {
            Some("Program") => {}
            Some(other) => {
                return Err(Error::unsupported(format!("expected a Program root, got {other}"), loc))
            }
            None => return Err(Error::unsupported("tree root carries no kind discriminator", loc)),
        }
        let body = program
            .get("body")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::unsupported("Program without a body", loc))?;
        scope::hoist(body, self.global, self.vars)?;
        for stmt in body {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Value) -> Result<(), Error> {
        match StmtKind::classify(stmt)? {
            StmtKind::Empty => Ok(()),
            StmtKind::Block(body) => {
                // Same scope: `var` has no block scoping here.
                for inner in body {
                    self.statement(inner)?;
                }
                Ok(())
            }
            StmtKind::VariableDeclaration(decls) => {
                for decl in decls {
                    self.declarator(decl)?;
                }
                Ok(())
            }
            StmtKind::Expression(expr) => self.expression_statement(expr),
        }
    }

    fn declarator(&mut self, decl: &Value) -> Result<(), Error> {
        let target = decl
            .get("id")
            .ok_or_else(|| Error::unsupported("declarator without a target", ast::loc_of(decl).start))?;
        if ast::kind(target) != Some("Identifier") {
            return Err(Error::unsupported(
                "destructuring declarator targets are not supported",
                ast::loc_of(target).start,
            ));
        }
        let name = target.get("name").and_then(Value::as_str).ok_or_else(|| {
            Error::unsupported("declarator target without a name", ast::loc_of(target).start)
        })?;
        let init = match decl.get("init") {
            Some(init) if !init.is_null() => init,
            _ => return Ok(()),
        };
        let incoming = self.evaluate(init)?;
        let id = match self.global.get(name) {
            Some(id) => id,
            // Hoisting covers the whole body, but stay defensive.
            None => {
                let id = self.vars.alloc_named(name, &ast::loc_of(decl), Schema::placeholder());
                self.global.insert(name.to_string(), id);
                id
            }
        };
        self.vars.set_schema(id, &incoming, &ast::source_tag(decl));
        Ok(())
    }

    fn expression_statement(&mut self, expr: &Value) -> Result<(), Error> {
        match ExprKind::classify(expr)? {
            // Directive prologues ("use strict";) and other bare literals
            // carry no evidence.
            ExprKind::Literal => Ok(()),
            ExprKind::Assignment { operator, left, right } => {
                if operator != "=" {
                    return Err(Error::unsupported(
                        format!("compound assignment operator {operator}"),
                        ast::loc_of(expr).start,
                    ));
                }
                let target = self.resolve(left)?;
                let incoming = self.evaluate(right)?;
                self.vars.set_schema(target, &incoming, &ast::source_tag(expr));
                // Once this dotted path is assigned, treat the key as always
                // present on its parent. A heuristic, not a proof.
                self.vars.set_required(target);
                Ok(())
            }
            ExprKind::Identifier(_)
            | ExprKind::Object(_)
            | ExprKind::Array(_)
            | ExprKind::Member { .. } => Err(Error::unsupported(
                "expression statement is not an assignment",
                ast::loc_of(expr).start,
            )),
        }
    }

    // ------------------------- evaluation -------------------------- //

    /// Evaluate an expression to the schema of its value.
    pub fn evaluate(&mut self, expr: &Value) -> Result<Schema, Error> {
        match ExprKind::classify(expr)? {
            ExprKind::Literal => literal_schema(expr),
            ExprKind::Object(props) => {
                let mut schema = Schema::of_type(TypeTag::Object);
                for prop in props {
                    let loc = ast::loc_of(prop).start;
                    let key_node = prop
                        .get("key")
                        .ok_or_else(|| Error::unsupported("object property without a key", loc))?;
                    let key = static_property_key(key_node)?;
                    let value_node = prop
                        .get("value")
                        .ok_or_else(|| Error::unsupported("object property without a value", loc))?;
                    let value_schema = self.evaluate(value_node)?;
                    schema.properties.insert(key.clone(), value_schema);
                    if !schema.required.contains(&key) {
                        schema.required.push(key);
                    }
                }
                Ok(schema)
            }
            ExprKind::Array(elements) => {
                let mut schema = Schema::of_type(TypeTag::Array);
                let mut element_schemas = Vec::with_capacity(elements.len());
                for element in elements {
                    // Elisions ([1, , 3]) read back as undefined.
                    element_schemas.push(if element.is_null() {
                        Schema::of_type(TypeTag::Undefined)
                    } else {
                        self.evaluate(element)?
                    });
                }
                if !element_schemas.is_empty() {
                    schema.items = Some(Box::new(crate::schema::merge(element_schemas.iter())));
                }
                Ok(schema)
            }
            ExprKind::Identifier(_) | ExprKind::Member { .. } => {
                let id = self.resolve(expr)?;
                Ok(self.vars.schema(id).clone())
            }
            ExprKind::Assignment { .. } => Err(Error::unsupported(
                "assignment in value position",
                ast::loc_of(expr).start,
            )),
        }
    }

    /// Resolve an expression to the variable it denotes.
    pub fn resolve(&mut self, expr: &Value) -> Result<VarId, Error> {
        match ExprKind::classify(expr)? {
            ExprKind::Literal => {
                let schema = literal_schema(expr)?;
                Ok(self.vars.alloc_anon(schema, &ast::source_tag(expr)))
            }
            ExprKind::Identifier(name) => {
                if let Some(id) = self.global.get(name) {
                    return Ok(id);
                }
                // Not an error: note the first reference and synthesize an
                // unconstrained global shared by all later references.
                let start = ast::loc_of(expr).start;
                self.undeclared.entry(name.to_string()).or_insert(start);
                let id = self.vars.alloc_anon(Schema::placeholder(), &ast::source_tag(expr));
                self.global.insert(name.to_string(), id);
                Ok(id)
            }
            ExprKind::Member { object, property, computed } => {
                let base = self.resolve(object)?;
                let exact: Option<String> = if computed {
                    let accessor = self.evaluate(property)?;
                    if accessor.enum_.len() == 1 {
                        literal_key(&accessor.enum_[0])
                    } else {
                        None
                    }
                } else {
                    match ast::kind(property) {
                        Some("Identifier") => property
                            .get("name")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    }
                };
                if self.vars.could_be(base, TypeTag::Array) {
                    if let Some(key) = &exact {
                        if ARRAY_INDEX.is_match(key) {
                            return Ok(self.vars.any_item(base));
                        }
                    }
                }
                if self.vars.could_be(base, TypeTag::Object) || self.vars.could_be(base, TypeTag::Array)
                {
                    return Ok(match exact {
                        Some(key) => self.vars.property(base, &key),
                        None => self.vars.any_property(base),
                    });
                }
                Err(Error::TypeMismatch {
                    what: "member access on a value that can be neither object nor array".into(),
                    loc: ast::loc_of(expr).start,
                })
            }
            ExprKind::Object(_) | ExprKind::Array(_) | ExprKind::Assignment { .. } => {
                Err(Error::unsupported(
                    "expression does not denote a variable",
                    ast::loc_of(expr).start,
                ))
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LITERALS
// ————————————————————————————————————————————————————————————————————————————

/// Schema of a literal node: a scalar type plus a single-element enum, with
/// mirrored bounds for numbers.
fn literal_schema(node: &Value) -> Result<Schema, Error> {
    let loc = ast::loc_of(node).start;
    if node.get("regex").is_some() {
        return Err(Error::UnsupportedLiteral { what: "regex literal".into(), loc });
    }
    match node.get("value") {
        None => Ok(Schema::of_type(TypeTag::Undefined)),
        Some(Value::Null) => Ok(Schema::of_type(TypeTag::Null)),
        Some(value @ Value::Bool(_)) => Ok(Schema {
            types: TypeSet::of(TypeTag::Boolean),
            enum_: vec![value.clone()],
            ..Schema::default()
        }),
        Some(value @ Value::Number(number)) => {
            let Some(n) = number.as_f64() else {
                return Err(Error::UnsupportedLiteral {
                    what: format!("numeric literal {number} out of range"),
                    loc,
                });
            };
            let tag = if n.fract() == 0.0 { TypeTag::Integer } else { TypeTag::Number };
            Ok(Schema {
                types: TypeSet::of(tag),
                enum_: vec![value.clone()],
                minimum: Some(n),
                maximum: Some(n),
                ..Schema::default()
            })
        }
        Some(value @ Value::String(_)) => Ok(Schema {
            types: TypeSet::of(TypeTag::String),
            enum_: vec![value.clone()],
            ..Schema::default()
        }),
        Some(other) => Err(Error::UnsupportedLiteral {
            what: format!("literal value {other}"),
            loc,
        }),
    }
}

/// A static object-literal key: a literal or a bare identifier.
fn static_property_key(key_node: &Value) -> Result<String, Error> {
    let loc = ast::loc_of(key_node).start;
    match ast::kind(key_node) {
        Some("Literal") => key_node
            .get("value")
            .and_then(literal_key)
            .ok_or_else(|| Error::unsupported("non-scalar object key", loc)),
        Some("Identifier") => key_node
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::unsupported("object key without a name", loc)),
        _ => Err(Error::unsupported("computed object keys are not supported", loc)),
    }
}

/// Coerce a scalar literal value to a property-key string.
fn literal_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
