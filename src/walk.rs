//! Generic pre-order traversal over syntax-tree values.
//!
//! A "node" is any JSON object carrying a `"type"` key. Children are found
//! the way the trees are actually shaped: object values that are nodes, and
//! arrays whose elements are nodes. The visitor returns an explicit
//! `Visit::Descend`/`Visit::Prune` signal rather than a magic boolean, and
//! may fail, which aborts the whole traversal.

use serde_json::Value;

use crate::ast;
use crate::error::Error;

/// Cap on tree nesting; traversal fails once it is exceeded.
pub const MAX_DEPTH: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Continue into this node's children.
    Descend,
    /// Skip this node's children (e.g. a nested function body).
    Prune,
}

/// Whether a value is a tree node (an object with a kind discriminator).
pub fn is_node(v: &Value) -> bool {
    v.as_object().is_some_and(|m| m.contains_key("type"))
}

/// Direct child nodes of `node`, in key order, flattening node arrays.
pub fn child_nodes(node: &Value) -> Vec<&Value> {
    let mut out = Vec::new();
    if let Some(map) = node.as_object() {
        for child in map.values() {
            if is_node(child) {
                out.push(child);
            } else if let Some(items) = child.as_array() {
                out.extend(items.iter().filter(|el| is_node(el)));
            }
        }
    }
    out
}

/// Visit every descendant node of `root` in pre-order. The visitor receives
/// the node, its JSON-Pointer path relative to `root`, and the ancestor
/// chain (nearest last; `root` first). `root` itself is not visited.
pub fn traverse<'a, F>(root: &'a Value, visit: &mut F) -> Result<(), Error>
where
    F: FnMut(&'a Value, &str, &[&'a Value]) -> Result<Visit, Error>,
{
    let mut ancestors: Vec<&'a Value> = Vec::new();
    walk_into(root, "", &mut ancestors, visit)
}

fn walk_into<'a, F>(
    node: &'a Value,
    pointer: &str,
    ancestors: &mut Vec<&'a Value>,
    visit: &mut F,
) -> Result<(), Error>
where
    F: FnMut(&'a Value, &str, &[&'a Value]) -> Result<Visit, Error>,
{
    if ancestors.len() >= MAX_DEPTH {
        return Err(Error::unsupported(
            format!("tree nesting exceeds the traversal depth limit ({MAX_DEPTH})"),
            ast::loc_of(node).start,
        ));
    }
    ancestors.push(node);
    let result = (|| {
        let Some(map) = node.as_object() else { return Ok(()) };
        for (key, child) in map {
            let child_pointer = format!("{pointer}/{}", escape(key));
            if is_node(child) {
                if visit(child, &child_pointer, ancestors)? == Visit::Descend {
                    walk_into(child, &child_pointer, ancestors, visit)?;
                }
            } else if let Some(items) = child.as_array() {
                for (index, element) in items.iter().enumerate() {
                    if is_node(element) {
                        let element_pointer = format!("{child_pointer}/{index}");
                        if visit(element, &element_pointer, ancestors)? == Visit::Descend {
                            walk_into(element, &element_pointer, ancestors, visit)?;
                        }
                    }
                }
            }
        }
        Ok(())
    })();
    ancestors.pop();
    result
}

/// JSON-Pointer token escaping (RFC 6901): `~` → `~0`, `/` → `~1`.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn program() -> Value {
        json!({
            "type": "Program",
            "body": [
                {"type": "ExpressionStatement", "expression": {"type": "Literal", "value": 1}},
                {"type": "EmptyStatement"}
            ]
        })
    }

    #[test]
    fn preorder_with_pointers() {
        let tree = program();
        let mut seen = Vec::new();
        traverse(&tree, &mut |node, pointer, ancestors| {
            seen.push((ast::kind(node).unwrap_or("?").to_string(), pointer.to_string()));
            assert_eq!(ast::kind(ancestors[0]), Some("Program"));
            Ok(Visit::Descend)
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                ("ExpressionStatement".to_string(), "/body/0".to_string()),
                ("Literal".to_string(), "/body/0/expression".to_string()),
                ("EmptyStatement".to_string(), "/body/1".to_string()),
            ]
        );
    }

    #[test]
    fn prune_skips_children() {
        let tree = program();
        let mut seen = Vec::new();
        traverse(&tree, &mut |node, _, _| {
            seen.push(ast::kind(node).unwrap_or("?").to_string());
            Ok(Visit::Prune)
        })
        .unwrap();
        assert_eq!(seen, vec!["ExpressionStatement", "EmptyStatement"]);
    }

    #[test]
    fn visitor_errors_abort() {
        let tree = program();
        let result = traverse(&tree, &mut |node, _, _| {
            if ast::kind(node) == Some("Literal") {
                Err(Error::unsupported("stop here", ast::loc_of(node).start))
            } else {
                Ok(Visit::Descend)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        let tree = json!({
            "type": "Root",
            "odd/key~name": {"type": "Child"}
        });
        let mut pointers = Vec::new();
        traverse(&tree, &mut |_, pointer, _| {
            pointers.push(pointer.to_string());
            Ok(Visit::Descend)
        })
        .unwrap();
        assert_eq!(pointers, vec!["/odd~1key~0name"]);
    }
}
