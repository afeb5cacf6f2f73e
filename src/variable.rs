//! The mutable variable graph.
//!
//! A `Variable` binds a name or access path to its current `Schema` and
//! lazily grows property / any-property / any-item children as accesses are
//! discovered. Nodes live in a `VarStore` arena and are addressed by stable
//! `VarId`s; every write goes through the store, re-merges against the
//! parent's *current* slot schema, and writes the result back into both the
//! node and the parent. A handle taken early still writes through correctly
//! after later updates, including after an any-property fold.

use indexmap::IndexMap;

use crate::ast::Loc;
use crate::schema::{self, Schema, TypeTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

/// Which slot of the parent schema a child variable is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Property(String),
    AnyProperty,
    AnyItem,
}

#[derive(Debug)]
struct VarNode {
    /// Identity tag: `name:line:column` for declared variables, `$anonN$`
    /// otherwise.
    tag: String,
    origin: Option<(VarId, Slot)>,
    schema: Schema,
    /// Named-property children. Mutually exclusive with `any_prop`.
    named: IndexMap<String, VarId>,
    any_prop: Option<VarId>,
    any_item: Option<VarId>,
}

#[derive(Debug, Default)]
pub struct VarStore {
    nodes: Vec<VarNode>,
    anon_counter: usize,
}

impl VarStore {
    pub fn new() -> Self {
        VarStore::default()
    }

    /// Register a declared variable; the tag records the declaration site.
    pub fn alloc_named(&mut self, name: &str, loc: &Loc, schema: Schema) -> VarId {
        let tag = format!("{name}:{}:{}", loc.start.line, loc.start.column);
        let at = loc.end.to_string();
        self.alloc(tag, None, schema, &at)
    }

    /// Register an anonymous variable (literals, synthesized globals).
    pub fn alloc_anon(&mut self, schema: Schema, at: &str) -> VarId {
        let tag = format!("$anon{}$", self.anon_counter);
        self.anon_counter += 1;
        self.alloc(tag, None, schema, at)
    }

    fn alloc(&mut self, tag: String, origin: Option<(VarId, Slot)>, schema: Schema, at: &str) -> VarId {
        let id = VarId(self.nodes.len());
        self.nodes.push(VarNode {
            tag,
            origin,
            schema,
            named: IndexMap::new(),
            any_prop: None,
            any_item: None,
        });
        self.cascade(id, at);
        id
    }

    fn alloc_child(&mut self, parent: VarId, slot: Slot, schema: Schema) -> VarId {
        let tag = format!("$anon{}$", self.anon_counter);
        self.anon_counter += 1;
        self.alloc(tag, Some((parent, slot)), schema, "declaration")
    }

    pub fn schema(&self, id: VarId) -> &Schema {
        &self.nodes[id.0].schema
    }

    pub fn could_be(&self, id: VarId, tag: TypeTag) -> bool {
        self.nodes[id.0].schema.could_be(tag)
    }

    /// Fold new evidence into a variable.
    ///
    /// The current state is read from the parent's slot (not a snapshot held
    /// by the node), merged with `incoming`, written back to both, and then
    /// cascaded into property/any-property children.
    pub fn set_schema(&mut self, id: VarId, incoming: &Schema, at: &str) {
        let origin = self.effective_origin(id);
        let current = match &origin {
            Some((parent, slot)) => self
                .slot_schema(*parent, slot)
                .cloned()
                .unwrap_or_else(Schema::placeholder),
            None => self.nodes[id.0].schema.clone(),
        };
        let mut merged = schema::merge([&current, incoming]);
        merged.id = Some(format!("{} at {}", self.nodes[id.0].tag, at));
        self.nodes[id.0].schema = merged.clone();
        if let Some((parent, slot)) = &origin {
            self.write_slot(*parent, slot, merged);
            self.sync_upward(*parent);
        }
        self.cascade(id, at);
    }

    /// Mark the accessed key required on the parent. Only meaningful for
    /// named-property children; a no-op for roots and any-* children.
    pub fn set_required(&mut self, id: VarId) {
        if let Some((parent, Slot::Property(key))) = self.nodes[id.0].origin.clone() {
            if self.nodes[parent.0].any_prop.is_some() {
                return;
            }
            let required = &mut self.nodes[parent.0].schema.required;
            if !required.contains(&key) {
                required.push(key);
            }
            self.sync_upward(parent);
        }
    }

    /// The child variable bound to `schema.properties[key]`. Once a dynamic
    /// access has been observed, every named access degrades to the
    /// any-property child instead.
    pub fn property(&mut self, id: VarId, key: &str) -> VarId {
        if let Some(child) = self.nodes[id.0].any_prop {
            return child;
        }
        if let Some(child) = self.nodes[id.0].named.get(key) {
            return *child;
        }
        let sub = self.nodes[id.0]
            .schema
            .properties
            .get(key)
            .cloned()
            .unwrap_or_else(Schema::placeholder);
        self.nodes[id.0]
            .schema
            .properties
            .entry(key.to_string())
            .or_insert_with(|| sub.clone());
        let child = self.alloc_child(id, Slot::Property(key.to_string()), sub);
        self.nodes[id.0].named.insert(key.to_string(), child);
        self.sync_upward(id);
        child
    }

    /// The child variable bound to `schema.additionalProperties`.
    ///
    /// The first call folds all named-property children into one schema,
    /// discards the per-key tracking and clears `properties`. Irreversible.
    /// An `additionalProperties` schema already present on the variable wins
    /// over the folded one.
    pub fn any_property(&mut self, id: VarId) -> VarId {
        if let Some(child) = self.nodes[id.0].any_prop {
            return child;
        }
        let folded = if self.nodes[id.0].named.is_empty() {
            Schema::placeholder()
        } else {
            let children: Vec<Schema> = self.nodes[id.0]
                .named
                .values()
                .map(|child| self.nodes[child.0].schema.clone())
                .collect();
            schema::merge(children.iter())
        };
        self.nodes[id.0].named.clear();
        self.nodes[id.0].schema.properties.clear();
        let bound = match self.nodes[id.0].schema.additional_properties.take() {
            Some(existing) => *existing,
            None => folded,
        };
        self.nodes[id.0].schema.additional_properties = Some(Box::new(bound.clone()));
        let child = self.alloc_child(id, Slot::AnyProperty, bound);
        self.nodes[id.0].any_prop = Some(child);
        self.sync_upward(id);
        child
    }

    /// The child variable bound to `schema.items`. Arrays are modeled as
    /// homogeneous; there is never per-index state to fold.
    pub fn any_item(&mut self, id: VarId) -> VarId {
        if let Some(child) = self.nodes[id.0].any_item {
            return child;
        }
        let bound = match self.nodes[id.0].schema.items.take() {
            Some(existing) => *existing,
            None => Schema::placeholder(),
        };
        self.nodes[id.0].schema.items = Some(Box::new(bound.clone()));
        let child = self.alloc_child(id, Slot::AnyItem, bound);
        self.nodes[id.0].any_item = Some(child);
        self.sync_upward(id);
        child
    }

    // ------------------------- internals -------------------------- //

    /// Write each node's updated schema back into its own parent slot, all
    /// the way up to a root. Nested slot writes are invisible at the root
    /// without this: a node's schema and the parent slot holding it are
    /// separate values, not one aliased object.
    fn sync_upward(&mut self, mut id: VarId) {
        while let Some((parent, slot)) = self.effective_origin(id) {
            let schema = self.nodes[id.0].schema.clone();
            // A degraded origin points at the fold target, which also holds
            // the other folded children; merge rather than overwrite.
            let degraded = slot == Slot::AnyProperty
                && matches!(self.nodes[id.0].origin, Some((_, Slot::Property(_))));
            let updated = if degraded {
                match self.slot_schema(parent, &slot) {
                    Some(current) => schema::merge([current, &schema]),
                    None => schema,
                }
            } else {
                schema
            };
            self.write_slot(parent, &slot, updated);
            id = parent;
        }
    }

    /// Push the schema's object shape into child variables, creating them on
    /// demand.
    fn cascade(&mut self, id: VarId, at: &str) {
        let props: Vec<(String, Schema)> = self.nodes[id.0]
            .schema
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, sub) in props {
            let child = self.property(id, &key);
            // A fold may already have happened; the named write degraded to
            // the any-property child, which re-merges below.
            self.set_schema(child, &sub, at);
        }
        let extra = self.nodes[id.0].schema.additional_properties.clone();
        if let Some(sub) = extra {
            let child = self.any_property(id);
            self.set_schema(child, &sub, at);
        }
    }

    /// A named-property origin degrades to the any-property slot once the
    /// parent has folded; a handle captured before the fold keeps working.
    fn effective_origin(&self, id: VarId) -> Option<(VarId, Slot)> {
        match &self.nodes[id.0].origin {
            Some((parent, Slot::Property(_))) if self.nodes[parent.0].any_prop.is_some() => {
                Some((*parent, Slot::AnyProperty))
            }
            other => other.clone(),
        }
    }

    fn slot_schema(&self, parent: VarId, slot: &Slot) -> Option<&Schema> {
        let node = &self.nodes[parent.0];
        match slot {
            Slot::Property(key) => node.schema.properties.get(key),
            Slot::AnyProperty => node.schema.additional_properties.as_deref(),
            Slot::AnyItem => node.schema.items.as_deref(),
        }
    }

    fn write_slot(&mut self, parent: VarId, slot: &Slot, schema: Schema) {
        let node = &mut self.nodes[parent.0];
        match slot {
            Slot::Property(key) => {
                node.schema.properties.insert(key.clone(), schema);
            }
            Slot::AnyProperty => node.schema.additional_properties = Some(Box::new(schema)),
            Slot::AnyItem => node.schema.items = Some(Box::new(schema)),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
