//! JSON-Schema fragments and the union merge.
//!
//! A `Schema` is the engine's value type: replaced wholesale on every
//! update, never mutated in place. `merge` folds an ordered sequence of
//! schemas into one that accepts every value any input accepted (union, not
//! intersection): the same binding has been observed holding each of these
//! shapes across different assignments.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPE TAGS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
    Function,
    Undefined,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Function => "function",
            TypeTag::Undefined => "undefined",
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// An unordered set of primitive type tags a value may take. Empty means
/// unconstrained ("could be anything"), not uninhabited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet(BTreeSet<TypeTag>);

impl TypeSet {
    pub fn of(tag: TypeTag) -> Self {
        TypeSet(BTreeSet::from([tag]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, tag: TypeTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.0.iter().copied()
    }

    /// No declared type means no constraint.
    pub fn could_be(&self, tag: TypeTag) -> bool {
        self.0.is_empty() || self.0.contains(&tag)
    }
}

impl FromIterator<TypeTag> for TypeSet {
    fn from_iter<I: IntoIterator<Item = TypeTag>>(iter: I) -> Self {
        TypeSet(iter.into_iter().collect())
    }
}

impl Serialize for TypeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // A single tag serializes as a bare string, a set as an array.
        if self.0.len() == 1 {
            match self.0.iter().next() {
                Some(tag) => tag.serialize(serializer),
                None => serializer.collect_seq(self.0.iter()),
            }
        } else {
            serializer.collect_seq(self.0.iter())
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA
// ————————————————————————————————————————————————————————————————————————————

/// A JSON-Schema fragment. Fields serialize under their JSON-Schema names and
/// only when meaningful; the debug id and the placeholder marker never do.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "TypeSet::is_empty")]
    pub types: TypeSet,

    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "ser_bound")]
    pub minimum: Option<f64>,
    #[serde(rename = "exclusiveMinimum", skip_serializing_if = "is_false")]
    pub exclusive_minimum: bool,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "ser_bound")]
    pub maximum: Option<f64>,
    #[serde(rename = "exclusiveMaximum", skip_serializing_if = "is_false")]
    pub exclusive_maximum: bool,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,

    /// Debug correlation: `<variable tag> at <line:column>` of the update
    /// that produced this version.
    #[serde(skip)]
    pub id: Option<String>,

    /// "No information yet". Placeholders are discarded by `merge`.
    #[serde(skip)]
    pub placeholder: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Prefer emitting integral bounds as JSON integers.
fn ser_bound<S: Serializer>(v: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(n) if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 => {
            serializer.serialize_i64(*n as i64)
        }
        Some(n) => serializer.serialize_f64(*n),
        // unreachable behind skip_serializing_if
        None => serializer.serialize_none(),
    }
}

impl Schema {
    /// The "no information yet" marker schema.
    pub fn placeholder() -> Self {
        Schema { placeholder: true, ..Schema::default() }
    }

    pub fn of_type(tag: TypeTag) -> Self {
        Schema { types: TypeSet::of(tag), ..Schema::default() }
    }

    pub fn could_be(&self, tag: TypeTag) -> bool {
        self.types.could_be(tag)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// MERGE (union)
// ————————————————————————————————————————————————————————————————————————————

/// Merge an ordered sequence of schemas into their union.
///
/// - Placeholders are discarded; an empty remainder yields a new placeholder
///   and a single remainder an independent copy.
/// - Type tags are unioned; a branch declaring no type makes the union
///   unconstrained, and `number` subsumes `integer`.
/// - Object shape merges key-wise; a branch that does not name a key
///   contributes its `additionalProperties` instead.
/// - Numeric bounds widen: least minimum, greatest maximum, either bound
///   omitted whenever any branch omits it. Exclusive flags travel with the
///   chosen bound.
///
/// `enum`, `required`, `items` and `title` are not combined by the n-way
/// merge; they survive only through the single-schema copy path.
pub fn merge<'a, I>(sequence: I) -> Schema
where
    I: IntoIterator<Item = &'a Schema>,
{
    let seq: Vec<&Schema> = sequence.into_iter().filter(|s| !s.placeholder).collect();
    if seq.is_empty() {
        return Schema::placeholder();
    }
    if seq.len() == 1 {
        return seq[0].clone();
    }

    let mut result = Schema::default();

    // Type-tag union. One untyped branch makes the whole union untyped.
    let mut tags: Option<BTreeSet<TypeTag>> = Some(BTreeSet::new());
    for s in &seq {
        if s.types.is_empty() {
            tags = None;
            break;
        }
        if let Some(set) = &mut tags {
            set.extend(s.types.iter());
        }
    }
    if let Some(mut set) = tags {
        if set.contains(&TypeTag::Number) {
            set.remove(&TypeTag::Integer);
        }
        result.types = set.into_iter().collect();
    }

    // Object shape.
    if result.could_be(TypeTag::Object) {
        for s in &seq {
            for (key, sub) in &s.properties {
                let merged = if let Some(existing) = result.properties.get(key) {
                    merge([existing, sub])
                } else if let Some(extra) = &result.additional_properties {
                    merge([extra.as_ref(), sub])
                } else {
                    sub.clone()
                };
                result.properties.insert(key.clone(), merged);
            }
            if let Some(extra) = &s.additional_properties {
                result.additional_properties = Some(Box::new(match &result.additional_properties {
                    Some(current) => merge([current.as_ref(), extra.as_ref()]),
                    None => extra.as_ref().clone(),
                }));
                // Keys this branch does not name absorb its extras.
                let absorbing: Vec<String> = result
                    .properties
                    .keys()
                    .filter(|key| !s.properties.contains_key(*key))
                    .cloned()
                    .collect();
                for key in absorbing {
                    let merged = match result.properties.get(&key) {
                        Some(existing) => merge([existing, extra.as_ref()]),
                        None => extra.as_ref().clone(),
                    };
                    result.properties.insert(key, merged);
                }
            }
        }
    }

    // Numeric bounds. Both bounds are accumulated symmetrically over the
    // whole sequence; an unbounded branch makes the union unbounded on that
    // side.
    if result.could_be(TypeTag::Number) || result.could_be(TypeTag::Integer) {
        let mut minimum: Option<(f64, bool)> = None;
        let mut minimum_open = false;
        let mut maximum: Option<(f64, bool)> = None;
        let mut maximum_open = false;
        for s in &seq {
            match s.minimum {
                None => minimum_open = true,
                Some(m) => {
                    minimum = Some(match minimum {
                        None => (m, s.exclusive_minimum),
                        Some((current, flag)) => {
                            if m < current {
                                (m, s.exclusive_minimum)
                            } else {
                                (current, flag)
                            }
                        }
                    });
                }
            }
            match s.maximum {
                None => maximum_open = true,
                Some(m) => {
                    maximum = Some(match maximum {
                        None => (m, s.exclusive_maximum),
                        Some((current, flag)) => {
                            if m > current {
                                (m, s.exclusive_maximum)
                            } else {
                                (current, flag)
                            }
                        }
                    });
                }
            }
        }
        if !minimum_open {
            if let Some((m, exclusive)) = minimum {
                result.minimum = Some(m);
                result.exclusive_minimum = exclusive;
            }
        }
        if !maximum_open {
            if let Some((m, exclusive)) = maximum {
                result.maximum = Some(m);
                result.exclusive_maximum = exclusive;
            }
        }
    }

    result
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn string_enum(lit: &str) -> Schema {
        Schema {
            types: TypeSet::of(TypeTag::String),
            enum_: vec![json!(lit)],
            ..Schema::default()
        }
    }

    fn bounded(min: Option<f64>, max: Option<f64>) -> Schema {
        Schema {
            types: TypeSet::of(TypeTag::Integer),
            minimum: min,
            maximum: max,
            ..Schema::default()
        }
    }

    #[test]
    fn merge_of_one_is_an_independent_copy() {
        let s = string_enum("x");
        let merged = merge([&s]);
        assert_eq!(merged, s);
    }

    #[test]
    fn placeholders_are_discarded() {
        assert!(merge([]).placeholder);
        assert!(merge([&Schema::placeholder(), &Schema::placeholder()]).placeholder);

        let s = bounded(Some(1.0), Some(5.0));
        let merged = merge([&Schema::placeholder(), &s]);
        assert_eq!(merged, s);
        assert!(!merged.placeholder);
    }

    #[test]
    fn type_union_is_order_insensitive() {
        let a = string_enum("x");
        let b = bounded(Some(0.0), Some(1.0));
        assert_eq!(merge([&a, &b]).types, merge([&b, &a]).types);
    }

    #[test]
    fn union_rejects_neither_branch() {
        let a = string_enum("x");
        let mut b = bounded(Some(1.0), Some(1.0));
        b.types = TypeSet::of(TypeTag::Number);
        b.enum_ = vec![json!(1)];
        let merged = merge([&a, &b]);
        assert!(merged.types.contains(TypeTag::String));
        assert!(merged.types.contains(TypeTag::Number));
        // No enum constraint survives, so both 'x' and 1 are accepted.
        assert!(merged.enum_.is_empty());
    }

    #[test]
    fn untyped_branch_makes_the_union_untyped() {
        let a = string_enum("x");
        let b = Schema::default();
        assert!(merge([&a, &b]).types.is_empty());
    }

    #[test]
    fn number_subsumes_integer() {
        let a = bounded(None, None);
        let mut b = Schema::of_type(TypeTag::Number);
        b.minimum = Some(0.5);
        b.maximum = Some(0.5);
        let merged = merge([&a, &b]);
        assert!(merged.types.contains(TypeTag::Number));
        assert!(!merged.types.contains(TypeTag::Integer));
    }

    #[test]
    fn bounds_widen() {
        let a = bounded(Some(0.0), Some(10.0));
        let b = bounded(Some(2.0), Some(5.0));
        let merged = merge([&a, &b]);
        assert_eq!(merged.minimum, Some(0.0));
        assert_eq!(merged.maximum, Some(10.0));
    }

    #[test]
    fn missing_bound_absorbs() {
        let a = bounded(Some(0.0), Some(10.0));
        let b = bounded(Some(2.0), None);
        let merged = merge([&a, &b]);
        assert_eq!(merged.minimum, Some(0.0));
        assert_eq!(merged.maximum, None, "one unbounded branch unbounds the union");
    }

    #[test]
    fn exclusive_flags_travel_with_the_chosen_bound() {
        let mut a = bounded(Some(0.0), Some(10.0));
        a.exclusive_minimum = true;
        let b = bounded(Some(2.0), Some(10.0));
        let merged = merge([&a, &b]);
        assert_eq!(merged.minimum, Some(0.0));
        assert!(merged.exclusive_minimum);
        // ties keep the first branch's flag
        assert!(!merged.exclusive_maximum);
    }

    #[test]
    fn object_properties_merge_key_wise() {
        let mut a = Schema::of_type(TypeTag::Object);
        a.properties.insert("x".into(), string_enum("a"));
        let mut b = Schema::of_type(TypeTag::Object);
        b.properties.insert("x".into(), bounded(Some(1.0), Some(1.0)));
        b.properties.insert("y".into(), string_enum("b"));

        let merged = merge([&a, &b]);
        let x = &merged.properties["x"];
        assert!(x.types.contains(TypeTag::String) && x.types.contains(TypeTag::Integer));
        assert!(merged.properties["y"].types.contains(TypeTag::String));
    }

    #[test]
    fn missing_key_contributes_additional_properties() {
        let mut a = Schema::of_type(TypeTag::Object);
        a.properties.insert("x".into(), string_enum("a"));
        let mut b = Schema::of_type(TypeTag::Object);
        b.additional_properties = Some(Box::new(bounded(Some(1.0), Some(1.0))));

        let merged = merge([&a, &b]);
        let x = &merged.properties["x"];
        assert!(x.types.contains(TypeTag::String) && x.types.contains(TypeTag::Integer));
        let extra = merged.additional_properties.expect("merged extras");
        assert!(extra.types.contains(TypeTag::Integer));
    }

    #[test]
    fn serialization_shape() {
        let mut s = Schema::of_type(TypeTag::Integer);
        s.minimum = Some(3.0);
        s.maximum = Some(3.0);
        s.enum_ = vec![json!(3)];
        s.id = Some("x:1:4 at 1:9".into());
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            json!({"type": "integer", "enum": [3], "minimum": 3, "maximum": 3})
        );

        let two = merge([&s, &string_enum("a")]);
        assert_eq!(
            serde_json::to_value(&two).unwrap(),
            json!({"type": ["integer", "string"]})
        );

        assert_eq!(serde_json::to_value(Schema::placeholder()).unwrap(), json!({}));
    }
}
