//! Type descriptors: recursive, tagged descriptions of data shapes.
//!
//! A `Descriptor` is a cheap shared handle. Cloning it shares the node, so one
//! type can sit under many parents (by identity) without being copied. The
//! built-in tags form the closed `Shape` enum; everything else enters through
//! `Shape::Extension`, whose strategy must be registered on the compiler.
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

pub type Fields = IndexMap<String, Descriptor>;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub struct Descriptor(Rc<Shape>);

#[derive(Debug)]
pub enum Shape {
    Always,
    Array { element: Descriptor },
    Boolean,
    Constraint(Constraint),
    Dictionary { value: Descriptor },
    Function,
    Intersect { intersectees: Vec<Descriptor> },
    Literal { value: Value },
    Number,
    Partial { fields: Fields },
    Record { fields: Fields },
    String,
    Tuple { components: Vec<Descriptor> },
    Union { alternatives: Vec<Descriptor> },
    Void,
    Extension(Extension),
}

/// Discriminant of a `Shape`, used to key intersection rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Always,
    Array,
    Boolean,
    Constraint,
    Dictionary,
    Function,
    Intersect,
    Literal,
    Number,
    Partial,
    Record,
    String,
    Tuple,
    Union,
    Void,
    Extension,
}

/// A refinement of `underlying` by `predicate`.
///
/// `correction`, when present, repairs any value of `underlying` into one the
/// predicate accepts; generation then maps through it instead of rejecting.
/// `args` marks the constraint for a registered custom strategy.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub underlying: Descriptor,
    pub predicate: Predicate,
    pub correction: Option<Correction>,
    pub args: Option<Args>,
}

/// Metadata attached to a tagged constraint.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub tag: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub types: IndexMap<String, Descriptor>,
}

#[derive(Clone)]
pub struct Predicate {
    name: String,
    test: Rc<dyn Fn(&Value) -> bool>,
}

#[derive(Clone)]
pub struct Correction {
    name: String,
    apply: Rc<dyn Fn(Value) -> Value>,
}

/// A type outside the built-in tag set. `name` selects the generation
/// strategy, `guard` decides membership.
#[derive(Debug, Clone)]
pub struct Extension {
    pub name: String,
    pub payload: serde_json::Value,
    pub guard: Predicate,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

fn named<K: Into<String>>(fields: impl IntoIterator<Item = (K, Descriptor)>) -> Fields {
    fields.into_iter().map(|(k, t)| (k.into(), t)).collect()
}

impl Descriptor {
    pub fn from_shape(shape: Shape) -> Self { Self(Rc::new(shape)) }

    pub fn always() -> Self { Self::from_shape(Shape::Always) }
    pub fn boolean() -> Self { Self::from_shape(Shape::Boolean) }
    pub fn number() -> Self { Self::from_shape(Shape::Number) }
    pub fn string() -> Self { Self::from_shape(Shape::String) }
    pub fn void() -> Self { Self::from_shape(Shape::Void) }
    pub fn function() -> Self { Self::from_shape(Shape::Function) }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::from_shape(Shape::Literal { value: value.into() })
    }

    pub fn array(element: Descriptor) -> Self {
        Self::from_shape(Shape::Array { element })
    }

    pub fn tuple(components: impl IntoIterator<Item = Descriptor>) -> Self {
        Self::from_shape(Shape::Tuple { components: components.into_iter().collect() })
    }

    pub fn dictionary(value: Descriptor) -> Self {
        Self::from_shape(Shape::Dictionary { value })
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Descriptor)>) -> Self {
        Self::from_shape(Shape::Record { fields: named(fields) })
    }

    pub fn partial<K: Into<String>>(fields: impl IntoIterator<Item = (K, Descriptor)>) -> Self {
        Self::from_shape(Shape::Partial { fields: named(fields) })
    }

    pub fn union(alternatives: impl IntoIterator<Item = Descriptor>) -> Self {
        Self::from_shape(Shape::Union { alternatives: alternatives.into_iter().collect() })
    }

    pub fn intersect(intersectees: impl IntoIterator<Item = Descriptor>) -> Self {
        Self::from_shape(Shape::Intersect { intersectees: intersectees.into_iter().collect() })
    }

    pub fn extension(name: impl Into<String>, payload: serde_json::Value, guard: Predicate) -> Self {
        Self::from_shape(Shape::Extension(Extension { name: name.into(), payload, guard }))
    }

    /// `self | other`
    pub fn or(&self, other: &Descriptor) -> Self {
        Self::union([self.clone(), other.clone()])
    }

    /// `self & other`
    pub fn and(&self, other: &Descriptor) -> Self {
        Self::intersect([self.clone(), other.clone()])
    }

    pub fn with_constraint(&self, predicate: Predicate) -> Self {
        Self::from_shape(Shape::Constraint(Constraint {
            underlying: self.clone(),
            predicate,
            correction: None,
            args: None,
        }))
    }

    pub fn with_correction(&self, predicate: Predicate, correction: Correction) -> Self {
        Self::from_shape(Shape::Constraint(Constraint {
            underlying: self.clone(),
            predicate,
            correction: Some(correction),
            args: None,
        }))
    }

    /// A constraint tagged for a custom generation strategy.
    pub fn custom(&self, predicate: Predicate, args: Args) -> Self {
        Self::from_shape(Shape::Constraint(Constraint {
            underlying: self.clone(),
            predicate,
            correction: None,
            args: Some(args),
        }))
    }
}

impl Args {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), ..Self::default() }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_type(mut self, name: impl Into<String>, ty: Descriptor) -> Self {
        self.types.insert(name.into(), ty);
        self
    }
}

impl Predicate {
    pub fn new(name: impl Into<String>, test: impl Fn(&Value) -> bool + 'static) -> Self {
        Self { name: name.into(), test: Rc::new(test) }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn test(&self, value: &Value) -> bool { (self.test)(value) }
}

impl Correction {
    pub fn new(name: impl Into<String>, apply: impl Fn(Value) -> Value + 'static) -> Self {
        Self { name: name.into(), apply: Rc::new(apply) }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn apply(&self, value: Value) -> Value { (self.apply)(value) }
}

// ————————————————————————————————————————————————————————————————————————————
// INSPECTION
// ————————————————————————————————————————————————————————————————————————————

impl Descriptor {
    pub fn shape(&self) -> &Shape { &self.0 }

    pub fn tag(&self) -> Tag {
        match self.shape() {
            Shape::Always => Tag::Always,
            Shape::Array { .. } => Tag::Array,
            Shape::Boolean => Tag::Boolean,
            Shape::Constraint(_) => Tag::Constraint,
            Shape::Dictionary { .. } => Tag::Dictionary,
            Shape::Function => Tag::Function,
            Shape::Intersect { .. } => Tag::Intersect,
            Shape::Literal { .. } => Tag::Literal,
            Shape::Number => Tag::Number,
            Shape::Partial { .. } => Tag::Partial,
            Shape::Record { .. } => Tag::Record,
            Shape::String => Tag::String,
            Shape::Tuple { .. } => Tag::Tuple,
            Shape::Union { .. } => Tag::Union,
            Shape::Void => Tag::Void,
            Shape::Extension(_) => Tag::Extension,
        }
    }

    /// The `args.tag` of a tagged constraint.
    pub fn custom_tag(&self) -> Option<&str> {
        match self.shape() {
            Shape::Constraint(Constraint { args: Some(args), .. }) if !args.tag.is_empty() => Some(args.tag.as_str()),
            _ => None,
        }
    }

    /// Same node, not merely an equal one.
    pub fn ptr_eq(a: &Descriptor, b: &Descriptor) -> bool { Rc::ptr_eq(&a.0, &b.0) }

    /// Membership test.
    pub fn guard(&self, value: &Value) -> bool {
        match self.shape() {
            Shape::Always => true,
            Shape::Array { element } => value
                .as_array()
                .is_some_and(|xs| xs.iter().all(|x| element.guard(x))),
            Shape::Boolean => matches!(value, Value::Bool(_)),
            Shape::Constraint(c) => c.underlying.guard(value) && c.predicate.test(value),
            Shape::Dictionary { value: ty } => value
                .as_object()
                .is_some_and(|map| map.values().all(|x| ty.guard(x))),
            Shape::Function => matches!(value, Value::Function(_)),
            Shape::Intersect { intersectees } => intersectees.iter().all(|t| t.guard(value)),
            Shape::Literal { value: lit } => value == lit,
            Shape::Number => matches!(value, Value::Number(_)),
            // an absent member satisfies any partial field
            Shape::Partial { fields } => value.as_object().is_some_and(|map| {
                fields.iter().all(|(k, t)| match map.get(k) {
                    None | Some(Value::Undefined) => true,
                    Some(x) => t.guard(x),
                })
            }),
            Shape::Record { fields } => {
                matches!(value, Value::Object(_))
                    && fields.iter().all(|(k, t)| t.guard(value.member(k)))
            }
            Shape::String => matches!(value, Value::String(_)),
            Shape::Tuple { components } => value.as_array().is_some_and(|xs| {
                xs.len() == components.len()
                    && xs.iter().zip(components).all(|(x, t)| t.guard(x))
            }),
            Shape::Union { alternatives } => alternatives.iter().any(|t| t.guard(value)),
            Shape::Void => matches!(value, Value::Undefined | Value::Null),
            Shape::Extension(ext) => ext.guard.test(value),
        }
    }
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Always => "always",
            Tag::Array => "array",
            Tag::Boolean => "boolean",
            Tag::Constraint => "constraint",
            Tag::Dictionary => "dictionary",
            Tag::Function => "function",
            Tag::Intersect => "intersect",
            Tag::Literal => "literal",
            Tag::Number => "number",
            Tag::Partial => "partial",
            Tag::Record => "record",
            Tag::String => "string",
            Tag::Tuple => "tuple",
            Tag::Union => "union",
            Tag::Void => "void",
            Tag::Extension => "extension",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.shape().fmt(f) }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

impl fmt::Debug for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Correction({})", self.name)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value { Value::from(j) }

    #[test]
    fn record_requires_declared_keys_but_tolerates_extra_ones() {
        let point = Descriptor::record([("x", Descriptor::number()), ("y", Descriptor::number())]);
        assert!(point.guard(&v(json!({"x": 1, "y": 2}))));
        assert!(point.guard(&v(json!({"x": 1, "y": 2, "z": "extra"}))));
        assert!(!point.guard(&v(json!({"x": 1}))));
        assert!(!point.guard(&v(json!([1, 2]))));
    }

    #[test]
    fn void_record_field_accepts_a_missing_key() {
        let t = Descriptor::record([("note", Descriptor::string().or(&Descriptor::void()))]);
        assert!(t.guard(&v(json!({}))));
        assert!(t.guard(&v(json!({"note": null}))));
        assert!(!t.guard(&v(json!({"note": 3}))));
    }

    #[test]
    fn partial_accepts_absent_and_rejects_wrong_types() {
        let t = Descriptor::partial([("name", Descriptor::string())]);
        assert!(t.guard(&v(json!({}))));
        assert!(t.guard(&v(json!({"name": "n"}))));
        assert!(!t.guard(&v(json!({"name": 1}))));
        let mut map = IndexMap::new();
        map.insert("name".to_string(), Value::Undefined);
        assert!(t.guard(&Value::Object(map)));
    }

    #[test]
    fn tuple_arity_is_exact() {
        let t = Descriptor::tuple([Descriptor::number(), Descriptor::string()]);
        assert!(t.guard(&v(json!([1, "a"]))));
        assert!(!t.guard(&v(json!([1]))));
        assert!(!t.guard(&v(json!([1, "a", true]))));
    }

    #[test]
    fn union_and_intersect_compose_sub_guards() {
        let ab = Descriptor::literal("a").or(&Descriptor::literal("b"));
        assert!(ab.guard(&Value::from("b")));
        assert!(!ab.guard(&Value::from("c")));

        let both = Descriptor::record([("x", Descriptor::number())])
            .and(&Descriptor::partial([("y", Descriptor::string())]));
        assert!(both.guard(&v(json!({"x": 1}))));
        assert!(both.guard(&v(json!({"x": 1, "y": "s"}))));
        assert!(!both.guard(&v(json!({"x": 1, "y": 2}))));
    }

    #[test]
    fn constraint_checks_underlying_before_predicate() {
        let positive = Descriptor::number().with_constraint(Predicate::new("positive", |v| {
            matches!(v, Value::Number(n) if *n > 0.0)
        }));
        assert!(positive.guard(&Value::Number(2.0)));
        assert!(!positive.guard(&Value::Number(-2.0)));
        assert!(!positive.guard(&Value::from("2")));
        assert_eq!(positive.tag(), Tag::Constraint);
        assert_eq!(positive.custom_tag(), None);
    }

    #[test]
    fn shared_nodes_keep_identity() {
        let vector = Descriptor::tuple([Descriptor::number(), Descriptor::number()]);
        let a = Descriptor::record([("at", vector.clone())]);
        let Shape::Record { fields } = a.shape() else { panic!("record expected") };
        assert!(Descriptor::ptr_eq(&fields["at"], &vector));
    }
}
