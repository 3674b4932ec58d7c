//! Intersection resolver.
//!
//! Given the intersectees of an `intersect`, pick the first rule whose tag set
//! covers every intersectee's tag, and let it build a targeted generator. When
//! nothing matches, draw from any intersectee and keep only values every
//! intersectee accepts. Either way the result passes through a final guard
//! over all intersectees, so nothing unchecked leaves this module.
//!
//! Built-in rules, in order:
//! 1. `{record, partial}`: merge fields, intersect per-field declarations.
//! 2. `{union}`: flatten all alternatives into one candidate pool.
//! 3. `{constraint}`: look up the custom intersection registry by `args.tag`.
use std::collections::BTreeSet;
use std::rc::Rc;

use indexmap::IndexMap;
use proptest::prelude::*;
use proptest::sample::Index;
use tracing::debug;

use super::{Compiler, IntersectStrategy};
use crate::algebra::{self, Generator, JSON_DEPTH};
use crate::descriptor::{Descriptor, Shape, Tag};
use crate::error::{GenError, GenResult};

#[derive(Clone)]
pub struct IntersectionRule {
    pub name: String,
    pub tags: BTreeSet<Tag>,
    pub handler: IntersectStrategy,
}

#[derive(Clone)]
pub struct CustomIntersection {
    pub tags: BTreeSet<String>,
    pub handler: IntersectStrategy,
}

impl IntersectionRule {
    pub fn new(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = Tag>,
        handler: impl Fn(&Compiler, &[Descriptor]) -> GenResult<Generator> + 'static,
    ) -> Self {
        Self { name: name.into(), tags: tags.into_iter().collect(), handler: Rc::new(handler) }
    }
}

pub(super) fn builtin_rules() -> Vec<IntersectionRule> {
    vec![
        IntersectionRule::new("merge records", [Tag::Record, Tag::Partial], merge_records),
        IntersectionRule::new("flatten unions", [Tag::Union], flatten_unions),
        IntersectionRule::new("dispatch tagged constraints", [Tag::Constraint], dispatch_constraints),
    ]
}

// ------------------------------- Resolve ---------------------------------- //

pub fn resolve(compiler: &Compiler, intersectees: &[Descriptor]) -> GenResult<Generator> {
    let flat = flatten(intersectees);
    let intersectees = flat.as_slice();
    let candidate = match intersectees {
        [] => return Ok(algebra::json(JSON_DEPTH)),
        [only] => compiler.compile(only)?,
        _ => {
            let tags: BTreeSet<Tag> = intersectees.iter().map(Descriptor::tag).collect();
            match compiler.rules.iter().find(|rule| tags.is_subset(&rule.tags)) {
                Some(rule) => {
                    debug!(rule = %rule.name, tags = %label(&tags), "targeted intersection");
                    (rule.handler)(compiler, intersectees)?
                }
                None => generic(compiler, intersectees)?,
            }
        }
    };
    Ok(algebra::guarded(candidate, "intersection guard", intersectees.to_vec()))
}

/// Nested intersects dissolve into their parts; the guard is a conjunction
/// either way.
fn flatten(intersectees: &[Descriptor]) -> Vec<Descriptor> {
    let mut out = Vec::with_capacity(intersectees.len());
    for t in intersectees {
        match t.shape() {
            Shape::Intersect { intersectees } => out.extend(flatten(intersectees)),
            _ => out.push(t.clone()),
        }
    }
    out
}

/// Draw from any intersectee, keep what all of them accept.
pub fn generic(compiler: &Compiler, intersectees: &[Descriptor]) -> GenResult<Generator> {
    let tags: BTreeSet<Tag> = intersectees.iter().map(Descriptor::tag).collect();
    debug!(tags = %label(&tags), "generic intersection by rejection");
    let options = compiler.compile_all(intersectees)?;
    if options.is_empty() {
        return Ok(algebra::json(JSON_DEPTH));
    }
    let whence = format!("no draw satisfied every intersectee of `{}`", label(&tags));
    Ok(algebra::guarded(algebra::one_of(options), whence, intersectees.to_vec()))
}

fn label(tags: &BTreeSet<Tag>) -> String {
    tags.iter().map(Tag::as_str).collect::<Vec<_>>().join(" & ")
}

// ---------------------------- Record merge -------------------------------- //

struct FieldDecls {
    types: Vec<Descriptor>,
    required: bool,
}

fn merge_records(compiler: &Compiler, intersectees: &[Descriptor]) -> GenResult<Generator> {
    let mut merged: IndexMap<String, FieldDecls> = IndexMap::new();
    for t in intersectees {
        let (fields, required) = match t.shape() {
            Shape::Record { fields } => (fields, true),
            Shape::Partial { fields } => (fields, false),
            _ => return Err(GenError::UnsupportedType { tag: t.tag().to_string() }),
        };
        for (name, ty) in fields {
            let decls = merged
                .entry(name.clone())
                .or_insert_with(|| FieldDecls { types: Vec::new(), required: false });
            decls.types.push(ty.clone());
            decls.required |= required;
        }
    }

    let mut optional = Vec::new();
    let mut fields = Vec::with_capacity(merged.len());
    for (name, decls) in merged {
        let field = match decls.types.as_slice() {
            [only] => compiler.compile(only)?,
            several => compiler.compile(&Descriptor::intersect(several.iter().cloned()))?,
        };
        let field = algebra::guarded(field, format!("field `{name}` rejected"), decls.types);
        if decls.required {
            fields.push((name, field));
        } else {
            optional.push(name.clone());
            fields.push((name, algebra::optional(field)));
        }
    }
    Ok(algebra::drop_absent(algebra::record_of(fields), optional))
}

// ---------------------------- Union flatten ------------------------------- //

fn flatten_unions(compiler: &Compiler, intersectees: &[Descriptor]) -> GenResult<Generator> {
    let mut pool: Vec<Descriptor> = Vec::new();
    for t in intersectees {
        let Shape::Union { alternatives } = t.shape() else {
            return Err(GenError::UnsupportedType { tag: t.tag().to_string() });
        };
        if alternatives.is_empty() {
            return Err(GenError::Uninhabited { tag: Tag::Union.to_string() });
        }
        for alt in alternatives {
            // shared alternatives are drawn once
            if !pool.iter().any(|seen| Descriptor::ptr_eq(seen, alt)) {
                pool.push(alt.clone());
            }
        }
    }
    let candidates = compiler.compile_all(&pool)?;
    let types = intersectees.to_vec();
    let whence: Rc<str> = Rc::from("no flattened alternative satisfied every union");
    let generator = (candidates, any::<Index>())
        .prop_filter_map(whence.to_string(), move |(drawn, start)| {
            let n = drawn.len();
            let offset = start.index(n);
            let hit = (0..n)
                .map(|i| (offset + i) % n)
                .find(|&i| types.iter().all(|t| t.guard(&drawn[i])))
                .map(|i| drawn[i].clone());
            if hit.is_none() {
                algebra::note_rejection(&whence);
            }
            hit
        })
        .boxed();
    Ok(generator)
}

// ------------------------- Constraint dispatch ---------------------------- //

fn dispatch_constraints(compiler: &Compiler, intersectees: &[Descriptor]) -> GenResult<Generator> {
    // every intersectee must carry a tag for a custom entry to apply
    let tags: Option<BTreeSet<String>> = intersectees
        .iter()
        .map(|t| t.custom_tag().map(str::to_string))
        .collect();
    if let Some(tags) = tags {
        let found = compiler
            .custom_intersections
            .iter()
            .find(|entry| tags.is_subset(&entry.tags));
        if let Some(entry) = found {
            debug!(?tags, "custom intersection");
            return (entry.handler)(compiler, intersectees);
        }
    }
    generic(compiler, intersectees)
}

// ------------------------------- Tests ------------------------------------ //
