//! Generator compiler: descriptor in, generator out.
//!
//! `Compiler` is the caller-owned context that holds every extension table.
//! `compile` is the single recursive entry point: strategies that need a
//! sub-generator call back into it, so registrations made at any time are
//! honored by every later compilation.
//!
//! Dispatch:
//! - built-in shapes: exhaustive `match` below;
//! - `constraint`: custom constraint registry when tagged, otherwise filter
//!   (or map through the correction);
//! - `intersect`: rule table, then generic guarded fallback (see `intersect`);
//! - `extension`: base strategy table, keyed by extension name.
pub mod intersect;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::algebra::{self, Generator, DEFAULT_MAX_SIZE, JSON_DEPTH};
use crate::descriptor::{Constraint, Descriptor, Extension, Fields, Shape, Tag};
use crate::error::{GenError, GenResult};
use crate::value::Value;

pub use intersect::{CustomIntersection, IntersectionRule};

pub type ExtensionStrategy = Rc<dyn Fn(&Compiler, &Extension) -> GenResult<Generator>>;
pub type ConstraintStrategy = Rc<dyn Fn(&Compiler, &Constraint) -> GenResult<Generator>>;
pub type IntersectStrategy = Rc<dyn Fn(&Compiler, &[Descriptor]) -> GenResult<Generator>>;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone)]
pub struct Compiler {
    /// base strategy table for `extension` names
    strategies: HashMap<String, ExtensionStrategy>,
    /// custom constraint registry, keyed by `args.tag`
    custom_constraints: HashMap<String, ConstraintStrategy>,
    /// built-in rules first, custom rules appended after
    rules: Vec<IntersectionRule>,
    builtin_rules: usize,
    /// custom intersection registry, keyed by sets of `args.tag`
    custom_intersections: Vec<CustomIntersection>,
    max_size: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRATION
// ————————————————————————————————————————————————————————————————————————————

impl Compiler {
    pub fn new() -> Self {
        let rules = intersect::builtin_rules();
        Self {
            strategies: HashMap::new(),
            custom_constraints: HashMap::new(),
            builtin_rules: rules.len(),
            rules,
            custom_intersections: Vec::new(),
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    /// Upper bound on generated collection lengths.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn max_size(&self) -> usize { self.max_size }

    /// Strategy for `extension` descriptors named `name`. Last write wins.
    pub fn register_strategy(
        &mut self,
        name: impl Into<String>,
        strategy: impl Fn(&Compiler, &Extension) -> GenResult<Generator> + 'static,
    ) {
        let name = name.into();
        debug!(%name, "registered extension strategy");
        self.strategies.insert(name, Rc::new(strategy));
    }

    /// Strategy for constraints whose `args.tag` is `tag`. Last write wins.
    pub fn register_custom_constraint(
        &mut self,
        tag: impl Into<String>,
        strategy: impl Fn(&Compiler, &Constraint) -> GenResult<Generator> + 'static,
    ) {
        let tag = tag.into();
        debug!(%tag, "registered custom constraint strategy");
        self.custom_constraints.insert(tag, Rc::new(strategy));
    }

    /// Targeted strategy for intersections whose tags all fall in `tags`.
    ///
    /// Custom rules run after the built-in ones. Registering the same tag set
    /// again replaces the earlier custom rule in place.
    pub fn register_intersection_rule(
        &mut self,
        name: impl Into<String>,
        tags: impl IntoIterator<Item = Tag>,
        strategy: impl Fn(&Compiler, &[Descriptor]) -> GenResult<Generator> + 'static,
    ) {
        let rule = IntersectionRule::new(name, tags, strategy);
        debug!(rule = %rule.name, "registered intersection rule");
        match self.rules[self.builtin_rules..].iter().position(|r| r.tags == rule.tags) {
            Some(i) => self.rules[self.builtin_rules + i] = rule,
            None => self.rules.push(rule),
        }
    }

    /// Strategy for intersections of tagged constraints whose `args.tag`s all
    /// fall in `tags`. Same tag set replaces in place; otherwise appended.
    pub fn register_custom_intersection<S: Into<String>>(
        &mut self,
        tags: impl IntoIterator<Item = S>,
        strategy: impl Fn(&Compiler, &[Descriptor]) -> GenResult<Generator> + 'static,
    ) {
        let entry = CustomIntersection {
            tags: tags.into_iter().map(Into::into).collect::<BTreeSet<String>>(),
            handler: Rc::new(strategy),
        };
        debug!(tags = ?entry.tags, "registered custom intersection");
        match self.custom_intersections.iter().position(|c| c.tags == entry.tags) {
            Some(i) => self.custom_intersections[i] = entry,
            None => self.custom_intersections.push(entry),
        }
    }
}

impl Default for Compiler {
    fn default() -> Self { Self::new() }
}

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

impl Compiler {
    pub fn compile(&self, descriptor: &Descriptor) -> GenResult<Generator> {
        trace!(tag = %descriptor.tag(), "compiling");
        let size = self.max_size;
        Ok(match descriptor.shape() {
            Shape::Always => algebra::json(JSON_DEPTH),
            Shape::Array { element } => algebra::array(self.compile(element)?, size),
            Shape::Boolean => algebra::boolean(),
            Shape::Constraint(c) => self.compile_constraint(c)?,
            Shape::Dictionary { value } => algebra::dictionary(self.compile(value)?, size),
            Shape::Function => algebra::function(),
            Shape::Intersect { intersectees } => intersect::resolve(self, intersectees)?,
            Shape::Literal { value } => algebra::constant(value.clone()),
            Shape::Number => algebra::number(),
            Shape::Partial { fields } => self.compile_partial(fields)?,
            Shape::Record { fields } => algebra::record_of(self.compile_fields(fields)?),
            Shape::String => algebra::string(),
            Shape::Tuple { components } => algebra::tuple_of(self.compile_all(components)?),
            Shape::Union { alternatives } => {
                if alternatives.is_empty() {
                    return Err(GenError::Uninhabited { tag: Tag::Union.to_string() });
                }
                algebra::one_of(self.compile_all(alternatives)?)
            }
            Shape::Void => algebra::void(),
            Shape::Extension(ext) => {
                let strategy = self
                    .strategies
                    .get(&ext.name)
                    .ok_or_else(|| GenError::UnsupportedType { tag: ext.name.clone() })?;
                strategy(self, ext)?
            }
        })
    }

    pub fn compile_all(&self, types: &[Descriptor]) -> GenResult<Vec<Generator>> {
        types.iter().map(|t| self.compile(t)).collect()
    }

    fn compile_fields(&self, fields: &Fields) -> GenResult<Vec<(String, Generator)>> {
        fields
            .iter()
            .map(|(name, ty)| Ok((name.clone(), self.compile(ty)?)))
            .collect()
    }

    fn compile_partial(&self, fields: &Fields) -> GenResult<Generator> {
        let optional = self
            .compile_fields(fields)?
            .into_iter()
            .map(|(name, g)| (name, algebra::optional(g)))
            .collect();
        let keys = fields.keys().cloned().collect();
        Ok(algebra::drop_absent(algebra::record_of(optional), keys))
    }

    fn compile_constraint(&self, c: &Constraint) -> GenResult<Generator> {
        if let Some(args) = c.args.as_ref().filter(|a| !a.tag.is_empty()) {
            let strategy = self
                .custom_constraints
                .get(&args.tag)
                .ok_or_else(|| GenError::MissingCustomGenerator { tag: args.tag.clone() })?;
            trace!(tag = %args.tag, "custom constraint strategy");
            return strategy(self, c);
        }
        let underlying = self.compile(&c.underlying)?;
        Ok(match &c.correction {
            Some(fix) => algebra::map(underlying, fix.clone()),
            None => {
                let predicate = c.predicate.clone();
                let whence = format!("constraint `{}` rejected the draw", predicate.name());
                algebra::filter(underlying, whence, move |v: &Value| predicate.test(v))
            }
        })
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut strategies: Vec<_> = self.strategies.keys().collect();
        strategies.sort();
        let mut constraints: Vec<_> = self.custom_constraints.keys().collect();
        constraints.sort();
        f.debug_struct("Compiler")
            .field("strategies", &strategies)
            .field("custom_constraints", &constraints)
            .field("rules", &self.rules.iter().map(|r| r.name.as_str()).collect::<Vec<_>>())
            .field("custom_intersections", &self.custom_intersections.iter().map(|c| &c.tags).collect::<Vec<_>>())
            .field("max_size", &self.max_size)
            .finish()
    }
}

// ------------------------------- Tests ------------------------------------ //
