//! Lowers descriptor documents into runtime descriptors.
//!
//! Named references resolve to the same `Descriptor` handle every time they
//! appear, so a type shared between parents keeps its identity. Reference
//! cycles cannot be generated eagerly and are rejected.
use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use tracing::debug;

use crate::descriptor::{Args, Constraint, Correction, Descriptor, Predicate, Shape};
use crate::ir::{ArgsDoc, Doc, Module};
use crate::jq_exec::JqProgram;
use crate::path_de;
use crate::value::Value;

/// Every named type of `module`, in declaration order.
pub fn lower_module(module: &Module) -> Result<IndexMap<String, Descriptor>> {
    let mut lowering = Lowering { module, done: HashMap::new(), visiting: Vec::new() };
    module
        .keys()
        .map(|name| Ok((name.clone(), lowering.resolve(name)?)))
        .collect()
}

/// Parses a module from JSON text, optionally from the node at `json_pointer`.
pub fn load_module(src: &str, json_pointer: Option<&str>) -> Result<Module> {
    match json_pointer {
        None => path_de::from_str_with_path(src),
        Some(pointer) => {
            let mut root: serde_json::Value = serde_json::from_str(src)?;
            let node = root
                .pointer_mut(pointer)
                .map(serde_json::Value::take)
                .ok_or_else(|| anyhow!("JSON pointer `{pointer}` selects nothing"))?;
            path_de::from_value_with_path(node)
        }
    }
}

struct Lowering<'a> {
    module: &'a Module,
    done: HashMap<String, Descriptor>,
    visiting: Vec<String>,
}

impl Lowering<'_> {
    fn resolve(&mut self, name: &str) -> Result<Descriptor> {
        if let Some(found) = self.done.get(name) {
            return Ok(found.clone());
        }
        if self.visiting.iter().any(|n| n == name) {
            let mut path = self.visiting.clone();
            path.push(name.to_string());
            bail!("reference cycle: {}", path.join(" -> "));
        }
        let module = self.module;
        let doc = module
            .get(name)
            .ok_or_else(|| anyhow!("reference to undeclared type `{name}`"))?;
        self.visiting.push(name.to_string());
        let lowered = self.lower(doc).with_context(|| format!("in type `{name}`"));
        self.visiting.pop();
        let lowered = lowered?;
        debug!(name, tag = %lowered.tag(), "lowered");
        self.done.insert(name.to_string(), lowered.clone());
        Ok(lowered)
    }

    fn lower(&mut self, doc: &Doc) -> Result<Descriptor> {
        Ok(match doc {
            Doc::Always => Descriptor::always(),
            Doc::Boolean => Descriptor::boolean(),
            Doc::Number => Descriptor::number(),
            Doc::String => Descriptor::string(),
            Doc::Void => Descriptor::void(),
            Doc::Function => Descriptor::function(),
            Doc::Literal { value } => Descriptor::literal(Value::from(value.clone())),
            Doc::Array { element } => Descriptor::array(self.lower(element)?),
            Doc::Tuple { components } => Descriptor::tuple(self.lower_all(components)?),
            Doc::Dictionary { value } => Descriptor::dictionary(self.lower(value)?),
            Doc::Record { fields } => Descriptor::record(self.lower_fields(fields)?),
            Doc::Partial { fields } => Descriptor::partial(self.lower_fields(fields)?),
            Doc::Union { alternatives } => Descriptor::union(self.lower_all(alternatives)?),
            Doc::Intersect { intersectees } => Descriptor::intersect(self.lower_all(intersectees)?),
            Doc::Ref { name } => self.resolve(name)?,
            Doc::Constraint { underlying, constraint, correction, args } => {
                let underlying = self.lower(underlying)?;
                let predicate = jq_predicate(constraint)?;
                let correction = match correction {
                    Some(src) => {
                        let program = JqProgram::compile(src).context("in correction")?;
                        Some(Correction::new(src.clone(), move |v| program.correct(v)))
                    }
                    None => None,
                };
                let args = args.as_ref().map(|a| self.lower_args(a)).transpose()?;
                Descriptor::from_shape(Shape::Constraint(Constraint { underlying, predicate, correction, args }))
            }
            Doc::Extension { name, guard, payload } => {
                Descriptor::extension(name.clone(), payload.clone(), jq_predicate(guard)?)
            }
        })
    }

    fn lower_all(&mut self, docs: &[Doc]) -> Result<Vec<Descriptor>> {
        docs.iter().map(|d| self.lower(d)).collect()
    }

    fn lower_fields(&mut self, fields: &IndexMap<String, Doc>) -> Result<Vec<(String, Descriptor)>> {
        fields
            .iter()
            .map(|(k, d)| Ok((k.clone(), self.lower(d).with_context(|| format!("in field `{k}`"))?)))
            .collect()
    }

    fn lower_args(&mut self, args: &ArgsDoc) -> Result<Args> {
        let types = args
            .types
            .iter()
            .map(|(k, d)| Ok((k.clone(), self.lower(d)?)))
            .collect::<Result<_>>()?;
        Ok(Args { tag: args.tag.clone(), params: args.params.clone(), types })
    }
}

fn jq_predicate(src: &str) -> Result<Predicate> {
    let program = JqProgram::compile(src)?;
    Ok(Predicate::new(src, move |v| program.test(v)))
}

// ------------------------------- Tests ------------------------------------ //
