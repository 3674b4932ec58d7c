//! jq programs as predicates and corrections for document-declared
//! constraints.
use std::fmt;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use jaq_core::{compile::Undefined, load, Compiler, Ctx, Filter, Native, RcIter};
use jaq_json::Val;
use tracing::warn;

use crate::value::Value;

/// A compiled jq filter together with its source text.
#[derive(Clone)]
pub struct JqProgram {
    source: String,
    filter: Rc<Filter<Native<Val>>>,
}

impl JqProgram {
    pub fn compile(source: &str) -> Result<Self> {
        let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
        let arena = load::Arena::default();
        let program = load::File { code: source, path: () };

        let modules = loader
            .load(&arena, program)
            .map_err(format_parse_errors)?;

        let filter = Compiler::default()
            .with_funs(jaq_std::funs().chain(jaq_json::funs()))
            .compile(modules)
            .map_err(format_undefined_errors)?;

        Ok(Self { source: source.to_string(), filter: Rc::new(filter) })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every output of the program for `input`.
    pub fn run(&self, input: &serde_json::Value) -> Result<Vec<serde_json::Value>> {
        let inputs = RcIter::new(core::iter::empty());
        let mut it = self.filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

        let mut out = Vec::new();
        while let Some(item) = it.next() {
            let v = item.map_err(|e| anyhow!("`{}`: {e:?}", self.source))?;
            out.push(serde_json::from_str(&format!("{v}"))?);
        }
        Ok(out)
    }

    /// jq truthiness of the first output. No output or a failed run is false.
    pub fn test(&self, value: &Value) -> bool {
        match self.run(&value.to_json()) {
            Ok(out) => out
                .first()
                .is_some_and(|v| !matches!(v, serde_json::Value::Null | serde_json::Value::Bool(false))),
            Err(error) => {
                warn!(program = %self.source, %error, "jq predicate failed");
                false
            }
        }
    }

    /// The first output, or the input unchanged when there is none.
    pub fn correct(&self, value: Value) -> Value {
        match self.run(&value.to_json()) {
            Ok(out) => out.into_iter().next().map(Value::from).unwrap_or(value),
            Err(error) => {
                warn!(program = %self.source, %error, "jq correction failed");
                value
            }
        }
    }
}

impl fmt::Debug for JqProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JqProgram").field(&self.source).finish()
    }
}

fn format_parse_errors(
    errs: Vec<(load::File<&str, ()>, load::Error<&str>)>,
) -> anyhow::Error {
    let mut s = String::new();
    for (file, err) in errs {
        s.push_str(&format!("parse error: {err:?} in `{}`\n", file.code));
    }
    anyhow!(s)
}

fn format_undefined_errors(
    errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>,
) -> anyhow::Error {
    let mut s = String::new();
    for (file, list) in errs {
        for (name, undef) in list {
            s.push_str(&format!("undefined `{name}`: {undef:?} in `{}`\n", file.code));
        }
    }
    anyhow!(s)
}

// ------------------------------- Tests ------------------------------------ //
