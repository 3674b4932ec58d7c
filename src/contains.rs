//! "Array contains exactly N items of a type", as a custom constraint.
//!
//! `array_with_contains` builds the tagged constraint; `register` installs the
//! strategy that repairs generated arrays instead of waiting for the count to
//! come up by chance: too few matches get pre-drawn items spliced in at random
//! positions, too many get the surplus matches (after the first `count`)
//! dropped.
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::json;

use crate::algebra::{self, Generator};
use crate::compiler::Compiler;
use crate::descriptor::{Args, Constraint, Descriptor, Predicate};
use crate::error::{GenError, GenResult};
use crate::value::Value;

pub const TAG: &str = "contains";

/// `count` may exceed the compiler's size bound by at most this factor.
const COUNT_HEADROOM: usize = 16;

pub fn array_with_contains(array: &Descriptor, item: &Descriptor, count: usize) -> Descriptor {
    let probe = item.clone();
    let predicate = Predicate::new(format!("contains exactly {count}"), move |v| {
        count_matching(v, &probe) == Some(count)
    });
    let args = Args::new(TAG)
        .with_param("count", json!(count))
        .with_type("item", item.clone());
    array.custom(predicate, args)
}

pub fn register(compiler: &mut Compiler) {
    compiler.register_custom_constraint(TAG, generate);
}

fn count_matching(value: &Value, item: &Descriptor) -> Option<usize> {
    value.as_array().map(|xs| xs.iter().filter(|x| item.guard(x)).count())
}

fn invalid(reason: &str) -> GenError {
    GenError::InvalidArgs { tag: TAG.to_string(), reason: reason.to_string() }
}

fn generate(compiler: &Compiler, constraint: &Constraint) -> GenResult<Generator> {
    let args = constraint.args.as_ref().ok_or_else(|| invalid("no args"))?;
    let item = args.types.get("item").cloned().ok_or_else(|| invalid("no `item` type"))?;
    let count = match args.params.get("count") {
        None => 1,
        Some(n) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| invalid("`count` must be a non-negative integer"))?,
    };
    let limit = compiler.max_size().max(1).saturating_mul(COUNT_HEADROOM);
    if count > limit {
        return Err(GenError::InvalidArgs {
            tag: TAG.to_string(),
            reason: format!("`count` {count} exceeds the limit of {limit} for collection size {}", compiler.max_size()),
        });
    }

    let base = compiler.compile(&constraint.underlying)?;
    let extras = vec(compiler.compile(&item)?, count..=count);
    let slots = vec(any::<usize>(), count..=count);
    let repaired = (base, extras, slots)
        .prop_map(move |(list, extras, slots)| repair(list, &item, count, extras, slots))
        .boxed();

    let underlying = constraint.underlying.clone();
    let predicate = constraint.predicate.clone();
    Ok(algebra::filter(repaired, "contains repair missed", move |v| {
        underlying.guard(v) && predicate.test(v)
    }))
}

fn repair(list: Value, item: &Descriptor, count: usize, extras: Vec<Value>, slots: Vec<usize>) -> Value {
    let Value::Array(mut xs) = list else { return list };
    let found = xs.iter().filter(|x| item.guard(x)).count();
    if found < count {
        for (extra, slot) in extras.into_iter().zip(slots).take(count - found) {
            let at = slot % (xs.len() + 1);
            xs.insert(at, extra);
        }
    } else if found > count {
        let mut kept = 0;
        xs.retain(|x| {
            if !item.guard(x) {
                return true;
            }
            kept += 1;
            kept <= count
        });
    }
    Value::Array(xs)
}

// ------------------------------- Tests ------------------------------------ //
