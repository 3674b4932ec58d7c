//! Generator algebra: the proptest combinators the compiler builds on.
//!
//! A `Generator` is a boxed proptest strategy over `Value`. Everything here is
//! a thin, `Value`-typed veneer over proptest so strategies in the compiler
//! read as the algebra they are (constant, one_of, tuple_of, record_of, map,
//! filter, sample).
use std::cell::RefCell;
use std::rc::Rc;

use proptest::collection::vec;
use proptest::prelude::*;
use proptest::strategy::{BoxedStrategy, Union, ValueTree};
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};

use crate::descriptor::{Correction, Descriptor};
use crate::error::{GenError, GenResult};
use crate::value::{Callable, Value};

pub type Generator = BoxedStrategy<Value>;

/// Nesting depth of arbitrary JSON values.
pub const JSON_DEPTH: u32 = 3;
/// Default upper bound on generated collection lengths.
pub const DEFAULT_MAX_SIZE: usize = 10;
/// Default number of filter rejections tolerated per run.
pub const DEFAULT_MAX_REJECTS: u32 = 65_536;

// ------------------------------ Randomness -------------------------------- //

/// Deterministic ChaCha stream for a 64-bit seed.
pub fn seeded_rng(seed: u64) -> TestRng {
    let mut bytes = [0u8; 32];
    for (i, chunk) in bytes.chunks_mut(8).enumerate() {
        chunk.copy_from_slice(&seed.rotate_left(16 * i as u32).to_le_bytes());
    }
    TestRng::from_seed(RngAlgorithm::ChaCha, &bytes)
}

pub fn seeded_runner(seed: u64, max_rejects: u32) -> TestRunner {
    let config = Config { max_local_rejects: max_rejects, ..Config::default() };
    TestRunner::new_with_rng(config, seeded_rng(seed))
}

// ------------------------------ Primitives -------------------------------- //

pub fn boolean() -> Generator {
    any::<bool>().prop_map(Value::Bool).boxed()
}

/// Finite numbers of either sign.
pub fn number() -> Generator {
    use proptest::num::f64::{NEGATIVE, NORMAL, POSITIVE, SUBNORMAL, ZERO};
    (POSITIVE | NEGATIVE | NORMAL | SUBNORMAL | ZERO).prop_map(Value::Number).boxed()
}

pub fn string() -> Generator {
    any::<String>().prop_map(Value::String).boxed()
}

/// `undefined` or `null`.
pub fn void() -> Generator {
    prop_oneof![Just(Value::Undefined), Just(Value::Null)].boxed()
}

pub fn function() -> Generator {
    any::<u64>().prop_map(|seed| Value::Function(Callable::new(seed))).boxed()
}

/// Arbitrary JSON-like values nested up to `depth` levels.
pub fn json(depth: u32) -> Generator {
    let leaf = prop_oneof![Just(Value::Null), boolean(), number(), string()];
    leaf.prop_recursive(depth, 64, 8, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..8).prop_map(Value::Array),
            vec((any::<String>(), inner), 0..8)
                .prop_map(|kv| Value::Object(kv.into_iter().collect())),
        ]
    })
    .boxed()
}

pub fn constant(value: Value) -> Generator {
    Just(value).boxed()
}

// ----------------------------- Combinators -------------------------------- //

pub fn array(element: Generator, max_size: usize) -> Generator {
    vec(element, 0..=max_size).prop_map(Value::Array).boxed()
}

pub fn dictionary(value: Generator, max_size: usize) -> Generator {
    vec((any::<String>(), value), 0..=max_size)
        .prop_map(|kv| Value::Object(kv.into_iter().collect()))
        .boxed()
}

/// Picks one option uniformly per draw. `options` must not be empty.
pub fn one_of(options: Vec<Generator>) -> Generator {
    Union::new(options).boxed()
}

pub fn tuple_of(components: Vec<Generator>) -> Generator {
    components.prop_map(Value::Array).boxed()
}

/// An object with exactly the given keys, in the given order.
pub fn record_of(fields: Vec<(String, Generator)>) -> Generator {
    let (names, generators): (Vec<String>, Vec<Generator>) = fields.into_iter().unzip();
    generators
        .prop_map(move |values| Value::Object(names.iter().cloned().zip(values).collect()))
        .boxed()
}

/// Either a drawn value or the absent marker.
pub fn optional(source: Generator) -> Generator {
    one_of(vec![source, constant(Value::Undefined)])
}

/// Removes `keys` whose drawn value is the absent marker.
pub fn drop_absent(source: Generator, keys: Vec<String>) -> Generator {
    source
        .prop_map(move |v| match v {
            Value::Object(mut map) => {
                map.retain(|k, x| !(x.is_undefined() && keys.contains(k)));
                Value::Object(map)
            }
            other => other,
        })
        .boxed()
}

pub fn map(source: Generator, correction: Correction) -> Generator {
    source.prop_map(move |v| correction.apply(v)).boxed()
}

/// Rejection sampling, bounded by the runner's local reject budget.
pub fn filter(source: Generator, whence: impl Into<String>, keep: impl Fn(&Value) -> bool + 'static) -> Generator {
    let whence: String = whence.into();
    let label: Rc<str> = Rc::from(whence.as_str());
    source
        .prop_filter(whence, move |v| {
            let kept = keep(v);
            if !kept {
                note_rejection(&label);
            }
            kept
        })
        .boxed()
}

/// Keeps only values every type in `types` accepts.
pub fn guarded(source: Generator, whence: impl Into<String>, types: Vec<Descriptor>) -> Generator {
    filter(source, whence, move |v| types.iter().all(|t| t.guard(v)))
}

// ------------------------------- Sampling --------------------------------- //

thread_local! {
    /// Label of the filter that rejected most recently on this thread.
    static LAST_REJECTION: RefCell<Option<Rc<str>>> = const { RefCell::new(None) };
}

/// Records `whence` as the latest rejecting filter, so a starved draw can
/// name it. proptest keeps only a generic message.
pub(crate) fn note_rejection(whence: &Rc<str>) {
    LAST_REJECTION.with(|last| *last.borrow_mut() = Some(Rc::clone(whence)));
}

pub fn draw(generator: &Generator, runner: &mut TestRunner) -> GenResult<Value> {
    LAST_REJECTION.with(|last| last.borrow_mut().take());
    generator.new_tree(runner).map(|tree| tree.current()).map_err(|reason| {
        let reason = match LAST_REJECTION.with(|last| last.borrow_mut().take()) {
            Some(whence) => format!("{whence} ({})", reason.message()),
            None => reason.message().to_string(),
        };
        GenError::RetryBudgetExceeded { reason }
    })
}

/// Draws `n` independent values.
pub fn sample(generator: &Generator, n: usize, runner: &mut TestRunner) -> GenResult<Vec<Value>> {
    (0..n).map(|_| draw(generator, runner)).collect()
}

// ------------------------------- Tests ------------------------------------ //
