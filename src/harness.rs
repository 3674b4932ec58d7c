//! Property-check harness: compile once, draw per trial, stop at the first
//! value its own type rejects.
use proptest::prelude::*;
use proptest::strategy::ValueTree;
use proptest::test_runner::TestRunner;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::algebra::{self, DEFAULT_MAX_REJECTS};
use crate::compiler::Compiler;
use crate::descriptor::Descriptor;
use crate::error::{GenError, GenResult};

/// Options for one check. Every field has a default, so partial JSON works.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// trials per check
    pub cases: u32,
    /// fixed seed for reproducible runs; drawn fresh when absent
    pub seed: Option<u64>,
    /// collection size bound for this check, overriding the compiler's
    pub max_size: Option<usize>,
    /// filter rejections tolerated over the whole check
    pub max_rejects: u32,
}

/// A passed check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub cases: u32,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { cases: 100, seed: None, max_size: None, max_rejects: DEFAULT_MAX_REJECTS }
    }
}

impl RunConfig {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed), ..Self::default() }
    }

    pub fn with_cases(mut self, cases: u32) -> Self {
        self.cases = cases;
        self
    }

    /// The configured seed, or a fresh random one.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            any::<u64>()
                .new_tree(&mut TestRunner::default())
                .map(|tree| tree.current())
                .unwrap_or_default()
        })
    }
}

impl Compiler {
    /// Checks that `config.cases` generated values all satisfy
    /// `descriptor.guard`.
    pub fn check(&self, descriptor: &Descriptor, config: &RunConfig) -> GenResult<Report> {
        let seed = config.resolve_seed();
        let sized;
        let compiler = match config.max_size {
            Some(max_size) => {
                sized = self.clone().with_max_size(max_size);
                &sized
            }
            None => self,
        };
        let generator = compiler.compile(descriptor)?;
        let mut runner = algebra::seeded_runner(seed, config.max_rejects);
        for trial in 1..=config.cases {
            let value = algebra::draw(&generator, &mut runner)?;
            if !descriptor.guard(&value) {
                warn!(trial, seed, %value, "counterexample");
                return Err(GenError::CounterexampleFound { trial, seed, value });
            }
        }
        debug!(cases = config.cases, seed, "check passed");
        Ok(Report { cases: config.cases, seed })
    }

    /// A zero-argument test body: panics with the error (and the offending
    /// value, if any) when the check fails.
    pub fn property(&self, descriptor: &Descriptor, config: RunConfig) -> Box<dyn Fn()> {
        let compiler = self.clone();
        let descriptor = descriptor.clone();
        Box::new(move || {
            if let Err(err) = compiler.check(&descriptor, &config) {
                panic!("{err}");
            }
        })
    }
}

// ------------------------------- Tests ------------------------------------ //
