use crate::value::Value;

pub type GenResult<T> = Result<T, GenError>;

/// Errors raised while compiling, sampling or checking a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// No strategy exists for the tag.
    #[error("unsupported type: no generation strategy for tag `{tag}`")]
    UnsupportedType { tag: String },

    /// A tagged constraint has no registered custom strategy.
    #[error("missing custom generator for `{tag}`; register it before compiling")]
    MissingCustomGenerator { tag: String },

    /// A custom strategy was handed `args` it cannot use.
    #[error("invalid args for custom generator `{tag}`: {reason}")]
    InvalidArgs { tag: String, reason: String },

    /// The type has no values to draw from.
    #[error("type `{tag}` is uninhabited")]
    Uninhabited { tag: String },

    /// A filter exhausted the run's rejection budget.
    #[error("retry budget exceeded: {reason}")]
    RetryBudgetExceeded { reason: String },

    /// A generated value failed its own type's guard.
    #[error("counterexample found on trial {trial} (seed {seed}): {value}")]
    CounterexampleFound { trial: u32, seed: u64, value: Value },
}
