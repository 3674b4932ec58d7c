//! Compile type descriptors into random value generators and property-check
//! that every generated value satisfies its own type.
pub mod algebra;
pub mod cli;
pub mod compiler;
pub mod contains;
pub mod descriptor;
pub mod error;
pub mod harness;
pub mod ir;
pub mod jq_exec;
pub mod lower;
pub mod path_de;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use algebra::Generator;
pub use compiler::Compiler;
pub use descriptor::{Args, Correction, Descriptor, Predicate, Shape, Tag};
pub use error::{GenError, GenResult};
pub use harness::{Report, RunConfig};
pub use value::{Callable, Value};
