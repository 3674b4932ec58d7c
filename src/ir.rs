// Serializable descriptor documents. Plain data only; `lower` turns these into
// runtime descriptors.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named types of one document, in declaration order.
pub type Module = IndexMap<String, Doc>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase", deny_unknown_fields)]
pub enum Doc {
    Always,
    Boolean,
    Number,
    String,
    Void,
    Function,
    Literal { value: serde_json::Value },
    Array { element: Box<Doc> },
    Tuple { components: Vec<Doc> },
    Dictionary { value: Box<Doc> },
    Record { fields: IndexMap<String, Doc> },
    Partial { fields: IndexMap<String, Doc> },
    Union { alternatives: Vec<Doc> },
    Intersect { intersectees: Vec<Doc> },
    Constraint {
        underlying: Box<Doc>,
        /// jq program; a truthy first output accepts the value
        constraint: String,
        /// jq program mapping any value of `underlying` to an accepted one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        correction: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<ArgsDoc>,
    },
    /// another type of the same module, by name
    Ref { name: String },
    Extension {
        name: String,
        guard: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Metadata naming a custom constraint strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArgsDoc {
    pub tag: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub types: IndexMap<String, Doc>,
}

// ------------------------------- Tests ------------------------------------ //
