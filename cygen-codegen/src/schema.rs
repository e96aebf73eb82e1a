// Description model: what the caller hands us about native classes and functions.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An environment maps target module names to module descriptions.
/// Insertion order is the caller's order and is preserved.
pub type Environment = IndexMap<String, ModuleDesc>;

// ---------------------------------------------------------------------------
// Semantic types
// ---------------------------------------------------------------------------

/// A semantic type as it appears in descriptions. The generation pipelines
/// treat these as atoms and hand them to the `TypeSystem` service for
/// rendering and conversion; the only property queried directly is whether
/// a type is a refinement (dispatch ordering).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    /// A named scalar ("int32", "float64", "str", ...) or a wrapped class name.
    Name(String),
    /// A parameterized type, e.g. `vector<int32>`.
    Template { name: String, args: Vec<TypeSpec> },
    /// A refinement of a base type, narrowed by a constraint predicate.
    /// The constraint is a Python expression with `{}` standing for the value.
    Refined { base: Box<TypeSpec>, constraint: String },
}

impl TypeSpec {
    pub fn name(s: &str) -> Self {
        TypeSpec::Name(s.to_string())
    }

    /// A short display form used in error messages.
    pub fn describe(&self) -> String {
        match self {
            TypeSpec::Name(n) => n.clone(),
            TypeSpec::Template { name, args } => {
                let inner: Vec<String> = args.iter().map(|a| a.describe()).collect();
                format!("{name}<{}>", inner.join(", "))
            }
            TypeSpec::Refined { base, constraint } => {
                format!("{} where {constraint}", base.describe())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// One declared argument of a method or function signature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeSpec,
    /// Default value as source text, if the native declaration has one.
    #[serde(default)]
    pub default: Option<String>,
}

/// One overload variant: name, ordered arguments, return type.
/// An absent return type denotes a constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub returns: Option<TypeSpec>,
}

impl MethodSig {
    /// The signature key identifying this overload variant:
    /// (name, ordered argument types). Unique within one description.
    pub fn key(&self) -> SigKey {
        SigKey {
            name: self.name.clone(),
            argtypes: self.args.iter().map(|a| a.ty.clone()).collect(),
        }
    }

    /// True for constructor entries (no return type).
    pub fn is_constructor(&self) -> bool {
        self.returns.is_none()
    }
}

/// Identifies one overload variant within a description.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SigKey {
    pub name: String,
    pub argtypes: Vec<TypeSpec>,
}

// ---------------------------------------------------------------------------
// Class / function / module descriptions
// ---------------------------------------------------------------------------

/// Optional raw-code injections, keyed by output kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraCode {
    #[serde(default)]
    pub decl: Option<String>,
    #[serde(default)]
    pub reexport: Option<String>,
    #[serde(default)]
    pub wrapper: Option<String>,
}

/// Per-member documentation for a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Docstrings {
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub methods: BTreeMap<String, String>,
}

/// Description of one C/C++ class or struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDesc {
    pub name: String,
    pub namespace: String,
    pub header_filename: String,
    /// Ordered parent class names. `None` marks a root class that owns a
    /// native handle directly.
    #[serde(default)]
    pub parents: Option<Vec<String>>,
    #[serde(default)]
    pub attrs: BTreeMap<String, TypeSpec>,
    #[serde(default)]
    pub methods: Vec<MethodSig>,
    #[serde(default)]
    pub docstrings: Docstrings,
    #[serde(default)]
    pub extra: ExtraCode,
}

impl ClassDesc {
    /// Methods sorted by signature key for deterministic iteration.
    pub fn sorted_methods(&self) -> Vec<&MethodSig> {
        let mut meths: Vec<&MethodSig> = self.methods.iter().collect();
        meths.sort_by(|a, b| a.key().cmp(&b.key()));
        meths
    }

    /// Look up the return type of an exact signature key, if declared here.
    pub fn lookup(&self, key: &SigKey) -> Option<&MethodSig> {
        self.methods.iter().find(|m| &m.key() == key)
    }
}

/// Description of a set of free-function overloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDesc {
    pub name: String,
    pub namespace: String,
    pub header_filename: String,
    #[serde(default)]
    pub signatures: Vec<MethodSig>,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub extra: ExtraCode,
}

impl FuncDesc {
    pub fn sorted_signatures(&self) -> Vec<&MethodSig> {
        let mut sigs: Vec<&MethodSig> = self.signatures.iter().collect();
        sigs.sort_by(|a, b| a.key().cmp(&b.key()));
        sigs
    }
}

/// A declared name inside a module maps to either a class or a function set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemDesc {
    Class(ClassDesc),
    Function(FuncDesc),
}

impl ItemDesc {
    pub fn as_class(&self) -> Option<&ClassDesc> {
        match self {
            ItemDesc::Class(c) => Some(c),
            ItemDesc::Function(_) => None,
        }
    }
}

/// Description of one target module: its items plus module-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleDesc {
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub extra: ExtraCode,
    /// Explicit output filenames. When absent, names derive from the
    /// target name (`cpp_<target>.pxd`, `<target>.pxd`, `<target>.pyx`).
    /// An explicit `null` is treated the same as an absent slot: every
    /// module always produces all three files, and a slot cannot opt its
    /// family out of generation.
    #[serde(default)]
    pub decl_filename: Option<String>,
    #[serde(default)]
    pub reexport_filename: Option<String>,
    #[serde(default)]
    pub wrapper_filename: Option<String>,
    #[serde(default)]
    pub items: IndexMap<String, ItemDesc>,
}

/// Members whose names start with an underscore or the destructor tilde are
/// never emitted, independently at every member site.
pub fn is_private_name(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('~')
}

/// Check the invariants deserialization cannot express: signature keys must
/// be unique within each class and each function overload set.
pub fn validate_env(env: &Environment) -> crate::error::GenResult<()> {
    use std::collections::BTreeSet;

    for (target, module) in env {
        for (name, item) in &module.items {
            let sigs: Vec<&MethodSig> = match item {
                ItemDesc::Class(c) => c.methods.iter().collect(),
                ItemDesc::Function(f) => f.signatures.iter().collect(),
            };
            let mut seen = BTreeSet::new();
            for sig in sigs {
                if !seen.insert(sig.key()) {
                    return Err(crate::error::GenError::InvalidDescription {
                        item: format!("{target}.{name}"),
                        reason: format!("duplicate signature key for `{}`", sig.name),
                    });
                }
            }
        }
    }
    Ok(())
}
