// Type-conversion service interface. The generation pipelines consume this
// trait for every typed value they touch; the rules themselves live behind
// it (see `builtin` for the stock implementation, or inject a fake in tests).

pub mod builtin;

use std::collections::BTreeSet;

use crate::error::GenResult;
use crate::schema::TypeSpec;

pub use builtin::BuiltinTypeSystem;

/// Which file scope a dependency registration serves: the native extern
/// declarations of a module, or the managed wrapper layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepScope {
    Native,
    Managed,
}

/// One import/cimport dependency: a module stem plus optionally an item
/// and an alias. Registration is set-idempotent; rendering is sorted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DepTuple {
    Module(String),
    Item(String, String),
    Aliased(String, String, String),
}

impl DepTuple {
    pub fn module(m: &str) -> Self {
        DepTuple::Module(m.to_string())
    }

    pub fn item(m: &str, item: &str) -> Self {
        DepTuple::Item(m.to_string(), item.to_string())
    }

    pub fn aliased(m: &str, item: &str, alias: &str) -> Self {
        DepTuple::Aliased(m.to_string(), item.to_string(), alias.to_string())
    }

    fn render(&self, keyword: &str) -> String {
        match self {
            DepTuple::Module(m) => format!("{keyword} {m}"),
            DepTuple::Item(m, i) => format!("from {m} {keyword} {i}"),
            DepTuple::Aliased(m, i, a) => format!("from {m} {keyword} {i} as {a}"),
        }
    }
}

/// Render a cimport set as sorted `cimport`/`from ... cimport ...` lines.
pub fn render_cimports(deps: &BTreeSet<DepTuple>) -> Vec<String> {
    let mut lines: Vec<String> = deps.iter().map(|d| d.render("cimport")).collect();
    lines.sort();
    lines
}

/// Render an import set as sorted `import`/`from ... import ...` lines.
pub fn render_imports(deps: &BTreeSet<DepTuple>) -> Vec<String> {
    let mut lines: Vec<String> = deps.iter().map(|d| d.render("import")).collect();
    lines.sort();
    lines
}

/// Options for native-to-managed conversion synthesis.
#[derive(Debug, Clone, Default)]
pub struct ConvertOpts {
    /// When set, the source value is `<inst_name>.<var>` (a native field
    /// access through an instance handle); otherwise `<var>` itself.
    pub inst_name: Option<String>,
    /// Prefix for cache slot names (`self` gives `self._<var>`); `None`
    /// yields the bare slot name `_<var>` used in backing-field decls.
    pub cache_prefix: Option<String>,
    /// Whether a cacheable conversion should actually synthesize the
    /// check-populate-reuse pattern. Return-value conversions pass false.
    pub cached: bool,
}

impl ConvertOpts {
    pub fn field(inst_name: &str) -> Self {
        ConvertOpts {
            inst_name: Some(inst_name.to_string()),
            cache_prefix: Some("self".to_string()),
            cached: true,
        }
    }

    pub fn return_value() -> Self {
        ConvertOpts { inst_name: None, cache_prefix: None, cached: false }
    }
}

/// Synthesized conversion code: declarations, body statements, and the
/// expression holding the converted value. `cache_name` is `Some` when the
/// converted value is cacheable in a per-instance backing slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Converted {
    pub decls: Vec<String>,
    pub body: Vec<String>,
    pub expr: String,
    pub cache_name: Option<String>,
}

/// The conversion service consumed by every pipeline. Implementations own
/// the native/managed/dynamic renderings of semantic types, the conversion
/// code synthesis, and the dependency tuples each type reference drags in.
pub trait TypeSystem {
    /// Native (C/C++-level) type name, e.g. `int`, `std_string`, `cpp_shapes.Shape`.
    fn native_name(&self, t: &TypeSpec) -> GenResult<String>;

    /// Managed (wrapper-level) type name, e.g. `Shape`, `list`.
    fn managed_name(&self, t: &TypeSpec) -> GenResult<String>;

    /// Dynamic-object type name as observed at call time, e.g. `int`, `str`.
    fn dynamic_name(&self, t: &TypeSpec) -> GenResult<String>;

    /// Whether the type is a refinement of a broader base representation.
    /// Used only to order dispatch candidate sequences.
    fn is_refinement(&self, t: &TypeSpec) -> bool;

    /// Register the cimport tuples this type needs for resolution in a file
    /// of the given scope. Repeated registration is idempotent.
    fn cimport_tuples(&self, t: &TypeSpec, scope: DepScope, acc: &mut BTreeSet<DepTuple>);

    /// Register the import tuples value conversion of this type needs at
    /// its use site.
    fn import_tuples(&self, t: &TypeSpec, acc: &mut BTreeSet<DepTuple>);

    /// Synthesize code converting a native value into its managed form.
    fn native_to_managed(&self, var: &str, t: &TypeSpec, opts: &ConvertOpts)
    -> GenResult<Converted>;

    /// Synthesize code converting a managed value into its native form.
    fn managed_to_native(&self, var: &str, t: &TypeSpec) -> GenResult<Converted>;
}
