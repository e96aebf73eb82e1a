// Stock type system: scalar C/C++ types, std::string, registered wrapped
// classes, vector<T>, and refinement types.

use std::collections::{BTreeMap, BTreeSet};

use crate::context::{ClassIndex, Filenames};
use crate::error::{GenError, GenResult};
use crate::schema::{Environment, ItemDesc, TypeSpec};

use super::{ConvertOpts, Converted, DepScope, DepTuple, TypeSystem};

/// Rendering info for one scalar type.
struct Scalar {
    native: &'static str,
    dynamic: &'static str,
}

fn scalar(name: &str) -> Option<Scalar> {
    let (native, dynamic) = match name {
        "bool" => ("bint", "bool"),
        "char" => ("char", "str"),
        "int16" => ("short", "int"),
        "int32" => ("int", "int"),
        "int64" => ("long long", "int"),
        "uint16" => ("unsigned short", "int"),
        "uint32" => ("unsigned int", "int"),
        "uint64" => ("unsigned long long", "int"),
        "float32" => ("float", "float"),
        "float64" => ("double", "float"),
        "str" | "string" => ("std_string", "str"),
        "void" => ("void", "None"),
        _ => return None,
    };
    Some(Scalar { native, dynamic })
}

fn is_string(name: &str) -> bool {
    matches!(name, "str" | "string")
}

/// A wrapped class the type system knows how to render and convert.
#[derive(Debug, Clone)]
struct RegisteredClass {
    /// Stem of the declaration header that externs the native class.
    decl_stem: String,
    /// Stem of the re-export header that declares the managed class.
    reexport_stem: String,
}

/// The stock `TypeSystem` implementation.
#[derive(Debug, Default)]
pub struct BuiltinTypeSystem {
    classes: BTreeMap<String, RegisteredClass>,
}

impl BuiltinTypeSystem {
    pub fn new() -> Self {
        BuiltinTypeSystem::default()
    }

    /// Make a class name renderable: native values become
    /// `<decl_stem>.<name>`, managed values cimport from the re-export
    /// header.
    pub fn register_class(&mut self, name: &str, decl_stem: &str, reexport_stem: &str) {
        self.classes.insert(
            name.to_string(),
            RegisteredClass {
                decl_stem: decl_stem.to_string(),
                reexport_stem: reexport_stem.to_string(),
            },
        );
    }

    /// Register every class in an environment, memoizing output filenames
    /// through the shared side table.
    pub fn register_env(&mut self, env: &Environment, filenames: &mut Filenames) {
        let index = ClassIndex::from_env(env, filenames);
        for module in env.values() {
            for item in module.items.values() {
                if let ItemDesc::Class(class) = item {
                    let decl = index.decl_stem(&class.name).unwrap_or_default().to_string();
                    let reexport =
                        index.reexport_stem(&class.name).unwrap_or_default().to_string();
                    self.register_class(&class.name, &decl, &reexport);
                }
            }
        }
    }

    fn class(&self, name: &str) -> Option<&RegisteredClass> {
        self.classes.get(name)
    }

    fn unknown(&self, t: &TypeSpec) -> GenError {
        GenError::UnknownType(t.describe())
    }

    /// Source expression a native-to-managed conversion reads from.
    fn source_expr(var: &str, opts: &ConvertOpts) -> String {
        match &opts.inst_name {
            Some(inst) => format!("{inst}.{var}"),
            None => var.to_string(),
        }
    }

    /// Cache slot name for a variable: `_<var>`, prefixed when requested.
    fn cache_slot(var: &str, opts: &ConvertOpts) -> String {
        match &opts.cache_prefix {
            Some(prefix) => format!("{prefix}._{var}"),
            None => format!("_{var}"),
        }
    }
}

impl TypeSystem for BuiltinTypeSystem {
    fn native_name(&self, t: &TypeSpec) -> GenResult<String> {
        match t {
            TypeSpec::Name(n) => {
                if let Some(s) = scalar(n) {
                    return Ok(s.native.to_string());
                }
                match self.class(n) {
                    Some(c) => Ok(format!("{}.{n}", c.decl_stem)),
                    None => Err(self.unknown(t)),
                }
            }
            TypeSpec::Template { name, args } if name == "vector" && args.len() == 1 => {
                Ok(format!("vector[{}]", self.native_name(&args[0])?))
            }
            TypeSpec::Template { .. } => Err(self.unknown(t)),
            TypeSpec::Refined { base, .. } => self.native_name(base),
        }
    }

    fn managed_name(&self, t: &TypeSpec) -> GenResult<String> {
        match t {
            TypeSpec::Name(n) => {
                if let Some(s) = scalar(n) {
                    return Ok(s.dynamic.to_string());
                }
                match self.class(n) {
                    Some(_) => Ok(n.clone()),
                    None => Err(self.unknown(t)),
                }
            }
            TypeSpec::Template { name, args } if name == "vector" && args.len() == 1 => {
                Ok("list".to_string())
            }
            TypeSpec::Template { .. } => Err(self.unknown(t)),
            TypeSpec::Refined { base, .. } => self.managed_name(base),
        }
    }

    fn dynamic_name(&self, t: &TypeSpec) -> GenResult<String> {
        // The managed wrapper type is also the runtime-observed type.
        self.managed_name(t)
    }

    fn is_refinement(&self, t: &TypeSpec) -> bool {
        matches!(t, TypeSpec::Refined { .. })
    }

    fn cimport_tuples(&self, t: &TypeSpec, scope: DepScope, acc: &mut BTreeSet<DepTuple>) {
        match t {
            TypeSpec::Name(n) => {
                if is_string(n) {
                    acc.insert(DepTuple::aliased("libcpp.string", "string", "std_string"));
                } else if let Some(c) = self.class(n) {
                    match scope {
                        DepScope::Native => {
                            acc.insert(DepTuple::module(&c.decl_stem));
                        }
                        DepScope::Managed => {
                            acc.insert(DepTuple::module(&c.decl_stem));
                            acc.insert(DepTuple::item(&c.reexport_stem, n));
                        }
                    }
                }
            }
            TypeSpec::Template { name, args } => {
                if name == "vector" {
                    acc.insert(DepTuple::item("libcpp.vector", "vector"));
                }
                for arg in args {
                    self.cimport_tuples(arg, scope, acc);
                }
            }
            TypeSpec::Refined { base, .. } => self.cimport_tuples(base, scope, acc),
        }
    }

    fn import_tuples(&self, t: &TypeSpec, acc: &mut BTreeSet<DepTuple>) {
        match t {
            TypeSpec::Name(n) => {
                if let Some(c) = self.class(n) {
                    acc.insert(DepTuple::item(&c.reexport_stem, n));
                }
            }
            TypeSpec::Template { args, .. } => {
                for arg in args {
                    self.import_tuples(arg, acc);
                }
            }
            TypeSpec::Refined { base, .. } => self.import_tuples(base, acc),
        }
    }

    fn native_to_managed(
        &self,
        var: &str,
        t: &TypeSpec,
        opts: &ConvertOpts,
    ) -> GenResult<Converted> {
        let src = Self::source_expr(var, opts);
        match t {
            TypeSpec::Name(n) => {
                if scalar(n).is_some() {
                    if n == "void" {
                        return Err(self.unknown(t));
                    }
                    let expr = if is_string(n) {
                        format!("bytes({src}.c_str()).decode()")
                    } else if n == "char" {
                        format!("chr(<int> {src})")
                    } else {
                        src
                    };
                    return Ok(Converted { expr, ..Default::default() });
                }
                if self.class(n).is_none() {
                    return Err(GenError::UnknownClass(n.clone()));
                }
                let proxy = format!("{var}_proxy");
                let decls = vec![format!("cdef {n} {proxy}")];
                if opts.cached {
                    let cache = Self::cache_slot(var, opts);
                    let body = vec![
                        format!("if {cache} is None:"),
                        format!("    {proxy} = {n}()"),
                        format!("    {proxy}._free_inst = False"),
                        format!("    {proxy}._inst = &{src}"),
                        format!("    {cache} = {proxy}"),
                    ];
                    Ok(Converted { decls, body, expr: cache.clone(), cache_name: Some(cache) })
                } else {
                    let body = vec![
                        format!("{proxy} = {n}()"),
                        format!("{proxy}._free_inst = False"),
                        format!("{proxy}._inst = &{src}"),
                    ];
                    Ok(Converted { decls, body, expr: proxy, cache_name: None })
                }
            }
            TypeSpec::Template { name, args } if name == "vector" && args.len() == 1 => {
                let elem = &args[0];
                let pull = match elem {
                    TypeSpec::Name(n) if is_string(n) => {
                        format!("[bytes(v.c_str()).decode() for v in {src}]")
                    }
                    TypeSpec::Name(n) if scalar(n).is_some() => format!("list({src})"),
                    _ => return Err(self.unknown(t)),
                };
                if opts.cached {
                    let cache = Self::cache_slot(var, opts);
                    let body =
                        vec![format!("if {cache} is None:"), format!("    {cache} = {pull}")];
                    Ok(Converted {
                        decls: Vec::new(),
                        body,
                        expr: cache.clone(),
                        cache_name: Some(cache),
                    })
                } else {
                    Ok(Converted { expr: pull, ..Default::default() })
                }
            }
            TypeSpec::Template { .. } => Err(self.unknown(t)),
            // Narrowing does not change the outbound representation.
            TypeSpec::Refined { base, .. } => self.native_to_managed(var, base, opts),
        }
    }

    fn managed_to_native(&self, var: &str, t: &TypeSpec) -> GenResult<Converted> {
        match t {
            TypeSpec::Name(n) => {
                if let Some(s) = scalar(n) {
                    if n == "void" {
                        return Err(self.unknown(t));
                    }
                    if is_string(n) {
                        return Ok(Converted {
                            decls: vec![format!("cdef std_string {var}_ss")],
                            body: vec![
                                format!("{var}_bytes = {var}.encode()"),
                                format!("{var}_ss = std_string(<char *> {var}_bytes)"),
                            ],
                            expr: format!("{var}_ss"),
                            cache_name: None,
                        });
                    }
                    return Ok(Converted {
                        expr: format!("<{}> {var}", s.native),
                        ..Default::default()
                    });
                }
                match self.class(n) {
                    Some(c) => Ok(Converted {
                        expr: format!("(<{}.{n} *> {var}._inst)[0]", c.decl_stem),
                        ..Default::default()
                    }),
                    None => Err(GenError::UnknownClass(n.clone())),
                }
            }
            TypeSpec::Template { name, args } if name == "vector" && args.len() == 1 => {
                let elem = &args[0];
                let TypeSpec::Name(en) = elem else {
                    return Err(self.unknown(t));
                };
                let Some(es) = scalar(en) else {
                    return Err(self.unknown(t));
                };
                if is_string(en) {
                    return Err(self.unknown(t));
                }
                let native_elem = es.native;
                Ok(Converted {
                    decls: vec![format!("cdef vector[{native_elem}] {var}_vec")],
                    body: vec![
                        format!("for {var}_item in {var}:"),
                        format!("    {var}_vec.push_back(<{native_elem}> {var}_item)"),
                    ],
                    expr: format!("{var}_vec"),
                    cache_name: None,
                })
            }
            TypeSpec::Template { .. } => Err(self.unknown(t)),
            TypeSpec::Refined { base, constraint } => {
                // The constraint gate raises TypeError, the canonical
                // incompatible-call error the dispatcher fallback tolerates.
                let mut conv = self.managed_to_native(var, base)?;
                let cond = constraint.replace("{}", var);
                conv.body.insert(
                    0,
                    format!(
                        "if not ({cond}): raise TypeError('{var} rejected by refinement constraint')"
                    ),
                );
                Ok(conv)
            }
        }
    }
}
