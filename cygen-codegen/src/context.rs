// Generation context: output-name memoization and class hierarchy lookups.

use std::collections::BTreeMap;

use crate::schema::{ClassDesc, Environment, ItemDesc, MethodSig};

/// Side table of computed output filenames, keyed by target module name.
/// Replaces in-place annotation of caller-owned descriptions: each name is
/// computed once and reused by every later pipeline pass.
#[derive(Debug, Default)]
pub struct Filenames {
    decl: BTreeMap<String, String>,
    reexport: BTreeMap<String, String>,
    wrapper: BTreeMap<String, String>,
}

impl Filenames {
    pub fn new() -> Self {
        Filenames::default()
    }

    /// Declaration-header filename for a target (`cpp_<target>.pxd` default).
    pub fn decl(&mut self, target: &str, explicit: Option<&str>) -> String {
        memoize(&mut self.decl, target, explicit, || {
            format!("cpp_{}.pxd", target.to_lowercase())
        })
    }

    /// Re-export header filename for a target (`<target>.pxd` default).
    pub fn reexport(&mut self, target: &str, explicit: Option<&str>) -> String {
        memoize(&mut self.reexport, target, explicit, || {
            format!("{}.pxd", target.to_lowercase())
        })
    }

    /// Implementation filename for a target (`<target>.pyx` default).
    pub fn wrapper(&mut self, target: &str, explicit: Option<&str>) -> String {
        memoize(&mut self.wrapper, target, explicit, || {
            format!("{}.pyx", target.to_lowercase())
        })
    }
}

fn memoize(
    table: &mut BTreeMap<String, String>,
    target: &str,
    explicit: Option<&str>,
    default: impl FnOnce() -> String,
) -> String {
    table
        .entry(target.to_string())
        .or_insert_with(|| explicit.map(String::from).unwrap_or_else(default))
        .clone()
}

/// Strip the extension from a generated filename, giving the module stem
/// used in `cimport` lines and qualified call sites.
pub fn file_stem(filename: &str) -> &str {
    filename.rsplit_once('.').map_or(filename, |(stem, _)| stem)
}

/// Flat namespace of every class description in an environment, plus the
/// declaration-header stem each class was declared in. Used to resolve
/// class hierarchies and to qualify constructor and call sites.
#[derive(Debug, Default)]
pub struct ClassIndex {
    classes: BTreeMap<String, ClassDesc>,
    decl_stems: BTreeMap<String, String>,
    reexport_stems: BTreeMap<String, String>,
}

impl ClassIndex {
    /// Collect all classes across the environment, memoizing filenames as
    /// a side effect so later pipelines observe identical names.
    pub fn from_env(env: &Environment, filenames: &mut Filenames) -> Self {
        let mut index = ClassIndex::default();
        for (target, module) in env {
            let decl = filenames.decl(target, module.decl_filename.as_deref());
            let reexport = filenames.reexport(target, module.reexport_filename.as_deref());
            for item in module.items.values() {
                if let ItemDesc::Class(class) = item {
                    index.decl_stems.insert(class.name.clone(), file_stem(&decl).to_string());
                    index
                        .reexport_stems
                        .insert(class.name.clone(), file_stem(&reexport).to_string());
                    index.classes.insert(class.name.clone(), class.clone());
                }
            }
        }
        index
    }

    pub fn get(&self, name: &str) -> Option<&ClassDesc> {
        self.classes.get(name)
    }

    /// Declaration-header stem of the module that declares `class_name`.
    pub fn decl_stem(&self, class_name: &str) -> Option<&str> {
        self.decl_stems.get(class_name).map(|s| s.as_str())
    }

    pub fn reexport_stem(&self, class_name: &str) -> Option<&str> {
        self.reexport_stems.get(class_name).map(|s| s.as_str())
    }

    /// Linearized ancestor chain for a class, root-first and self-last,
    /// built by recursively prepending each parent's own chain. A root
    /// class (no parents) yields an empty chain.
    pub fn hierarchy(&self, class_name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        self.hierarchy_into(class_name, &mut chain);
        chain
    }

    fn hierarchy_into(&self, class_name: &str, chain: &mut Vec<String>) {
        let Some(desc) = self.classes.get(class_name) else {
            return;
        };
        let Some(parents) = &desc.parents else {
            return;
        };
        if chain.first().map(String::as_str) != Some(class_name) {
            chain.insert(0, class_name.to_string());
        }
        for parent in parents.iter().rev() {
            chain.insert(0, parent.clone());
            self.hierarchy_into(parent, chain);
        }
    }

    /// The class whose native handle type a method call must be cast to:
    /// the nearest ancestor (root-first) that declares the identical
    /// signature-key -> return pair. Falls back to the class itself when
    /// no ancestor declares it.
    pub fn method_owner(&self, desc: &ClassDesc, sig: &MethodSig) -> String {
        let key = sig.key();
        for ancestor in self.hierarchy(&desc.name) {
            let Some(adesc) = self.classes.get(&ancestor) else {
                continue;
            };
            if let Some(found) = adesc.lookup(&key) {
                if found.returns == sig.returns {
                    return ancestor;
                }
            }
        }
        desc.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArgSpec, ModuleDesc, TypeSpec};
    use indexmap::IndexMap;

    fn method(name: &str, argtypes: &[&str], returns: Option<&str>) -> MethodSig {
        MethodSig {
            name: name.into(),
            args: argtypes
                .iter()
                .enumerate()
                .map(|(i, t)| ArgSpec {
                    name: format!("a{i}"),
                    ty: TypeSpec::name(t),
                    default: None,
                })
                .collect(),
            returns: returns.map(TypeSpec::name),
        }
    }

    fn class(name: &str, parents: Option<&[&str]>, methods: Vec<MethodSig>) -> ClassDesc {
        ClassDesc {
            name: name.into(),
            namespace: "ns".into(),
            header_filename: format!("{}.h", name.to_lowercase()),
            parents: parents.map(|p| p.iter().map(|s| s.to_string()).collect()),
            attrs: BTreeMap::new(),
            methods,
            docstrings: Default::default(),
            extra: Default::default(),
        }
    }

    fn env_of(classes: Vec<ClassDesc>) -> Environment {
        let mut items = IndexMap::new();
        for c in classes {
            items.insert(c.name.clone(), ItemDesc::Class(c));
        }
        let mut env = IndexMap::new();
        env.insert("m".to_string(), ModuleDesc { items, ..Default::default() });
        env
    }

    #[test]
    fn filenames_memoize_once() {
        let mut names = Filenames::new();
        assert_eq!(names.decl("Pack", None), "cpp_pack.pxd");
        // A later explicit value does not override the memoized one.
        assert_eq!(names.decl("Pack", Some("other.pxd")), "cpp_pack.pxd");
        assert_eq!(names.wrapper("Pack", Some("custom.pyx")), "custom.pyx");
        assert_eq!(names.wrapper("Pack", None), "custom.pyx");
    }

    #[test]
    fn hierarchy_is_root_first_self_last() {
        let env = env_of(vec![
            class("A", None, vec![]),
            class("B", Some(&["A"]), vec![]),
            class("C", Some(&["B"]), vec![]),
        ]);
        let index = ClassIndex::from_env(&env, &mut Filenames::new());
        assert_eq!(index.hierarchy("C"), vec!["A", "B", "C"]);
        // Roots own their handle directly and have no ancestor chain.
        assert!(index.hierarchy("A").is_empty());
    }

    #[test]
    fn inherited_method_binds_to_declaring_ancestor() {
        let foo = method("foo", &["int32"], Some("void"));
        let env = env_of(vec![
            class("A", None, vec![foo.clone()]),
            class("B", Some(&["A"]), vec![]),
        ]);
        let index = ClassIndex::from_env(&env, &mut Filenames::new());
        let b = index.get("B").unwrap().clone();
        assert_eq!(index.method_owner(&b, &foo), "A");
    }

    #[test]
    fn unmatched_signature_falls_back_to_self() {
        let foo = method("foo", &["str"], Some("void"));
        let env = env_of(vec![
            class("A", None, vec![method("foo", &["int32"], Some("void"))]),
            class("B", Some(&["A"]), vec![foo.clone()]),
        ]);
        let index = ClassIndex::from_env(&env, &mut Filenames::new());
        let b = index.get("B").unwrap().clone();
        // Different argument types: no ancestor declares this exact key.
        assert_eq!(index.method_owner(&b, &foo), "B");
    }

    #[test]
    fn return_type_must_match_for_ancestor_binding() {
        let child_foo = method("foo", &["int32"], Some("int32"));
        let env = env_of(vec![
            class("A", None, vec![method("foo", &["int32"], Some("void"))]),
            class("B", Some(&["A"]), vec![child_foo.clone()]),
        ]);
        let index = ClassIndex::from_env(&env, &mut Filenames::new());
        let b = index.get("B").unwrap().clone();
        assert_eq!(index.method_owner(&b, &child_foo), "B");
    }
}
