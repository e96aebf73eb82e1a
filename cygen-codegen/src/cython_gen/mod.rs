// Generation driver: runs the three per-module pipelines over a whole
// environment and maps output filenames to rendered file contents.

pub mod decl;
pub mod dispatch;
pub mod reexport;
pub mod wrapper;

use std::collections::BTreeMap;

use crate::context::{ClassIndex, Filenames};
use crate::error::GenResult;
use crate::schema::Environment;
use crate::typesystem::TypeSystem;

/// Drives generation for an environment against an injected type system.
/// Output filenames are memoized across the three passes so cross-file
/// references (cimport stems, cast targets) stay consistent.
pub struct Generator<'a> {
    ts: &'a dyn TypeSystem,
    filenames: Filenames,
    exception: Option<String>,
}

impl<'a> Generator<'a> {
    pub fn new(ts: &'a dyn TypeSystem) -> Self {
        Generator { ts, filenames: Filenames::new(), exception: Some("+".to_string()) }
    }

    /// Override the exception annotation on extern declarations.
    /// `None` drops the annotation entirely.
    pub fn with_exception(mut self, exception: Option<String>) -> Self {
        self.exception = exception;
        self
    }

    /// Declaration headers (`cpp_<target>.pxd`) for every module.
    pub fn gen_decls(&mut self, env: &Environment) -> GenResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (target, module) in env {
            let filename = self.filenames.decl(target, module.decl_filename.as_deref());
            log::debug!("generating declaration header {filename}");
            let text = decl::mod_decl(module, self.ts, self.exception.as_deref())?;
            out.insert(filename, text);
        }
        Ok(out)
    }

    /// Re-export headers (`<target>.pxd`) for every module.
    pub fn gen_reexports(&mut self, env: &Environment) -> GenResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (target, module) in env {
            let filename = self.filenames.reexport(target, module.reexport_filename.as_deref());
            log::debug!("generating re-export header {filename}");
            let text = reexport::mod_reexport(module, self.ts)?;
            out.insert(filename, text);
        }
        Ok(out)
    }

    /// Implementation modules (`<target>.pyx`) for every module.
    pub fn gen_wrappers(&mut self, env: &Environment) -> GenResult<BTreeMap<String, String>> {
        let index = ClassIndex::from_env(env, &mut self.filenames);
        let mut out = BTreeMap::new();
        for (target, module) in env {
            let filename = self.filenames.wrapper(target, module.wrapper_filename.as_deref());
            log::debug!("generating implementation module {filename}");
            let text =
                wrapper::mod_wrapper(target, module, &index, &mut self.filenames, self.ts)?;
            out.insert(filename, text);
        }
        Ok(out)
    }

    /// All three families in one map.
    pub fn generate_all(&mut self, env: &Environment) -> GenResult<BTreeMap<String, String>> {
        let mut out = self.gen_decls(env)?;
        out.extend(self.gen_reexports(env)?);
        out.extend(self.gen_wrappers(env)?);
        log::info!("generated {} files for {} modules", out.len(), env.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArgSpec, ClassDesc, ItemDesc, MethodSig, ModuleDesc, TypeSpec};
    use crate::typesystem::BuiltinTypeSystem;
    use indexmap::IndexMap;
    use std::collections::BTreeMap as Map;

    fn foo_env() -> Environment {
        let mut attrs = Map::new();
        attrs.insert("bar".to_string(), TypeSpec::name("float64"));
        let foo = ClassDesc {
            name: "Foo".into(),
            namespace: "lib".into(),
            header_filename: "foo.h".into(),
            parents: None,
            attrs,
            methods: vec![
                MethodSig { name: "Foo".into(), args: vec![], returns: None },
                MethodSig {
                    name: "Foo".into(),
                    args: vec![ArgSpec {
                        name: "bar".into(),
                        ty: TypeSpec::name("float64"),
                        default: None,
                    }],
                    returns: None,
                },
                MethodSig {
                    name: "wiggle".into(),
                    args: vec![ArgSpec {
                        name: "n".into(),
                        ty: TypeSpec::name("int32"),
                        default: Some("1".into()),
                    }],
                    returns: Some(TypeSpec::name("float64")),
                },
            ],
            docstrings: Default::default(),
            extra: Default::default(),
        };
        let mut items = IndexMap::new();
        items.insert("Foo".to_string(), ItemDesc::Class(foo));
        let mut env = IndexMap::new();
        env.insert(
            "foo".to_string(),
            ModuleDesc { docstring: Some("Foo wrappers.".into()), items, ..Default::default() },
        );
        env
    }

    #[test]
    fn all_three_families_share_filenames() {
        let env = foo_env();
        let mut ts = BuiltinTypeSystem::new();
        ts.register_env(&env, &mut Filenames::new());
        let mut generator = Generator::new(&ts);
        let files = generator.generate_all(&env).unwrap();
        let names: Vec<&String> = files.keys().collect();
        assert_eq!(names, vec!["cpp_foo.pxd", "foo.pxd", "foo.pyx"]);
    }

    #[test]
    fn end_to_end_foo_scenario() {
        let env = foo_env();
        let mut ts = BuiltinTypeSystem::new();
        ts.register_env(&env, &mut Filenames::new());
        let mut generator = Generator::new(&ts);
        let files = generator.generate_all(&env).unwrap();

        let decl = &files["cpp_foo.pxd"];
        assert!(decl.contains("cdef extern from \"foo.h\" namespace \"lib\":"));
        assert!(decl.contains("        Foo() except +"));
        assert!(decl.contains("        Foo(double) except +"));
        // Defaulted argument externs both arities.
        assert!(decl.contains("        double wiggle() except +"));
        assert!(decl.contains("        double wiggle(int) except +"));

        let reexport = &files["foo.pxd"];
        assert!(reexport.contains("cdef class Foo:"));
        assert!(reexport.contains("    cdef void * _inst"));
        assert!(reexport.contains("    cdef public bint _free_inst"));

        let pyx = &files["foo.pyx"];
        // Overloaded constructors mangle and dispatch through __init__.
        assert!(pyx.contains("def _foo_foo_0(self):"));
        assert!(pyx.contains("def _foo_foo_1(self, bar):"));
        assert!(pyx.contains("def __init__(self, *args, **kwargs):"));
        assert!(pyx.contains("self._inst = new cpp_foo.Foo(<double> bar)"));
        // Singleton method keeps its bare name, default intact.
        assert!(pyx.contains("def wiggle(self, n=1):"));
        assert!(pyx.contains("rtnval = (<cpp_foo.Foo *> self._inst).wiggle(<int> n)"));
        assert!(pyx.contains("def __dealloc__(self):"));
    }

    #[test]
    fn exception_annotation_is_configurable() {
        let env = foo_env();
        let mut ts = BuiltinTypeSystem::new();
        ts.register_env(&env, &mut Filenames::new());
        let mut generator = Generator::new(&ts).with_exception(None);
        let files = generator.gen_decls(&env).unwrap();
        assert!(!files["cpp_foo.pxd"].contains("except +"));
        assert!(files["cpp_foo.pxd"].contains("        Foo()"));
    }

    #[test]
    fn explicit_filenames_win_over_derived_ones() {
        let mut env = foo_env();
        env.get_mut("foo").unwrap().wrapper_filename = Some("foo_custom.pyx".into());
        let mut ts = BuiltinTypeSystem::new();
        ts.register_env(&env, &mut Filenames::new());
        let mut generator = Generator::new(&ts);
        let files = generator.generate_all(&env).unwrap();
        assert!(files.contains_key("foo_custom.pyx"));
        assert!(!files.contains_key("foo.pyx"));
    }
}
