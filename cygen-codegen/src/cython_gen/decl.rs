// Declaration-header generation: extern blocks re-declaring the native
// classes and functions so the wrapper layer can call them.

use std::collections::BTreeSet;

use crate::document::{join_sections, Block, AUTOGEN_WARNING};
use crate::error::GenResult;
use crate::expand::expand_default_args;
use crate::schema::{is_private_name, ClassDesc, FuncDesc, ItemDesc, ModuleDesc};
use crate::typesystem::{render_cimports, DepScope, DepTuple, TypeSystem};

/// Generate the declaration header for one target module.
pub fn mod_decl(
    module: &ModuleDesc,
    ts: &dyn TypeSystem,
    exception: Option<&str>,
) -> GenResult<String> {
    let mut cimports: BTreeSet<DepTuple> = BTreeSet::new();
    let mut bodies: Vec<String> = Vec::new();
    for item in module.items.values() {
        let text = match item {
            ItemDesc::Class(class) => class_decl(class, ts, exception, &mut cimports)?,
            ItemDesc::Function(func) => func_decl(func, ts, exception, &mut cimports)?,
        };
        bodies.push(text);
    }

    let cimport_lines = render_cimports(&cimports).join("\n");
    let body = bodies.join("\n");
    let extra = module.extra.decl.clone().unwrap_or_default();
    Ok(join_sections(&[AUTOGEN_WARNING, &cimport_lines, &body, &extra]))
}

fn exception_suffix(exception: Option<&str>) -> String {
    match exception {
        Some(ann) => format!(" except {ann}"),
        None => String::new(),
    }
}

/// The `cdef cppclass` extern block for one class description.
fn class_decl(
    desc: &ClassDesc,
    ts: &dyn TypeSystem,
    exception: Option<&str>,
    cimports: &mut BTreeSet<DepTuple>,
) -> GenResult<String> {
    let estr = exception_suffix(exception);

    let mut parents = Vec::new();
    if let Some(names) = &desc.parents {
        for p in names {
            let pt = crate::schema::TypeSpec::name(p);
            parents.push(ts.native_name(&pt)?);
            ts.cimport_tuples(&pt, DepScope::Native, cimports);
        }
    }
    let parent_fill =
        if parents.is_empty() { String::new() } else { format!("({})", parents.join(", ")) };

    let mut attr_lines = Vec::new();
    for (aname, atype) in &desc.attrs {
        if is_private_name(aname) {
            continue;
        }
        ts.cimport_tuples(atype, DepScope::Native, cimports);
        attr_lines.push(format!("{} {aname}", ts.native_name(atype)?));
    }

    let sorted = desc.sorted_methods();
    let mut ctor_lines = Vec::new();
    let mut method_lines = Vec::new();
    for sig in expand_default_args(&sorted) {
        if is_private_name(&sig.name) {
            continue;
        }
        let mut argfill = Vec::with_capacity(sig.args.len());
        for arg in &sig.args {
            ts.cimport_tuples(&arg.ty, DepScope::Native, cimports);
            argfill.push(ts.native_name(&arg.ty)?);
        }
        let argfill = argfill.join(", ");
        match &sig.returns {
            None => {
                let line = format!("{}({argfill}){estr}", sig.name);
                if !ctor_lines.contains(&line) {
                    ctor_lines.push(line);
                }
            }
            Some(rtn) => {
                ts.cimport_tuples(rtn, DepScope::Native, cimports);
                let line = format!("{} {}({argfill}){estr}", ts.native_name(rtn)?, sig.name);
                if !method_lines.contains(&line) {
                    method_lines.push(line);
                }
            }
        }
    }

    let mut block = Block::new();
    block.line(
        0,
        format!(
            "cdef extern from \"{}\" namespace \"{}\":",
            desc.header_filename, desc.namespace
        ),
    );
    block.blank();
    block.line(1, format!("cdef cppclass {}{parent_fill}:", desc.name));
    block.line(2, "# constructors");
    block.lines(2, &ctor_lines);
    block.blank();
    block.line(2, "# attributes");
    block.lines(2, &attr_lines);
    block.blank();
    block.line(2, "# methods");
    block.lines(2, &method_lines);
    block.blank();

    let mut text = block.render();
    if let Some(extra) = &desc.extra.decl {
        text.push_str(extra);
        text.push('\n');
    }
    Ok(text)
}

/// The extern block declaring one free-function overload set.
fn func_decl(
    desc: &FuncDesc,
    ts: &dyn TypeSystem,
    exception: Option<&str>,
    cimports: &mut BTreeSet<DepTuple>,
) -> GenResult<String> {
    let estr = exception_suffix(exception);

    let sorted = desc.sorted_signatures();
    let mut lines = Vec::new();
    for sig in expand_default_args(&sorted) {
        if is_private_name(&sig.name) {
            continue;
        }
        let mut argfill = Vec::with_capacity(sig.args.len());
        for arg in &sig.args {
            ts.cimport_tuples(&arg.ty, DepScope::Native, cimports);
            argfill.push(ts.native_name(&arg.ty)?);
        }
        let rtype = match &sig.returns {
            Some(rtn) => {
                ts.cimport_tuples(rtn, DepScope::Native, cimports);
                ts.native_name(rtn)?
            }
            None => "void".to_string(),
        };
        let line = format!("{rtype} {}({}){estr}", sig.name, argfill.join(", "));
        if !lines.contains(&line) {
            lines.push(line);
        }
    }

    let mut block = Block::new();
    block.line(0, "# function signatures");
    block.line(
        0,
        format!(
            "cdef extern from \"{}\" namespace \"{}\":",
            desc.header_filename, desc.namespace
        ),
    );
    block.blank();
    block.lines(1, &lines);
    block.blank();

    let mut text = block.render();
    if let Some(extra) = &desc.extra.decl {
        text.push_str(extra);
        text.push('\n');
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArgSpec, MethodSig, TypeSpec};
    use crate::typesystem::BuiltinTypeSystem;
    use std::collections::BTreeMap;

    fn arg(name: &str, ty: &str) -> ArgSpec {
        ArgSpec { name: name.into(), ty: TypeSpec::name(ty), default: None }
    }

    fn shape_class() -> ClassDesc {
        let mut attrs = BTreeMap::new();
        attrs.insert("area".to_string(), TypeSpec::name("float64"));
        attrs.insert("_hidden".to_string(), TypeSpec::name("int32"));
        ClassDesc {
            name: "Shape".into(),
            namespace: "geo".into(),
            header_filename: "shape.h".into(),
            parents: None,
            attrs,
            methods: vec![
                MethodSig { name: "Shape".into(), args: vec![], returns: None },
                MethodSig {
                    name: "scale".into(),
                    args: vec![arg("by", "float64")],
                    returns: Some(TypeSpec::name("void")),
                },
                MethodSig { name: "~Shape".into(), args: vec![], returns: None },
            ],
            docstrings: Default::default(),
            extra: Default::default(),
        }
    }

    #[test]
    fn class_decl_externs_public_members_only() {
        let ts = BuiltinTypeSystem::new();
        let mut cimports = BTreeSet::new();
        let text = class_decl(&shape_class(), &ts, Some("+"), &mut cimports).unwrap();
        assert!(text.contains("cdef extern from \"shape.h\" namespace \"geo\":"));
        assert!(text.contains("    cdef cppclass Shape:"));
        assert!(text.contains("        Shape() except +"));
        assert!(text.contains("        double area"));
        assert!(text.contains("        void scale(double) except +"));
        assert!(!text.contains("_hidden"));
        assert!(!text.contains("~Shape"));
    }

    #[test]
    fn parent_classes_render_natively_and_register_deps() {
        let mut ts = BuiltinTypeSystem::new();
        ts.register_class("Shape", "cpp_shapes", "shapes");
        let mut desc = shape_class();
        desc.name = "Circle".into();
        desc.parents = Some(vec!["Shape".into()]);
        let mut cimports = BTreeSet::new();
        let text = class_decl(&desc, &ts, None, &mut cimports).unwrap();
        assert!(text.contains("cdef cppclass Circle(cpp_shapes.Shape):"));
        assert!(cimports.contains(&DepTuple::module("cpp_shapes")));
    }

    #[test]
    fn defaulted_arguments_extern_one_line_per_arity() {
        let ts = BuiltinTypeSystem::new();
        let desc = FuncDesc {
            name: "resize".into(),
            namespace: "geo".into(),
            header_filename: "ops.h".into(),
            signatures: vec![MethodSig {
                name: "resize".into(),
                args: vec![
                    arg("w", "int32"),
                    ArgSpec {
                        name: "h".into(),
                        ty: TypeSpec::name("int32"),
                        default: Some("1".into()),
                    },
                ],
                returns: Some(TypeSpec::name("void")),
            }],
            docstring: None,
            extra: Default::default(),
        };
        let mut cimports = BTreeSet::new();
        let text = func_decl(&desc, &ts, Some("+"), &mut cimports).unwrap();
        assert!(text.contains("    void resize(int) except +"));
        assert!(text.contains("    void resize(int, int) except +"));
    }

    #[test]
    fn module_decl_assembles_banner_cimports_and_extra() {
        let ts = BuiltinTypeSystem::new();
        let mut items = indexmap::IndexMap::new();
        let mut class = shape_class();
        class.attrs.insert("label".to_string(), TypeSpec::name("str"));
        items.insert("Shape".to_string(), ItemDesc::Class(class));
        let module = ModuleDesc {
            extra: crate::schema::ExtraCode {
                decl: Some("ctypedef int shape_id".into()),
                ..Default::default()
            },
            items,
            ..Default::default()
        };
        let text = mod_decl(&module, &ts, Some("+")).unwrap();
        assert!(text.starts_with("################"));
        assert!(text.contains("from libcpp.string cimport string as std_string"));
        assert!(text.contains("std_string label"));
        assert!(text.trim_end().ends_with("ctypedef int shape_id"));
        // cimports come before the extern body.
        assert!(text.find("cimport").unwrap() < text.find("cdef extern").unwrap());
    }
}
