// Re-export header generation: the `cdef class` declarations that expose
// each wrapper's instance handle and cached-property backing slots to other
// compilation units.

use std::collections::BTreeSet;

use crate::document::{join_sections, Block, AUTOGEN_WARNING};
use crate::error::GenResult;
use crate::schema::{is_private_name, ClassDesc, ItemDesc, ModuleDesc, TypeSpec};
use crate::typesystem::{render_cimports, ConvertOpts, DepScope, DepTuple, TypeSystem};

/// Generate the re-export header for one target module. Only classes
/// contribute; function-only modules still get a valid (mostly empty) file.
pub fn mod_reexport(module: &ModuleDesc, ts: &dyn TypeSystem) -> GenResult<String> {
    let mut cimports: BTreeSet<DepTuple> = BTreeSet::new();
    let mut bodies: Vec<String> = Vec::new();
    for item in module.items.values() {
        if let ItemDesc::Class(class) = item {
            bodies.push(class_reexport(class, ts, &mut cimports)?);
        }
    }

    let cimport_lines = render_cimports(&cimports).join("\n");
    let body = bodies.join("\n");
    let extra = module.extra.reexport.clone().unwrap_or_default();
    Ok(join_sections(&[AUTOGEN_WARNING, &cimport_lines, &body, &extra]))
}

fn class_reexport(
    desc: &ClassDesc,
    ts: &dyn TypeSystem,
    cimports: &mut BTreeSet<DepTuple>,
) -> GenResult<String> {
    // The class's own extern declarations are always needed for casts.
    ts.cimport_tuples(&TypeSpec::name(&desc.name), DepScope::Native, cimports);

    let mut parents = Vec::new();
    if let Some(names) = &desc.parents {
        for p in names {
            let pt = TypeSpec::name(p);
            parents.push(ts.managed_name(&pt)?);
            ts.cimport_tuples(&pt, DepScope::Managed, cimports);
        }
    }
    let parent_fill =
        if parents.is_empty() { String::new() } else { format!("({})", parents.join(", ")) };

    let mut body = Vec::new();
    if desc.parents.is_none() {
        // Root classes own the native handle and its lifetime flag.
        body.push("cdef void * _inst".to_string());
        body.push("cdef public bint _free_inst".to_string());
    }
    for (aname, atype) in &desc.attrs {
        if is_private_name(aname) {
            continue;
        }
        let probe = ConvertOpts { inst_name: None, cache_prefix: None, cached: true };
        let conv = ts.native_to_managed(aname, atype, &probe)?;
        if let Some(slot) = conv.cache_name {
            ts.cimport_tuples(atype, DepScope::Managed, cimports);
            body.push(format!("cdef public {} {slot}", ts.managed_name(atype)?));
        }
    }
    if body.is_empty() {
        body.push("pass".to_string());
    }

    let mut block = Block::new();
    block.line(0, format!("cdef class {}{parent_fill}:", desc.name));
    block.lines(1, &body);
    block.blank();

    let mut text = block.render();
    if let Some(extra) = &desc.extra.reexport {
        text.push_str(extra);
        text.push('\n');
    }
    Ok(text)
}
