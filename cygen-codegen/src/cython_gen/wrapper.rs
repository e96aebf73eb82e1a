// Implementation-module generation: the extension classes and module-level
// functions that call through the extern declarations, convert values at the
// boundary, and dispatch overloads at runtime.

use std::collections::BTreeSet;

use crate::context::{file_stem, ClassIndex, Filenames};
use crate::document::{join_sections, Block, AUTOGEN_WARNING};
use crate::error::GenResult;
use crate::naming::{mangled_table, INIT_NAME};
use crate::schema::{is_private_name, ArgSpec, ClassDesc, FuncDesc, ItemDesc, ModuleDesc, TypeSpec};
use crate::typesystem::{
    render_cimports, render_imports, ConvertOpts, DepScope, DepTuple, TypeSystem,
};

use super::dispatch::{gen_dispatcher, DispatchVariant};

fn nodoc(name: &str) -> String {
    format!("no docstring for {name}, please file a bug report!")
}

/// Prepend a call-signature line to a docstring, unless the docstring
/// already leads with the member's name.
fn doc_add_sig(doc: &str, name: &str, args: &[ArgSpec], is_method: bool) -> String {
    if doc.starts_with(name) {
        return doc.to_string();
    }
    let mut parts: Vec<String> = if is_method { vec!["self".to_string()] } else { Vec::new() };
    for arg in args {
        match &arg.default {
            Some(d) => parts.push(format!("{}={d}", arg.name)),
            None => parts.push(arg.name.clone()),
        }
    }
    format!("{name}({})\n{doc}", parts.join(", "))
}

fn push_doc(block: &mut Block, indent: usize, doc: &str) {
    let mut lines = doc.lines();
    let Some(first) = lines.next() else {
        return;
    };
    let rest: Vec<&str> = lines.collect();
    if rest.is_empty() {
        block.line(indent, format!("\"\"\"{first}\"\"\""));
    } else {
        block.line(indent, format!("\"\"\"{first}"));
        for line in rest {
            block.line(indent, line);
        }
        block.line(indent, "\"\"\"");
    }
}

fn is_void(ts: &dyn TypeSystem, t: &TypeSpec) -> bool {
    matches!(ts.native_name(t), Ok(n) if n == "void")
}

/// `def` argument list: receiver first for methods, defaults kept in place.
fn def_argfill(args: &[ArgSpec], has_self: bool) -> String {
    let mut parts: Vec<String> = if has_self { vec!["self".to_string()] } else { Vec::new() };
    for arg in args {
        match &arg.default {
            Some(d) => parts.push(format!("{}={d}", arg.name)),
            None => parts.push(arg.name.clone()),
        }
    }
    parts.join(", ")
}

/// One property: caching getter plus cache-invalidating setter.
fn gen_property(
    aname: &str,
    atype: &TypeSpec,
    doc: &str,
    ts: &dyn TypeSystem,
    inst_cast: &str,
) -> GenResult<(Block, Option<String>)> {
    let getter = ts.native_to_managed(aname, atype, &ConvertOpts::field(inst_cast))?;
    let setter = ts.managed_to_native("value", atype)?;

    let mut block = Block::new();
    block.line(0, format!("property {aname}:"));
    push_doc(&mut block, 1, doc);
    block.line(1, "def __get__(self):");
    block.lines(2, &getter.decls);
    block.lines(2, &getter.body);
    block.line(2, format!("return {}", getter.expr));
    block.blank();
    block.line(1, "def __set__(self, value):");
    block.lines(2, &setter.decls);
    block.lines(2, &setter.body);
    block.line(2, format!("{inst_cast}.{aname} = {}", setter.expr));
    if let Some(slot) = &getter.cache_name {
        // A stale cached proxy would keep exposing the old value.
        block.line(2, format!("{slot} = None"));
    }
    block.blank();
    Ok((block, getter.cache_name.clone()))
}

/// One constructor variant: convert arguments, allocate the native instance.
fn gen_constructor(
    sig: &crate::schema::MethodSig,
    mangled: &str,
    native_class: &str,
    doc: &str,
    ts: &dyn TypeSystem,
) -> GenResult<Block> {
    let mut block = Block::new();
    block.line(0, format!("def {mangled}({}):", def_argfill(&sig.args, true)));
    push_doc(&mut block, 1, doc);

    let mut argvals = Vec::with_capacity(sig.args.len());
    let mut decls = Vec::new();
    let mut bodies = Vec::new();
    for arg in &sig.args {
        let conv = ts.managed_to_native(&arg.name, &arg.ty)?;
        decls.extend(conv.decls);
        bodies.extend(conv.body);
        argvals.push(conv.expr);
    }
    block.lines(1, &decls);
    block.lines(1, &bodies);
    block.line(1, format!("self._inst = new {native_class}({})", argvals.join(", ")));
    block.blank();
    Ok(block)
}

/// One method or free-function variant: convert arguments, call through the
/// extern declaration, convert the return value.
fn gen_method(
    sig: &crate::schema::MethodSig,
    mangled: &str,
    inst: &str,
    has_self: bool,
    doc: &str,
    ts: &dyn TypeSystem,
) -> GenResult<Block> {
    let mut block = Block::new();
    block.line(0, format!("def {mangled}({}):", def_argfill(&sig.args, has_self)));
    push_doc(&mut block, 1, doc);

    let mut argvals = Vec::with_capacity(sig.args.len());
    let mut decls = Vec::new();
    let mut bodies = Vec::new();
    for arg in &sig.args {
        let conv = ts.managed_to_native(&arg.name, &arg.ty)?;
        decls.extend(conv.decls);
        bodies.extend(conv.body);
        argvals.push(conv.expr);
    }

    let call = format!("{inst}.{}({})", sig.name, argvals.join(", "));
    match &sig.returns {
        Some(rtn) if !is_void(ts, rtn) => {
            decls.push(format!("cdef {} rtnval", ts.native_name(rtn)?));
            let conv = ts.native_to_managed("rtnval", rtn, &ConvertOpts::return_value())?;
            decls.extend(conv.decls);
            block.lines(1, &decls);
            block.lines(1, &bodies);
            block.line(1, format!("rtnval = {call}"));
            block.lines(1, &conv.body);
            block.line(1, format!("return {}", conv.expr));
        }
        _ => {
            block.lines(1, &decls);
            block.lines(1, &bodies);
            block.line(1, call);
        }
    }
    block.blank();
    Ok(block)
}

/// Group adjacent same-name signatures out of a key-sorted sequence.
fn name_groups<'a>(
    sigs: &[&'a crate::schema::MethodSig],
) -> Vec<(String, Vec<&'a crate::schema::MethodSig>)> {
    let mut groups: Vec<(String, Vec<&'a crate::schema::MethodSig>)> = Vec::new();
    for &sig in sigs {
        match groups.last_mut() {
            Some((name, members)) if *name == sig.name => members.push(sig),
            _ => groups.push((sig.name.clone(), vec![sig])),
        }
    }
    groups
}

/// The full extension-class block for one class description.
fn class_wrapper(
    desc: &ClassDesc,
    index: &ClassIndex,
    ts: &dyn TypeSystem,
    imports: &mut BTreeSet<DepTuple>,
    cimports: &mut BTreeSet<DepTuple>,
) -> GenResult<String> {
    let own = TypeSpec::name(&desc.name);
    ts.cimport_tuples(&own, DepScope::Managed, cimports);
    let native_class = ts.native_name(&own)?;
    let is_root = desc.parents.is_none();

    let mut parents = Vec::new();
    if let Some(names) = &desc.parents {
        for p in names {
            let pt = TypeSpec::name(p);
            parents.push(ts.managed_name(&pt)?);
            ts.cimport_tuples(&pt, DepScope::Managed, cimports);
            ts.import_tuples(&pt, imports);
        }
    }
    let parent_fill =
        if parents.is_empty() { String::new() } else { format!("({})", parents.join(", ")) };

    // Attributes first: their cache slots feed the __cinit__ defaults.
    let inst_cast = format!("(<{native_class} *> self._inst)");
    let mut attr_blocks = Block::new();
    let mut cache_slots = Vec::new();
    for (aname, atype) in &desc.attrs {
        if is_private_name(aname) {
            continue;
        }
        ts.cimport_tuples(atype, DepScope::Managed, cimports);
        ts.import_tuples(atype, imports);
        let doc = desc.docstrings.attrs.get(aname).cloned().unwrap_or_else(|| nodoc(aname));
        let (block, slot) = gen_property(aname, atype, &doc, ts, &inst_cast)?;
        attr_blocks.merge(0, block);
        if let Some(slot) = slot {
            cache_slots.push(slot);
        }
    }

    // Constructor-shaped entries under a foreign name (destructor-like
    // noise) never emit; drop them before grouping so surviving overload
    // groups keep their bare names.
    let sorted: Vec<&crate::schema::MethodSig> = desc
        .sorted_methods()
        .into_iter()
        .filter(|m| !(m.is_constructor() && m.name != desc.name))
        .collect();
    let table = mangled_table(Some(&desc.name), &sorted);

    let mut ctor_blocks = Block::new();
    let mut method_blocks = Block::new();
    for (gname, members) in name_groups(&sorted) {
        if is_private_name(&gname) {
            continue;
        }

        // A return-carrying signature is a normal method even when it
        // shares the class's name; only absent-return entries construct.
        let mut last_is_ctor = false;
        let mut variants = Vec::with_capacity(members.len());
        for &sig in &members {
            let mangled = table[&sig.key()].clone();
            for arg in &sig.args {
                ts.cimport_tuples(&arg.ty, DepScope::Managed, cimports);
                ts.import_tuples(&arg.ty, imports);
            }
            let raw_doc =
                desc.docstrings.methods.get(&gname).cloned().unwrap_or_else(|| nodoc(&gname));
            if sig.is_constructor() {
                let doc = doc_add_sig(&raw_doc, &gname, &sig.args, true);
                ctor_blocks.merge(0, gen_constructor(sig, &mangled, &native_class, &doc, ts)?);
                last_is_ctor = true;
            } else {
                if let Some(rtn) = &sig.returns {
                    ts.cimport_tuples(rtn, DepScope::Managed, cimports);
                    ts.import_tuples(rtn, imports);
                }
                // Calls bind to the root-most ancestor declaring this
                // exact signature, via a cast of the shared handle.
                let owner = index.method_owner(desc, sig);
                let owner_type = TypeSpec::name(&owner);
                let inst = if owner == desc.name {
                    inst_cast.clone()
                } else {
                    ts.cimport_tuples(&owner_type, DepScope::Managed, cimports);
                    ts.import_tuples(&owner_type, imports);
                    format!("(<{} *> self._inst)", ts.native_name(&owner_type)?)
                };
                let doc = doc_add_sig(&raw_doc, &gname, &sig.args, true);
                method_blocks.merge(0, gen_method(sig, &mangled, &inst, true, &doc, ts)?);
                last_is_ctor = false;
            }
            variants.push(DispatchVariant { sig: sig.clone(), mangled });
        }

        if variants.len() > 1 {
            // The dispatcher follows the shape of the group's final
            // variant: a constructor tail registers under __init__ and
            // returns completion only.
            let dispatch_name = if last_is_ctor { INIT_NAME } else { gname.as_str() };
            let doc = desc.docstrings.methods.get(&gname).cloned().unwrap_or_else(|| nodoc(&gname));
            let (argtypes, dispatcher) = gen_dispatcher(
                dispatch_name,
                &variants,
                ts,
                true,
                !last_is_ctor,
                Some(&doc),
            )?;
            let target = if last_is_ctor { &mut ctor_blocks } else { &mut method_blocks };
            target.lines(0, &argtypes);
            target.merge(0, dispatcher);
        }
    }

    let mut class_block = Block::new();
    class_block.line(0, format!("cdef class {}{parent_fill}:", desc.name));
    let class_doc = desc.docstrings.class.clone().unwrap_or_else(|| nodoc(&desc.name));
    push_doc(&mut class_block, 1, &class_doc);
    class_block.blank();
    class_block.line(1, "# constructors");
    class_block.line(1, "def __cinit__(self, *args, **kwargs):");
    class_block.line(2, "self._inst = NULL");
    class_block.line(2, "self._free_inst = True");
    class_block.blank();
    class_block.line(2, "# cached property defaults");
    for slot in &cache_slots {
        class_block.line(2, format!("{slot} = None"));
    }
    class_block.blank();
    class_block.merge(1, ctor_blocks);
    if is_root {
        cimports.insert(DepTuple::item("libc.stdlib", "free"));
        class_block.line(1, "def __dealloc__(self):");
        class_block.line(2, "if self._free_inst:");
        class_block.line(3, "free(self._inst)");
        class_block.blank();
    }
    class_block.line(1, "# attributes");
    class_block.merge(1, attr_blocks);
    class_block.line(1, "# methods");
    class_block.merge(1, method_blocks);

    let mut text = class_block.render();
    if let Some(extra) = &desc.extra.wrapper {
        text.push('\n');
        text.push_str(extra);
        text.push('\n');
    }
    Ok(text)
}

/// Module-level wrappers for one free-function overload set.
fn func_wrapper(
    desc: &FuncDesc,
    decl_stem: &str,
    ts: &dyn TypeSystem,
    imports: &mut BTreeSet<DepTuple>,
    cimports: &mut BTreeSet<DepTuple>,
) -> GenResult<String> {
    cimports.insert(DepTuple::module(decl_stem));

    let sorted = desc.sorted_signatures();
    let table = mangled_table(None, &sorted);
    let raw_doc = desc.docstring.clone().unwrap_or_else(|| nodoc(&desc.name));

    let mut body = Block::new();
    for (gname, members) in name_groups(&sorted) {
        if is_private_name(&gname) {
            continue;
        }
        for sig in &members {
            let mangled = table[&sig.key()].clone();
            for arg in &sig.args {
                ts.cimport_tuples(&arg.ty, DepScope::Managed, cimports);
                ts.import_tuples(&arg.ty, imports);
            }
            if let Some(rtn) = &sig.returns {
                ts.cimport_tuples(rtn, DepScope::Managed, cimports);
                ts.import_tuples(rtn, imports);
            }
            let doc = doc_add_sig(&raw_doc, &gname, &sig.args, false);
            body.merge(0, gen_method(sig, &mangled, decl_stem, false, &doc, ts)?);
        }
        if members.len() > 1 {
            let variants: Vec<DispatchVariant> = members
                .iter()
                .map(|sig| DispatchVariant {
                    sig: (*sig).clone(),
                    mangled: table[&sig.key()].clone(),
                })
                .collect();
            let (argtypes, dispatcher) =
                gen_dispatcher(&gname, &variants, ts, false, true, Some(&raw_doc))?;
            body.lines(0, &argtypes);
            body.merge(0, dispatcher);
        }
    }

    let mut text = body.render();
    if let Some(extra) = &desc.extra.wrapper {
        text.push('\n');
        text.push_str(extra);
        text.push('\n');
    }
    Ok(text)
}

/// Generate the implementation module for one target.
pub fn mod_wrapper(
    target: &str,
    module: &ModuleDesc,
    index: &ClassIndex,
    filenames: &mut Filenames,
    ts: &dyn TypeSystem,
) -> GenResult<String> {
    let decl_name = filenames.decl(target, module.decl_filename.as_deref());
    let decl_stem = file_stem(&decl_name).to_string();

    let mut imports: BTreeSet<DepTuple> = BTreeSet::new();
    let mut cimports: BTreeSet<DepTuple> = BTreeSet::new();
    let mut bodies = Vec::new();
    for item in module.items.values() {
        let text = match item {
            ItemDesc::Class(class) => {
                class_wrapper(class, index, ts, &mut imports, &mut cimports)?
            }
            ItemDesc::Function(func) => {
                func_wrapper(func, &decl_stem, ts, &mut imports, &mut cimports)?
            }
        };
        bodies.push(text);
    }

    let module_doc = format!(
        "\"\"\"{}\n\"\"\"",
        module.docstring.clone().unwrap_or_else(|| "no docstring, please file a bug report!".into())
    );
    let cimport_lines = render_cimports(&cimports).join("\n");
    let import_lines = render_imports(&imports).join("\n");
    let body = bodies.join("\n");
    let extra = module.extra.wrapper.clone().unwrap_or_default();
    Ok(join_sections(&[
        AUTOGEN_WARNING,
        &module_doc,
        &cimport_lines,
        &import_lines,
        &body,
        &extra,
    ]))
}
