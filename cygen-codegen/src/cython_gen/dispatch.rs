// Dispatcher synthesis: resolves an overloaded call to one mangled variant
// at runtime via a two-phase protocol (exact structural match, then
// best-effort trial invocation).

use crate::document::Block;
use crate::error::GenResult;
use crate::schema::MethodSig;
use crate::typesystem::TypeSystem;

/// One overload variant a dispatcher can resolve to.
#[derive(Debug, Clone)]
pub struct DispatchVariant {
    pub sig: MethodSig,
    pub mangled: String,
}

/// Synthesize the dispatcher for one overloaded name group.
///
/// Returns the per-variant `<mangled>_argtypes` constant lines (sorted,
/// emitted by the caller ahead of the dispatcher in the same scope) and
/// the dispatcher definition itself. `has_self` distinguishes methods from
/// free functions; `has_rtn` controls whether resolved calls return their
/// value or just complete.
pub fn gen_dispatcher(
    name: &str,
    variants: &[DispatchVariant],
    ts: &dyn TypeSystem,
    has_self: bool,
    has_rtn: bool,
    doc: Option<&str>,
) -> GenResult<(Vec<String>, Block)> {
    let qualifier = if has_self { "self." } else { "" };

    let mut argtypes_lines = Vec::with_capacity(variants.len());
    for v in variants {
        argtypes_lines.push(argtypes_constant(v, ts)?);
    }
    argtypes_lines.sort();

    let mut block = Block::new();
    let argfill = if has_self { "self, *args, **kwargs" } else { "*args, **kwargs" };
    block.line(0, format!("def {name}({argfill}):"));
    if let Some(doc) = doc {
        block.line(1, format!("\"\"\"{doc}\"\"\""));
    }
    block.line(1, "types = set([(i, type(a)) for i, a in enumerate(args)])");
    block.line(1, "types.update([(k, type(v)) for k, v in kwargs.items()])");

    // Phase 1: exact structural match. Fewer refinement-typed arguments
    // first, then ascending argument count, then mangled name.
    let mut exact: Vec<&DispatchVariant> = variants.iter().collect();
    exact.sort_by(|a, b| {
        refinement_count(a, ts)
            .cmp(&refinement_count(b, ts))
            .then(a.sig.args.len().cmp(&b.sig.args.len()))
            .then(a.mangled.cmp(&b.mangled))
    });
    block.line(1, "# vtable-like dispatch for exactly matching types");
    for v in &exact {
        let m = &v.mangled;
        block.line(1, format!("if types <= {qualifier}{m}_argtypes:"));
        if has_rtn {
            block.line(2, format!("return {qualifier}{m}(*args, **kwargs)"));
        } else {
            block.line(2, format!("{qualifier}{m}(*args, **kwargs)"));
            block.line(2, "return");
        }
    }

    // Phase 2: best-effort trial invocation. More refinement-typed
    // arguments first, then descending argument count, then mangled name.
    let mut trial: Vec<&DispatchVariant> = variants.iter().collect();
    trial.sort_by(|a, b| {
        refinement_count(b, ts)
            .cmp(&refinement_count(a, ts))
            .then(b.sig.args.len().cmp(&a.sig.args.len()))
            .then(a.mangled.cmp(&b.mangled))
    });
    block.line(1, "# duck-typed dispatch based on whatever works!");
    for v in &trial {
        let m = &v.mangled;
        block.line(1, "try:");
        if has_rtn {
            block.line(2, format!("return {qualifier}{m}(*args, **kwargs)"));
        } else {
            block.line(2, format!("{qualifier}{m}(*args, **kwargs)"));
            block.line(2, "return");
        }
        block.line(1, "except (RuntimeError, TypeError, NameError):");
        block.line(2, "pass");
    }

    block.line(1, format!("raise RuntimeError('method {name}() could not be dispatched')"));
    block.blank();
    Ok((argtypes_lines, block))
}

fn refinement_count(v: &DispatchVariant, ts: &dyn TypeSystem) -> usize {
    v.sig.args.iter().filter(|a| ts.is_refinement(&a.ty)).count()
}

/// The exact-match requirement set for one variant: each declared argument
/// contributes a (positional index, dynamic type) pair and an
/// (argument name, dynamic type) pair.
fn argtypes_constant(v: &DispatchVariant, ts: &dyn TypeSystem) -> GenResult<String> {
    let mut pairs = Vec::with_capacity(v.sig.args.len() * 2);
    for (i, arg) in v.sig.args.iter().enumerate() {
        pairs.push(format!("({i}, {})", ts.dynamic_name(&arg.ty)?));
    }
    for arg in &v.sig.args {
        pairs.push(format!("(\"{}\", {})", arg.name, ts.dynamic_name(&arg.ty)?));
    }
    let tuple = if pairs.is_empty() {
        String::new()
    } else {
        format!("({})", pairs.join(", "))
    };
    Ok(format!("{}_argtypes = frozenset({tuple})", v.mangled))
}
