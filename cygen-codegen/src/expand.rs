// Default-argument expansion: one signature per omitted-defaults suffix.

use crate::schema::{ArgSpec, MethodSig};

/// Expand each signature with defaulted trailing arguments into one
/// signature per arity, dropping defaulted arguments from the right.
/// The produced signatures carry no defaults (each arity is its own
/// variant) and are returned sorted by signature key, deduplicated.
pub fn expand_default_args(sigs: &[&MethodSig]) -> Vec<MethodSig> {
    let mut out: Vec<MethodSig> = Vec::new();
    for sig in sigs {
        let stripped: Vec<ArgSpec> = sig
            .args
            .iter()
            .map(|a| ArgSpec { name: a.name.clone(), ty: a.ty.clone(), default: None })
            .collect();
        out.push(MethodSig {
            name: sig.name.clone(),
            args: stripped.clone(),
            returns: sig.returns.clone(),
        });

        // Drop defaulted arguments from the right, one arity at a time.
        let mut arity = sig.args.len();
        while arity > 0 && sig.args[arity - 1].default.is_some() {
            arity -= 1;
            out.push(MethodSig {
                name: sig.name.clone(),
                args: stripped[..arity].to_vec(),
                returns: sig.returns.clone(),
            });
        }
    }
    out.sort_by(|a, b| a.key().cmp(&b.key()));
    out.dedup_by(|a, b| a.key() == b.key());
    out
}
