// Overload grouping and deterministic name mangling.

use std::collections::BTreeMap;

use crate::schema::{MethodSig, SigKey};

/// The canonical initializer name constructors collapse to.
pub const INIT_NAME: &str = "__init__";

/// Number of digits needed to zero-pad indices for a group of `count` members.
fn digit_width(count: usize) -> usize {
    count.to_string().len()
}

/// Mangle one overload variant: `_<owner>_<name>_<index>` lowercased, with
/// the index zero-padded to the group's digit width. Free functions omit
/// the owner segment.
pub fn mangle(owner: Option<&str>, name: &str, index: usize, count: usize) -> String {
    let width = digit_width(count);
    match owner {
        Some(owner) => format!("_{owner}_{name}_{index:0width$}").to_lowercase(),
        None => format!("_{name}_{index:0width$}").to_lowercase(),
    }
}

/// Count of signatures per method name, in one description.
pub fn group_counts<'a>(sigs: impl Iterator<Item = &'a MethodSig>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for sig in sigs {
        *counts.entry(sig.name.clone()).or_insert(0usize) += 1;
    }
    counts
}

/// Build the mangled name table for a description's signatures.
///
/// Groups of size one keep their bare name (constructors collapse to
/// `__init__`); larger groups get deterministic suffixes assigned in
/// sorted-signature-key order. `owner` is the class name, or `None` for
/// free functions.
pub fn mangled_table(owner: Option<&str>, sigs: &[&MethodSig]) -> BTreeMap<SigKey, String> {
    let counts = group_counts(sigs.iter().copied());
    let mut current: BTreeMap<String, usize> = BTreeMap::new();

    let mut sorted: Vec<&MethodSig> = sigs.to_vec();
    sorted.sort_by(|a, b| a.key().cmp(&b.key()));

    let mut table = BTreeMap::new();
    for sig in sorted {
        let count = counts[&sig.name];
        let index = current.entry(sig.name.clone()).or_insert(0);
        let mangled = if count > 1 {
            mangle(owner, &sig.name, *index, count)
        } else if owner.is_some() && sig.is_constructor() {
            INIT_NAME.to_string()
        } else {
            sig.name.clone()
        };
        *index += 1;
        table.insert(sig.key(), mangled);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArgSpec, TypeSpec};

    fn sig(name: &str, argtypes: &[&str], returns: Option<&str>) -> MethodSig {
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

    #[test]
    fn singleton_group_keeps_bare_name() {
        let m = sig("scale", &["float64"], Some("void"));
        let table = mangled_table(Some("Shape"), &[&m]);
        assert_eq!(table[&m.key()], "scale");
    }

    #[test]
    fn singleton_constructor_collapses_to_init() {
        let c = sig("Shape", &[], None);
        let table = mangled_table(Some("Shape"), &[&c]);
        assert_eq!(table[&c.key()], INIT_NAME);
    }

    #[test]
    fn overloads_get_distinct_stable_suffixes() {
        let a = sig("f", &["int32"], Some("void"));
        let b = sig("f", &["str"], Some("void"));
        let table = mangled_table(Some("Shape"), &[&a, &b]);
        assert_eq!(table[&a.key()], "_shape_f_0");
        assert_eq!(table[&b.key()], "_shape_f_1");

        // Stable under input reordering: sorted-key assignment.
        let again = mangled_table(Some("Shape"), &[&b, &a]);
        assert_eq!(table, again);
    }

    #[test]
    fn free_functions_omit_owner() {
        let a = sig("norm", &["int32"], Some("float64"));
        let b = sig("norm", &["float64"], Some("float64"));
        let table = mangled_table(None, &[&a, &b]);
        assert_eq!(table[&a.key()], "_norm_0");
        assert_eq!(table[&b.key()], "_norm_1");
    }

    #[test]
    fn index_padding_follows_group_width() {
        let sigs: Vec<MethodSig> = (0..10)
            .map(|i| sig("f", &[&format!("t{i:02}") as &str], Some("void")))
            .collect();
        let refs: Vec<&MethodSig> = sigs.iter().collect();
        let table = mangled_table(None, &refs);
        let mut names: Vec<&String> = table.values().collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 10);
        assert!(names.iter().all(|n| n.len() == "_f_00".len()));
    }

    #[test]
    fn empty_description_yields_empty_table() {
        let table = mangled_table(Some("Shape"), &[]);
        assert!(table.is_empty());
    }
}
