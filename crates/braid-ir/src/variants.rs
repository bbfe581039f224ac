//! Variant generation for snippet escapes.
//!
//! A fragment with snippet escapes has one variant per way of filling its
//! holes: each snippet escape picks one of the snippet quotes linked to
//! it, and the variant is the fragment with every hole replaced by the
//! chosen quote's body.

use std::collections::BTreeMap;
use std::convert::Infallible;

use braid_ast::{Expr, rewrite_table};
use braid_core::{CompileError, CompileResult, NodeId};
use tracing::{debug, trace};

use crate::ir::{Prog, ProgEscape, ProgId, ProgTable};

/// One resolution of a fragment's snippet escapes.
#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    pub prog_id: ProgId,
    /// The chosen candidate for each of the fragment's snippet escapes, in
    /// the order the escapes were written, followed by the choices for
    /// escapes inside those candidates.
    pub config: Vec<ProgId>,
    /// Fragments replaced by this variant, keyed by ID.
    pub progs: ProgTable,
}

impl Variant {
    /// `base` with this variant's fragments in place of the originals.
    pub fn overlay(&self, base: &ProgTable) -> ProgTable {
        let mut progs = base.clone();
        progs.extend(self.progs.clone());
        progs
    }
}

/// Variants per fragment; `None` for fragments without snippet escapes.
pub type VariantTable = BTreeMap<ProgId, Option<Vec<Variant>>>;

/// Every way of picking one element from each set. The first set varies
/// slowest. Any empty set, or no sets at all, gives no combinations.
pub fn cross_product<T: Clone>(sets: &[Vec<T>]) -> Vec<Vec<T>> {
    let Some((head, tail)) = sets.split_first() else {
        return Vec::new();
    };
    if tail.is_empty() {
        return head.iter().map(|value| vec![value.clone()]).collect();
    }
    let tail_product = cross_product(tail);
    head.iter()
        .flat_map(|value| {
            tail_product.iter().map(move |rest| {
                let mut combination = Vec::with_capacity(rest.len() + 1);
                combination.push(value.clone());
                combination.extend(rest.iter().cloned());
                combination
            })
        })
        .collect()
}

/// Replace each subtree whose ID is a key of `substitutions` with the
/// mapped tree; everything else is rebuilt unchanged.
pub fn substitute(tree: &Expr, substitutions: &BTreeMap<NodeId, Expr>) -> Expr {
    let table = rewrite_table::<(), Infallible>(|expr, _| substitutions.get(&expr.id).cloned());
    match table.visit(tree, ()) {
        Ok(expr) => expr,
        Err(never) => match never {},
    }
}

/// The candidates for each of `prog`'s snippet escapes, in table order.
fn candidates(progs: &ProgTable, prog: &Prog) -> CompileResult<Vec<Vec<ProgId>>> {
    prog.owned_snippet
        .iter()
        .map(|escape| {
            let options: Vec<ProgId> = progs
                .values()
                .filter(|other| other.snippet_escape == Some(escape.id))
                .map(|other| other.id)
                .collect();
            if options.is_empty() {
                return Err(CompileError::UnresolvedSnippet { escape: escape.id });
            }
            Ok(options)
        })
        .collect()
}

/// Build the variant of `prog` that fills its snippet escapes with `config`.
///
/// The chosen candidates' own snippet escapes become the variant's
/// `owned_snippet`, to be filled in a later round.
fn prog_variant(prog: &Prog, config: &[ProgId], progs: &ProgTable) -> CompileResult<Prog> {
    let mut variant = prog.clone();
    variant.owned_snippet.clear();
    let mut substitutions = BTreeMap::new();

    for (escape, candidate) in prog.owned_snippet.iter().zip(config) {
        let snippet = progs
            .get(candidate)
            .ok_or(CompileError::UnresolvedSnippet { escape: escape.id })?;
        substitutions.insert(escape.id, snippet.body.clone());

        variant.persist.extend(snippet.persist.iter().cloned());
        variant.splice.extend(snippet.splice.iter().cloned());
        variant.owned_persist.extend(snippet.owned_persist.iter().cloned());
        variant.owned_splice.extend(snippet.owned_splice.iter().cloned());
        variant.owned_snippet.extend(snippet.owned_snippet.iter().cloned());
        union_into(&mut variant.free, &snippet.free);
        union_into(&mut variant.bound, &snippet.bound);

        // Escapes move with the code they are written in.
        for list in [
            &mut variant.persist,
            &mut variant.splice,
            &mut variant.owned_persist,
            &mut variant.owned_splice,
            &mut variant.owned_snippet,
        ] {
            rehome(list, snippet.id, prog.id);
        }
    }

    variant.body = substitute(&prog.body, &substitutions);
    Ok(variant)
}

/// A variant whose holes may not all be filled yet.
struct Partial {
    config: Vec<ProgId>,
    prog: Prog,
    /// Snippet escapes already filled on the way to `prog`.
    filled: Vec<NodeId>,
}

/// Fill `partial`'s open holes in every possible way.
fn expand(progs: &ProgTable, partial: Partial) -> CompileResult<Vec<Partial>> {
    if let Some(escape) = partial
        .prog
        .owned_snippet
        .iter()
        .find(|escape| partial.filled.contains(&escape.id))
    {
        return Err(CompileError::invalid_snippet(
            escape.id,
            "snippet escape is filled with code containing itself",
        ));
    }
    let options = candidates(progs, &partial.prog)?;
    cross_product(&options)
        .into_iter()
        .map(|choice| {
            let prog = prog_variant(&partial.prog, &choice, progs)?;
            let mut filled = partial.filled.clone();
            filled.extend(partial.prog.owned_snippet.iter().map(|escape| escape.id));
            let mut config = partial.config.clone();
            config.extend(choice);
            Ok(Partial {
                config,
                prog,
                filled,
            })
        })
        .collect()
}

fn union_into(target: &mut Vec<NodeId>, extra: &[NodeId]) {
    for id in extra {
        if !target.contains(id) {
            target.push(*id);
        }
    }
}

fn rehome(escapes: &mut [ProgEscape], from: ProgId, to: ProgId) {
    for escape in escapes.iter_mut().filter(|escape| escape.prog == from) {
        escape.prog = to;
    }
}

/// All variants of one fragment, or `None` if it has no snippet escapes.
///
/// Holes brought in by a chosen candidate are filled too, so every variant
/// body is free of snippet escapes. Their choices follow the outer ones in
/// `config`.
pub fn get_variants(progs: &ProgTable, prog: &Prog) -> CompileResult<Option<Vec<Variant>>> {
    if prog.owned_snippet.is_empty() {
        return Ok(None);
    }
    let mut partials = vec![Partial {
        config: Vec::new(),
        prog: prog.clone(),
        filled: Vec::new(),
    }];
    while partials.iter().any(|partial| !partial.prog.owned_snippet.is_empty()) {
        let mut next = Vec::with_capacity(partials.len());
        for partial in partials {
            if partial.prog.owned_snippet.is_empty() {
                next.push(partial);
            } else {
                next.extend(expand(progs, partial)?);
            }
        }
        partials = next;
    }

    let variants: Vec<Variant> = partials
        .into_iter()
        .map(|partial| {
            trace!("variant of {} with {:?}", prog.id, partial.config);
            Variant {
                prog_id: prog.id,
                progs: ProgTable::from([(prog.id, partial.prog)]),
                config: partial.config,
            }
        })
        .collect();
    debug!("fragment {} has {} variants", prog.id, variants.len());
    Ok(Some(variants))
}

/// Variants for every fragment.
///
/// Fails with `UnresolvedSnippet` if any snippet escape has no candidate.
pub fn presplice(progs: &ProgTable) -> CompileResult<VariantTable> {
    progs
        .values()
        .map(|prog| Ok((prog.id, get_variants(progs, prog)?)))
        .collect()
}
