//! Definition checker (C4): validates a `def` body against its declared
//! signature and dummy variables, using a dependency-tracking variant of the
//! typechecker that also computes which bound variables an expression may
//! mention *after full unfolding* (so a `Regular` argument can't smuggle a
//! bound variable into a position the callee declared independent of it).

use std::collections::HashMap;

use crate::context::{build_context, Ctx};
use crate::driver::VerifierState;
use crate::make_sure;
use crate::none_err;
use crate::types::{Binder, DepSet, Def, Expr, ExprNode, Name, SortId, TermDecl};
use crate::util::{ErrKind, Res};

/// Iterate the individual set bits of a `DepSet` as standalone bit values
/// (`1`, `2`, `4`, ...), not positions — this is how bound-variable digits
/// are represented throughout the kernel.
fn bits(mut x: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        if x == 0 {
            None
        } else {
            let b = x & x.wrapping_neg();
            x &= !b;
            Some(b)
        }
    })
}

/// The dependency-tracking typecheck used only by the definition checker.
/// Returns `(sort, is_bound, deps)` where `deps` is the set of bound
/// variables (from the *caller's* context) the expression may mention after
/// fully unfolding every definition application inside it.
fn dep_typecheck(state: &VerifierState, ctx: &Ctx, expr: &Expr) -> Res<(SortId, bool, DepSet)> {
    match expr.node() {
        ExprNode::Var(name) => {
            let entry = ctx.get(*name).ok_or_else(|| {
                crate::util::VerifErr::new(ErrKind::Typing, format!("undeclared-var: '{}'", state.names.resolve(*name)))
            })?;
            Ok((entry.sort, entry.bound, entry.deps))
        }
        ExprNode::App(term_id, args) => {
            let term = none_err!(ErrKind::Typing, state.get_term(*term_id), "unknown-term: no such term")?;
            make_sure!(ErrKind::Typing, term.args.len() == args.len(),
                "arity-mismatch: term '{}' expects {} argument(s), got {}",
                state.names.resolve(term.name), term.args.len(), args.len());
            let params: Vec<Binder> = term.args.clone();
            let term_name = term.name;
            let ret_sort = term.ret_sort;
            let ret_deps = term.ret_deps;

            // Map from the callee's own bound-parameter bit (assigned the
            // same way `build_context` assigns it: consecutive powers of
            // two, in declaration order) to the caller-side `DepSet` of the
            // concrete variable passed at that position.
            let mut parallel: HashMap<u64, DepSet> = HashMap::new();
            let mut callee_bv = 1u64;
            let mut total = DepSet::EMPTY;

            for (param, arg) in params.iter().zip(args.iter()) {
                let (arg_sort, arg_is_bound, arg_deps) = dep_typecheck(state, ctx, arg)?;
                make_sure!(ErrKind::Typing, arg_sort == param.sort(),
                    "type-mismatch: argument to '{}' has the wrong sort", state.names.resolve(term_name));
                match param {
                    Binder::Bound { .. } => {
                        make_sure!(ErrKind::Typing, arg_is_bound,
                            "non-bound-in-BV-slot: argument to '{}' must be a bound variable reference",
                            state.names.resolve(term_name));
                        parallel.insert(callee_bv, arg_deps);
                        callee_bv = callee_bv.checked_mul(2).ok_or_else(|| {
                            crate::util::VerifErr::new(ErrKind::Scoping, "bound-variable bit overflow")
                        })?;
                    }
                    Binder::Regular { deps: allowed, .. } => {
                        let mapped_allowed = bits(allowed.0).fold(DepSet::EMPTY, |acc, b| {
                            acc.union(parallel.get(&b).copied().unwrap_or(DepSet::EMPTY))
                        });
                        total = total.union(arg_deps.subtract(mapped_allowed));
                    }
                }
            }

            let mapped_ret = bits(ret_deps.0).fold(DepSet::EMPTY, |acc, b| {
                acc.union(parallel.get(&b).copied().unwrap_or(DepSet::EMPTY))
            });
            total = total.union(mapped_ret);
            Ok((ret_sort, false, total))
        }
    }
}

/// `check_def`, exactly as specified: build the arg context, validate the
/// return type's dependency list and sort, extend with dummies, then run
/// the dependency-tracking typecheck on the body and demand it matches the
/// declared return sort and stays within the declared return dependencies.
pub fn check_def(
    state: &VerifierState,
    name: Name,
    args: Vec<Binder>,
    ret_sort: SortId,
    ret_deps: DepSet,
    dummies: Vec<(Name, SortId)>,
    body: Expr,
) -> Res<TermDecl> {
    let ctx = build_context(state, &args, Ctx::new())?;

    make_sure!(ErrKind::Scoping, ret_deps.0 & !(ctx.bound_mask()) == 0,
        "unbound-dependency: return type depends on a variable not bound by the argument list");

    let ret_mods = none_err!(ErrKind::Sort, state.sort_mods(ret_sort), "sort-not-found: unknown return sort")?;
    make_sure!(ErrKind::Sort, !ret_mods.pure, "pure sort cannot be a term's return sort");

    let mut ctx = ctx;
    for (v, s) in &dummies {
        let mods = none_err!(ErrKind::Sort, state.sort_mods(*s), "sort-not-found: unknown dummy sort")?;
        make_sure!(ErrKind::Sort, !mods.strict, "strict-sort-bind: dummy '{}' cannot be bound at a strict sort",
            state.names.resolve(*v));
        make_sure!(ErrKind::Sort, !mods.free, "free-sort-bind: dummy '{}' cannot be bound at a free sort",
            state.names.resolve(*v));
        make_sure!(ErrKind::Scoping, !ctx.vars.contains_key(v), "duplicate-variable: dummy '{}' shadows an argument",
            state.names.resolve(*v));
        let bit = ctx.alloc_bv(state.config.max_bound_vars)?;
        ctx.vars.insert(*v, crate::context::CtxEntry { sort: *s, bound: true, deps: DepSet::singleton(bit) });
        ctx.order.push(*v);
    }

    let (body_sort, _is_bound, body_deps) = dep_typecheck(state, &ctx, &body)?;
    make_sure!(ErrKind::Typing, body_sort == ret_sort,
        "type-mismatch: definition body has sort different from the declared return sort");
    make_sure!(ErrKind::Scoping, body_deps.subtract(ret_deps).is_empty(),
        "unbound-dependency: definition body depends on a variable outside the declared return dependencies");

    Ok(TermDecl { name, args, ret_sort, ret_deps, def: Some(Def { dummies, body }) })
}
