//! Proof checker (C5): validates proof terms against a theorem statement,
//! managing the local proof heap and the disjoint-variable-enforcing
//! substitution builder that both this module and C6 (`conv`) share.

use std::collections::HashMap;

use crate::context::{build_context, Ctx, CtxEntry};
use crate::conv;
use crate::driver::VerifierState;
use crate::make_sure;
use crate::none_err;
use crate::types::{Binder, DepSet, Expr, ExprNode, Name, Proof, SortId};
use crate::typeck;
use crate::util::{ErrKind, Res, VerifErr};

/// `check_theorem`, exactly as specified: build the arg context, demand
/// every hypothesis and the conclusion land at a provable sort, extend with
/// dummies, then demand the proof's verified result structurally matches the
/// declared conclusion.
pub fn check_theorem(
    state: &mut VerifierState,
    args: &[Binder],
    hyp_names: &[Name],
    hyps: &[Expr],
    concl: &Expr,
    dummies: &[(Name, SortId)],
    proof: &Proof,
) -> Res<()> {
    let ctx = build_context(state, args, Ctx::new())?;

    for h in hyps {
        let (sort, _, _) = typeck::typecheck(state, &ctx, h)?;
        let mods = none_err!(ErrKind::Sort, state.sort_mods(sort), "sort-not-found: unknown hypothesis sort")?;
        make_sure!(ErrKind::Sort, mods.provable, "non-provable conclusion: hypothesis is not stated at a provable sort");
    }
    let (concl_sort, _, _) = typeck::typecheck(state, &ctx, concl)?;
    let concl_mods = none_err!(ErrKind::Sort, state.sort_mods(concl_sort), "sort-not-found: unknown conclusion sort")?;
    make_sure!(ErrKind::Sort, concl_mods.provable, "non-provable conclusion: theorem conclusion is not stated at a provable sort");

    let mut ctx = ctx;
    for (v, s) in dummies {
        let mods = none_err!(ErrKind::Sort, state.sort_mods(*s), "sort-not-found: unknown dummy sort")?;
        make_sure!(ErrKind::Sort, !mods.strict, "strict-sort-bind: dummy '{}' cannot be bound at a strict sort",
            state.names.resolve(*v));
        make_sure!(ErrKind::Sort, !mods.free, "free-sort-bind: dummy '{}' cannot be bound at a free sort",
            state.names.resolve(*v));
        make_sure!(ErrKind::Scoping, !ctx.vars.contains_key(v), "duplicate-variable: dummy '{}' shadows an argument",
            state.names.resolve(*v));
        let bit = ctx.alloc_bv(state.config.max_bound_vars)?;
        ctx.vars.insert(*v, CtxEntry { sort: *s, bound: true, deps: DepSet::singleton(bit) });
        ctx.order.push(*v);
    }

    let mut heap: HashMap<Name, Expr> = HashMap::new();
    for (name, e) in hyp_names.iter().zip(hyps.iter()) {
        make_sure!(ErrKind::Scoping, !heap.contains_key(name), "shadowed heap name: hypothesis '{}' declared twice",
            state.names.resolve(*name));
        heap.insert(*name, e.clone());
    }

    let result = verify_proof(state, &ctx, &mut heap, proof)?;
    make_sure!(ErrKind::Proof, result == *concl,
        "declaration claim does not match verified result");
    Ok(())
}

/// Walk a proof term, returning the `Expr` it proves. Heap writes are
/// single-assignment: `Let` fails if its name is already bound.
fn verify_proof(
    state: &mut VerifierState,
    ctx: &Ctx,
    heap: &mut HashMap<Name, Expr>,
    proof: &Proof,
) -> Res<Expr> {
    match proof {
        Proof::Hyp(h) => heap.get(h).cloned().ok_or_else(|| {
            VerifErr::proof(format!("missing-subproof: heap has no entry for '{}'", state.names.resolve(*h)))
        }),
        Proof::Thm(tid, es, ps) => {
            let thm = none_err!(ErrKind::Typing, state.get_thm(*tid), "unknown-theorem: no such theorem")?;
            let params: Vec<Binder> = thm.args.clone();
            let thm_hyps: Vec<Expr> = thm.hyps.clone();
            let thm_concl = thm.concl.clone();
            let thm_name = thm.name;

            make_sure!(ErrKind::Proof, thm_hyps.len() == ps.len(),
                "hypothesis-count-mismatch: '{}' expects {} subproof(s), got {}",
                state.names.resolve(thm_name), thm_hyps.len(), ps.len());

            let subst = verify_args(state, ctx, &params, es)?;

            for (h, p) in thm_hyps.iter().zip(ps.iter()) {
                let expected = apply_subst(state, &subst, h);
                let got = verify_proof(state, ctx, heap, p)?;
                make_sure!(ErrKind::Proof, expected == got,
                    "hypothesis-mismatch: subproof for '{}' does not match the required hypothesis",
                    state.names.resolve(thm_name));
            }
            Ok(apply_subst(state, &subst, &thm_concl))
        }
        Proof::Conv(e1, c, p) => {
            let (l, r, _sort, _is_bound) = conv::verify_conv(state, ctx, c)?;
            let e2 = verify_proof(state, ctx, heap, p)?;
            make_sure!(ErrKind::Proof, l == *e1,
                "conversion-mismatch: left side of conversion does not match the claimed target");
            make_sure!(ErrKind::Proof, r == e2,
                "conversion-mismatch: right side of conversion does not match the subproof's conclusion");
            Ok(e1.clone())
        }
        Proof::Let(h, p1, p2) => {
            let e1 = verify_proof(state, ctx, heap, p1)?;
            make_sure!(ErrKind::Scoping, !heap.contains_key(h),
                "shadowed heap name: '{}' already bound on the proof heap", state.names.resolve(*h));
            heap.insert(*h, e1);
            verify_proof(state, ctx, heap, p2)
        }
        Proof::Sorry => Err(VerifErr::proof("incomplete-proof: `Sorry` is never accepted")),
    }
}

/// Substitution construction with disjoint-variable enforcement (shared by
/// C5's `Thm` application and C6's `CUnfold`/`CApp` argument checking).
/// Folds left over `(params, es)`, carrying the bound variables and
/// free-var sets seen at earlier positions so each new argument can be
/// checked against everything that came before it.
pub(crate) fn verify_args(
    state: &VerifierState,
    ctx: &Ctx,
    params: &[Binder],
    es: &[Expr],
) -> Res<HashMap<Name, Expr>> {
    make_sure!(ErrKind::Typing, params.len() == es.len(),
        "arity-mismatch: expected {} argument(s), got {}", params.len(), es.len());

    // `bound_seen` pairs each already-processed bound argument with the bit
    // its *callee* (`params`) position was assigned — the same contiguous
    // power-of-two numbering `build_context` uses when it originally checked
    // this theorem/definition's own argument list. `allowed` (a
    // `Binder::Regular`'s declared deps) is expressed in that same callee
    // namespace, not in the caller's current-context bit assignment, so the
    // DV check below must compare against the callee bit, not
    // `ctx.get(v_j).deps` (mirrors `defcheck::dep_typecheck`'s `parallel` map).
    let mut bound_seen: Vec<(Name, u64)> = Vec::new();
    let mut regular_seen: Vec<&[Name]> = Vec::new();
    let mut subst: HashMap<Name, Expr> = HashMap::new();
    let mut callee_bv: u64 = 1;

    for (param, e) in params.iter().zip(es.iter()) {
        let (sort, is_bound, fv) = typeck::typecheck(state, ctx, e)?;
        make_sure!(ErrKind::Typing, sort == param.sort(), "type-mismatch: argument has the wrong sort");

        match param {
            Binder::Bound { .. } => {
                make_sure!(ErrKind::Typing, is_bound, "non-bound-in-BV-slot: argument must be a bound variable reference");
                let v = match e.node() {
                    ExprNode::Var(v) => *v,
                    _ => return Err(VerifErr::internal("is_bound typecheck result for a non-Var expression")),
                };
                if state.config.dv_check {
                    for prev_fv in &regular_seen {
                        make_sure!(ErrKind::Dv, prev_fv.binary_search(&v).is_err(),
                            "disjoint variable violation: '{}' occurs free in an earlier argument", state.names.resolve(v));
                    }
                }
                bound_seen.push((v, callee_bv));
                callee_bv = callee_bv.checked_mul(2).ok_or_else(|| {
                    VerifErr::new(ErrKind::Scoping, "bound-variable bit overflow")
                })?;
            }
            Binder::Regular { deps: allowed, .. } => {
                if state.config.dv_check {
                    for (v_j, callee_bit) in &bound_seen {
                        if allowed.0 & callee_bit == 0 {
                            make_sure!(ErrKind::Dv, !fv.contains(*v_j),
                                "disjoint variable violation: '{}' occurs free in this argument but is not a declared dependency",
                                state.names.resolve(*v_j));
                        }
                    }
                }
                regular_seen.push(fv.as_slice());
            }
        }
        subst.insert(param.name(), e.clone());
    }
    Ok(subst)
}

/// Apply a finished substitution map to an expression, rebuilding through
/// the arena so the result stays hash-consed. Variables outside the map's
/// domain (anything not a parameter name) pass through unchanged.
pub(crate) fn apply_subst(state: &mut VerifierState, subst: &HashMap<Name, Expr>, expr: &Expr) -> Expr {
    match expr.node() {
        ExprNode::Var(v) => subst.get(v).cloned().unwrap_or_else(|| expr.clone()),
        ExprNode::App(term_id, args) => {
            let term_id = *term_id;
            let new_args: Vec<Expr> = args.iter().map(|a| apply_subst(state, subst, a)).collect();
            state.arena.mk_app(term_id, new_args)
        }
    }
}
