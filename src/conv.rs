//! Conversion checker (C6): decides definitional equality between two
//! expressions via reflexivity (`CVar`), congruence (`CApp`), symmetry
//! (`CSym`), and unfolding (`CUnfold`). Transitivity is not a syntactic
//! form here — chains are nested `CApp`/`CUnfold` or composed at the proof
//! level via `Proof::Conv`.

use crate::context::Ctx;
use crate::driver::VerifierState;
use crate::make_sure;
use crate::none_err;
use crate::proofcheck::{apply_subst, verify_args};
use crate::types::{Binder, Conv, Expr, SortId};
use crate::util::{ErrKind, Res, VerifErr};

/// `verify_conv(c) -> (lhs, rhs, sort, is_bound)`.
pub fn verify_conv(state: &mut VerifierState, ctx: &Ctx, c: &Conv) -> Res<(Expr, Expr, SortId, bool)> {
    match c {
        Conv::CVar(v) => {
            let entry = ctx.get(*v).ok_or_else(|| {
                VerifErr::typing(format!("undeclared-var: '{}'", state.names.resolve(*v)))
            })?;
            let e = state.arena.mk_var(*v);
            Ok((e.clone(), e, entry.sort, entry.bound))
        }
        Conv::CApp(tid, cs) => {
            let term = none_err!(ErrKind::Typing, state.get_term(*tid), "unknown-term: no such term")?;
            let params: Vec<Binder> = term.args.clone();
            let ret_sort = term.ret_sort;
            make_sure!(ErrKind::Typing, params.len() == cs.len(),
                "arity-mismatch: expected {} argument(s), got {}", params.len(), cs.len());

            let mut ls = Vec::with_capacity(cs.len());
            let mut rs = Vec::with_capacity(cs.len());
            for (param, c_i) in params.iter().zip(cs.iter()) {
                let (l, r, sort, is_bound) = verify_conv(state, ctx, c_i)?;
                make_sure!(ErrKind::Typing, sort == param.sort(), "type-mismatch: conversion argument has the wrong sort");
                if let Binder::Bound { .. } = param {
                    make_sure!(ErrKind::Typing, is_bound,
                        "non-bound-in-BV-slot: conversion argument must be a bound variable reference");
                }
                ls.push(l);
                rs.push(r);
            }
            let lhs = state.arena.mk_app(*tid, ls);
            let rhs = state.arena.mk_app(*tid, rs);
            Ok((lhs, rhs, ret_sort, false))
        }
        Conv::CSym(inner) => {
            let (l, r, sort, is_bound) = verify_conv(state, ctx, inner)?;
            Ok((r, l, sort, is_bound))
        }
        Conv::CUnfold { term, args, dummies, proof } => {
            let t = none_err!(ErrKind::Typing, state.get_term(*term), "unknown-term: no such term")?;
            let params: Vec<Binder> = t.args.clone();
            let def = none_err!(ErrKind::Proof, t.def.clone(), "not-a-definition: CUnfold target has no definition")?;
            make_sure!(ErrKind::Typing, params.len() == args.len(),
                "arity-mismatch: expected {} argument(s), got {}", params.len(), args.len());
            make_sure!(ErrKind::Scoping, def.dummies.len() == dummies.len(),
                "dummy-count-mismatch: definition declares {} dummy variable(s), unfold supplies {}",
                def.dummies.len(), dummies.len());

            let mut subst = verify_args(state, ctx, &params, args)?;
            for ((dname, _dsort), fresh) in def.dummies.iter().zip(dummies.iter()) {
                let fresh_var = state.arena.mk_var(*fresh);
                subst.insert(*dname, fresh_var);
            }

            let (l, r, sort, is_bound) = verify_conv(state, ctx, proof)?;
            let expected = apply_subst(state, &subst, &def.body);
            make_sure!(ErrKind::Proof, l == expected,
                "conversion-mismatch: unfolded body does not match the definition");

            let lhs = state.arena.mk_app(*term, args.clone());
            Ok((lhs, r, sort, is_bound))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Config;
    use crate::types::{Def, SortMods, TermDecl};

    #[test]
    fn reflexive_var_conversion() {
        let mut st = VerifierState::new(Config::default());
        let wff = st.names.intern("wff");
        let sort_id = st.insert_sort(wff, SortMods::default()).unwrap();
        let x = st.names.intern("x");
        let mut ctx = Ctx::new();
        ctx.vars.insert(x, crate::context::CtxEntry { sort: sort_id, bound: true, deps: crate::types::DepSet::singleton(1) });
        let (l, r, sort, bound) = verify_conv(&mut st, &ctx, &Conv::CVar(x)).unwrap();
        assert_eq!(l, r);
        assert_eq!(sort, sort_id);
        assert!(bound);
    }

    #[test]
    fn symmetry_swaps_sides() {
        let mut st = VerifierState::new(Config::default());
        let wff = st.names.intern("wff");
        let sort_id = st.insert_sort(wff, SortMods::default()).unwrap();
        let f = st.names.intern("f");
        let x = st.names.intern("x");
        let tid = st.insert_term(TermDecl {
            name: f,
            args: vec![Binder::Bound { name: x, sort: sort_id }],
            ret_sort: sort_id,
            ret_deps: crate::types::DepSet::EMPTY,
            def: None,
        }).unwrap();
        let mut ctx = Ctx::new();
        ctx.vars.insert(x, crate::context::CtxEntry { sort: sort_id, bound: true, deps: crate::types::DepSet::singleton(1) });
        let c = Conv::CApp(tid, vec![Conv::CVar(x)]);
        let (l, r, ..) = verify_conv(&mut st, &ctx, &c).unwrap();
        let (sl, sr, ..) = verify_conv(&mut st, &ctx, &Conv::CSym(Box::new(c))).unwrap();
        assert_eq!(sl, r);
        assert_eq!(sr, l);
    }

    #[test]
    fn unfold_matches_definition_body() {
        let mut st = VerifierState::new(Config::default());
        let wff = st.names.intern("wff");
        let sort_id = st.insert_sort(wff, SortMods::default()).unwrap();
        let not = st.names.intern("not");
        let x = st.names.intern("x");
        let body = st.arena.mk_var(x);
        let tid = st.insert_term(TermDecl {
            name: not,
            args: vec![Binder::Bound { name: x, sort: sort_id }],
            ret_sort: sort_id,
            ret_deps: crate::types::DepSet::EMPTY,
            def: Some(Def { dummies: vec![], body: body.clone() }),
        }).unwrap();
        let mut ctx = Ctx::new();
        ctx.vars.insert(x, crate::context::CtxEntry { sort: sort_id, bound: true, deps: crate::types::DepSet::singleton(1) });
        let c = Conv::CUnfold {
            term: tid,
            args: vec![st.arena.mk_var(x)],
            dummies: vec![],
            proof: Box::new(Conv::CVar(x)),
        };
        let (l, r, sort, _bound) = verify_conv(&mut st, &ctx, &c).unwrap();
        assert_eq!(sort, sort_id);
        assert_eq!(l, st.arena.mk_app(tid, vec![st.arena.mk_var(x)]));
        assert_eq!(r, st.arena.mk_var(x));
    }
}
