//! Expression typechecker (C3): assigns a sort to an expression and reports
//! whether it is "bound" (a bare reference to a `Bound` context variable),
//! along with its free-variable set.
//!
//! The free-variable set is exactly the memoized `Expr::freevars()` from the
//! hash-consing arena (its union-of-children construction already gives the
//! free-var set of an `App` as the union of its argument free-var sets), so
//! this module only has to compute sorts and boundness; it never walks an
//! already-built expression just to recompute what the arena already cached.

use crate::context::Ctx;
use crate::driver::VerifierState;
use crate::make_sure;
use crate::none_err;
use crate::types::{Binder, Expr, ExprNode, Name, SortId};
use crate::util::{ErrKind, Res, VerifErr};

/// A borrowed view of an already-computed free-variable set, supporting the
/// `O(log n)` membership queries C5's disjoint-variable checks need.
#[derive(Debug, Clone, Copy)]
pub struct FreeVarSet<'e>(&'e [Name]);

impl<'e> FreeVarSet<'e> {
    pub fn contains(self, name: Name) -> bool {
        self.0.binary_search(&name).is_ok()
    }

    pub fn as_slice(self) -> &'e [Name] {
        self.0
    }
}

pub fn typecheck<'e>(
    state: &VerifierState,
    ctx: &Ctx,
    expr: &'e Expr,
) -> Res<(SortId, bool, FreeVarSet<'e>)> {
    match expr.node() {
        ExprNode::Var(name) => {
            let entry = ctx.get(*name).ok_or_else(|| {
                VerifErr::new(ErrKind::Typing, format!("undeclared-var: '{}'", state.names.resolve(*name)))
            })?;
            Ok((entry.sort, entry.bound, FreeVarSet(expr.freevars())))
        }
        ExprNode::App(term_id, args) => {
            let term = none_err!(ErrKind::Typing, state.get_term(*term_id), "unknown-term: no such term")?;
            make_sure!(ErrKind::Typing, term.args.len() == args.len(),
                "arity-mismatch: term '{}' expects {} argument(s), got {}",
                state.names.resolve(term.name), term.args.len(), args.len());

            // Clone the param list so the immutable borrow of `state.terms`
            // doesn't outlive the recursive calls below (which also borrow
            // `state` to resolve nested term ids).
            let params: Vec<Binder> = term.args.clone();
            let term_name = term.name;
            for (param, arg) in params.iter().zip(args.iter()) {
                let (arg_sort, arg_is_bound, _) = typecheck(state, ctx, arg)?;
                make_sure!(ErrKind::Typing, arg_sort == param.sort(),
                    "type-mismatch: argument to '{}' has the wrong sort", state.names.resolve(term_name));
                if let Binder::Bound { .. } = param {
                    make_sure!(ErrKind::Typing, arg_is_bound,
                        "non-bound-in-BV-slot: argument to '{}' must be a bound variable reference",
                        state.names.resolve(term_name));
                }
            }
            let ret_sort = state.get_term(*term_id).expect("checked above").ret_sort;
            Ok((ret_sort, false, FreeVarSet(expr.freevars())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Config;
    use crate::types::{DepSet, ExprArena, SortMods, TermDecl};

    #[test]
    fn var_lookup_reports_boundness_sort_and_freevars() {
        let mut st = VerifierState::new(Config::default());
        let wff = st.names.intern("wff");
        let sort_id = st.insert_sort(wff, SortMods::default()).unwrap();
        let x = st.names.intern("x");
        let mut ctx = Ctx::new();
        ctx.vars.insert(x, crate::context::CtxEntry { sort: sort_id, bound: true, deps: DepSet::singleton(1) });

        let mut arena = ExprArena::new();
        let e = arena.mk_var(x);
        let (sort, bound, fv) = typecheck(&st, &ctx, &e).unwrap();
        assert_eq!(sort, sort_id);
        assert!(bound);
        assert!(fv.contains(x));
    }

    #[test]
    fn undeclared_var_rejected() {
        let st = VerifierState::new(Config::default());
        let ctx = Ctx::new();
        let mut arena = ExprArena::new();
        let stray = {
            let mut st2 = VerifierState::new(Config::default());
            st2.names.intern("y")
        };
        let e = arena.mk_var(stray);
        let err = typecheck(&st, &ctx, &e).unwrap_err();
        assert_eq!(err.kind, ErrKind::Typing);
    }

    #[test]
    fn unknown_term_rejected() {
        let st = VerifierState::new(Config::default());
        let ctx = Ctx::new();
        let mut arena = ExprArena::new();
        let app = arena.mk_app(crate::types::TermId(0), vec![]);
        let err = typecheck(&st, &ctx, &app).unwrap_err();
        assert_eq!(err.kind, ErrKind::Typing);
        assert!(err.msg.contains("unknown-term"));
    }

    #[test]
    fn arity_mismatch_rejected() {
        let mut st = VerifierState::new(Config::default());
        let wff = st.names.intern("wff");
        let sort_id = st.insert_sort(wff, SortMods::default()).unwrap();
        let f = st.names.intern("f");
        let x = st.names.intern("x");
        let tid = st.insert_term(TermDecl {
            name: f,
            args: vec![Binder::Bound { name: x, sort: sort_id }],
            ret_sort: sort_id,
            ret_deps: DepSet::EMPTY,
            def: None,
        }).unwrap();
        let ctx = Ctx::new();
        let mut arena = ExprArena::new();
        let app = arena.mk_app(tid, vec![]);
        let err = typecheck(&st, &ctx, &app).unwrap_err();
        assert_eq!(err.kind, ErrKind::Typing);
        assert!(err.msg.contains("arity-mismatch"));
    }
}
