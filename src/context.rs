//! Context builder (C2): turns an ordered list of binders into a
//! variable-name -> binder-info map, enforcing shadowing, sort-strictness,
//! and dependency-scope rules as it goes.

use std::collections::HashMap;

use crate::driver::VerifierState;
use crate::make_sure;
use crate::types::{Binder, DepSet, Name, SortId};
use crate::util::{ErrKind, Res};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtxEntry {
    pub sort: SortId,
    pub bound: bool,
    /// If `bound`, the single bit assigned to this variable; otherwise the
    /// declared dependency set.
    pub deps: DepSet,
}

/// A variable context: name -> binder info, plus bookkeeping needed to
/// assign fresh bound-variable bits in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Ctx {
    pub vars: HashMap<Name, CtxEntry>,
    /// Declaration order, needed by C4's dependency-tracking typecheck and
    /// by diagnostics.
    pub order: Vec<Name>,
    next_bv: u64,
}

impl Ctx {
    pub fn new() -> Self {
        Ctx { vars: HashMap::new(), order: Vec::new(), next_bv: 1 }
    }

    pub fn get(&self, name: Name) -> Option<CtxEntry> {
        self.vars.get(&name).copied()
    }

    /// Allocate the next bound-variable bit, in the same contiguous
    /// power-of-two order `build_context` uses for `args`. Exposed so C4/C5
    /// can extend a context with dummy variables after the initial
    /// `build_context` call using the exact same assignment scheme.
    pub fn alloc_bv(&mut self, max_bound_vars: u32) -> Res<u64> {
        self.take_next_bv(max_bound_vars)
    }

    fn take_next_bv(&mut self, max_bound_vars: u32) -> Res<u64> {
        make_sure!(ErrKind::Scoping, (self.next_bv >> max_bound_vars) == 0,
            "exceeded the maximum of {} simultaneously bound variables", max_bound_vars);
        let out = self.next_bv;
        self.next_bv *= 2;
        Ok(out)
    }
}

/// `build_context(state, binders, start_ctx) -> ctx`, exactly as specified:
/// iterate `binders` in order, rejecting strict-sort binds, duplicate
/// variables, and unbound dependency references.
pub fn build_context(state: &VerifierState, binders: &[Binder], start_ctx: Ctx) -> Res<Ctx> {
    let mut ctx = start_ctx;
    for b in binders {
        let name = b.name();
        make_sure!(ErrKind::Scoping, !ctx.vars.contains_key(&name),
            "duplicate variable '{}'", state.names.resolve(name));
        let mods = state.sort_mods(b.sort())
            .ok_or_else(|| crate::util::VerifErr::new(ErrKind::Sort,
                format!("sort-not-found: unknown sort for variable '{}'", state.names.resolve(name))))?;
        match *b {
            Binder::Bound { sort, .. } => {
                make_sure!(ErrKind::Sort, !mods.strict,
                    "strict-sort-bind: cannot bind variable at strict sort '{}'", state.names.resolve(name));
                let bit = ctx.take_next_bv(state.config.max_bound_vars as u32)?;
                ctx.vars.insert(name, CtxEntry { sort, bound: true, deps: DepSet::singleton(bit) });
            }
            Binder::Regular { sort, deps, .. } => {
                // Every referenced dependency must already be a `Bound` entry
                // in the accumulated context; `deps` is expressed directly as
                // a `DepSet` over already-assigned bits, so this reduces to
                // checking that no bit lies beyond what's been assigned yet.
                make_sure!(ErrKind::Scoping, deps.0 & !(ctx.next_bv() - 1) == 0,
                    "unbound-dependency: variable '{}' depends on a bound variable not yet in scope",
                    state.names.resolve(name));
                ctx.vars.insert(name, CtxEntry { sort, bound: false, deps });
            }
        }
        ctx.order.push(name);
    }
    Ok(ctx)
}

impl Ctx {
    /// The set of bound-variable bits handed out so far, as a mask. Since
    /// bits are always taken in contiguous power-of-two order starting at 1,
    /// this is just `next_bv - 1`.
    pub fn bound_mask(&self) -> u64 {
        self.next_bv - 1
    }

    fn next_bv(&self) -> u64 {
        self.next_bv
    }
}
