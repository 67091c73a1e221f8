//! Term algebra & binder model (C1): sorts, binders, expressions, proofs,
//! conversions, and the declaration/environment shapes the driver consumes.
//!
//! Expressions are hash-consed, following `ammkrn-nanoda`'s `InnerExpr`
//! scheme: each node caches a structural digest and its free-variable set so
//! repeated subterms (common in nested `Thm`/`Conv` applications) compare and
//! union in `O(1)` rather than being recomputed from scratch each time.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use fxhash::FxHashMap;

/// Interned declaration/variable name. Comparisons and hashing are `O(1)`,
/// the same `AtomID`-style interning mm0-rs uses for its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThmId(pub u32);

/// String interner backing `Name`. Grounded in mm0-rs's `AtomVec`/`AtomID`
/// table, simplified to the bidirectional map this kernel actually needs.
#[derive(Debug, Default)]
pub struct NameTable {
    strs: Vec<Rc<str>>,
    ids: FxHashMap<Rc<str>, Name>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&n) = self.ids.get(s) {
            return n;
        }
        let rc: Rc<str> = Rc::from(s);
        let id = Name(self.strs.len() as u32);
        self.strs.push(rc.clone());
        self.ids.insert(rc, id);
        id
    }

    pub fn resolve(&self, n: Name) -> &str {
        &self.strs[n.0 as usize]
    }

    /// Look up an already-interned name without creating a new one. Used by
    /// C8 to recognize the fixed `s0`/`s1`/`sadd`/`ch`/`x0`..`xf` signature
    /// by spelling, without needing mutable access just to probe for it.
    pub fn lookup(&self, s: &str) -> Option<Name> {
        self.ids.get(s).copied()
    }
}

/// The hard bound-variable limit this kernel carries over from the MM0
/// `.mmb` format: a context may declare at most this many `Bound` binders,
/// since dependency sets are packed into a `u64` bitset.
pub const MAX_BOUND_VARS: u32 = 55;

/// A packed set of bound-variable "digits". Bit `i` is set iff the bound
/// variable that was assigned digit `1 << i` is a member. Union and
/// membership are single machine words, which is what keeps disjoint-variable
/// checking and dependency-scope checking linear instead of quadratic over
/// deeply nested proof terms (spec's resource-bound requirement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DepSet(pub u64);

impl DepSet {
    pub const EMPTY: DepSet = DepSet(0);

    pub fn singleton(bit: u64) -> Self {
        DepSet(bit)
    }

    pub fn union(self, other: DepSet) -> DepSet {
        DepSet(self.0 | other.0)
    }

    pub fn contains(self, bit: u64) -> bool {
        self.0 & bit != 0
    }

    pub fn intersects(self, other: DepSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn subtract(self, other: DepSet) -> DepSet {
        DepSet(self.0 & !other.0)
    }
}

/// Sort modifier flags. Kept as plain booleans rather than a packed `u8`
/// (`SORT_PURE`/`SORT_STRICT`/...) since this kernel never serializes a sort
/// to a byte stream; the packed representation is kept only for dependency
/// sets (`DepSet`), where it earns its keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortMods {
    pub pure: bool,
    pub strict: bool,
    pub provable: bool,
    pub free: bool,
}

#[derive(Debug, Clone)]
pub struct SortDecl {
    pub name: Name,
    pub mods: SortMods,
}

/// A binder, as specified: a first-class bound variable, or an open regular
/// variable with a declared dependency set over already-declared bound vars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binder {
    Bound { name: Name, sort: SortId },
    Regular { name: Name, sort: SortId, deps: DepSet },
}

impl Binder {
    pub fn name(self) -> Name {
        match self {
            Binder::Bound { name, .. } | Binder::Regular { name, .. } => name,
        }
    }

    pub fn sort(self) -> SortId {
        match self {
            Binder::Bound { sort, .. } | Binder::Regular { sort, .. } => sort,
        }
    }

    pub fn is_bound(self) -> bool {
        matches!(self, Binder::Bound { .. })
    }

    pub fn deps(self) -> DepSet {
        match self {
            Binder::Bound { .. } => DepSet::EMPTY,
            Binder::Regular { deps, .. } => deps,
        }
    }
}

// --- Hash-consed expressions -------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprNode {
    Var(Name),
    App(TermId, Vec<Expr>),
}

struct ExprCell {
    node: ExprNode,
    digest: u64,
    freevars: Rc<[Name]>,
}

impl fmt::Debug for ExprCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.fmt(f)
    }
}

/// A hash-consed expression. Two `Expr`s built through the same
/// [`ExprArena`] compare in `O(1)` when they share their allocation (the
/// common case for subterms reused across a proof); otherwise comparison
/// falls back to structural equality of the (already-deduplicated) children.
#[derive(Clone)]
pub struct Expr(Rc<ExprCell>);

impl Expr {
    pub fn node(&self) -> &ExprNode {
        &self.0.node
    }

    pub fn digest(&self) -> u64 {
        self.0.digest
    }

    /// The set of variable names occurring anywhere in this expression,
    /// memoized at construction time. This is a purely syntactic property
    /// (it does not consult any context), matching the "free-var set" used
    /// by the disjoint-variable checks in C5.
    pub fn freevars(&self) -> &[Name] {
        &self.0.freevars
    }

    pub fn mentions(&self, name: Name) -> bool {
        self.0.freevars.binary_search(&name).is_ok()
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.node.fmt(f)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.0.digest != other.0.digest {
            return false;
        }
        self.0.node == other.0.node
    }
}
impl Eq for Expr {}

fn merge_sorted(a: &[Name], b: &[Name]) -> Rc<[Name]> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out.into()
}

const VAR_TAG: u32 = 0x5eed_1a5;
const APP_TAG: u32 = 0xa991_3c07;

fn digest_var(name: Name) -> u64 {
    fxhash::hash64(&(VAR_TAG, name.0))
}

fn digest_app(term: TermId, arg_digests: &[u64]) -> u64 {
    let mut h = fxhash::hash64(&(APP_TAG, term.0));
    for d in arg_digests {
        h = fxhash::hash64(&(h, *d));
    }
    h
}

/// Hash-consing arena for [`Expr`]. All expression construction in the
/// kernel goes through here (never a bare `Rc::new`) so that structurally
/// identical subterms share one allocation.
#[derive(Default)]
pub struct ExprArena {
    table: FxHashMap<(u64, ExprNodeKey), Expr>,
}

/// A lightweight key used only for the interner's hash map; avoids storing
/// `ExprNode` twice (once in the cell, once in the key) by keying on the
/// already-built children's identity rather than their structure.
#[derive(PartialEq, Eq, Hash, Clone)]
enum ExprNodeKey {
    Var(Name),
    App(TermId, Vec<usize>),
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mk_var(&mut self, name: Name) -> Expr {
        let digest = digest_var(name);
        let key = (digest, ExprNodeKey::Var(name));
        if let Some(e) = self.table.get(&key) {
            return e.clone();
        }
        let cell = ExprCell { node: ExprNode::Var(name), digest, freevars: Rc::from(vec![name]) };
        let e = Expr(Rc::new(cell));
        self.table.insert(key, e.clone());
        e
    }

    pub fn mk_app(&mut self, term: TermId, args: Vec<Expr>) -> Expr {
        let digests: Vec<u64> = args.iter().map(Expr::digest).collect();
        let digest = digest_app(term, &digests);
        let key = (digest, ExprNodeKey::App(term, args.iter().map(|e| Rc::as_ptr(&e.0) as usize).collect()));
        if let Some(e) = self.table.get(&key) {
            return e.clone();
        }
        let freevars = args.iter().fold(Rc::from(vec![]) as Rc<[Name]>, |acc, e| merge_sorted(&acc, e.freevars()));
        let cell = ExprCell { node: ExprNode::App(term, args), digest, freevars };
        let e = Expr(Rc::new(cell));
        self.table.insert(key, e.clone());
        e
    }
}

// --- Declarations -------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Def {
    pub dummies: Vec<(Name, SortId)>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub struct TermDecl {
    pub name: Name,
    pub args: Vec<Binder>,
    pub ret_sort: SortId,
    pub ret_deps: DepSet,
    pub def: Option<Def>,
}

impl TermDecl {
    pub fn is_def(&self) -> bool {
        self.def.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ThmDecl {
    pub name: Name,
    pub args: Vec<Binder>,
    pub hyp_names: Vec<Name>,
    pub hyps: Vec<Expr>,
    pub concl: Expr,
    /// `None` for an axiom: a theorem declaration without a proof obligation.
    pub is_axiom: bool,
}

// --- Proof / conversion terms (C5 / C6) ---------------------------------------

#[derive(Debug, Clone)]
pub enum Conv {
    CVar(Name),
    CApp(TermId, Vec<Conv>),
    CSym(Box<Conv>),
    CUnfold { term: TermId, args: Vec<Expr>, dummies: Vec<Name>, proof: Box<Conv> },
}

#[derive(Debug, Clone)]
pub enum Proof {
    Hyp(Name),
    Thm(ThmId, Vec<Expr>, Vec<Proof>),
    Conv(Expr, Conv, Box<Proof>),
    Let(Name, Box<Proof>, Box<Proof>),
    Sorry,
}

// --- Environment & proof script (external, immutable inputs; C7) -------------

#[derive(Debug, Clone)]
pub enum DeclBody {
    Term { args: Vec<Binder>, ret_sort: SortId, ret_deps: DepSet },
    Axiom { args: Vec<Binder>, hyp_names: Vec<Name>, hyps: Vec<Expr>, concl: Expr },
    Def { args: Vec<Binder>, ret_sort: SortId, ret_deps: DepSet, dummies: Vec<(Name, SortId)>, body: Expr },
}

#[derive(Debug, Clone)]
pub enum Spec {
    Sort(Name, SortMods),
    Decl(Name, DeclBody),
    /// `SThm x ...` — a theorem declaration the strict-mode script must match
    /// positionally; the payload mirrors `DeclBody::Axiom` but is kept
    /// distinct because a `StmtThm` with a *proof* is still checked against
    /// it (the conclusion/hyp shapes, not the proof itself, are declared
    /// ahead of time by the elaborator).
    Thm { args: Vec<Binder>, hyp_names: Vec<Name>, hyps: Vec<Expr>, concl: Expr },
    /// `SInout(IOKString dir e)`.
    Inout { dir: bool, expr: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDir {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    StepSort(Name),
    StepTerm(Name),
    StepAxiom(Name),
    StmtDef {
        name: Name,
        args: Vec<Binder>,
        ret_sort: SortId,
        ret_deps: DepSet,
        dummies: Vec<(Name, SortId)>,
        body: Expr,
        strict: bool,
    },
    StmtThm {
        name: Name,
        args: Vec<Binder>,
        hyp_names: Vec<Name>,
        hyps: Vec<Expr>,
        concl: Expr,
        dummies: Vec<(Name, SortId)>,
        proof: Proof,
        strict: bool,
    },
    StepInout { dir: IoDir, expr: Expr },
}

/// The immutable input environment: an ordered list of specifications plus
/// indexable tables for named lookup, exactly as described in the external
/// interfaces section. Constructing this from surface syntax is out of
/// scope — it is handed to the kernel fully formed.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub specs: Vec<Spec>,
    pub sort_table: HashMap<Name, (SortId, SortMods)>,
    pub term_table: HashMap<Name, TermId>,
    pub thm_table: HashMap<Name, ThmId>,
}
