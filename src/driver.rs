//! Verifier driver (C7): walks the environment and the proof script in
//! lockstep, dispatching to C4 (definitions), C5 (theorems), or C8
//! (string I/O), and accumulates diagnostics the way a real embedder
//! (an editor, a CI check) wants them — one entry per failed declaration,
//! not a single short-circuiting `Result`.

use std::collections::HashMap;

use crate::conv;
use crate::defcheck;
use crate::io as io_mod;
use crate::proofcheck;
use crate::types::{
    DeclBody, Environment, ExprArena, IoDir, Name, NameTable, Spec, SortId, SortMods,
    Stmt, TermDecl, ThmDecl, ThmId, TermId,
};
use crate::util::{Diagnostics, ErrKind, Res, VerifErr};

/// Read the next spec entry or fail with `nothing more to prove` (the
/// boundary behavior where the script outruns the environment).
macro_rules! none_step {
    ($next:expr, $($msg:tt)*) => {
        match $next {
            Some(s) => s,
            None => return Err(VerifErr::shape("nothing more to prove")),
        }
    };
}

/// Embedder-tunable knobs. None of them changes what a conforming theory
/// accepts under the default settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Disjoint-variable enforcement. Always `true` on the accept path this
    /// crate exposes publicly; kept togglable for tooling built atop the
    /// kernel that wants partial feedback on an in-progress theory.
    pub dv_check: bool,
    /// Whether `StepInout` statements are processed at all.
    pub io_enabled: bool,
    /// The hard bound-variable-per-context limit. Defaults to the MM0
    /// format's `55`; lowered only in tests that want to exercise overflow
    /// without constructing that many binders.
    pub max_bound_vars: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config { dv_check: true, io_enabled: true, max_bound_vars: crate::types::MAX_BOUND_VARS }
    }
}

/// The mutable aggregate threaded through the driver: sort/term/theorem
/// tables, the expression arena, and the emitted output sequence. Owned
/// exclusively by the single executing driver; per-declaration checks
/// borrow it and build their own fresh `Ctx`/heap on top.
pub struct VerifierState {
    pub names: NameTable,
    pub arena: ExprArena,
    pub config: Config,

    sorts: Vec<SortMods>,
    sort_ids: HashMap<Name, SortId>,

    terms: Vec<TermDecl>,
    term_ids: HashMap<Name, TermId>,

    thms: Vec<ThmDecl>,
    thm_ids: HashMap<Name, ThmId>,

    pub outputs: Vec<Vec<u8>>,
}

impl VerifierState {
    pub fn new(config: Config) -> Self {
        VerifierState {
            names: NameTable::new(),
            arena: ExprArena::new(),
            config,
            sorts: Vec::new(),
            sort_ids: HashMap::new(),
            terms: Vec::new(),
            term_ids: HashMap::new(),
            thms: Vec::new(),
            thm_ids: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn sort_id(&self, name: Name) -> Option<SortId> {
        self.sort_ids.get(&name).copied()
    }

    pub fn sort_mods(&self, id: SortId) -> Option<SortMods> {
        self.sorts.get(id.0 as usize).copied()
    }

    pub fn term_id(&self, name: Name) -> Option<TermId> {
        self.term_ids.get(&name).copied()
    }

    pub fn thm_id(&self, name: Name) -> Option<ThmId> {
        self.thm_ids.get(&name).copied()
    }

    /// Looks up a term by id. Returns `None` for an out-of-range or
    /// not-yet-declared id: since script/environment inputs are untrusted,
    /// an `App`/`Conv` node may reference a term that doesn't (yet) exist.
    pub fn get_term(&self, id: TermId) -> Option<&TermDecl> {
        self.terms.get(id.0 as usize)
    }

    pub fn get_thm(&self, id: ThmId) -> Option<&ThmDecl> {
        self.thms.get(id.0 as usize)
    }

    pub fn insert_sort(&mut self, name: Name, mods: SortMods) -> Res<SortId> {
        crate::make_sure!(ErrKind::Shape, !self.sort_ids.contains_key(&name),
            "duplicate sort '{}'", self.names.resolve(name));
        let id = SortId(self.sorts.len() as u32);
        self.sorts.push(mods);
        self.sort_ids.insert(name, id);
        Ok(id)
    }

    pub fn insert_term(&mut self, decl: TermDecl) -> Res<TermId> {
        crate::make_sure!(ErrKind::Shape, !self.term_ids.contains_key(&decl.name),
            "duplicate term '{}'", self.names.resolve(decl.name));
        let id = TermId(self.terms.len() as u32);
        self.term_ids.insert(decl.name, id);
        self.terms.push(decl);
        Ok(id)
    }

    pub fn insert_thm(&mut self, decl: ThmDecl) -> Res<ThmId> {
        crate::make_sure!(ErrKind::Shape, !self.thm_ids.contains_key(&decl.name),
            "duplicate theorem '{}'", self.names.resolve(decl.name));
        let id = ThmId(self.thms.len() as u32);
        self.thm_ids.insert(decl.name, id);
        self.thms.push(decl);
        Ok(id)
    }

    #[cfg(test)]
    pub fn declare_sort_for_test(&mut self, name: Name, mods: SortMods) -> SortId {
        self.insert_sort(name, mods).unwrap()
    }
}

/// Run a full proof script against an environment, per the external
/// interfaces contract: `Ok(outputs)` iff every declaration checked and the
/// spec queue was fully consumed with no diagnostics accumulated; `Err` with
/// the list of diagnostics otherwise. Shape mismatches and spec/script
/// length mismatches are fatal and abort immediately rather than being
/// accumulated.
pub fn run(env: &Environment, script: &[Stmt], config: Config) -> Result<Vec<Vec<u8>>, Vec<VerifErr>> {
    let mut state = VerifierState::new(config);
    let mut diags = Diagnostics::new();
    let mut cursor = 0usize;

    for stmt in script {
        let next = env.specs.get(cursor);
        match step(&mut state, &mut diags, stmt, next) {
            Ok(consumed) => {
                if consumed {
                    cursor += 1;
                }
            }
            Err(e) => return Err(vec![e]),
        }
    }

    if cursor < env.specs.len() {
        return Err(vec![VerifErr::shape("Not all theorems have been proven")]);
    }

    if diags.is_empty() {
        Ok(state.outputs)
    } else {
        Err(diags.into_vec())
    }
}

/// Dispatch a single script statement. Returns `Ok(true)` if it consumed the
/// next environment spec, `Ok(false)` if it deliberately did not (the
/// non-strict `def`/`theorem` asymmetry), or `Err` for a fatal shape error.
/// Per-declaration check failures (scoping/sort/typing/dv/proof/io) are
/// caught here and pushed to `diags` rather than propagated.
fn step(
    state: &mut VerifierState,
    diags: &mut Diagnostics,
    stmt: &Stmt,
    next: Option<&Spec>,
) -> Res<bool> {
    match stmt {
        Stmt::StepSort(name) => {
            let spec = none_step!(next, "sort {}", state.names.resolve(*name));
            match spec {
                Spec::Sort(spec_name, mods) if spec_name == name => {
                    log::debug!("checking sort '{}'", state.names.resolve(*name));
                    state.insert_sort(*name, *mods)?;
                    Ok(true)
                }
                other => Err(shape_mismatch("sort", state.names.resolve(*name), other)),
            }
        }
        Stmt::StepTerm(name) => {
            let spec = none_step!(next, "term {}", state.names.resolve(*name));
            match spec {
                Spec::Decl(spec_name, DeclBody::Term { args, ret_sort, ret_deps }) if spec_name == name => {
                    log::debug!("checking term '{}'", state.names.resolve(*name));
                    state.insert_term(TermDecl {
                        name: *name,
                        args: args.clone(),
                        ret_sort: *ret_sort,
                        ret_deps: *ret_deps,
                        def: None,
                    })?;
                    Ok(true)
                }
                other => Err(shape_mismatch("term", state.names.resolve(*name), other)),
            }
        }
        Stmt::StepAxiom(name) => {
            let spec = none_step!(next, "axiom {}", state.names.resolve(*name));
            match spec {
                Spec::Decl(spec_name, DeclBody::Axiom { args, hyp_names, hyps, concl }) if spec_name == name => {
                    log::debug!("checking axiom '{}'", state.names.resolve(*name));
                    state.insert_thm(ThmDecl {
                        name: *name,
                        args: args.clone(),
                        hyp_names: hyp_names.clone(),
                        hyps: hyps.clone(),
                        concl: concl.clone(),
                        is_axiom: true,
                    })?;
                    Ok(true)
                }
                other => Err(shape_mismatch("axiom", state.names.resolve(*name), other)),
            }
        }
        Stmt::StmtDef { name, args, ret_sort, ret_deps, dummies, body, strict } => {
            if *strict {
                let spec = none_step!(next, "def {}", state.names.resolve(*name));
                match spec {
                    Spec::Decl(
                        spec_name,
                        DeclBody::Def { args: s_args, ret_sort: s_ret_sort, ret_deps: s_ret_deps, dummies: s_dummies, body: s_body },
                    ) if spec_name == name
                        && s_args == args
                        && s_ret_sort == ret_sort
                        && s_ret_deps == ret_deps
                        && s_dummies == dummies
                        && s_body == body => {}
                    other => return Err(shape_mismatch("def", state.names.resolve(*name), other)),
                }
            } else {
                log::warn!(
                    "def '{}' checked in non-strict mode: body not cross-checked against a declared spec",
                    state.names.resolve(*name)
                );
            }
            log::debug!("checking def '{}'", state.names.resolve(*name));
            let with_ctx = |e: VerifErr| e.with_context(format!("def {}", state.names.resolve(*name)));
            let decl = defcheck::check_def(state, *name, args.clone(), *ret_sort, *ret_deps, dummies.clone(), body.clone())
                .unwrap_or_else(|e| {
                    diags.push(with_ctx(e));
                    TermDecl { name: *name, args: args.clone(), ret_sort: *ret_sort, ret_deps: *ret_deps, def: None }
                });
            state.insert_term(decl)?;
            Ok(*strict)
        }
        Stmt::StmtThm { name, args, hyp_names, hyps, concl, dummies, proof, strict } => {
            if *strict {
                let spec = none_step!(next, "theorem {}", state.names.resolve(*name));
                match spec {
                    Spec::Thm { args: s_args, hyp_names: s_hyp_names, hyps: s_hyps, concl: s_concl }
                        if s_args == args && s_hyp_names == hyp_names && s_hyps == hyps && s_concl == concl => {}
                    other => return Err(shape_mismatch("theorem", state.names.resolve(*name), other)),
                }
            }
            log::debug!("checking theorem '{}'", state.names.resolve(*name));
            let with_ctx = |e: VerifErr| e.with_context(format!("theorem {}", state.names.resolve(*name)));
            match proofcheck::check_theorem(state, args, hyp_names, hyps, concl, dummies, proof) {
                Ok(()) => {
                    state.insert_thm(ThmDecl {
                        name: *name,
                        args: args.clone(),
                        hyp_names: hyp_names.clone(),
                        hyps: hyps.clone(),
                        concl: concl.clone(),
                        is_axiom: false,
                    })?;
                }
                Err(e) => diags.push(with_ctx(e)),
            }
            Ok(*strict)
        }
        Stmt::StepInout { dir, expr } => {
            if !state.config.io_enabled {
                return Ok(false);
            }
            let spec = none_step!(next, "inout");
            match spec {
                Spec::Inout { dir: spec_dir, expr: spec_expr }
                    if io_dir_matches(*dir, *spec_dir) && spec_expr == expr =>
                {
                    match dir {
                        IoDir::Input => {
                            // Caller supplies the input buffer out-of-band via
                            // `run_with_input`; plain `run` rejects input steps.
                            diags.push(VerifErr::io(
                                "input verification requires an input buffer; use `run_with_input`",
                            ));
                        }
                        IoDir::Output => match io_mod::verify_output_string(state, expr) {
                            Ok(bytes) => state.outputs.push(bytes),
                            Err(e) => diags.push(e.with_context("inout")),
                        },
                    }
                    Ok(true)
                }
                other => Err(shape_mismatch("inout", "", other)),
            }
        }
    }
}

fn io_dir_matches(script_dir: IoDir, spec_dir: bool) -> bool {
    matches!((script_dir, spec_dir), (IoDir::Input, false) | (IoDir::Output, true))
}

fn shape_mismatch(kind: &str, name: &str, found: &Spec) -> VerifErr {
    let _ = found;
    VerifErr::shape(format!("incorrect step '{} {}'", kind, name))
}

/// Like [`run`], but threads an input byte buffer through so `StepInout`
/// statements with `dir = Input` can be checked against it.
pub fn run_with_input(
    env: &Environment,
    script: &[Stmt],
    config: Config,
    input: &[u8],
) -> Result<Vec<Vec<u8>>, Vec<VerifErr>> {
    let mut state = VerifierState::new(config);
    let mut diags = Diagnostics::new();
    let mut cursor = 0usize;

    for stmt in script {
        let next = env.specs.get(cursor);
        match step_with_input(&mut state, &mut diags, stmt, next, input) {
            Ok(consumed) => {
                if consumed {
                    cursor += 1;
                }
            }
            Err(e) => return Err(vec![e]),
        }
    }

    if cursor < env.specs.len() {
        return Err(vec![VerifErr::shape("Not all theorems have been proven")]);
    }

    if diags.is_empty() {
        Ok(state.outputs)
    } else {
        Err(diags.into_vec())
    }
}

fn step_with_input(
    state: &mut VerifierState,
    diags: &mut Diagnostics,
    stmt: &Stmt,
    next: Option<&Spec>,
    input: &[u8],
) -> Res<bool> {
    if let Stmt::StepInout { dir: IoDir::Input, expr } = stmt {
        if !state.config.io_enabled {
            return Ok(false);
        }
        let spec = none_step!(next, "inout");
        return match spec {
            Spec::Inout { dir: false, expr: spec_expr } if spec_expr == expr => {
                if let Err(e) = io_mod::verify_input_string(state, expr, input) {
                    diags.push(e.with_context("inout"));
                }
                Ok(true)
            }
            other => Err(shape_mismatch("inout", "", other)),
        };
    }
    step(state, diags, stmt, next)
}
