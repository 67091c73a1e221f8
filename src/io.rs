//! String I/O interpreter (C8): reduces an expression over the fixed
//! `s0`/`s1`/`sadd`/`ch`/`x0..xf` algebraic signature to bytes, either
//! matching it against an input buffer or appending it to the driver's
//! output sequence. Any other term encountered must be a definition with no
//! dummy variables, which is unfolded in place.

use crate::driver::VerifierState;
use crate::make_sure;
use crate::proofcheck::apply_subst;
use crate::types::{Expr, ExprNode, Name, TermId};
use crate::util::{ErrKind, Res, VerifErr};

/// The fixed signature's term ids, resolved once per call by name. A `None`
/// entry means that name was never declared in this environment, so no
/// expression can possibly match it.
struct Builtins {
    s0: Option<TermId>,
    s1: Option<TermId>,
    sadd: Option<TermId>,
    ch: Option<TermId>,
    hex: [Option<TermId>; 16],
}

impl Builtins {
    fn collect(state: &VerifierState) -> Self {
        let lookup = |s: &str| state.names.lookup(s).and_then(|n| state.term_id(n));
        let mut hex = [None; 16];
        for (i, slot) in hex.iter_mut().enumerate() {
            *slot = lookup(&format!("x{:x}", i));
        }
        Builtins {
            s0: lookup("s0"),
            s1: lookup("s1"),
            sadd: lookup("sadd"),
            ch: lookup("ch"),
            hex,
        }
    }

    fn hex_digit(&self, tid: TermId) -> Option<u8> {
        self.hex.iter().position(|h| *h == Some(tid)).map(|i| i as u8)
    }
}

/// The value an output-mode reduction yields: either a completed byte buffer
/// or a single hex nibble still awaiting its partner in a `ch`.
enum OutVal {
    Hex(u8),
    Bytes(Vec<u8>),
}

/// Reduce `expr` in output mode to a byte buffer and append it to
/// `state.outputs`'s caller-visible return value.
pub fn verify_output_string(state: &mut VerifierState, expr: &Expr) -> Res<Vec<u8>> {
    let builtins = Builtins::collect(state);
    match reduce_output(state, &builtins, expr)? {
        OutVal::Bytes(b) => Ok(b),
        OutVal::Hex(_) => Err(VerifErr::internal(
            "output reduction yielded a lone hex nibble: impossible under a well-formed axiom set",
        )),
    }
}

fn reduce_output(state: &mut VerifierState, builtins: &Builtins, expr: &Expr) -> Res<OutVal> {
    let (tid, args) = match expr.node() {
        ExprNode::Var(_) => return Err(VerifErr::io("free variable in an output-mode IO expression")),
        ExprNode::App(tid, args) => (*tid, args),
    };

    if let Some(digit) = builtins.hex_digit(tid) {
        make_sure!(ErrKind::Io, args.is_empty(), "hex digit term applied to arguments");
        return Ok(OutVal::Hex(digit));
    }
    if Some(tid) == builtins.s0 {
        make_sure!(ErrKind::Io, args.is_empty(), "'s0' applied to arguments");
        return Ok(OutVal::Bytes(Vec::new()));
    }
    if Some(tid) == builtins.s1 {
        make_sure!(ErrKind::Io, args.len() == 1, "'s1' expects exactly one argument");
        return reduce_output(state, builtins, &args[0]);
    }
    if Some(tid) == builtins.sadd {
        make_sure!(ErrKind::Io, args.len() == 2, "'sadd' expects exactly two arguments");
        let mut b1 = require_bytes(reduce_output(state, builtins, &args[0])?)?;
        let b2 = require_bytes(reduce_output(state, builtins, &args[1])?)?;
        b1.extend_from_slice(&b2);
        return Ok(OutVal::Bytes(b1));
    }
    if Some(tid) == builtins.ch {
        make_sure!(ErrKind::Io, args.len() == 2, "'ch' expects exactly two arguments");
        let h1 = require_hex(reduce_output(state, builtins, &args[0])?)?;
        let h2 = require_hex(reduce_output(state, builtins, &args[1])?)?;
        return Ok(OutVal::Bytes(vec![(h1 << 4) | h2]));
    }

    unfold_and_recurse(state, tid, args, |state, body| reduce_output(state, builtins, body))
}

fn require_bytes(v: OutVal) -> Res<Vec<u8>> {
    match v {
        OutVal::Bytes(b) => Ok(b),
        OutVal::Hex(_) => Err(VerifErr::io("expected a byte string, found a bare hex nibble")),
    }
}

fn require_hex(v: OutVal) -> Res<u8> {
    match v {
        OutVal::Hex(h) => Ok(h),
        OutVal::Bytes(_) => Err(VerifErr::io("expected a hex nibble, found a byte string")),
    }
}

/// A half-byte cursor over the input buffer: either sitting on a byte
/// boundary or midway through a byte (high nibble already consumed).
struct Cursor<'b> {
    buf: &'b [u8],
    byte_pos: usize,
    mid_byte: bool,
}

impl<'b> Cursor<'b> {
    fn new(buf: &'b [u8]) -> Self {
        Cursor { buf, byte_pos: 0, mid_byte: false }
    }

    fn at_end(&self) -> bool {
        self.byte_pos >= self.buf.len() && !self.mid_byte
    }

    /// Pop the next nibble, returning it along with the byte index it
    /// belongs to (reported on mismatch) — captured *before* advancing past
    /// a completed byte, so a low-nibble mismatch still points at the byte
    /// that contains it rather than the next one.
    fn pop_nibble(&mut self) -> Option<(u8, usize)> {
        if self.byte_pos >= self.buf.len() {
            return None;
        }
        let byte = self.buf[self.byte_pos];
        let pos = self.byte_pos;
        if self.mid_byte {
            self.mid_byte = false;
            self.byte_pos += 1;
            Some((byte & 0xf, pos))
        } else {
            self.mid_byte = true;
            Some(((byte >> 4) & 0xf, pos))
        }
    }

    fn mismatch_at(&self, pos: usize) -> VerifErr {
        let rest = String::from_utf8_lossy(&self.buf[pos.min(self.buf.len())..]);
        VerifErr::io(format!("input mismatch at char {}: rest = '{}'", pos, rest))
    }
}

/// Reduce `expr` in input mode against `input`, consuming nibbles through a
/// half-byte cursor. Succeeds iff the cursor lands exactly at end-of-buffer.
pub fn verify_input_string(state: &mut VerifierState, expr: &Expr, input: &[u8]) -> Res<()> {
    let builtins = Builtins::collect(state);
    let mut cursor = Cursor::new(input);
    reduce_input(state, &builtins, expr, &mut cursor)?;
    if !cursor.at_end() {
        return Err(cursor.mismatch_at(cursor.byte_pos));
    }
    Ok(())
}

fn reduce_input(state: &mut VerifierState, builtins: &Builtins, expr: &Expr, cursor: &mut Cursor) -> Res<()> {
    let (tid, args) = match expr.node() {
        ExprNode::Var(_) => return Err(VerifErr::io("free variable in an input-mode IO expression")),
        ExprNode::App(tid, args) => (*tid, args),
    };

    if let Some(digit) = builtins.hex_digit(tid) {
        make_sure!(ErrKind::Io, args.is_empty(), "hex digit term applied to arguments");
        let (got, pos) = cursor.pop_nibble().ok_or_else(|| cursor.mismatch_at(cursor.byte_pos))?;
        if got != digit {
            return Err(cursor.mismatch_at(pos));
        }
        return Ok(());
    }
    if Some(tid) == builtins.s0 {
        make_sure!(ErrKind::Io, args.is_empty(), "'s0' applied to arguments");
        return Ok(());
    }
    if Some(tid) == builtins.s1 {
        make_sure!(ErrKind::Io, args.len() == 1, "'s1' expects exactly one argument");
        return reduce_input(state, builtins, &args[0], cursor);
    }
    if Some(tid) == builtins.sadd {
        make_sure!(ErrKind::Io, args.len() == 2, "'sadd' expects exactly two arguments");
        reduce_input(state, builtins, &args[0], cursor)?;
        return reduce_input(state, builtins, &args[1], cursor);
    }
    if Some(tid) == builtins.ch {
        make_sure!(ErrKind::Io, args.len() == 2, "'ch' expects exactly two arguments");
        reduce_input(state, builtins, &args[0], cursor)?;
        return reduce_input(state, builtins, &args[1], cursor);
    }

    unfold_and_recurse(state, tid, args, |state, body| reduce_input(state, builtins, body, cursor))
}

/// Shared "unknown head term" fallback for both modes: the term must be a
/// definition with no dummy variables, unfolded via direct parameter
/// substitution (no disjoint-variable bookkeeping — this is plain
/// expression rewriting, not a proof-term substitution).
fn unfold_and_recurse<T>(
    state: &mut VerifierState,
    tid: TermId,
    args: &[Expr],
    recurse: impl FnOnce(&mut VerifierState, &Expr) -> Res<T>,
) -> Res<T> {
    let term = state.get_term(tid).ok_or_else(|| VerifErr::io("term not supported"))?;
    let def = term.def.clone().ok_or_else(|| VerifErr::io("term not supported"))?;
    make_sure!(ErrKind::Io, def.dummies.is_empty(),
        "definition with dummies in IO expression");
    let params = term.args.clone();
    make_sure!(ErrKind::Io, params.len() == args.len(), "arity-mismatch in IO expression");

    let mut subst = std::collections::HashMap::new();
    let names: Vec<Name> = params.iter().map(|p| p.name()).collect();
    for (name, arg) in names.iter().zip(args.iter()) {
        subst.insert(*name, arg.clone());
    }
    let body = apply_subst(state, &subst, &def.body);
    recurse(state, &body)
}
