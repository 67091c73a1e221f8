//! Shared error type, result alias, and the small assertion macros the rest
//! of the kernel is built on: a flat error enum with a `Msg` escape hatch
//! rather than a `thiserror`-derived tree of variant structs, plus
//! `make_sure!`/`none_err!` as thin lifts from `bool`/`Option` into `Res`.

use std::error::Error;
use std::fmt;

/// The flat error-kind taxonomy from the kernel's error handling design:
/// shape errors are fatal to the whole run, everything else is caught by the
/// driver's `report` wrapper and accumulated as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrKind {
    /// Script statement doesn't match the next environment spec. Fatal.
    Shape,
    /// Duplicate binder, undeclared dependency, shadowed heap name.
    Scoping,
    /// Strict-sort bind, pure-sort return, unknown sort, non-provable conclusion.
    Sort,
    /// Sort mismatch, non-bound variable in BV slot, arity mismatch, unknown term.
    Typing,
    /// Disjoint-variable violation or capture.
    Dv,
    /// Hypothesis mismatch, conversion mismatch, missing subproof, `Sorry`,
    /// declaration claim not matching the verified result.
    Proof,
    /// Input byte mismatch, EOF, unsupported IO term, IO definition with dummies.
    Io,
    /// Output-side "impossible" case (a bad axiom set). Reported, never panics.
    Internal,
}

impl fmt::Display for ErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrKind::Shape => "shape",
            ErrKind::Scoping => "scoping",
            ErrKind::Sort => "sort",
            ErrKind::Typing => "typing",
            ErrKind::Dv => "dv",
            ErrKind::Proof => "proof",
            ErrKind::Io => "io",
            ErrKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// The kernel's single error type. `ctx` accumulates the `withContext`
/// colon-separated chain as the error propagates out of nested declaration
/// checks; the innermost message is pushed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifErr {
    pub kind: ErrKind,
    pub msg: String,
    pub ctx: Vec<String>,
}

impl VerifErr {
    pub fn new(kind: ErrKind, msg: impl Into<String>) -> Self {
        VerifErr { kind, msg: msg.into(), ctx: Vec::new() }
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Shape, msg)
    }

    pub fn scoping(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Scoping, msg)
    }

    pub fn sort(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Sort, msg)
    }

    pub fn typing(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Typing, msg)
    }

    pub fn dv(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Dv, msg)
    }

    pub fn proof(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Proof, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Io, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrKind::Internal, msg)
    }

    /// Prefix this error with a declaration or subroutine name, building the
    /// colon-separated `withContext` chain described in the error message
    /// format section.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.ctx.push(ctx.into());
        self
    }
}

impl fmt::Display for VerifErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.ctx.iter().rev() {
            write!(f, "{}: ", c)?;
        }
        write!(f, "[{}] {}", self.kind, self.msg)
    }
}

impl Error for VerifErr {}

pub type Res<T> = Result<T, VerifErr>;

/// Assert a boolean condition, turning failure into a `VerifErr` of the
/// given kind, with an explicit error kind since this kernel distinguishes
/// more failure classes than a single generic check would.
#[macro_export]
macro_rules! make_sure {
    ($kind:expr, $cond:expr) => {
        if !($cond) {
            return Err($crate::util::VerifErr::new($kind, format!("failed: {}", stringify!($cond))));
        }
    };
    ($kind:expr, $cond:expr, $($msg:tt)*) => {
        if !($cond) {
            return Err($crate::util::VerifErr::new($kind, format!($($msg)*)));
        }
    };
}

/// Lift an `Option` into a `Res`.
#[macro_export]
macro_rules! none_err {
    ($kind:expr, $opt:expr, $($msg:tt)*) => {
        match $opt {
            Some(v) => Ok(v),
            None => Err($crate::util::VerifErr::new($kind, format!($($msg)*))),
        }
    };
}

/// Lift a `Result` whose error implements `Display` into a `Res`, for
/// `TryFrom`-style conversions.
#[macro_export]
macro_rules! conv_err {
    ($kind:expr, $result:expr) => {
        match $result {
            Ok(v) => Ok(v),
            Err(e) => Err($crate::util::VerifErr::new($kind, format!("{}", e))),
        }
    };
}

/// A writer-style error accumulator: the driver pushes one diagnostic per
/// failed declaration and continues, per the "error accumulation vs
/// short-circuit" design note.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    errs: Vec<VerifErr>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics { errs: Vec::new() }
    }

    pub fn push(&mut self, e: VerifErr) {
        log::warn!("{}", e);
        self.errs.push(e);
    }

    pub fn is_empty(&self) -> bool {
        self.errs.is_empty()
    }

    pub fn into_vec(self) -> Vec<VerifErr> {
        self.errs
    }
}
