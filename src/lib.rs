//! Proof verifier kernel for a Metamath-Zero-family formal logic. Consumes
//! an already-elaborated [`types::Environment`] and proof script and decides
//! whether every declaration has been justified, emitting output byte
//! strings and/or a list of diagnostics.
//!
//! The kernel is the trust boundary: parsing, elaboration, and CLI wiring
//! are all external collaborators. See [`driver::run`] for the entry point.

pub mod util;
pub mod types;
pub mod context;
pub mod typeck;
pub mod defcheck;
pub mod proofcheck;
pub mod conv;
pub mod io;
pub mod driver;

pub use driver::{run, run_with_input, Config, VerifierState};
pub use types::Environment;
pub use util::{ErrKind, Res, VerifErr};
