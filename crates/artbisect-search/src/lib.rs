//! Two-stage bisection over compiled methods and optimization passes.
//!
//! Stage one narrows a failing run down to the smallest prefix of the
//! compiler's own method order that still reproduces the fault; stage two
//! repeats the search over the implicated method's pass pipeline. Every
//! probe is one full execution through an [`artbisect_env::TestEnv`].

pub mod bisect;
pub mod diagnostics;
pub mod passes;
pub mod search;
pub mod testable;
