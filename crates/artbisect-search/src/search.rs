use anyhow::Result;

use crate::bisect::binary_search;
use crate::passes::filter_passes;
use crate::testable::Testable;

/// Result of a completed search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The test passes even when compiling every method.
    NoBug,
    /// Compiling this method reproduces the fault, but it reproduces even
    /// with just the mandatory passes, so no single pass is implicated.
    MethodOnly(String),
    /// The fault needs this method compiled with this pass in the pipeline.
    MethodAndPass(String, String),
}

/// Two-stage bisection: first over the compiled-method order, then over the
/// implicated method's pass pipeline.
///
/// Fatal outcomes (the fault reproducing with zero methods compiled, or a
/// pass cutoff that contradicts stage one) surface as errors rather than
/// outcomes; they mean the fault does not originate where this tool can
/// localize it, or that probe results were not monotone.
pub fn bug_search(testable: &mut dyn Testable) -> Result<Outcome> {
    let all_methods = testable.all_methods()?;
    let faulty_method_idx = binary_search(0, all_methods.len(), |mid| {
        testable.test(Some(&all_methods[..mid]), None)
    })?;
    if faulty_method_idx == all_methods.len() {
        return Ok(Outcome::NoBug);
    }
    if faulty_method_idx == 0 {
        anyhow::bail!(
            "testable fails with no methods compiled; perhaps the issue lies outside \
             the compiler"
        );
    }
    let faulty_method = all_methods[faulty_method_idx - 1].clone();

    let all_passes = testable.passes_for_method(&faulty_method)?;
    let method_under_test = [faulty_method.clone()];
    let faulty_pass_idx = binary_search(0, all_passes.len(), |mid| {
        testable.test(
            Some(&method_under_test),
            Some(&filter_passes(&all_passes, mid)),
        )
    })?;
    if faulty_pass_idx == 0 {
        return Ok(Outcome::MethodOnly(faulty_method));
    }
    if faulty_pass_idx == all_passes.len() {
        // Stage one proved this method fails with the full pipeline, so some
        // cutoff below the end must fail too.
        anyhow::bail!(
            "inconsistent probe results for {faulty_method}: the full pipeline fails \
             but no pass cutoff reproduces it"
        );
    }
    let faulty_pass = all_passes[faulty_pass_idx - 1].clone();
    Ok(Outcome::MethodAndPass(faulty_method, faulty_pass))
}
