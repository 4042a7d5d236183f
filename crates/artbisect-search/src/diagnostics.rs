//! Scrape patterns for the compiler's `-verbose:compiler` output.
//!
//! These literals are a wire contract with the compiler under test: if its
//! diagnostic text changes, method and pass discovery breaks here and nowhere
//! else. Callers treat an empty scrape of otherwise-successful output as a
//! fatal format mismatch.

use std::sync::OnceLock;

use regex::Regex;

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Building ([^\n]+)\n").expect("method pattern"))
}

fn pass_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Starting pass: ([^\n]+)\n").expect("pass pattern"))
}

/// Methods compiled during a run, in the compiler's own compilation order.
pub fn scrape_methods(diagnostics: &str) -> Vec<String> {
    method_re()
        .captures_iter(diagnostics)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Pipeline stages started during a run, in pipeline order. Includes
/// non-optimization stages; see [`crate::passes::NON_PASSES`].
pub fn scrape_passes(diagnostics: &str) -> Vec<String> {
    pass_re()
        .captures_iter(diagnostics)
        .map(|caps| caps[1].to_string())
        .collect()
}
