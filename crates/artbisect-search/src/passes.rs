/// Passes which must always run for compilation to complete successfully.
/// They stay in every probe regardless of where the search cutoff falls.
pub const MANDATORY_PASSES: &[&str] = &[
    "dex_cache_array_fixups_arm",
    "dex_cache_array_fixups_mips",
    "instruction_simplifier$before_codegen",
    "pc_relative_fixups_x86",
    "pc_relative_fixups_mips",
    "x86_memory_operand_generation",
];

/// Pipeline stages which are not optimizations. They run regardless of the
/// pass-selection mechanism and are dropped from the searched list.
pub const NON_PASSES: &[&str] = &[
    "builder",
    "prepare_for_register_allocation",
    "liveness",
    "register",
];

/// Keeps every pass with index below `cutoff`, plus every mandatory pass
/// wherever it appears. Original order is preserved.
pub fn filter_passes(passes: &[String], cutoff: usize) -> Vec<String> {
    passes
        .iter()
        .enumerate()
        .filter(|(idx, pass)| *idx < cutoff || MANDATORY_PASSES.contains(&pass.as_str()))
        .map(|(_, pass)| pass.clone())
        .collect()
}
