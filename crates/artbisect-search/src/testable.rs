use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Result;

use artbisect_env::TestEnv;

use crate::diagnostics;
use crate::passes::NON_PASSES;

/// One testable compilation: something that can be probed with a method
/// subset and a pass subset and scored pass/fail.
///
/// The search driver only talks to this trait, so it can be exercised
/// against scripted doubles.
pub trait Testable {
    /// Runs one probe. `None` for `methods` compiles everything; `None` for
    /// `passes` runs the default pipeline. Returns true when the run shows no
    /// fault: either the process exited non-zero (a crash is not the fault
    /// under search) or its stdout matched the reference output.
    fn test(&mut self, methods: Option<&[String]>, passes: Option<&[String]>) -> Result<bool>;

    /// All methods compiled during an unrestricted run, in compilation order.
    fn all_methods(&mut self) -> Result<Vec<String>>;

    /// All optimization passes run for `method`, in pipeline order.
    fn passes_for_method(&mut self, method: &str) -> Result<Vec<String>>;
}

/// Wraps one base launch command against a dex2oat-compiled classpath.
///
/// Method and pass subsets are delivered through two selection files in the
/// environment's scratch area, rewritten per probe. Method and pass lists
/// are discovered lazily from compiler diagnostics and memoized for the
/// session.
pub struct Dex2OatTestable {
    base_cmd: Vec<String>,
    env: Box<dyn TestEnv>,
    class_name: String,
    correct_output: Option<String>,
    verbose: bool,
    compiled_methods_path: String,
    passes_to_run_path: String,
    method_list: Option<Vec<String>>,
    pass_lists: HashMap<String, Vec<String>>,
}

impl Dex2OatTestable {
    pub fn new(
        base_cmd: Vec<String>,
        mut env: Box<dyn TestEnv>,
        class_name: &str,
        correct_output: Option<String>,
        verbose: bool,
    ) -> Result<Self> {
        let compiled_methods_path = env.create_file(Some("compiled_methods"))?;
        let passes_to_run_path = env.create_file(Some("run_passes"))?;
        Ok(Self {
            base_cmd,
            env,
            class_name: class_name.to_string(),
            correct_output,
            verbose,
            compiled_methods_path,
            passes_to_run_path,
            method_list: None,
            pass_lists: HashMap::new(),
        })
    }

    pub fn logfile_path(&self) -> PathBuf {
        self.env.logfile_path().to_path_buf()
    }

    pub fn log_note(&mut self, note: &str) -> Result<()> {
        self.env.log_note(note)
    }

    fn prepare_cmd(
        &mut self,
        methods: Option<&[String]>,
        passes: Option<&[String]>,
    ) -> Result<Vec<String>> {
        let mut cmd = self.base_cmd.clone();
        if let Some(methods) = methods {
            self.env.write_lines(&self.compiled_methods_path, methods)?;
            cmd.push("-Xcompiler-option".to_string());
            cmd.push(format!("--compiled-methods={}", self.compiled_methods_path));
        }
        if let Some(passes) = passes {
            self.env.write_lines(&self.passes_to_run_path, passes)?;
            cmd.push("-Xcompiler-option".to_string());
            cmd.push(format!("--run-passes={}", self.passes_to_run_path));
        }
        // Forward -verbose:compiler through dex2oat to the runtime so the
        // diagnostic markers appear on stderr.
        for opt in ["-Xcompiler-option", "--runtime-arg", "-Xcompiler-option", "-verbose:compiler"] {
            cmd.push(opt.to_string());
        }
        cmd.push("-classpath".to_string());
        cmd.push(self.env.classpath().to_string());
        cmd.push(self.class_name.clone());
        Ok(cmd)
    }
}

impl Testable for Dex2OatTestable {
    fn test(&mut self, methods: Option<&[String]>, passes: Option<&[String]>) -> Result<bool> {
        if self.verbose {
            eprintln!("Testing methods: {methods:?} passes: {passes:?}.");
        }
        let cmd = self.prepare_cmd(methods, passes)?;
        let out = self.env.run_command(&cmd)?;
        let res =
            out.exit_status != 0 || self.correct_output.as_deref() == Some(out.stdout.as_str());
        if self.verbose {
            eprintln!("Test passed: {res}.");
        }
        Ok(res)
    }

    fn all_methods(&mut self) -> Result<Vec<String>> {
        if let Some(methods) = &self.method_list {
            return Ok(methods.clone());
        }
        let cmd = self.prepare_cmd(None, None)?;
        let out = self.env.run_command(&cmd)?;
        let methods = diagnostics::scrape_methods(&out.stderr);
        if methods.is_empty() {
            anyhow::bail!(
                "failed to retrieve method list: compiler diagnostics were not in the \
                 expected format"
            );
        }
        self.method_list = Some(methods.clone());
        Ok(methods)
    }

    fn passes_for_method(&mut self, method: &str) -> Result<Vec<String>> {
        if let Some(passes) = self.pass_lists.get(method) {
            return Ok(passes.clone());
        }
        let methods = [method.to_string()];
        let cmd = self.prepare_cmd(Some(&methods), None)?;
        let out = self.env.run_command(&cmd)?;
        let passes: Vec<String> = diagnostics::scrape_passes(&out.stderr)
            .into_iter()
            .filter(|pass| !NON_PASSES.contains(&pass.as_str()))
            .collect();
        if passes.is_empty() {
            anyhow::bail!(
                "failed to retrieve pass list for {method}: compiler diagnostics were not \
                 in the expected format"
            );
        }
        self.pass_lists.insert(method.to_string(), passes.clone());
        Ok(passes)
    }
}
