use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use log::debug;

use crate::{error::Error, plan::ExecutionPlan};

/// What a [Runner] hands back after running an [ExecutionPlan]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessOutcome {
    pub stdout: String,

    /// contents of each requested output file, `None` if the program did not
    /// write it
    pub output_files: BTreeMap<String, Option<String>>,
}

/// Something that can run an [ExecutionPlan] to completion. Every call must
/// use its own working area so that concurrent calls do not collide.
pub trait Runner {
    fn run(&self, plan: &ExecutionPlan) -> Result<ProcessOutcome, Error>;
}

/// Runs the plan on the local machine in a fresh scratch directory that is
/// removed when the run finishes
#[derive(Clone, Debug, Default)]
pub struct LocalRunner {
    /// parent for the scratch directories. `None` uses the system temporary
    /// directory
    pub scratch_dir: Option<PathBuf>,
}

impl LocalRunner {
    pub fn new(scratch_dir: Option<PathBuf>) -> Self {
        Self { scratch_dir }
    }

    fn scratch(&self) -> Result<tempfile::TempDir, Error> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mp2d_");
        Ok(match &self.scratch_dir {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        })
    }

    /// read `name` from `dir`, returning `None` if it does not exist
    fn collect(dir: &Path, name: &str) -> Result<Option<String>, Error> {
        let path = dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }
}

impl Runner for LocalRunner {
    fn run(&self, plan: &ExecutionPlan) -> Result<ProcessOutcome, Error> {
        let Some((prog, args)) = plan.command.split_first() else {
            return Err(Error::Unknown("empty command".to_owned()));
        };
        let scratch = self.scratch()?;
        let dir = scratch.path();
        debug!("running {} in {}", plan.command.join(" "), dir.display());

        for (name, contents) in &plan.input_files {
            fs::write(dir.join(name), contents)?;
        }

        let output = Command::new(prog)
            .args(args)
            .current_dir(dir)
            .env_clear()
            .envs(&plan.environment)
            .output()
            .map_err(|e| {
                Error::Unknown(format!("failed to run {prog} with {e}"))
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Error::Unknown(format!(
                "{prog} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !stderr.trim().is_empty() {
            debug!("{prog} stderr: {}", stderr.trim());
        }

        let mut output_files = BTreeMap::new();
        for name in &plan.output_files {
            output_files.insert(name.clone(), Self::collect(dir, name)?);
        }

        Ok(ProcessOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            output_files,
        })
    }
}
