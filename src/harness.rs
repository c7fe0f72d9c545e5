use std::{path::PathBuf, sync::Arc};

use log::{debug, warn};

use crate::{
    config::Config,
    dashparam::{self, strip_engine_hint},
    error::{Error, ErrorRecord, Failure},
    harvest::harvest,
    plan::plant,
    request::{ComputationRequest, Driver},
    result::{
        ComputationResult, FailedOperation, Outcome, Provenance, QcVar,
        ReturnResult,
    },
    runner::{LocalRunner, Runner},
    version::{is_new_enough, locate_program, VersionCache, MIN_VERSION},
};

/// What a [Harness] can do and how it may be scheduled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarnessInfo {
    pub name: &'static str,
    /// each call runs in its own scratch directory
    pub scratch: bool,
    /// concurrent calls on one harness do not interfere
    pub thread_safe: bool,
    /// a single call can use more than one thread
    pub thread_parallel: bool,
    /// a single call can span more than one node
    pub node_parallel: bool,
    /// the harness passes a memory limit to the program
    pub managed_memory: bool,
}

const INFO: HarnessInfo = HarnessInfo {
    name: "MP2D",
    scratch: true,
    thread_safe: true,
    thread_parallel: false,
    node_parallel: false,
    managed_memory: false,
};

/// Drives MP2D for energies and gradients. A harness holds no per-call state,
/// so one value can serve any number of concurrent callers as long as its
/// [Runner] gives each call its own scratch space.
#[derive(Debug)]
pub struct Harness<R: Runner = LocalRunner> {
    pub config: Config,
    runner: R,
    versions: Arc<VersionCache>,
}

impl Harness<LocalRunner> {
    pub fn new(config: Config) -> Self {
        let runner = LocalRunner::new(config.scratch_dir.clone());
        Self::with_runner(config, runner)
    }
}

impl<R: Runner> Harness<R> {
    /// a harness using `runner` and the process-wide version cache
    pub fn with_runner(config: Config, runner: R) -> Self {
        Self {
            config,
            runner,
            versions: VersionCache::global(),
        }
    }

    /// replace the process-wide version cache with `versions`
    pub fn with_version_cache(mut self, versions: Arc<VersionCache>) -> Self {
        self.versions = versions;
        self
    }

    pub fn info() -> HarnessInfo {
        INFO
    }

    /// the absolute path to the MP2D executable, or an availability error if
    /// it is not installed
    pub fn found(&self) -> Result<PathBuf, Error> {
        let exe = locate_program(&self.config.program)?;
        Ok(std::fs::canonicalize(exe)?)
    }

    pub fn get_version(&self) -> Result<String, Error> {
        let exe = self.found()?;
        self.versions.get_version(&exe)
    }

    /// Run MP2D for `request`. Availability, version, and driver checks fail
    /// before anything is planned. Any later error is recorded on the partial
    /// result returned inside the [Failure].
    pub fn compute(
        &self,
        request: &ComputationRequest,
    ) -> Result<ComputationResult, Failure> {
        let installed = self.get_version()?;
        if !is_new_enough(&installed, MIN_VERSION) {
            return Err(Error::Resource {
                installed,
                minimum: MIN_VERSION.to_owned(),
            }
            .into());
        }

        let mut result = ComputationResult::new(
            request,
            Provenance::stamp(concat!(module_path!(), "::compute")),
        );
        result.method = strip_engine_hint(&request.method).to_owned();

        if request.driver.derivative_int() > 1 {
            return Err(Error::Input(format!(
                "MP2D valid driver options are 'energy' and 'gradient', not \
                 {}",
                request.driver
            ))
            .into());
        }

        let ene = match self.run(request, &mut result) {
            Ok(ene) => ene,
            Err(error) => {
                result.success = false;
                result.error = Some(ErrorRecord::from(&error));
                return Err(Failure {
                    error,
                    record: Some(Box::new(result)),
                });
            }
        };
        result.success = true;
        result
            .qcvars
            .insert(String::from("CURRENT ENERGY"), QcVar::Scalar(ene));
        result.return_result = match (request.driver, &result.gradient) {
            (Driver::Gradient, Some(grad)) => {
                let grad = grad.clone();
                result.qcvars.insert(
                    String::from("CURRENT GRADIENT"),
                    QcVar::Array(grad.clone()),
                );
                Some(ReturnResult::Gradient(grad))
            }
            _ => Some(ReturnResult::Energy(ene)),
        };

        if result.provenance.version.is_none() {
            warn!("using installed version {installed} for provenance");
            result.provenance.version = Some(installed);
        }

        Ok(result)
    }

    /// Like [Self::compute], but hand failures back as a value
    pub fn compute_or_fail(&self, request: &ComputationRequest) -> Outcome {
        match self.compute(request) {
            Ok(result) => Outcome::Success(Box::new(result)),
            Err(Failure { error, record }) => {
                Outcome::Failed(Box::new(FailedOperation {
                    error: ErrorRecord::from(&error),
                    input: record.map(|r| *r),
                }))
            }
        }
    }

    /// resolve, plant, execute, and harvest, returning the harvested energy
    fn run(
        &self,
        request: &ComputationRequest,
        result: &mut ComputationResult,
    ) -> Result<f64, Error> {
        let kw = &request.keywords;
        let params = dashparam::resolve(
            &request.method,
            kw.level_hint.as_deref(),
            kw.params_tweaks.as_ref(),
            kw.dashcoeff_supplement.as_ref(),
        )?;
        // the runner changes into its scratch directory, so a relative
        // program path has to be resolved here
        let exe = self.found()?;
        let plan = plant(&exe.to_string_lossy(), request, &params)?;
        let outcome = self.runner.run(&plan)?;
        debug!("collected {} bytes of stdout", outcome.stdout.len());
        harvest(result, request, &params, &plan, &outcome)?;
        result.energy.ok_or_else(|| {
            Error::ResultParsing(String::from(
                "harvest finished without an energy",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        collections::BTreeMap,
    };

    use approx::assert_abs_diff_eq;

    use crate::{
        molecule::Molecule, plan::ExecutionPlan, plan::GRADIENT_FILE,
        runner::ProcessOutcome, string,
    };

    use super::*;

    /// hands back a fixed outcome and remembers the plans it was given
    struct CannedRunner {
        outcome: ProcessOutcome,
        calls: Cell<usize>,
        plans: RefCell<Vec<ExecutionPlan>>,
    }

    impl CannedRunner {
        fn new(stdout: &str, grad: Option<&str>) -> Self {
            Self {
                outcome: ProcessOutcome {
                    stdout: stdout.to_owned(),
                    output_files: BTreeMap::from([(
                        GRADIENT_FILE.to_owned(),
                        grad.map(str::to_owned),
                    )]),
                },
                calls: Cell::new(0),
                plans: RefCell::new(Vec::new()),
            }
        }
    }

    impl Runner for CannedRunner {
        fn run(&self, plan: &ExecutionPlan) -> Result<ProcessOutcome, Error> {
            self.calls.set(self.calls.get() + 1);
            self.plans.borrow_mut().push(plan.clone());
            Ok(self.outcome.clone())
        }
    }

    const STDOUT: &str = "     MP2D dispersion correction v1.1
   MP2D dispersion correction Eh   0   0   0   -0.001234
Atomic Coordinates in Angstroms
";

    /// a harness whose program exists on disk and whose version is already
    /// cached, so nothing is ever executed except through `runner`
    fn harness(
        runner: CannedRunner,
        version: &str,
    ) -> (Harness<CannedRunner>, tempfile::NamedTempFile) {
        let exe = tempfile::NamedTempFile::new().unwrap();
        let cache = Arc::new(VersionCache::new());
        cache.insert(&std::fs::canonicalize(exe.path()).unwrap(), version);
        let config = Config {
            program: exe.path().to_str().unwrap().to_owned(),
            scratch_dir: None,
        };
        let h = Harness::with_runner(config, runner).with_version_cache(cache);
        (h, exe)
    }

    fn dimer(driver: Driver) -> ComputationRequest {
        ComputationRequest::new(
            "mp2d-dmp2",
            driver,
            Molecule::new(
                string!["Ne", "Ne"],
                vec![0.0, 0.0, 0.0, 0.0, 0.0, 5.8],
            ),
        )
    }

    #[test]
    fn test_energy() {
        let (h, _exe) = harness(CannedRunner::new(STDOUT, None), "1.1");
        let got = h.compute(&dimer(Driver::Energy)).unwrap();
        assert!(got.success);
        assert_eq!(got.method, "dmp2");
        assert_abs_diff_eq!(got.energy.unwrap(), -0.001234);
        assert_eq!(got.return_result, Some(ReturnResult::Energy(-0.001234)));
        assert_eq!(got.qcvar_scalar("CURRENT ENERGY"), got.energy);
        assert_eq!(
            got.qcvar_scalar("DISPERSION CORRECTION ENERGY"),
            got.energy
        );
        assert!(got.qcvar_array("CURRENT GRADIENT").is_none());
        assert_eq!(got.provenance.creator, "mp2d");
        assert!(got.error.is_none());
        assert_eq!(h.runner.calls.get(), 1);
    }

    #[test]
    fn test_gradient() {
        let runner =
            CannedRunner::new(STDOUT, Some("0.0 0.0 0.01 0.0 0.0 -0.01"));
        let (h, _exe) = harness(runner, "1.1");
        let got = h.compute(&dimer(Driver::Gradient)).unwrap();
        let want = nalgebra::DMatrix::from_row_slice(
            2,
            3,
            &[0.0, 0.0, 0.01, 0.0, 0.0, -0.01],
        );
        assert_eq!(
            got.return_result,
            Some(ReturnResult::Gradient(want.clone()))
        );
        assert_eq!(got.qcvar_array("CURRENT GRADIENT"), Some(&want));
        assert_eq!(got.qcvar_scalar("CURRENT ENERGY"), Some(-0.001234));
        assert_eq!(h.runner.plans.borrow()[0].command[2], "--gradient");
    }

    #[test]
    fn test_info() {
        let got = Harness::<LocalRunner>::info();
        assert_eq!(got.name, "MP2D");
        assert!(got.scratch);
        assert!(got.thread_safe);
        assert!(!got.thread_parallel);
        assert!(!got.node_parallel);
        assert!(!got.managed_memory);
    }

    #[test]
    fn test_command_uses_absolute_program() {
        let (h, exe) = harness(CannedRunner::new(STDOUT, None), "1.1");
        h.compute(&dimer(Driver::Energy)).unwrap();
        let plans = h.runner.plans.borrow();
        let program = std::path::Path::new(&plans[0].command[0]);
        assert!(program.is_absolute());
        assert_eq!(program, std::fs::canonicalize(exe.path()).unwrap());
    }

    #[test]
    fn test_uppercase_engine_hint() {
        let (h, _exe) = harness(CannedRunner::new(STDOUT, None), "1.1");
        let mut req = dimer(Driver::Energy);
        req.method = String::from("MP2D-mp2-dmp2");
        let got = h.compute(&req).unwrap();
        assert_eq!(got.method, "mp2-dmp2");
        assert_eq!(
            got.qcvar_scalar("MP2-DMP2 DISPERSION CORRECTION ENERGY"),
            Some(-0.001234)
        );
    }

    #[test]
    fn test_unsupported_driver() {
        for driver in [Driver::Hessian, Driver::Properties] {
            let (h, _exe) = harness(CannedRunner::new(STDOUT, None), "1.1");
            let got = h.compute(&dimer(driver)).unwrap_err();
            assert!(matches!(got.error, Error::Input(_)));
            assert!(got.record.is_none());
            assert_eq!(h.runner.calls.get(), 0);
        }
    }

    #[test]
    fn test_too_old() {
        let (h, _exe) = harness(CannedRunner::new(STDOUT, None), "1.0");
        let got = h.compute(&dimer(Driver::Energy)).unwrap_err();
        match got.error {
            Error::Resource { installed, minimum } => {
                assert_eq!(installed, "1.0");
                assert_eq!(minimum, "1.1");
            }
            e => panic!("expected resource error, got {e:?}"),
        }
        assert_eq!(h.runner.calls.get(), 0);
    }

    #[test]
    fn test_not_installed() {
        let config = Config {
            program: String::from("/nonexistent/bin/mp2d"),
            scratch_dir: None,
        };
        let h = Harness::with_runner(config, CannedRunner::new(STDOUT, None));
        let got = h.compute(&dimer(Driver::Energy)).unwrap_err();
        assert_eq!(got.error.kind(), "AvailabilityError");
        assert_eq!(h.runner.calls.get(), 0);
    }

    #[test]
    fn test_unsupported_level() {
        let (h, _exe) = harness(CannedRunner::new(STDOUT, None), "1.1");
        let mut req = dimer(Driver::Energy);
        req.keywords.level_hint = Some(String::from("d3zero"));
        req.keywords.dashcoeff_supplement = Some(BTreeMap::from([(
            String::from("d3zero"),
            crate::dashparam::LevelTable {
                default: BTreeMap::from([(String::from("s6"), 1.0)]),
                ..Default::default()
            },
        )]));
        let got = h.compute(&req).unwrap_err();
        assert_eq!(got.error.kind(), "ConfigurationError");
        let record = got.record.unwrap();
        assert!(!record.success);
        assert_eq!(record.error.unwrap().error_type, "ConfigurationError");
        assert_eq!(h.runner.calls.get(), 0);
    }

    #[test]
    fn test_parse_failure_is_recorded() {
        let (h, _exe) = harness(CannedRunner::new("garbage\n", None), "1.1");
        let got = h.compute(&dimer(Driver::Energy)).unwrap_err();
        assert_eq!(got.error.kind(), "ResultParsingError");
        let record = got.record.unwrap();
        assert!(!record.success);
        assert!(record.stdout.unwrap().starts_with("garbage"));
        let err = record.error.unwrap();
        assert_eq!(err.error_type, "ResultParsingError");
        assert!(err.error_message.contains("energy not found"));
    }

    #[test]
    fn test_compute_or_fail() {
        let (h, _exe) = harness(CannedRunner::new("garbage\n", None), "1.1");
        match h.compute_or_fail(&dimer(Driver::Energy)) {
            Outcome::Failed(f) => {
                assert_eq!(f.error.error_type, "ResultParsingError");
                assert!(f.input.is_some());
            }
            Outcome::Success(_) => panic!("expected failure"),
        }

        let (h, _exe) = harness(CannedRunner::new(STDOUT, None), "1.1");
        assert!(h.compute_or_fail(&dimer(Driver::Energy)).is_success());
    }

    #[test]
    fn test_version_fallback() {
        let stdout = "   MP2D dispersion correction Eh  -0.5\n";
        let (h, _exe) = harness(CannedRunner::new(stdout, None), "1.2.0");
        let got = h.compute(&dimer(Driver::Energy)).unwrap();
        assert_eq!(got.provenance.creator, "mp2d");
        assert_eq!(got.provenance.version.as_deref(), Some("1.2.0"));
    }
}
