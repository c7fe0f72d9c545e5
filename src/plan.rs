use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{
    dashparam::DashParameters,
    error::Error,
    request::{ComputationRequest, Driver},
};

/// name of the geometry file handed to MP2D
pub const GEOMETRY_FILE: &str = "mp2d_geometry";

/// name of the gradient file MP2D writes when asked for a gradient
pub const GRADIENT_FILE: &str = "mp2d_gradient";

/// the only environment variables passed through to MP2D
static PASSTHROUGH_ENV: &[&str] = &["HOME", "PATH"];

/// Everything needed to run MP2D once. Built by [plant] and consumed by a
/// [crate::runner::Runner].
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionPlan {
    /// file name to contents, written into the scratch directory
    pub input_files: BTreeMap<String, String>,

    /// files to collect from the scratch directory after the run
    pub output_files: BTreeSet<String>,

    pub environment: BTreeMap<String, String>,

    pub command: Vec<String>,

    /// the resolved real-atom mask of the request's molecule
    pub real: Vec<bool>,
}

/// Translate `request` and its resolved parameters into an [ExecutionPlan] for
/// running `program`.
pub fn plant(
    program: &str,
    request: &ComputationRequest,
    params: &DashParameters,
) -> Result<ExecutionPlan, Error> {
    let coeffs = coeff_args(params)?;
    let real = request.molecule.real_mask()?;

    let input_files = BTreeMap::from([(
        GEOMETRY_FILE.to_owned(),
        request.molecule.to_xyz(&real),
    )]);
    let output_files = BTreeSet::from([GRADIENT_FILE.to_owned()]);

    let environment = PASSTHROUGH_ENV
        .iter()
        .filter_map(|&k| std::env::var(k).ok().map(|v| (k.to_owned(), v)))
        .collect();

    let mut command = vec![program.to_owned(), GEOMETRY_FILE.to_owned()];
    if request.driver == Driver::Gradient {
        command.push("--gradient".to_owned());
    }
    command.extend(coeffs);
    debug!("planned command: {}", command.join(" "));

    Ok(ExecutionPlan {
        input_files,
        output_files,
        environment,
        command,
        real,
    })
}

/// Format the coefficients of `params` as MP2D command line arguments, in the
/// order MP2D expects them for the level. Whole numbers keep their decimal
/// point.
pub fn coeff_args(params: &DashParameters) -> Result<Vec<String>, Error> {
    let c = &params.coefficients;
    let get = |key: &str| {
        c.get(key).copied().ok_or_else(|| {
            Error::Configuration(format!(
                "coefficient '{key}' missing for level '{}'",
                params.level
            ))
        })
    };
    match params.level.to_lowercase().as_str() {
        "dmp2" => Ok(vec![
            format!("--TT_a1={:?}", get("a1")?),
            format!("--TT_a2={:?}", get("a2")?),
            format!("--rcut={:?}", get("rcut")?),
            format!("--w={:?}", get("w")?),
            format!("--s8={:?}", get("s8")?),
        ]),
        other => Err(Error::Configuration(format!(
            "-D correction level {other} is not available. Choose among {:?}.",
            ["dmp2"]
        ))),
    }
}
