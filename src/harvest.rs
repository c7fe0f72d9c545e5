use log::{debug, warn};
use nalgebra as na;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    dashparam::DashParameters,
    error::Error,
    plan::{ExecutionPlan, GRADIENT_FILE},
    request::{ComputationRequest, Driver},
    result::{ComputationResult, Provenance, QcVar},
    runner::ProcessOutcome,
    utils::print_variables,
};

/// start of the line carrying the dispersion energy
const ENERGY_MARKER: &str = "   MP2D dispersion correction Eh";

/// nothing after this line is needed
const COORD_MARKER: &str = "Atomic Coordinates in Angstroms";

static VERSION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)MP2D dispersion correction v([0-9][0-9a-z.\-]*)")
        .expect("valid regex")
});

/// The parts of MP2D's stdout we care about
#[derive(Debug, Default, PartialEq)]
pub struct StdoutScan {
    pub version: Option<String>,
    pub energy: Option<f64>,
}

/// Scan `stdout` for the version and energy lines, stopping at the atomic
/// coordinates block
pub fn scan_stdout(stdout: &str) -> Result<StdoutScan, Error> {
    let mut ret = StdoutScan::default();
    for line in stdout.lines() {
        if let Some(caps) = VERSION_LINE.captures(line) {
            ret.version = Some(caps[1].replace('-', "").to_lowercase());
        } else if line.starts_with(ENERGY_MARKER) {
            // canonical output has the energy as the 5th field, but it is
            // always the last one
            let field = line.split_whitespace().last().unwrap_or_default();
            let ene = field.replace(['D', 'd'], "E").parse().map_err(|_| {
                Error::ResultParsing(format!(
                    "failed to parse dispersion energy from '{line}'"
                ))
            })?;
            ret.energy = Some(ene);
        } else if line.starts_with(COORD_MARKER) {
            break;
        }
    }
    Ok(ret)
}

/// Parse the first `3 * nreal` numbers of an MP2D gradient file into an
/// (nreal, 3) matrix
pub fn parse_gradient(
    contents: &str,
    nreal: usize,
) -> Result<na::DMatrix<f64>, Error> {
    let vals = contents
        .split_whitespace()
        .take(3 * nreal)
        .map(|s| s.replace(['D', 'd'], "E").parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            Error::ResultParsing(format!("malformed gradient file: {e}"))
        })?;
    if vals.len() != 3 * nreal {
        return Err(Error::ResultParsing(format!(
            "gradient file has {} values, expected {} for {nreal} real atoms",
            vals.len(),
            3 * nreal
        )));
    }
    Ok(na::DMatrix::from_row_slice(nreal, 3, &vals))
}

/// Process the raw output of MP2D in `outcome` into `result`: diagnostic
/// text, energy and gradient, the labeled quantities, and provenance. Fields
/// are filled in as they are parsed, so `result` holds whatever was collected
/// before an error.
pub fn harvest(
    result: &mut ComputationResult,
    request: &ComputationRequest,
    params: &DashParameters,
    plan: &ExecutionPlan,
    outcome: &ProcessOutcome,
) -> Result<(), Error> {
    let mut text = outcome.stdout.clone();
    text.push_str("\n  <<<  MP2D Results  >>>\n");
    for (name, contents) in &outcome.output_files {
        if let Some(contents) = contents {
            text.push_str(&format!(
                "\n  MP2D scratch file {name} has been read.\n"
            ));
            text.push_str(contents);
        }
    }
    result.stdout = Some(text);
    result.molecule.real = Some(plan.real.clone());

    let full_nat = plan.real.len();
    let real_nat = plan.real.iter().filter(|&&r| r).count();

    let scan = scan_stdout(&outcome.stdout)?;
    let ene = match scan.energy {
        Some(e) => e,
        // a lone atom has no dispersion, and MP2D prints no energy for it
        None if real_nat == 1 && request.driver == Driver::Gradient => {
            debug!("no energy line for single-atom gradient, using 0.0");
            0.0
        }
        None => {
            return Err(Error::ResultParsing(
                "dispersion correction energy not found in MP2D output"
                    .to_owned(),
            ))
        }
    };
    result.energy = Some(ene);

    let realgrad = match outcome.output_files.get(GRADIENT_FILE) {
        Some(Some(s)) if !s.trim().is_empty() => {
            Some(parse_gradient(s, real_nat)?)
        }
        _ => None,
    };

    let fullgrad = if request.driver == Driver::Gradient {
        let Some(realgrad) = realgrad else {
            return Err(Error::ResultParsing(
                "Unsuccessful gradient collection.".to_owned(),
            ));
        };
        let mut full = na::DMatrix::zeros(full_nat, 3);
        let ireal = plan
            .real
            .iter()
            .enumerate()
            .filter_map(|(i, &r)| r.then_some(i));
        for (row, i) in ireal.enumerate() {
            full.row_mut(i).copy_from(&realgrad.row(row));
        }
        result.gradient = Some(full.clone());
        Some(full)
    } else {
        None
    };

    let qcvkey = params.fctldash.to_uppercase();
    let mut labels = vec![
        String::from("DISPERSION CORRECTION"),
        String::from("2-BODY DISPERSION CORRECTION"),
    ];
    if !qcvkey.is_empty() {
        labels.push(format!("{qcvkey} DISPERSION CORRECTION"));
    }
    for label in &labels {
        result
            .qcvars
            .insert(format!("{label} ENERGY"), QcVar::Scalar(ene));
        if let Some(grad) = &fullgrad {
            result.qcvars.insert(
                format!("{label} GRADIENT"),
                QcVar::Array(grad.clone()),
            );
        }
    }
    if let Some(text) = result.stdout.as_mut() {
        text.push_str(&print_variables(&result.qcvars));
    }

    if scan.version.is_none() {
        warn!("MP2D output contained no version line");
    }
    result.provenance = Provenance {
        creator: String::from("mp2d"),
        routine: concat!(module_path!(), "::harvest").to_owned(),
        version: scan.version,
    };

    Ok(())
}
