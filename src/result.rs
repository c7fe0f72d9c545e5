use std::collections::BTreeMap;

use nalgebra as na;

use crate::{
    error::ErrorRecord,
    molecule::Molecule,
    request::{ComputationRequest, Driver},
};

/// Which program, version, and routine produced a result
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Provenance {
    pub creator: String,
    pub routine: String,
    pub version: Option<String>,
}

impl Provenance {
    /// provenance of this crate itself
    pub fn stamp(routine: &str) -> Self {
        Self {
            creator: env!("CARGO_PKG_NAME").to_owned(),
            routine: routine.to_owned(),
            version: Some(env!("CARGO_PKG_VERSION").to_owned()),
        }
    }
}

/// A named quantity in the result: a scalar in Eh or an (N, 3) array in Eh/a0
#[derive(Clone, Debug, PartialEq)]
pub enum QcVar {
    Scalar(f64),
    Array(na::DMatrix<f64>),
}

impl QcVar {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            QcVar::Scalar(v) => Some(*v),
            QcVar::Array(_) => None,
        }
    }

    pub fn array(&self) -> Option<&na::DMatrix<f64>> {
        match self {
            QcVar::Scalar(_) => None,
            QcVar::Array(a) => Some(a),
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            QcVar::Scalar(_) => "Eh",
            QcVar::Array(_) => "Eh/a0",
        }
    }
}

/// The primary value of a result, determined by the driver
#[derive(Clone, Debug, PartialEq)]
pub enum ReturnResult {
    Energy(f64),
    Gradient(na::DMatrix<f64>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComputationResult {
    pub method: String,
    pub driver: Driver,

    /// the input molecule with its real-atom mask resolved
    pub molecule: Molecule,

    pub success: bool,

    /// dispersion correction energy in Eh. this is the `return_energy`
    /// property and is set for both drivers
    pub energy: Option<f64>,

    /// full (N, 3) gradient in Eh/a0, zero rows for ghost atoms
    pub gradient: Option<na::DMatrix<f64>>,

    pub return_result: Option<ReturnResult>,

    pub qcvars: BTreeMap<String, QcVar>,

    pub provenance: Provenance,

    /// program output followed by the contents of any output files and a
    /// rendering of `qcvars`
    pub stdout: Option<String>,

    pub error: Option<ErrorRecord>,
}

impl ComputationResult {
    /// An empty, unsuccessful result for `request`
    pub fn new(request: &ComputationRequest, provenance: Provenance) -> Self {
        Self {
            method: request.method.clone(),
            driver: request.driver,
            molecule: request.molecule.clone(),
            success: false,
            energy: None,
            gradient: None,
            return_result: None,
            qcvars: BTreeMap::new(),
            provenance,
            stdout: None,
            error: None,
        }
    }

    /// shorthand for a scalar entry in `qcvars`
    pub fn qcvar_scalar(&self, label: &str) -> Option<f64> {
        self.qcvars.get(label).and_then(QcVar::scalar)
    }

    /// shorthand for an array entry in `qcvars`
    pub fn qcvar_array(&self, label: &str) -> Option<&na::DMatrix<f64>> {
        self.qcvars.get(label).and_then(QcVar::array)
    }
}

/// A failed computation converted into a value instead of an error
#[derive(Clone, Debug, PartialEq)]
pub struct FailedOperation {
    pub error: ErrorRecord,
    /// the partial record if the failure happened after planning began
    pub input: Option<ComputationResult>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Success(Box<ComputationResult>),
    Failed(Box<FailedOperation>),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}
