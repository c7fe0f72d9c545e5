use std::{collections::BTreeMap, fmt::Display};

use serde::Deserialize;

use crate::{dashparam::LevelTable, error::Error, molecule::Molecule};

/// The requested computation type. MP2D only produces energies and first
/// derivatives, but higher derivatives can still be requested and are
/// rejected by the harness.
#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Energy,
    Gradient,
    Hessian,
    Properties,
}

impl Driver {
    /// the derivative order implied by the driver. properties are treated as
    /// unsupported, like any derivative above the gradient
    pub fn derivative_int(&self) -> usize {
        match self {
            Driver::Energy => 0,
            Driver::Gradient => 1,
            Driver::Hessian | Driver::Properties => 2,
        }
    }
}

impl Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Driver::Energy => "energy",
            Driver::Gradient => "gradient",
            Driver::Hessian => "hessian",
            Driver::Properties => "properties",
        };
        write!(f, "{s}")
    }
}

#[derive(Clone, Default, Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Keywords {
    /// dispersion level to use instead of the one implied by the method
    pub level_hint: Option<String>,

    /// coefficients overriding the tabulated values for the resolved level
    pub params_tweaks: Option<BTreeMap<String, f64>>,

    /// extra coefficient tables merged into the built-in ones
    pub dashcoeff_supplement: Option<BTreeMap<String, LevelTable>>,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComputationRequest {
    pub method: String,
    pub driver: Driver,
    pub molecule: Molecule,
    #[serde(default)]
    pub keywords: Keywords,
}

impl ComputationRequest {
    pub fn new(method: &str, driver: Driver, molecule: Molecule) -> Self {
        Self {
            method: method.to_owned(),
            driver,
            molecule,
            keywords: Keywords::default(),
        }
    }

    pub fn load(filename: &str) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(filename)?;
        Ok(toml::from_str(&contents)?)
    }
}
