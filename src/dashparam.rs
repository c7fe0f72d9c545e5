//! Dispersion levels, their tabulated coefficients, and the resolution of a
//! method name plus caller overrides into the coefficients MP2D needs.

use std::collections::BTreeMap;

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::Error;

/// prefix that marks a method as intended for this harness
pub const ENGINE_HINT: &str = "mp2d-";

/// `method` without a leading [ENGINE_HINT], matched regardless of case
pub fn strip_engine_hint(method: &str) -> &str {
    match method.get(..ENGINE_HINT.len()) {
        Some(head) if head.eq_ignore_ascii_case(ENGINE_HINT) => {
            &method[ENGINE_HINT.len()..]
        }
        _ => method,
    }
}

/// alternative spellings of dispersion levels
static LEVEL_ALIASES: &[(&str, &str)] = &[("mp2d", "dmp2")];

/// The coefficients of a named functional within a dispersion level
#[derive(Clone, Default, Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Definition {
    pub params: BTreeMap<String, f64>,
    pub citation: Option<String>,
}

/// All of the coefficient data for one dispersion level. Also the shape of a
/// single `dashcoeff_supplement` entry.
#[derive(Clone, Default, Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LevelTable {
    pub formal: Option<String>,
    pub default: BTreeMap<String, f64>,
    pub definitions: BTreeMap<String, Definition>,
}

impl LevelTable {
    /// merge `other` into `self`, letting entries of `other` win
    fn extend(&mut self, other: &LevelTable) {
        if other.formal.is_some() {
            self.formal.clone_from(&other.formal);
        }
        self.default
            .extend(other.default.iter().map(|(k, v)| (k.to_lowercase(), *v)));
        self.definitions.extend(
            other
                .definitions
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone())),
        );
    }
}

static DASHCOEFF: Lazy<BTreeMap<String, LevelTable>> = Lazy::new(|| {
    let dmp2 = BTreeMap::from([
        (String::from("s8"), 1.187),
        (String::from("a1"), 0.944),
        (String::from("a2"), 0.480),
        (String::from("rcut"), 0.72),
        (String::from("w"), 0.20),
    ]);
    BTreeMap::from([(
        String::from("dmp2"),
        LevelTable {
            formal: Some(String::from("DMP2")),
            default: dmp2.clone(),
            definitions: BTreeMap::from([(
                String::from("mp2"),
                Definition {
                    params: dmp2,
                    citation: Some(String::from(
                        "J. Rezac, C. Greenwell, G. Beran, J. Chem. Theory \
                         Comput., 14, 4711-4721 (2018)",
                    )),
                },
            )]),
        },
    )])
});

/// The coefficients that must be present after resolving `level`, or `None`
/// if the level is not one this crate knows about
pub fn required_keys(level: &str) -> Option<&'static [&'static str]> {
    match level {
        "dmp2" => Some(&["a1", "a2", "rcut", "w", "s8"]),
        _ => None,
    }
}

/// lowercase `level` and replace it with its canonical name if it is an alias
fn canonical_level(level: &str) -> String {
    let level = level.to_lowercase();
    for (alias, name) in LEVEL_ALIASES {
        if level == *alias {
            return name.to_string();
        }
    }
    level
}

/// split `method` into an optional functional name and the dispersion level
/// it implies, if any
fn split_method<'a>(
    method: &'a str,
    tables: &BTreeMap<String, LevelTable>,
) -> (Option<&'a str>, Option<String>) {
    let level = canonical_level(method);
    if tables.contains_key(&level) {
        return (None, Some(level));
    }
    if let Some((fctl, lvl)) = method.rsplit_once('-') {
        let lvl = canonical_level(lvl);
        if tables.contains_key(&lvl) {
            return (Some(fctl), Some(lvl));
        }
    }
    (Some(method), None)
}

/// Fully resolved dispersion parameters
#[derive(Clone, Debug, PartialEq)]
pub struct DashParameters {
    /// canonical level name like "dmp2"
    pub level: String,
    pub coefficients: BTreeMap<String, f64>,
    /// label like "mp2-dmp2" when the coefficients are exactly those of a
    /// tabulated functional, empty otherwise
    pub fctldash: String,
}

/// Resolve `method` and the caller overrides into [DashParameters].
/// `level_hint` replaces the level implied by `method`,
/// `dashcoeff_supplement` is merged into the built-in tables before lookup,
/// and `param_tweaks` finally overrides individual coefficients.
pub fn resolve(
    method: &str,
    level_hint: Option<&str>,
    param_tweaks: Option<&BTreeMap<String, f64>>,
    dashcoeff_supplement: Option<&BTreeMap<String, LevelTable>>,
) -> Result<DashParameters, Error> {
    let mut tables = DASHCOEFF.clone();
    if let Some(supplement) = dashcoeff_supplement {
        for (level, table) in supplement {
            tables.entry(canonical_level(level)).or_default().extend(table);
        }
    }

    let method = strip_engine_hint(method).to_lowercase();
    let method = method.as_str();
    let (fctl, implied) = split_method(method, &tables);

    let level = match (level_hint, implied) {
        (Some(hint), _) => canonical_level(hint),
        (None, Some(level)) => level,
        (None, None) => {
            return Err(Error::Configuration(format!(
                "unable to determine a dispersion level from method \
                 '{method}'. supply a level_hint"
            )))
        }
    };

    let Some(table) = tables.get(&level) else {
        return Err(Error::Configuration(format!(
            "no coefficients known for dispersion level '{level}'. known \
             levels: {:?}",
            tables.keys().collect::<Vec<_>>()
        )));
    };

    let (mut coefficients, mut named) =
        match fctl.and_then(|f| table.definitions.get(f).map(|d| (f, d))) {
            Some((f, def)) => (def.params.clone(), Some(f)),
            None => {
                if let Some(f) = fctl {
                    warn!(
                        "no '{f}' parameterization for level '{level}', \
                         using the level defaults"
                    );
                }
                (table.default.clone(), None)
            }
        };

    let required = required_keys(&level);
    if let Some(tweaks) = param_tweaks {
        for (key, &value) in tweaks {
            let key = key.to_lowercase();
            if let Some(req) = required {
                if !req.contains(&key.as_str()) {
                    return Err(Error::Configuration(format!(
                        "'{key}' is not a coefficient of dispersion level \
                         '{level}'. valid keys: {req:?}"
                    )));
                }
            }
            if coefficients.insert(key, value) != Some(value) {
                named = None;
            }
        }
    }

    if let Some(req) = required {
        let missing: Vec<_> = req
            .iter()
            .filter(|k| !coefficients.contains_key(**k))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "dispersion level '{level}' is missing coefficients {missing:?}"
            )));
        }
    }

    let fctldash = match named {
        Some(f) => format!("{f}-{level}"),
        None => String::new(),
    };
    debug!("resolved {level} coefficients {coefficients:?} ({fctldash})");

    Ok(DashParameters {
        level,
        coefficients,
        fctldash,
    })
}
