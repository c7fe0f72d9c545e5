//! Run the MP2D dispersion correction program on a molecule and collect its
//! energy and gradient.
//!
//! A computation goes through three phases: [plan::plant] turns a
//! [request::ComputationRequest] into the files, environment, and command MP2D
//! needs; a [runner::Runner] executes them; and [harvest::harvest] parses the
//! output back into a [result::ComputationResult]. [harness::Harness] checks
//! the preconditions and sequences the phases.

pub mod config;
pub mod dashparam;
pub mod error;
pub mod harness;
pub mod harvest;
pub mod molecule;
pub mod plan;
pub mod request;
pub mod result;
pub mod runner;
pub mod utils;
pub mod version;

pub use config::Config;
pub use error::{Error, Failure};
pub use harness::{Harness, HarnessInfo};
pub use request::{ComputationRequest, Driver};
pub use result::ComputationResult;

/// Å per bohr, CODATA 2014
pub const BOHR_TO_ANGSTROM: f64 = 0.52917721067;
