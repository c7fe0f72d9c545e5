use std::collections::BTreeMap;

use nalgebra as na;

use crate::result::QcVar;

/// from [StackOverflow](https://stackoverflow.com/a/45145246)
#[macro_export]
macro_rules! string {
    // match a list of expressions separated by comma:
    ($($str:expr),*) => ({
        // create a Vec with this list of expressions,
        // calling String::from on each:
        vec![$(String::from($str),)*] as Vec<String>
    });
}

pub fn dump_mat(mat: &na::DMatrix<f64>) -> String {
    let mut ret = String::new();
    let (rows, cols) = mat.shape();
    for i in 0..rows {
        ret.push_str(&format!("{:>9}", i));
        for j in 0..cols {
            ret.push_str(&format!("{:>20.12}", mat[(i, j)]));
        }
        ret.push('\n');
    }
    ret
}

/// Render `qcvars` as a human-readable table, one label per entry with arrays
/// expanded row by row beneath their label
pub fn print_variables(qcvars: &BTreeMap<String, QcVar>) -> String {
    let mut ret = String::from("\n  Variable Map:\n  ");
    ret.push_str(&"-".repeat(76));
    ret.push('\n');
    for (label, var) in qcvars {
        let quoted = format!("\"{label}\"");
        match var {
            QcVar::Scalar(v) => {
                ret.push_str(&format!(
                    "  {quoted:<50} => {v:>20.12} [{}]\n",
                    var.units()
                ));
            }
            QcVar::Array(a) => {
                ret.push_str(&format!(
                    "  {quoted:<50} => [{}]\n",
                    var.units()
                ));
                ret.push_str(&dump_mat(a));
            }
        }
    }
    ret.push('\n');
    ret
}
