use serde::Deserialize;

use crate::{error::Error, BOHR_TO_ANGSTROM};

/// A molecular geometry in the layout of the generic job record: atomic
/// symbols, flat Cartesian coordinates in bohr, and an optional mask marking
/// which atoms are real. Atoms with a `false` mask entry are ghosts.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Molecule {
    pub symbols: Vec<String>,

    /// 3N coordinates in bohr
    pub geometry: Vec<f64>,

    /// one entry per atom. `None` means every atom is real
    #[serde(default)]
    pub real: Option<Vec<bool>>,

    #[serde(default)]
    pub name: Option<String>,
}

impl Molecule {
    pub fn new(symbols: Vec<String>, geometry: Vec<f64>) -> Self {
        Self {
            symbols,
            geometry,
            real: None,
            name: None,
        }
    }

    pub fn with_real(mut self, real: Vec<bool>) -> Self {
        self.real = Some(real);
        self
    }

    pub fn natom(&self) -> usize {
        self.symbols.len()
    }

    /// Return the real-atom mask with the default of all-real filled in,
    /// checking that the geometry, symbols, and mask agree on the atom count
    /// and that at least one atom is real.
    pub fn real_mask(&self) -> Result<Vec<bool>, Error> {
        let nat = self.natom();
        if nat == 0 {
            return Err(Error::Input("molecule has no atoms".to_owned()));
        }
        if self.geometry.len() != 3 * nat {
            return Err(Error::Input(format!(
                "geometry has {} coordinates for {nat} atoms",
                self.geometry.len()
            )));
        }
        let real = match &self.real {
            Some(r) if r.len() != nat => {
                return Err(Error::Input(format!(
                    "real mask has {} entries for {nat} atoms",
                    r.len()
                )))
            }
            Some(r) => r.clone(),
            None => vec![true; nat],
        };
        if !real.iter().any(|&r| r) {
            return Err(Error::Input(
                "molecule has no real atoms".to_owned(),
            ));
        }
        Ok(real)
    }

    /// Render the geometry as XYZ text in Angstrom. Ghost atoms keep their
    /// coordinate line but are written with an empty symbol.
    pub fn to_xyz(&self, real: &[bool]) -> String {
        let mut ret = format!(
            "{}\n{}\n",
            self.natom(),
            self.name.as_deref().unwrap_or_default()
        );
        for (i, (sym, coord)) in
            self.symbols.iter().zip(self.geometry.chunks(3)).enumerate()
        {
            let label = if real[i] { sym.as_str() } else { "" };
            ret.push_str(&format!(
                "{:2} {:17.12} {:17.12} {:17.12}\n",
                label,
                coord[0] * BOHR_TO_ANGSTROM,
                coord[1] * BOHR_TO_ANGSTROM,
                coord[2] * BOHR_TO_ANGSTROM,
            ));
        }
        ret
    }
}

#[cfg(test)]
mod tests {
    use crate::string;

    use super::*;

    fn water() -> Molecule {
        Molecule::new(
            string!["O", "H", "H"],
            vec![
                0.0, 0.0, -0.1294769, //
                0.0, -1.4941267, 1.0274234, //
                0.0, 1.4941267, 1.0274234,
            ],
        )
    }

    #[test]
    fn test_real_mask_default() {
        assert_eq!(water().real_mask().unwrap(), vec![true; 3]);
    }

    #[test]
    fn test_real_mask_errors() {
        let bad = water().with_real(vec![true, false]);
        assert!(matches!(bad.real_mask(), Err(Error::Input(_))));

        let ghosts = water().with_real(vec![false; 3]);
        assert!(matches!(ghosts.real_mask(), Err(Error::Input(_))));

        let mut short = water();
        short.geometry.pop();
        assert!(matches!(short.real_mask(), Err(Error::Input(_))));
    }

    #[test]
    fn test_to_xyz() {
        let mol = Molecule::new(
            string!["He", "He"],
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 2.0],
        );
        let got = mol.to_xyz(&[true, true]);
        let want = "2

He    0.000000000000    0.000000000000    0.000000000000
He    0.000000000000    0.000000000000    1.058354421340
";
        assert_eq!(got, want);
    }

    #[test]
    fn test_to_xyz_ghost() {
        let mut mol = water().with_real(vec![true, false, true]);
        mol.name = Some(String::from("water"));
        let real = mol.real_mask().unwrap();
        let got = mol.to_xyz(&real);
        let lines: Vec<_> = got.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "3");
        assert_eq!(lines[1], "water");
        assert!(lines[2].starts_with("O  "));
        assert!(lines[3].starts_with("   "));
        assert_eq!(lines[3].split_whitespace().count(), 3);
        assert!(lines[4].starts_with("H  "));
    }
}
