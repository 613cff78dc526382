//! Closed-form column derivations

use serde::{Deserialize, Serialize};

/// Formula computing one derived column from previously available columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    /// a * b
    Product(String, String),
    /// a / b
    Quotient(String, String),
    /// a / (b * c)
    QuotientOfProduct {
        numerator: String,
        left: String,
        right: String,
    },
    /// a ^ n
    Power(String, i32),
    /// factor * a
    Scale(String, f64),
    /// (1 / a) ^ 2
    InverseSquare(String),
    /// scale * exp(a * b)
    ExpDecay {
        scale: String,
        left: String,
        right: String,
    },
}

impl Formula {
    /// Columns this formula reads, in argument order
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Formula::Product(a, b) | Formula::Quotient(a, b) => vec![a.as_str(), b.as_str()],
            Formula::QuotientOfProduct { numerator, left, right } => {
                vec![numerator.as_str(), left.as_str(), right.as_str()]
            }
            Formula::Power(a, _) | Formula::Scale(a, _) | Formula::InverseSquare(a) => {
                vec![a.as_str()]
            }
            Formula::ExpDecay { scale, left, right } => {
                vec![scale.as_str(), left.as_str(), right.as_str()]
            }
        }
    }

    /// Evaluate for one row; `args` follows the order of [`Formula::inputs`].
    /// The result may be non-finite, the caller sanitizes it.
    pub fn eval(&self, args: &[f64]) -> f64 {
        match self {
            Formula::Product(..) => args[0] * args[1],
            Formula::Quotient(..) => args[0] / args[1],
            Formula::QuotientOfProduct { .. } => args[0] / (args[1] * args[2]),
            Formula::Power(_, n) => args[0].powi(*n),
            Formula::Scale(_, factor) => factor * args[0],
            Formula::InverseSquare(_) => (1.0 / args[0]).powi(2),
            Formula::ExpDecay { .. } => args[0] * (args[1] * args[2]).exp(),
        }
    }

    /// Human-readable expression for reports
    pub fn describe(&self) -> String {
        match self {
            Formula::Product(a, b) => format!("{} * {}", a, b),
            Formula::Quotient(a, b) => format!("{} / {}", a, b),
            Formula::QuotientOfProduct { numerator, left, right } => {
                format!("{} / ({} * {})", numerator, left, right)
            }
            Formula::Power(a, n) => format!("{} ^ {}", a, n),
            Formula::Scale(a, factor) => format!("{} * {}", factor, a),
            Formula::InverseSquare(a) => format!("(1 / {}) ^ 2", a),
            Formula::ExpDecay { scale, left, right } => {
                format!("{} * exp({} * {})", scale, left, right)
            }
        }
    }
}

/// A named derived column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub name: String,
    pub formula: Formula,
}

impl Derivation {
    pub fn new(name: impl Into<String>, formula: Formula) -> Self {
        Self {
            name: name.into(),
            formula,
        }
    }
}

fn s(name: &str) -> String {
    name.to_string()
}

/// `MW_ASU = MW_chain * No_mol_ASU`
pub fn mw_asu() -> Derivation {
    Derivation::new("MW_ASU", Formula::Product(s("MW_chain"), s("No_mol_ASU")))
}

/// `MW_ASU/sites_ASU`
pub fn mw_asu_per_site() -> Derivation {
    Derivation::new("MW_ASU/sites_ASU", Formula::Quotient(s("MW_ASU"), s("sites_ASU")))
}

/// `IoverSigma/MW_ASU`
pub fn i_over_sigma_per_mw_asu() -> Derivation {
    Derivation::new("IoverSigma/MW_ASU", Formula::Quotient(s("IoverSigma"), s("MW_ASU")))
}

/// `MW_chain/No_atom_chain`
pub fn mw_per_atom() -> Derivation {
    Derivation::new(
        "MW_chain/No_atom_chain",
        Formula::Quotient(s("MW_chain"), s("No_atom_chain")),
    )
}

/// `MW_ASU/sites_ASU/solvent_content`
pub fn mw_per_site_per_solvent() -> Derivation {
    Derivation::new(
        "MW_ASU/sites_ASU/solvent_content",
        Formula::Quotient(s("MW_ASU/sites_ASU"), s("solvent_content")),
    )
}

/// `wavelength**3`
pub fn wavelength_cubed() -> Derivation {
    Derivation::new("wavelength**3", Formula::Power(s("wavelength"), 3))
}

/// `wavelength**3/Vcell`
pub fn wavelength_cubed_per_volume() -> Derivation {
    Derivation::new(
        "wavelength**3/Vcell",
        Formula::Quotient(s("wavelength**3"), s("Vcell")),
    )
}

/// `Vcell/Vm<Ma>`: cell volume over Matthews volume times mean atomic mass
pub fn volume_per_matthews_mass() -> Derivation {
    Derivation::new(
        "Vcell/Vm<Ma>",
        Formula::QuotientOfProduct {
            numerator: s("Vcell"),
            left: s("Matth_coeff"),
            right: s("MW_chain/No_atom_chain"),
        },
    )
}

/// `wilson = -2 * wilsonbfactor`
pub fn wilson() -> Derivation {
    Derivation::new("wilson", Formula::Scale(s("wilsonbfactor"), -2.0))
}

/// `bragg = (1 / highreslimit)^2`
pub fn bragg() -> Derivation {
    Derivation::new("bragg", Formula::InverseSquare(s("highreslimit")))
}

/// `volume_wilsonB_highres = Vcell/Vm<Ma> * exp(wilson * bragg)`
pub fn volume_wilson_b_highres() -> Derivation {
    Derivation::new(
        "volume_wilsonB_highres",
        Formula::ExpDecay {
            scale: s("Vcell/Vm<Ma>"),
            left: s("wilson"),
            right: s("bragg"),
        },
    )
}
