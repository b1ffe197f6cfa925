pub mod errors;

pub use errors::{GeometryResult, RcwaError, RcwaErrorCategory, RcwaResult, SolveResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Side of the stack a diffraction order leaves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Reflected,
    Transmitted,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Reflected, Side::Transmitted];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reflected => "R",
            Self::Transmitted => "T",
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Coupling regime selected by the incidence azimuth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffractionRegime {
    Planar,
    Conical,
}

#[cfg(test)]
mod tests {
    use super::Side;

    #[test]
    fn side_labels_follow_reflected_transmitted_shorthand() {
        assert_eq!(Side::Reflected.to_string(), "R");
        assert_eq!(Side::Transmitted.to_string(), "T");
        assert_eq!(Side::ALL.len(), 2);
    }
}
