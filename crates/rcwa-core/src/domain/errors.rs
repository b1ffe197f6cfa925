use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::numerics::{EigenError, LuError};

pub type RcwaResult<T> = Result<T, RcwaError>;
pub type GeometryResult<T> = RcwaResult<T>;
pub type SolveResult<T> = RcwaResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RcwaErrorCategory {
    InvalidGeometry,
    InvalidIllumination,
    DegenerateSlab,
    EmptyStack,
    InvalidHalfSpace,
    EigensolveDivergence,
    IllConditionedStack,
}

impl RcwaErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidGeometry => "InvalidGeometry",
            Self::InvalidIllumination => "InvalidIllumination",
            Self::DegenerateSlab => "DegenerateSlab",
            Self::EmptyStack => "EmptyStack",
            Self::InvalidHalfSpace => "InvalidHalfSpace",
            Self::EigensolveDivergence => "EigensolveDivergence",
            Self::IllConditionedStack => "IllConditionedStack",
        }
    }

    /// Construction-time failures; everything else comes out of a solve.
    pub const fn is_structural(self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry
                | Self::InvalidIllumination
                | Self::DegenerateSlab
                | Self::EmptyStack
                | Self::InvalidHalfSpace
        )
    }

    pub const fn is_numerical(self) -> bool {
        !self.is_structural()
    }
}

impl Display for RcwaErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcwaError {
    category: RcwaErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl RcwaError {
    pub fn new(
        category: RcwaErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn invalid_geometry(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RcwaErrorCategory::InvalidGeometry, placeholder, message)
    }

    pub fn invalid_illumination(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RcwaErrorCategory::InvalidIllumination, placeholder, message)
    }

    pub fn degenerate_slab(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RcwaErrorCategory::DegenerateSlab, placeholder, message)
    }

    pub fn empty_stack(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RcwaErrorCategory::EmptyStack, placeholder, message)
    }

    pub fn invalid_half_space(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RcwaErrorCategory::InvalidHalfSpace, placeholder, message)
    }

    pub fn eigensolve_divergence(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RcwaErrorCategory::EigensolveDivergence, placeholder, message)
    }

    pub fn ill_conditioned(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(RcwaErrorCategory::IllConditionedStack, placeholder, message)
    }

    pub const fn category(&self) -> RcwaErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub(crate) fn from_lu(placeholder: &'static str, context: &str, source: LuError) -> Self {
        Self::ill_conditioned(placeholder, format!("{context}: {source}"))
    }

    pub(crate) fn from_eigen(placeholder: &'static str, context: &str, source: EigenError) -> Self {
        Self::eigensolve_divergence(placeholder, format!("{context}: {source}"))
    }
}

impl Display for RcwaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for RcwaError {}

#[cfg(test)]
mod tests {
    use super::{RcwaError, RcwaErrorCategory};
    use crate::numerics::LuError;

    #[test]
    fn categories_split_into_structural_and_numerical() {
        let structural = [
            RcwaErrorCategory::InvalidGeometry,
            RcwaErrorCategory::InvalidIllumination,
            RcwaErrorCategory::DegenerateSlab,
            RcwaErrorCategory::EmptyStack,
            RcwaErrorCategory::InvalidHalfSpace,
        ];
        let numerical = [
            RcwaErrorCategory::EigensolveDivergence,
            RcwaErrorCategory::IllConditionedStack,
        ];

        for category in structural {
            assert!(category.is_structural(), "{category} should be structural");
        }
        for category in numerical {
            assert!(category.is_numerical(), "{category} should be numerical");
        }
    }

    #[test]
    fn error_renders_diagnostic_line() {
        let error = RcwaError::invalid_geometry(
            "GEOMETRY.FRAGMENT_WIDTH",
            "fragment width must be positive, got -1",
        );

        assert_eq!(error.category(), RcwaErrorCategory::InvalidGeometry);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [GEOMETRY.FRAGMENT_WIDTH] fragment width must be positive, got -1"
        );
        assert_eq!(
            error.to_string(),
            "InvalidGeometry [GEOMETRY.FRAGMENT_WIDTH] fragment width must be positive, got -1"
        );
    }

    #[test]
    fn lu_failures_map_to_ill_conditioned_stack() {
        let error = RcwaError::from_lu(
            "SOLVE.INTERFACE",
            "interface coupling",
            LuError::SingularMatrix { pivot_index: 3 },
        );
        assert_eq!(error.category(), RcwaErrorCategory::IllConditionedStack);
        assert!(error.message().contains("pivot index 3"));
    }
}
