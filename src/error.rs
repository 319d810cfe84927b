use std::error::Error;
use std::fmt;

use crate::config::InversionMethod;

/// Error type shared by the optimization and classification APIs.
///
/// `Configuration`, `Data` and `MissingParameter` are raised before any
/// matrix computation starts; `Numerical` surfaces a failed decomposition
/// together with the hyperparameters that produced it. `RepeatFailed`
/// wraps an inner error with the outer repeat (and fold, when known) so
/// callers can tell which resampling unit went wrong.
#[derive(Debug)]
pub enum PerturboError {
    /// Invalid strategy pairing, malformed grid, or out-of-range setting.
    Configuration(String),
    /// Dataset problems: mismatched row counts, empty classes, non-finite values.
    Data(String),
    /// Neither explicit hyperparameters nor a usable report were supplied.
    MissingParameter(String),
    /// Singular or ill-conditioned kernel matrix under the given strategy.
    Numerical {
        method: InversionMethod,
        sigma: f64,
        regul: f64,
        detail: String,
    },
    /// Failure inside one outer repeat, tagged with its position.
    RepeatFailed {
        repeat: usize,
        fold: Option<usize>,
        source: Box<PerturboError>,
    },
}

impl fmt::Display for PerturboError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PerturboError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            PerturboError::Data(msg) => write!(f, "data error: {}", msg),
            PerturboError::MissingParameter(msg) => {
                write!(f, "missing parameter: {}", msg)
            }
            PerturboError::Numerical {
                method,
                sigma,
                regul,
                detail,
            } => write!(
                f,
                "numerical error ({} inversion, sigma={}, regul={}): {}",
                method, sigma, regul, detail
            ),
            PerturboError::RepeatFailed {
                repeat,
                fold,
                source,
            } => match fold {
                Some(fold) => write!(f, "repeat {} fold {} failed: {}", repeat, fold, source),
                None => write!(f, "repeat {} failed: {}", repeat, source),
            },
        }
    }
}

impl Error for PerturboError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PerturboError::RepeatFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl PerturboError {
    /// Attach repeat/fold context to an error bubbling out of a resampling unit.
    pub(crate) fn in_repeat(self, repeat: usize, fold: Option<usize>) -> PerturboError {
        PerturboError::RepeatFailed {
            repeat,
            fold,
            source: Box::new(self),
        }
    }

    /// Shorthand for a `Numerical` error at a known grid cell.
    pub(crate) fn numerical(
        method: InversionMethod,
        sigma: f64,
        regul: f64,
        detail: impl Into<String>,
    ) -> PerturboError {
        PerturboError::Numerical {
            method,
            sigma,
            regul,
            detail: detail.into(),
        }
    }
}
