use std::{fmt, str::FromStr};

/// How much slower the simulated device executes main-thread work
/// compared to the machine that captured the trace.
///
/// # Example
///
/// ```
/// use lantern_core::measure::CpuSlowdown;
///
/// let slowdown = CpuSlowdown::new(4.0).unwrap();
/// assert_eq!(slowdown.to_string(), "4x");
///
/// let parsed: CpuSlowdown = "4x".parse().unwrap();
/// assert_eq!(parsed, slowdown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CpuSlowdown(f64);

impl CpuSlowdown {
    /// No slowdown: tasks cost what was observed.
    pub const NONE: Self = Self(1.0);

    /// Create a validated multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`CpuSlowdownError`] if `multiplier` is NaN, infinite,
    /// zero or negative.
    pub fn new(multiplier: f64) -> Result<Self, CpuSlowdownError> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(CpuSlowdownError(multiplier));
        }
        Ok(Self(multiplier))
    }

    /// Unchecked constructor for constants, `multiplier` must be positive.
    pub(crate) const fn const_new(multiplier: f64) -> Self {
        Self(multiplier)
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Scale an observed duration (in milliseconds).
    #[inline]
    pub fn apply(self, observed_ms: f64) -> f64 {
        observed_ms * self.0
    }
}

impl Default for CpuSlowdown {
    fn default() -> Self {
        crate::defaults::DEFAULT_CPU_SLOWDOWN
    }
}

impl fmt::Display for CpuSlowdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{}x", self.0 as u64)
        } else {
            write!(f, "{:.2}x", self.0)
        }
    }
}

impl FromStr for CpuSlowdown {
    type Err = CpuSlowdownParseError;

    /// Parses `"4"`, `"4x"` or `"2.5x"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let num = s.strip_suffix('x').unwrap_or(s);
        let multiplier: f64 = num
            .trim()
            .parse()
            .map_err(|_| CpuSlowdownParseError::InvalidNumber)?;
        Ok(Self::new(multiplier)?)
    }
}

impl TryFrom<f64> for CpuSlowdown {
    type Error = CpuSlowdownError;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CpuSlowdown> for f64 {
    fn from(value: CpuSlowdown) -> Self {
        value.0
    }
}

/// Error returned when constructing a [`CpuSlowdown`] that is not a
/// strictly positive, finite number.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("cpu slowdown multiplier must be a positive finite number, got {0}")]
pub struct CpuSlowdownError(f64);

/// Error returned when parsing a [`CpuSlowdown`] from a string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CpuSlowdownParseError {
    /// The numeric part could not be parsed as a float.
    #[error("invalid cpu slowdown multiplier")]
    InvalidNumber,
    #[error("{0}")]
    OutOfRange(#[from] CpuSlowdownError),
}
