use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Monotonic map from a clamped similarity in `[0, 1]` to a fraction of `max_score`.
///
/// Every variant maps `0 -> 0` and `1 -> 1`.
pub enum Calibration {
    /// Fraction equals similarity.
    #[default]
    Linear,
    /// Piecewise-linear grade bands fitted against human-graded answers:
    ///
    /// | similarity  | grade     |
    /// |-------------|-----------|
    /// | >= 0.85     | 90 – 100% |
    /// | 0.70 – 0.85 | 70 – 90%  |
    /// | 0.55 – 0.70 | 50 – 70%  |
    /// | 0.40 – 0.55 | 30 – 50%  |
    /// | < 0.40      | 0 – 30%   |
    Banded,
}

impl Calibration {
    /// Returns the grade fraction for a similarity already clamped to `[0, 1]`.
    pub fn fraction(&self, similarity: f64) -> f64 {
        let fraction = match self {
            Calibration::Linear => similarity,
            Calibration::Banded => banded_fraction(similarity),
        };
        fraction.clamp(0.0, 1.0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Calibration::Linear => "linear",
            Calibration::Banded => "banded",
        }
    }
}

fn banded_fraction(s: f64) -> f64 {
    if s >= 0.85 {
        0.90 + (s - 0.85) * 0.67
    } else if s >= 0.70 {
        0.70 + (s - 0.70) * 1.33
    } else if s >= 0.55 {
        0.50 + (s - 0.55) * 1.33
    } else if s >= 0.40 {
        0.30 + (s - 0.40) * 1.33
    } else {
        s * 0.75
    }
}

impl std::str::FromStr for Calibration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "banded" => Ok(Self::Banded),
            _ => Err(format!("Unknown calibration: {}", s)),
        }
    }
}

impl std::fmt::Display for Calibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
