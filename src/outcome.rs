//! Per-value result type.
//!
//! Numeric values that feed a response are carried as `Outcome`s so a degenerate value (a
//! pole, a domain error, a clamped grid cell) is distinguishable from a computed one right up
//! to the wire, where it is folded to the documented default and optionally listed in the
//! diagnostics.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    /// the value was computed normally
    Computed { value: T },
    /// a substitute value is reported in place of the real one
    Degenerate { value: T, reason: String },
    /// nothing to report; the element is dropped or the section omitted
    Failed { reason: String },
}

impl<T> Outcome<T> {
    pub fn computed(value: T) -> Self {
        Outcome::Computed { value }
    }

    pub fn degenerate(value: T, reason: impl Into<String>) -> Self {
        Outcome::Degenerate {
            value,
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Outcome::Computed { .. })
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Outcome::Degenerate { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    /// The reported value, computed or substituted.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Computed { value } | Outcome::Degenerate { value, .. } => Some(value),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Computed { .. } => None,
            Outcome::Degenerate { reason, .. } | Outcome::Failed { reason } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Computed { value } => Outcome::Computed { value: f(value) },
            Outcome::Degenerate { value, reason } => Outcome::Degenerate {
                value: f(value),
                reason,
            },
            Outcome::Failed { reason } => Outcome::Failed { reason },
        }
    }
}

impl<T: Clone> Outcome<T> {
    pub fn value_or(&self, default: T) -> T {
        self.value().cloned().unwrap_or(default)
    }
}

impl Outcome<f64> {
    /// `Computed` for finite values, otherwise `Degenerate` carrying `substitute`.
    pub fn from_scalar(value: f64, substitute: f64) -> Self {
        if value.is_finite() {
            Outcome::Computed { value }
        } else {
            Outcome::degenerate(substitute, format!("non-finite value {}", value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scalar() {
        assert_eq!(Outcome::from_scalar(2.5, 0.0), Outcome::Computed { value: 2.5 });
        let nan = Outcome::from_scalar(f64::NAN, 0.0);
        assert!(nan.is_degenerate());
        assert_eq!(nan.value_or(1.0), 0.0);
        assert_eq!(nan.reason(), Some("non-finite value NaN"));
    }

    #[test]
    fn test_failed_has_no_value() {
        let failed: Outcome<f64> = Outcome::failed("did not converge");
        assert!(failed.is_failed());
        assert_eq!(failed.value(), None);
        assert_eq!(failed.value_or(-1.0), -1.0);
    }

    #[test]
    fn test_map_keeps_reason() {
        let outcome = Outcome::degenerate(2, "clamped").map(|v| v * 10);
        assert_eq!(outcome, Outcome::degenerate(20, "clamped"));
    }

    #[test]
    fn test_serialization_is_tagged() {
        let json = serde_json::to_value(Outcome::degenerate(0.0, "pole")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "degenerate", "value": 0.0, "reason": "pole"})
        );
    }
}
