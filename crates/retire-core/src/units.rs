//! Compile-time unit safety for plant quantities.
//!
//! Prevents mixing incompatible quantities like nameplate megawatts and
//! emission rates, or fractional shares and raw percentages.
//!
//! All types use `#[repr(transparent)]` ensuring they have the same memory
//! layout as `f64`; the compiler optimizes away the wrapper.
//!
//! # Usage
//!
//! ```
//! use retire_core::units::{Fraction, Megawatts};
//!
//! let capacity = Megawatts(500.0) + Megawatts(250.0);
//! assert_eq!(capacity.value(), 750.0);
//!
//! // This would NOT compile - different units
//! // let wrong = capacity + Fraction(0.5);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Macro to implement common arithmetic operations for unit types
macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Extract the raw f64 value
            #[inline]
            pub fn value(&self) -> f64 {
                self.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", self.0, $unit_name)
            }
        }
    };
}

/// Active power / nameplate capacity in megawatts.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Megawatts(pub f64);
impl_unit_ops!(Megawatts, "MW");

/// Emission rate in tons of CO2 per megawatt-hour.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TonsPerMwh(pub f64);
impl_unit_ops!(TonsPerMwh, "t/MWh");

/// Dimensionless share in [0, 1] (capacity factors, retirement shares,
/// opposition shares). Raw source percentages are converted to `Fraction`
/// at ingestion and never travel as percentages.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Fraction(pub f64);
impl_unit_ops!(Fraction, "p.u.");

impl Fraction {
    /// Build a fraction from a source percentage (divides by 100).
    #[inline]
    pub fn from_percent(percent: f64) -> Self {
        Fraction(percent / 100.0)
    }

    /// Clamp into the [0, 1] domain.
    #[inline]
    pub fn clamped(self) -> Self {
        Fraction(self.0.clamp(0.0, 1.0))
    }
}
