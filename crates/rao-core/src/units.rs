//! Unit newtypes for the quantities the optimiser manipulates.
//!
//! Flows and thresholds travel as megawatts or amperes, PST set-points as
//! degrees (tap tables) or radians (DC equations), and bus voltages as
//! kilovolts. Mixing them by accident is a compile error:
//!
//! ```
//! use rao_core::units::{Amperes, Degrees, Kilovolts, Megawatts};
//!
//! let flow = Megawatts(450.0) - Megawatts(410.0);
//! assert_eq!(flow.value(), 40.0);
//!
//! // let wrong = flow + Amperes(10.0); // does not compile
//! let limit = Amperes(1000.0).to_megawatts(Kilovolts(400.0));
//! assert!(limit.value() > 692.0 && limit.value() < 693.0);
//!
//! let alpha = Degrees(-8.0).to_radians();
//! assert!(alpha.value() < 0.0);
//! ```
//!
//! All types are `#[repr(transparent)]` over `f64`.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

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

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.2} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Active power in megawatts (MW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Current magnitude in amperes (A)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Amperes(pub f64);

impl_unit_ops!(Amperes, "A");

/// Nominal voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

const SQRT_3: f64 = 1.732_050_807_568_877_2;

impl Megawatts {
    /// Current carried by this active power at `voltage`, unit power factor:
    /// `I = P·1000 / (√3·U)`.
    #[inline]
    pub fn to_amperes(self, voltage: Kilovolts) -> Amperes {
        if voltage.0.abs() < 1e-12 {
            Amperes(f64::NAN)
        } else {
            Amperes(self.0 * 1000.0 / (SQRT_3 * voltage.0))
        }
    }
}

impl Amperes {
    /// Active power carried by this current at `voltage`, unit power factor:
    /// `P = I·√3·U / 1000`.
    #[inline]
    pub fn to_megawatts(self, voltage: Kilovolts) -> Megawatts {
        Megawatts(self.0 * SQRT_3 * voltage.0 / 1000.0)
    }
}

/// Angle in radians, as used inside the DC flow equations.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Radians(pub f64);

impl_unit_ops!(Radians, "rad");

/// Angle in degrees, as found in PST tap tables.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "°");

impl Radians {
    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0 * 180.0 / std::f64::consts::PI)
    }

    pub const ZERO: Self = Self(0.0);
}

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0 * std::f64::consts::PI / 180.0)
    }

    pub const ZERO: Self = Self(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megawatts_arithmetic() {
        let p1 = Megawatts(410.0);
        let p2 = Megawatts(450.0);

        assert_eq!((p1 - p2).value(), -40.0);
        assert_eq!((-p1).value(), -410.0);
        assert_eq!((p1 * 2.0).value(), 820.0);
        assert_eq!((0.5 * p1).value(), 205.0);
        assert_eq!(p2.min(p1).value(), 410.0);
    }

    #[test]
    fn test_current_power_conversion() {
        let v = Kilovolts(400.0);
        let p = Amperes(1000.0).to_megawatts(v);
        // 1000 A × √3 × 400 kV / 1000 = 692.82 MW
        assert!((p.value() - 692.820323).abs() < 1e-5);
        assert!((p.to_amperes(v).value() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_voltage_is_not_convertible() {
        assert!(!Megawatts(10.0).to_amperes(Kilovolts(0.0)).is_finite());
    }

    #[test]
    fn test_angle_conversion() {
        let rad = Degrees(180.0).to_radians();
        assert!((rad.value() - std::f64::consts::PI).abs() < 1e-12);
        assert!((rad.to_degrees().value() - 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_sum_iterator() {
        let flows = [Megawatts(10.0), Megawatts(20.0), Megawatts(30.0)];
        let total: Megawatts = flows.iter().sum();
        assert_eq!(total.value(), 60.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Megawatts(100.0)), "100.00 MW");
        assert_eq!(format!("{}", Amperes(5.5)), "5.50 A");
    }
}
