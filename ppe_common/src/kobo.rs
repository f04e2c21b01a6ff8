use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const NAIRA_CURRENCY_CODE: &str = "NGN";
pub const NAIRA_CURRENCY_CODE_LOWER: &str = "ngn";

//--------------------------------------        Kobo          ---------------------------------------------------------
/// An amount of money in integer minor units (kobo). All gateway traffic and every ledger row uses this
/// representation; fractional naira never enter the system.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Kobo(i64);

impl Add for Kobo {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Kobo {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Kobo {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Kobo {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Kobo {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Kobo {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Kobo {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in kobo: {0}")]
pub struct KoboConversionError(String);

impl From<i64> for Kobo {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Kobo {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Kobo {}

impl TryFrom<u64> for Kobo {
    type Error = KoboConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(KoboConversionError(format!("Value {} is too large to convert to Kobo", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Kobo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let naira = (self.0 / 100).abs();
        let kobo = (self.0 % 100).abs();
        write!(f, "{sign}₦{naira}.{kobo:02}")
    }
}

impl Kobo {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_naira(naira: i64) -> Self {
        Self(naira * 100)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
