use std::fmt;

/// Whole-credit amount, stored as an unsigned integer.
///
/// Balances and prices never go negative; every debit goes through a
/// checked subtraction so an underflow is a rejected operation, not a wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Credits(u64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    pub const fn new(value: u64) -> Self {
        Credits(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Subtraction that fails instead of underflowing.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Credits)
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Credits(self.0.saturating_sub(rhs.0))
    }

    /// Price of `quantity` units at this per-unit price.
    pub fn times(self, quantity: u32) -> Self {
        Credits(self.0.saturating_mul(u64::from(quantity)))
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Credits(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Credits {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl From<u64> for Credits {
    fn from(value: u64) -> Self {
        Credits(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sub_within_balance() {
        let a = Credits::new(100);
        assert_eq!(a.checked_sub(Credits::new(30)), Some(Credits::new(70)));
    }

    #[test]
    fn checked_sub_underflow_is_none() {
        let a = Credits::new(10);
        assert_eq!(a.checked_sub(Credits::new(11)), None);
    }

    #[test]
    fn checked_sub_exact_balance() {
        let a = Credits::new(10);
        assert_eq!(a.checked_sub(Credits::new(10)), Some(Credits::ZERO));
    }

    #[test]
    fn saturating_sub_clamps_to_zero() {
        assert_eq!(
            Credits::new(5).saturating_sub(Credits::new(9)),
            Credits::ZERO
        );
    }

    #[test]
    fn times_multiplies_by_quantity() {
        assert_eq!(Credits::new(10).times(3), Credits::new(30));
        assert_eq!(Credits::new(10).times(0), Credits::ZERO);
    }

    #[test]
    fn display_is_plain_integer() {
        assert_eq!(Credits::new(1234).to_string(), "1234");
        assert_eq!(Credits::ZERO.to_string(), "0");
    }

    #[test]
    fn ordering() {
        assert!(Credits::new(10) < Credits::new(20));
        assert!(Credits::new(20) > Credits::ZERO);
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Credits::default(), Credits::ZERO);
    }
}
