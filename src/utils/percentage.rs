use std::{fmt::Display, ops::Deref};

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%", self.0)
    }
}

impl Percentage {
    pub fn is_complete(&self) -> bool {
        self.0 >= 100.
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of `whole` covered by `value`. A zero target counts as met as soon as anything was
/// tracked.
pub fn duration_percentage(value: Duration, whole: Duration) -> Percentage {
    let value = value.num_seconds().max(0);
    let whole = whole.num_seconds().max(0);
    if whole == 0 {
        return Percentage(if value > 0 { 100. } else { 0. });
    }
    Percentage(value as f64 / whole as f64 * 100.)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::duration_percentage;

    #[test]
    fn zero_target_does_not_divide() {
        assert_eq!(*duration_percentage(Duration::zero(), Duration::zero()), 0.);
        assert!(duration_percentage(Duration::seconds(1), Duration::zero()).is_complete());
    }

    #[test]
    fn half_way() {
        let p = duration_percentage(Duration::minutes(30), Duration::hours(1));
        assert_eq!(p.to_string(), "50%");
        assert!(!p.is_complete());
    }
}
