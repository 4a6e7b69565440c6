//! Position status for the single traded instrument.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionFamily {
    Long,
    Short,
    Flat,
}

impl PositionFamily {
    /// Family implied by a signed position size.
    pub fn of(position: i64) -> Self {
        match position.signum() {
            1 => PositionFamily::Long,
            -1 => PositionFamily::Short,
            _ => PositionFamily::Flat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PositionStatus {
    #[default]
    Empty,
    LongFilled,
    LongStopLossFilled,
    LongTakeProfitFilled,
    ShortFilled,
    ShortStopLossFilled,
    ShortTakeProfitFilled,
}

impl PositionStatus {
    pub fn family(self) -> PositionFamily {
        match self {
            PositionStatus::Empty => PositionFamily::Flat,
            PositionStatus::LongFilled
            | PositionStatus::LongStopLossFilled
            | PositionStatus::LongTakeProfitFilled => PositionFamily::Long,
            PositionStatus::ShortFilled
            | PositionStatus::ShortStopLossFilled
            | PositionStatus::ShortTakeProfitFilled => PositionFamily::Short,
        }
    }

    pub fn is_open(self) -> bool {
        self != PositionStatus::Empty
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PositionStatus::Empty => "EMPTY",
            PositionStatus::LongFilled => "LONG_FILLED",
            PositionStatus::LongStopLossFilled => "LONG_STOP_LOSS_FILLED",
            PositionStatus::LongTakeProfitFilled => "LONG_TAKE_PROFIT_FILLED",
            PositionStatus::ShortFilled => "SHORT_FILLED",
            PositionStatus::ShortStopLossFilled => "SHORT_STOP_LOSS_FILLED",
            PositionStatus::ShortTakeProfitFilled => "SHORT_TAKE_PROFIT_FILLED",
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_of_each_status() {
        assert_eq!(PositionStatus::Empty.family(), PositionFamily::Flat);
        assert_eq!(PositionStatus::LongTakeProfitFilled.family(), PositionFamily::Long);
        assert_eq!(PositionStatus::ShortStopLossFilled.family(), PositionFamily::Short);
        assert!(!PositionStatus::default().is_open());
        assert!(PositionStatus::ShortFilled.is_open());
    }

    #[test]
    fn family_of_signed_size() {
        assert_eq!(PositionFamily::of(100), PositionFamily::Long);
        assert_eq!(PositionFamily::of(-3), PositionFamily::Short);
        assert_eq!(PositionFamily::of(0), PositionFamily::Flat);
    }

    #[test]
    fn display_uses_upper_snake_case() {
        assert_eq!(PositionStatus::LongStopLossFilled.to_string(), "LONG_STOP_LOSS_FILLED");
    }
}
