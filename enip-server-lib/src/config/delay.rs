//! Artificial response delay spec (§4.G, §4.I): either a fixed number of
//! seconds, or a `"lo-hi"` range the control plane samples from once a second.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelaySpec {
    Fixed(f64),
    Range(f64, f64),
}

impl FromStr for DelaySpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((lo, hi)) = s.split_once('-') {
            let lo: f64 = lo.parse().map_err(|_| format!("invalid delay range {s:?}"))?;
            let hi: f64 = hi.parse().map_err(|_| format!("invalid delay range {s:?}"))?;
            if lo < 0.0 || hi < lo {
                return Err(format!("delay range {s:?} must satisfy 0 <= lo <= hi"));
            }
            Ok(DelaySpec::Range(lo, hi))
        } else {
            let value: f64 = s.parse().map_err(|_| format!("invalid delay value {s:?}"))?;
            if value < 0.0 {
                return Err(format!("delay value {s:?} must be non-negative"));
            }
            Ok(DelaySpec::Fixed(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_value_parses() {
        assert_eq!("0.5".parse::<DelaySpec>().unwrap(), DelaySpec::Fixed(0.5));
    }

    #[test]
    fn range_parses() {
        assert_eq!("0.1-0.4".parse::<DelaySpec>().unwrap(), DelaySpec::Range(0.1, 0.4));
    }

    #[test]
    fn negative_fixed_is_rejected() {
        assert!("-1".parse::<DelaySpec>().is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!("0.5-0.1".parse::<DelaySpec>().is_err());
    }
}
