//! Tag-spec grammar (§6 CLI surface, §4.E): `NAME=TYPE[SIZE]`.

use std::str::FromStr;

use crate::cip::{CipType, Primitive};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub name: String,
    pub cip_type: CipType,
    pub size: usize,
}

impl TagSpec {
    pub fn default_value(&self) -> Primitive {
        Primitive::zero(self.cip_type)
    }
}

impl FromStr for TagSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = match s.split_once('=') {
            Some((name, rest)) => (name, rest),
            None => (s, ""),
        };
        if name.is_empty() {
            return Err(format!("tag spec {s:?} has an empty name"));
        }

        let (type_part, size) = match rest.split_once('[') {
            Some((type_part, size_part)) => {
                let size_part = size_part
                    .strip_suffix(']')
                    .ok_or_else(|| format!("tag spec {s:?} has an unterminated '['"))?;
                let size: usize = size_part
                    .parse()
                    .map_err(|_| format!("tag spec {s:?} has a non-numeric size"))?;
                (type_part, size)
            }
            None => (rest, 1),
        };

        let cip_type = if type_part.is_empty() {
            CipType::Int
        } else {
            type_part.parse()?
        };

        if size == 0 {
            return Err(format!("tag spec {s:?} must have at least one element"));
        }

        Ok(TagSpec { name: name.to_string(), cip_type, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_default_type_is_int() {
        let spec: TagSpec = "SCADA".parse().unwrap();
        assert_eq!(spec, TagSpec { name: "SCADA".to_string(), cip_type: CipType::Int, size: 1 });
    }

    #[test]
    fn explicit_type_and_size() {
        let spec: TagSpec = "ARRAY=DINT[4]".parse().unwrap();
        assert_eq!(spec, TagSpec { name: "ARRAY".to_string(), cip_type: CipType::Dint, size: 4 });
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!("BAD=INT[0]".parse::<TagSpec>().is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!("BAD=REAL".parse::<TagSpec>().is_err());
    }

    #[test]
    fn bare_name_defaults_to_scalar_int() {
        let spec: TagSpec = "BAD".parse().unwrap();
        assert_eq!(spec, TagSpec { name: "BAD".to_string(), cip_type: CipType::Int, size: 1 });
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!("=INT[2]".parse::<TagSpec>().is_err());
    }
}
