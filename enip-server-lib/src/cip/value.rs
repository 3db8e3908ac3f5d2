//! Typed value codec (§4.D): the closed `cip_type -> width` map and
//! little-endian encode/decode of SINT/INT/DINT scalars and arrays.

/// The closed set of data types this simulator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipType {
    Sint,
    Int,
    Dint,
}

impl CipType {
    /// CIP elementary type code, as it appears on the wire.
    pub const fn code(self) -> u16 {
        match self {
            CipType::Sint => 0xC2,
            CipType::Int => 0xC3,
            CipType::Dint => 0xC4,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0xC2 => Some(CipType::Sint),
            0xC3 => Some(CipType::Int),
            0xC4 => Some(CipType::Dint),
            _ => None,
        }
    }

    /// Width in bytes of a single element of this type.
    pub const fn width(self) -> usize {
        match self {
            CipType::Sint => 1,
            CipType::Int => 2,
            CipType::Dint => 4,
        }
    }
}

impl std::str::FromStr for CipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SINT" => Ok(CipType::Sint),
            "INT" => Ok(CipType::Int),
            "DINT" => Ok(CipType::Dint),
            other => Err(format!("unknown tag type {other:?} (expected SINT, INT, or DINT)")),
        }
    }
}

/// A single scalar value of one of the closed set of supported types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Sint(i8),
    Int(i16),
    Dint(i32),
}

impl Primitive {
    pub fn cip_type(self) -> CipType {
        match self {
            Primitive::Sint(_) => CipType::Sint,
            Primitive::Int(_) => CipType::Int,
            Primitive::Dint(_) => CipType::Dint,
        }
    }

    pub fn zero(t: CipType) -> Self {
        match t {
            CipType::Sint => Primitive::Sint(0),
            CipType::Int => Primitive::Int(0),
            CipType::Dint => Primitive::Dint(0),
        }
    }

    pub fn write_le(self, out: &mut Vec<u8>) {
        match self {
            Primitive::Sint(v) => out.extend_from_slice(&v.to_le_bytes()),
            Primitive::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            Primitive::Dint(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// Decode one element of type `t` from the first `t.width()` bytes of `bytes`.
    /// Returns `None` if `bytes` is shorter than the element width.
    pub fn read_le(t: CipType, bytes: &[u8]) -> Option<Self> {
        if bytes.len() < t.width() {
            return None;
        }
        Some(match t {
            CipType::Sint => Primitive::Sint(bytes[0] as i8),
            CipType::Int => Primitive::Int(i16::from_le_bytes([bytes[0], bytes[1]])),
            CipType::Dint => {
                Primitive::Dint(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
        })
    }
}

/// Encode a run of same-typed elements, little-endian, back to back.
pub fn encode_elements(values: &[Primitive]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * values.first().map_or(0, |v| v.cip_type().width()));
    for v in values {
        v.write_le(&mut out);
    }
    out
}

/// Decode exactly `count` elements of type `t` from `bytes`.
///
/// Returns `None` if `bytes` does not hold exactly `count * t.width()` bytes;
/// callers distinguish short vs. excess input to choose between
/// `NOT_ENOUGH_DATA` and `TOO_MUCH_DATA` (§4.D).
pub fn decode_elements(t: CipType, bytes: &[u8], count: usize) -> Option<Vec<Primitive>> {
    let width = t.width();
    if bytes.len() != width.checked_mul(count)? {
        return None;
    }
    let mut out = Vec::with_capacity(count);
    for chunk in bytes.chunks_exact(width) {
        out.push(Primitive::read_le(t, chunk)?);
    }
    Some(out)
}
