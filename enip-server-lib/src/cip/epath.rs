//! CIP path / IOI codec (§4.C): decodes the tagged-union segment list
//! addressing a CIP object, attribute, or tag by symbolic name.

use crate::cip::status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpathSegment {
    Symbolic(String),
    ClassId(u16),
    InstanceId(u16),
    AttributeId(u16),
    Element(u32),
}

/// Decode a path from its raw segment bytes (the word-count prefix has
/// already been consumed and used to size `bytes`).
///
/// Returns `Err(status::PATH_SEGMENT_ERROR)` on any unrecognized segment tag
/// or truncated segment, per §4.C.
pub fn decode_segments(mut bytes: &[u8]) -> Result<Vec<EpathSegment>, u8> {
    let mut segments = Vec::new();
    while !bytes.is_empty() {
        let tag = bytes[0];
        match tag {
            0x91 => {
                let n = *bytes.get(1).ok_or(status::PATH_SEGMENT_ERROR)? as usize;
                let name_start: usize = 2;
                let name_end = name_start.checked_add(n).ok_or(status::PATH_SEGMENT_ERROR)?;
                let name_bytes = bytes.get(name_start..name_end).ok_or(status::PATH_SEGMENT_ERROR)?;
                let name = std::str::from_utf8(name_bytes)
                    .map_err(|_| status::PATH_SEGMENT_ERROR)?
                    .to_string();
                let mut consumed = name_end;
                if n % 2 == 1 {
                    consumed = consumed.checked_add(1).ok_or(status::PATH_SEGMENT_ERROR)?;
                }
                segments.push(EpathSegment::Symbolic(name));
                bytes = bytes.get(consumed..).ok_or(status::PATH_SEGMENT_ERROR)?;
            }
            0x20 => {
                let v = *bytes.get(1).ok_or(status::PATH_SEGMENT_ERROR)?;
                segments.push(EpathSegment::ClassId(v as u16));
                bytes = &bytes[2..];
            }
            0x21 => {
                let v = read_padded_u16(bytes)?;
                segments.push(EpathSegment::ClassId(v));
                bytes = &bytes[4..];
            }
            0x24 => {
                let v = *bytes.get(1).ok_or(status::PATH_SEGMENT_ERROR)?;
                segments.push(EpathSegment::InstanceId(v as u16));
                bytes = &bytes[2..];
            }
            0x25 => {
                let v = read_padded_u16(bytes)?;
                segments.push(EpathSegment::InstanceId(v));
                bytes = &bytes[4..];
            }
            0x30 => {
                let v = *bytes.get(1).ok_or(status::PATH_SEGMENT_ERROR)?;
                segments.push(EpathSegment::AttributeId(v as u16));
                bytes = &bytes[2..];
            }
            0x31 => {
                let v = read_padded_u16(bytes)?;
                segments.push(EpathSegment::AttributeId(v));
                bytes = &bytes[4..];
            }
            0x28 => {
                let v = *bytes.get(1).ok_or(status::PATH_SEGMENT_ERROR)?;
                segments.push(EpathSegment::Element(v as u32));
                bytes = &bytes[2..];
            }
            0x29 => {
                let v = read_padded_u16(bytes)?;
                segments.push(EpathSegment::Element(v as u32));
                bytes = &bytes[4..];
            }
            0x2A => {
                let word = bytes.get(4..8).ok_or(status::PATH_SEGMENT_ERROR)?;
                let v = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                segments.push(EpathSegment::Element(v));
                bytes = &bytes[8..];
            }
            _ => return Err(status::PATH_SEGMENT_ERROR),
        }
    }
    Ok(segments)
}

fn read_padded_u16(bytes: &[u8]) -> Result<u16, u8> {
    let word = bytes.get(2..4).ok_or(status::PATH_SEGMENT_ERROR)?;
    Ok(u16::from_le_bytes([word[0], word[1]]))
}

/// Encode segments back to raw path bytes (without the word-count prefix).
/// Always produces an even-length buffer (§3 invariant).
pub fn encode_segments(segments: &[EpathSegment]) -> Vec<u8> {
    let mut out = Vec::new();
    for seg in segments {
        match seg {
            EpathSegment::Symbolic(name) => {
                out.push(0x91);
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
                if name.len() % 2 == 1 {
                    out.push(0);
                }
            }
            EpathSegment::ClassId(v) if *v <= 0xFF => {
                out.push(0x20);
                out.push(*v as u8);
            }
            EpathSegment::ClassId(v) => {
                out.push(0x21);
                out.push(0);
                out.extend_from_slice(&v.to_le_bytes());
            }
            EpathSegment::InstanceId(v) if *v <= 0xFF => {
                out.push(0x24);
                out.push(*v as u8);
            }
            EpathSegment::InstanceId(v) => {
                out.push(0x25);
                out.push(0);
                out.extend_from_slice(&v.to_le_bytes());
            }
            EpathSegment::AttributeId(v) if *v <= 0xFF => {
                out.push(0x30);
                out.push(*v as u8);
            }
            EpathSegment::AttributeId(v) => {
                out.push(0x31);
                out.push(0);
                out.extend_from_slice(&v.to_le_bytes());
            }
            EpathSegment::Element(v) if *v <= 0xFF => {
                out.push(0x28);
                out.push(*v as u8);
            }
            EpathSegment::Element(v) if *v <= 0xFFFF => {
                out.push(0x29);
                out.push(0);
                out.extend_from_slice(&(*v as u16).to_le_bytes());
            }
            EpathSegment::Element(v) => {
                out.push(0x2A);
                out.push(0);
                out.push(0);
                out.push(0);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out
}

/// Encode a path with its leading word-count byte, as it appears inside a
/// CIP message request.
pub fn encode_path_with_length(segments: &[EpathSegment]) -> Vec<u8> {
    let body = encode_segments(segments);
    debug_assert_eq!(body.len() % 2, 0, "epath must be word-aligned");
    let mut out = Vec::with_capacity(1 + body.len());
    out.push((body.len() / 2) as u8);
    out.extend_from_slice(&body);
    out
}

/// Pull the symbolic tag name out of a decoded path, if the first segment is
/// symbolic. This is the common case for Logix-style tag addressing.
pub fn symbolic_name(segments: &[EpathSegment]) -> Option<&str> {
    segments.iter().find_map(|s| match s {
        EpathSegment::Symbolic(name) => Some(name.as_str()),
        _ => None,
    })
}

/// Pull an explicit element index out of a decoded path, defaulting to 0.
pub fn element_index(segments: &[EpathSegment]) -> u32 {
    segments
        .iter()
        .find_map(|s| match s {
            EpathSegment::Element(i) => Some(*i),
            _ => None,
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_roundtrip_even_length() {
        let segs = vec![EpathSegment::Symbolic("SCADA".to_string())];
        let encoded = encode_segments(&segs);
        // "SCADA" is 5 bytes -> padded to 6, plus tag+len = 8 total, even.
        assert_eq!(encoded.len() % 2, 0);
        assert_eq!(encoded, vec![0x91, 0x05, b'S', b'C', b'A', b'D', b'A', 0x00]);
        let decoded = decode_segments(&encoded).unwrap();
        assert_eq!(decoded, segs);
    }

    #[test]
    fn symbolic_even_length_name_no_pad() {
        let segs = vec![EpathSegment::Symbolic("TAG1".to_string())];
        let encoded = encode_segments(&segs);
        assert_eq!(encoded, vec![0x91, 0x04, b'T', b'A', b'G', b'1']);
    }

    #[test]
    fn unknown_tag_is_path_segment_error() {
        let err = decode_segments(&[0xFF]).unwrap_err();
        assert_eq!(err, status::PATH_SEGMENT_ERROR);
    }

    #[test]
    fn logical_class_instance_attribute_roundtrip() {
        let segs = vec![
            EpathSegment::ClassId(0x6B),
            EpathSegment::InstanceId(1),
            EpathSegment::AttributeId(3),
        ];
        let encoded = encode_segments(&segs);
        assert_eq!(decode_segments(&encoded).unwrap(), segs);
    }

    #[test]
    fn element_segment_widths() {
        for v in [5u32, 300, 70000] {
            let segs = vec![EpathSegment::Element(v)];
            let encoded = encode_segments(&segs);
            assert_eq!(decode_segments(&encoded).unwrap(), segs);
        }
    }

    #[test]
    fn truncated_symbolic_is_path_segment_error() {
        let err = decode_segments(&[0x91, 0x05, b'A', b'B']).unwrap_err();
        assert_eq!(err, status::PATH_SEGMENT_ERROR);
    }
}
