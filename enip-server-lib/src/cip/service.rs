//! Service processor (§4.F): executes Read/Write Tag (and fragmented and
//! multiple-service variants) against the object registry, producing a
//! `CipReply` for every request — CIP errors are data, never `Result::Err`.

use crate::cip::epath::element_index;
use crate::cip::message::{encode_reply, parse_request, CipReply, CipRequest};
use crate::cip::registry::TagRegistry;
use crate::cip::status;
use crate::cip::value::{decode_elements, encode_elements, CipType};

const READ_TAG: u8 = 0x4C;
const READ_TAG_FRAGMENTED: u8 = 0x52;
const WRITE_TAG: u8 = 0x4D;
const WRITE_TAG_FRAGMENTED: u8 = 0x53;
const MULTIPLE_SERVICE_PACKET: u8 = 0x0A;

/// Maximum bytes of value data returned in a single (fragmented) reply.
/// Not wire-mandated by this simulator's closed subset; chosen small enough
/// that fragmentation is actually exercised by arrays a few elements long.
const MAX_FRAGMENT_DATA_BYTES: usize = 240;

pub fn dispatch(registry: &TagRegistry, req: &CipRequest) -> CipReply {
    let service_reply = req.service | 0x80;
    match req.service {
        READ_TAG => read_tag(registry, req, false),
        READ_TAG_FRAGMENTED => read_tag(registry, req, true),
        WRITE_TAG => write_tag(registry, req, false),
        WRITE_TAG_FRAGMENTED => write_tag(registry, req, true),
        MULTIPLE_SERVICE_PACKET => multiple_service_packet(registry, req),
        _ => CipReply::error(service_reply, status::SERVICE_NOT_SUPPORTED),
    }
}

fn read_tag(registry: &TagRegistry, req: &CipRequest, fragmented: bool) -> CipReply {
    let service_reply = req.service | 0x80;
    let attr_mutex = match registry.resolve(&req.path) {
        Ok(m) => m,
        Err(e) => return CipReply::error(service_reply, e),
    };
    let mut attr = attr_mutex.lock().expect("attribute lock poisoned");
    if attr.error != 0 {
        return CipReply::error(service_reply, attr.error);
    }

    let start = element_index(&req.path) as usize;
    let (count, byte_offset) = if fragmented {
        let count = req
            .data
            .get(0..2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .unwrap_or(1);
        let offset = req
            .data
            .get(2..6)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize)
            .unwrap_or(0);
        (count, offset)
    } else {
        let count = req
            .data
            .get(0..2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .unwrap_or(1);
        (count, 0)
    };

    if start.checked_add(count).is_none_or(|end| end > attr.buffer.len()) {
        return CipReply::error(service_reply, status::PATH_DESTINATION_UNKNOWN);
    }

    let full_bytes = encode_elements(&attr.buffer[start..start + count]);
    let type_code = attr.cip_type.code();

    let (chunk, reply_status) = if fragmented {
        if byte_offset > full_bytes.len() {
            return CipReply::error(service_reply, status::PATH_DESTINATION_UNKNOWN);
        }
        let remaining = &full_bytes[byte_offset..];
        let take = remaining.len().min(MAX_FRAGMENT_DATA_BYTES);
        let more = take < remaining.len();
        let st = if more { status::PARTIAL_TRANSFER } else { status::SUCCESS };
        (remaining[..take].to_vec(), st)
    } else {
        (full_bytes, status::SUCCESS)
    };

    attr.record_event(format!("read {count} element(s) at index {start}"));

    let mut data = Vec::with_capacity(2 + chunk.len());
    data.extend_from_slice(&type_code.to_le_bytes());
    data.extend_from_slice(&chunk);
    CipReply { service: service_reply, status: reply_status, ext_status: Vec::new(), data }
}

fn write_tag(registry: &TagRegistry, req: &CipRequest, fragmented: bool) -> CipReply {
    let service_reply = req.service | 0x80;
    let attr_mutex = match registry.resolve(&req.path) {
        Ok(m) => m,
        Err(e) => return CipReply::error(service_reply, e),
    };
    let mut attr = attr_mutex.lock().expect("attribute lock poisoned");
    if attr.error != 0 {
        return CipReply::error(service_reply, attr.error);
    }

    if req.data.len() < 2 {
        return CipReply::error(service_reply, status::NOT_ENOUGH_DATA);
    }
    let type_code = u16::from_le_bytes([req.data[0], req.data[1]]);
    let req_type = match CipType::from_code(type_code) {
        Some(t) => t,
        None => return CipReply::error(service_reply, status::PATH_DESTINATION_UNKNOWN),
    };
    if req_type != attr.cip_type {
        return CipReply::error(service_reply, status::PATH_DESTINATION_UNKNOWN);
    }

    let rest = &req.data[2..];
    let (count, byte_offset, body): (usize, usize, &[u8]) = if fragmented {
        if rest.len() < 6 {
            return CipReply::error(service_reply, status::NOT_ENOUGH_DATA);
        }
        let count = u16::from_le_bytes([rest[0], rest[1]]) as usize;
        let offset = u32::from_le_bytes([rest[2], rest[3], rest[4], rest[5]]) as usize;
        (count, offset, &rest[6..])
    } else {
        if rest.len() < 2 {
            return CipReply::error(service_reply, status::NOT_ENOUGH_DATA);
        }
        let count = u16::from_le_bytes([rest[0], rest[1]]) as usize;
        (count, 0, &rest[2..])
    };

    let width = attr.cip_type.width();
    let expected_len = match width.checked_mul(count) {
        Some(n) => n,
        None => return CipReply::error(service_reply, status::NOT_ENOUGH_DATA),
    };
    if body.len() < expected_len {
        return CipReply::error(service_reply, status::NOT_ENOUGH_DATA);
    }
    if body.len() > expected_len {
        return CipReply::error(service_reply, status::TOO_MUCH_DATA);
    }
    if byte_offset % width != 0 {
        return CipReply::error(service_reply, status::NOT_ENOUGH_DATA);
    }

    let start = element_index(&req.path) as usize + byte_offset / width;
    if start.checked_add(count).is_none_or(|end| end > attr.buffer.len()) {
        return CipReply::error(service_reply, status::PATH_DESTINATION_UNKNOWN);
    }

    let values = match decode_elements(attr.cip_type, body, count) {
        Some(v) => v,
        None => return CipReply::error(service_reply, status::NOT_ENOUGH_DATA),
    };

    attr.buffer[start..start + count].copy_from_slice(&values);
    attr.record_event(format!("wrote {count} element(s) at index {start}"));

    CipReply { service: service_reply, status: status::SUCCESS, ext_status: Vec::new(), data: Vec::new() }
}

fn multiple_service_packet(registry: &TagRegistry, req: &CipRequest) -> CipReply {
    let service_reply = req.service | 0x80;
    if req.data.len() < 2 {
        return CipReply::error(service_reply, status::NOT_ENOUGH_DATA);
    }
    let count = u16::from_le_bytes([req.data[0], req.data[1]]) as usize;
    let offsets_end = 2 + count * 2;
    if req.data.len() < offsets_end {
        return CipReply::error(service_reply, status::NOT_ENOUGH_DATA);
    }
    let offsets: Vec<usize> = (0..count)
        .map(|i| u16::from_le_bytes([req.data[2 + 2 * i], req.data[3 + 2 * i]]) as usize)
        .collect();

    let sub_replies: Vec<CipReply> = (0..count)
        .map(|i| {
            let start = offsets[i];
            let end = offsets.get(i + 1).copied().unwrap_or(req.data.len());
            if start > req.data.len() || end > req.data.len() || start > end {
                return CipReply::error(0x80, status::PATH_SEGMENT_ERROR);
            }
            match parse_request(&req.data[start..end]) {
                Ok(sub_req) => dispatch(registry, &sub_req),
                Err(e) => CipReply::error(0x80, e),
            }
        })
        .collect();

    let encoded: Vec<Vec<u8>> = sub_replies.iter().map(encode_reply).collect();
    let mut reply_offsets = Vec::with_capacity(count);
    let mut cursor = offsets_end;
    for enc in &encoded {
        reply_offsets.push(cursor as u16);
        cursor += enc.len();
    }

    let mut data = Vec::with_capacity(cursor);
    data.extend_from_slice(&(count as u16).to_le_bytes());
    for off in &reply_offsets {
        data.extend_from_slice(&off.to_le_bytes());
    }
    for enc in &encoded {
        data.extend_from_slice(enc);
    }

    CipReply { service: service_reply, status: status::SUCCESS, ext_status: Vec::new(), data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cip::epath::EpathSegment;
    use crate::cip::value::Primitive;

    fn registry_with_scada() -> TagRegistry {
        let mut reg = TagRegistry::new();
        reg.create("SCADA", CipType::Int, 1, Primitive::Int(0)).unwrap();
        reg
    }

    fn scada_path() -> Vec<EpathSegment> {
        vec![EpathSegment::Symbolic("SCADA".to_string())]
    }

    #[test]
    fn read_default_scalar() {
        let reg = registry_with_scada();
        let req = CipRequest { service: READ_TAG, path: scada_path(), data: vec![1, 0] };
        let reply = dispatch(&reg, &req);
        assert_eq!(reply.service, 0xCC);
        assert_eq!(reply.status, status::SUCCESS);
        assert_eq!(reply.data, vec![0xC3, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn write_then_read_roundtrip() {
        let reg = registry_with_scada();
        let write_req = CipRequest {
            service: WRITE_TAG,
            path: scada_path(),
            data: vec![0xC3, 0x00, 0x01, 0x00, 0x2A, 0x00],
        };
        let write_reply = dispatch(&reg, &write_req);
        assert_eq!(write_reply.status, status::SUCCESS);

        let read_req = CipRequest { service: READ_TAG, path: scada_path(), data: vec![1, 0] };
        let read_reply = dispatch(&reg, &read_req);
        assert_eq!(read_reply.data, vec![0xC3, 0x00, 0x2A, 0x00]);
    }

    #[test]
    fn unknown_tag_is_status_04() {
        let reg = registry_with_scada();
        let req = CipRequest {
            service: READ_TAG,
            path: vec![EpathSegment::Symbolic("XYZ".to_string())],
            data: vec![],
        };
        assert_eq!(dispatch(&reg, &req).status, status::PATH_SEGMENT_ERROR);
    }

    #[test]
    fn injected_error_short_circuits_without_side_effects() {
        let reg = registry_with_scada();
        reg.inject_error("SCADA", 0x1E).unwrap();
        let req = CipRequest { service: READ_TAG, path: scada_path(), data: vec![] };
        let reply = dispatch(&reg, &req);
        assert_eq!(reply.status, 0x1E);
        assert!(reply.data.is_empty());
        assert_eq!(reg.get("SCADA").unwrap().lock().unwrap().buffer, vec![Primitive::Int(0)]);
    }

    #[test]
    fn unknown_service_is_not_supported() {
        let reg = registry_with_scada();
        let req = CipRequest { service: 0x99, path: scada_path(), data: vec![] };
        let reply = dispatch(&reg, &req);
        assert_eq!(reply.service, 0x99 | 0x80);
        assert_eq!(reply.status, status::SERVICE_NOT_SUPPORTED);
    }

    #[test]
    fn write_short_body_is_not_enough_data() {
        let reg = registry_with_scada();
        let req = CipRequest {
            service: WRITE_TAG,
            path: scada_path(),
            data: vec![0xC3, 0x00, 0x01, 0x00, 0x2A], // missing one byte
        };
        assert_eq!(dispatch(&reg, &req).status, status::NOT_ENOUGH_DATA);
    }

    #[test]
    fn write_excess_body_is_too_much_data() {
        let reg = registry_with_scada();
        let req = CipRequest {
            service: WRITE_TAG,
            path: scada_path(),
            data: vec![0xC3, 0x00, 0x01, 0x00, 0x2A, 0x00, 0x00],
        };
        assert_eq!(dispatch(&reg, &req).status, status::TOO_MUCH_DATA);
    }

    #[test]
    fn fragmented_read_offset_at_end_is_success_with_no_data() {
        let mut reg = TagRegistry::new();
        reg.create("ARRAY", CipType::Dint, 2, Primitive::Dint(7)).unwrap();
        let req = CipRequest {
            service: READ_TAG_FRAGMENTED,
            path: vec![EpathSegment::Symbolic("ARRAY".to_string())],
            data: {
                let mut d = vec![2, 0]; // count
                d.extend_from_slice(&8u32.to_le_bytes()); // offset == 2*4 bytes
                d
            },
        };
        let reply = dispatch(&reg, &req);
        assert_eq!(reply.status, status::SUCCESS);
        assert_eq!(reply.data, vec![0xC4, 0x00]); // type code only, no value bytes
    }

    #[test]
    fn fragmented_read_offset_beyond_end_is_path_destination_unknown() {
        let mut reg = TagRegistry::new();
        reg.create("ARRAY", CipType::Dint, 2, Primitive::Dint(7)).unwrap();
        let req = CipRequest {
            service: READ_TAG_FRAGMENTED,
            path: vec![EpathSegment::Symbolic("ARRAY".to_string())],
            data: {
                let mut d = vec![2, 0];
                d.extend_from_slice(&9u32.to_le_bytes());
                d
            },
        };
        assert_eq!(dispatch(&reg, &req).status, status::PATH_DESTINATION_UNKNOWN);
    }

    #[test]
    fn multiple_service_packet_runs_all_siblings_despite_failure() {
        let reg = registry_with_scada();
        let good = CipRequest { service: READ_TAG, path: scada_path(), data: vec![1, 0] };
        let bad = CipRequest {
            service: READ_TAG,
            path: vec![EpathSegment::Symbolic("NOPE".to_string())],
            data: vec![],
        };
        let good_bytes = crate::cip::message::encode_request(&good);
        let bad_bytes = crate::cip::message::encode_request(&bad);

        let mut data = vec![2, 0]; // count
        let offsets_start = 2 + 2 * 2;
        data.extend_from_slice(&(offsets_start as u16).to_le_bytes());
        data.extend_from_slice(&((offsets_start + good_bytes.len()) as u16).to_le_bytes());
        data.extend_from_slice(&good_bytes);
        data.extend_from_slice(&bad_bytes);

        let req = CipRequest { service: MULTIPLE_SERVICE_PACKET, path: vec![], data };
        let reply = dispatch(&reg, &req);
        assert_eq!(reply.status, status::SUCCESS);

        let sub_count = u16::from_le_bytes([reply.data[0], reply.data[1]]);
        assert_eq!(sub_count, 2);
    }
}
