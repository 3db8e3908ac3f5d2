//! CIP message request/reply framing (§3): the service byte, the length-
//! prefixed path, and the trailing service-specific data.

use crate::cip::epath::{decode_segments, encode_path_with_length, EpathSegment};
use crate::cip::status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipRequest {
    pub service: u8,
    pub path: Vec<EpathSegment>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipReply {
    pub service: u8,
    pub status: u8,
    pub ext_status: Vec<u16>,
    pub data: Vec<u8>,
}

impl CipReply {
    pub fn error(service_reply: u8, status: u8) -> Self {
        Self { service: service_reply, status, ext_status: Vec::new(), data: Vec::new() }
    }
}

/// Parse an unconnected CIP message request: `service | word_count | path | data`.
/// Any truncation is reported as `PATH_SEGMENT_ERROR`, the closest status in
/// the closed set (§7) for "couldn't even find the addressed object".
pub fn parse_request(bytes: &[u8]) -> Result<CipRequest, u8> {
    let service = *bytes.first().ok_or(status::PATH_SEGMENT_ERROR)?;
    let word_count = *bytes.get(1).ok_or(status::PATH_SEGMENT_ERROR)? as usize;
    let path_start: usize = 2;
    let path_end = path_start.checked_add(word_count * 2).ok_or(status::PATH_SEGMENT_ERROR)?;
    let path_bytes = bytes.get(path_start..path_end).ok_or(status::PATH_SEGMENT_ERROR)?;
    let path = decode_segments(path_bytes)?;
    let data = bytes[path_end..].to_vec();
    Ok(CipRequest { service, path, data })
}

pub fn encode_request(req: &CipRequest) -> Vec<u8> {
    let mut out = vec![req.service];
    out.extend_from_slice(&encode_path_with_length(&req.path));
    out.extend_from_slice(&req.data);
    out
}

pub fn encode_reply(reply: &CipReply) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + reply.ext_status.len() * 2 + reply.data.len());
    out.push(reply.service);
    out.push(0); // reserved
    out.push(reply.status);
    out.push(reply.ext_status.len() as u8);
    for word in &reply.ext_status {
        out.extend_from_slice(&word.to_le_bytes());
    }
    out.extend_from_slice(&reply.data);
    out
}
