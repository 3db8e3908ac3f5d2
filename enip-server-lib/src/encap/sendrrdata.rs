//! SendRRData payload (§3): the interface handle and timeout wrapping a CPF
//! carrying one unconnected CIP message.

use crate::encap::cpf::{self, Cpf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRrData {
    pub interface_handle: u32,
    pub timeout: u16,
    pub cpf: Cpf,
}

pub fn decode(bytes: &[u8]) -> Result<SendRrData, ()> {
    if bytes.len() < 6 {
        return Err(());
    }
    let interface_handle = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let timeout = u16::from_le_bytes([bytes[4], bytes[5]]);
    let cpf = cpf::decode(&bytes[6..])?;
    Ok(SendRrData { interface_handle, timeout, cpf })
}

pub fn encode(payload: &SendRrData) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&payload.interface_handle.to_le_bytes());
    out.extend_from_slice(&payload.timeout.to_le_bytes());
    out.extend_from_slice(&cpf::encode(&payload.cpf));
    out
}

/// Build a reply SendRRData payload wrapping a CIP reply's bytes, mirroring
/// the request's interface handle/timeout conventions (always 0 on replies).
pub fn wrap_reply(cip_reply_bytes: Vec<u8>) -> SendRrData {
    SendRrData { interface_handle: 0, timeout: 0, cpf: Cpf::unconnected_data(cip_reply_bytes) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let payload = SendRrData {
            interface_handle: 0,
            timeout: 0,
            cpf: Cpf::unconnected_data(vec![0x4C, 0x02, 0x91, 0x05]),
        };
        let bytes = encode(&payload);
        assert_eq!(decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn too_short_is_rejected() {
        assert!(decode(&[0u8; 4]).is_err());
    }
}
