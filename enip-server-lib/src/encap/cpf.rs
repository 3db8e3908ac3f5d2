//! Common Packet Format (§3, GLOSSARY): the type-length-value item list
//! carried inside a SendRRData payload.

pub const TYPE_NULL_ADDRESS: u16 = 0x0000;
pub const TYPE_UNCONNECTED_DATA: u16 = 0x00B2;
pub const TYPE_LIST_SERVICES_RESPONSE: u16 = 0x0100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpfItem {
    pub type_id: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cpf {
    pub items: Vec<CpfItem>,
}

impl Cpf {
    pub fn unconnected_data(data: Vec<u8>) -> Self {
        Self {
            items: vec![
                CpfItem { type_id: TYPE_NULL_ADDRESS, data: Vec::new() },
                CpfItem { type_id: TYPE_UNCONNECTED_DATA, data },
            ],
        }
    }

    /// The payload of the unconnected-data item, if one is present — this is
    /// the embedded CIP message request/reply for SendRRData (§3).
    pub fn unconnected_payload(&self) -> Option<&[u8]> {
        self.items.iter().find(|i| i.type_id == TYPE_UNCONNECTED_DATA).map(|i| i.data.as_slice())
    }
}

pub fn decode(bytes: &[u8]) -> Result<Cpf, ()> {
    let count = u16::from_le_bytes([*bytes.first().ok_or(())?, *bytes.get(1).ok_or(())?]) as usize;
    let mut rest = bytes.get(2..).ok_or(())?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        if rest.len() < 4 {
            return Err(());
        }
        let type_id = u16::from_le_bytes([rest[0], rest[1]]);
        let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        let data = rest.get(4..4 + len).ok_or(())?.to_vec();
        items.push(CpfItem { type_id, data });
        rest = &rest[4 + len..];
    }
    Ok(Cpf { items })
}

pub fn encode(cpf: &Cpf) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(cpf.items.len() as u16).to_le_bytes());
    for item in &cpf.items {
        out.extend_from_slice(&item.type_id.to_le_bytes());
        out.extend_from_slice(&(item.data.len() as u16).to_le_bytes());
        out.extend_from_slice(&item.data);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconnected_data_roundtrip() {
        let cpf = Cpf::unconnected_data(vec![0x4C, 0x02, 0x91, 0x05]);
        let bytes = encode(&cpf);
        assert_eq!(decode(&bytes).unwrap(), cpf);
    }

    #[test]
    fn unconnected_payload_extracts_the_right_item() {
        let cpf = Cpf::unconnected_data(vec![0xAA, 0xBB]);
        assert_eq!(cpf.unconnected_payload(), Some(&[0xAA, 0xBB][..]));
    }

    #[test]
    fn truncated_item_is_rejected() {
        let mut bytes = encode(&Cpf::unconnected_data(vec![1, 2, 3]));
        bytes.truncate(bytes.len() - 1);
        assert!(decode(&bytes).is_err());
    }
}
