//! CIP general status codes (stratum 1, §7). These are wire data: plain
//! `u8` constants returned inside a reply, never propagated as `Result::Err`.

pub const SUCCESS: u8 = 0x00;
pub const PATH_SEGMENT_ERROR: u8 = 0x04;
pub const PATH_DESTINATION_UNKNOWN: u8 = 0x05;
pub const PARTIAL_TRANSFER: u8 = 0x06;
pub const SERVICE_NOT_SUPPORTED: u8 = 0x08;
pub const NOT_ENOUGH_DATA: u8 = 0x13;
pub const TOO_MUCH_DATA: u8 = 0x15;

/// Encapsulation-level status codes (stratum 2, §7), carried in the ENIP
/// header `status` field rather than inside a CIP reply body.
pub mod encap {
    pub const SUCCESS: u32 = 0x0000_0000;
    pub const INVALID_COMMAND: u32 = 0x0000_0001;
    pub const INSUFFICIENT_MEMORY: u32 = 0x0000_0002;
    pub const INCORRECT_DATA: u32 = 0x0000_0003;
}
