//! ENIP encapsulation header codec (§4.B, §6): the 24-byte header plus a
//! command-specific payload, parsed incrementally over a byte source.

pub const HEADER_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ListServices,
    ListIdentity,
    ListInterfaces,
    RegisterSession,
    UnRegisterSession,
    SendRrData,
    SendUnitData,
    Unknown(u16),
}

impl Command {
    pub fn from_u16(code: u16) -> Self {
        match code {
            0x0004 => Command::ListServices,
            0x0063 => Command::ListIdentity,
            0x0064 => Command::ListInterfaces,
            0x0065 => Command::RegisterSession,
            0x0066 => Command::UnRegisterSession,
            0x006F => Command::SendRrData,
            0x0070 => Command::SendUnitData,
            other => Command::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Command::ListServices => 0x0004,
            Command::ListIdentity => 0x0063,
            Command::ListInterfaces => 0x0064,
            Command::RegisterSession => 0x0065,
            Command::UnRegisterSession => 0x0066,
            Command::SendRrData => 0x006F,
            Command::SendUnitData => 0x0070,
            Command::Unknown(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnipFrame {
    pub command: Command,
    pub session_handle: u32,
    pub status: u32,
    pub sender_context: [u8; 8],
    pub options: u32,
    pub payload: Vec<u8>,
}

/// Outcome of attempting to parse one frame off the front of a buffer: either
/// a complete frame plus the number of bytes it consumed, or a request for at
/// least `n` more bytes before parsing can make progress. This is a
/// suspension, never an error (§4.B, §9 "generator-style parser").
#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    Done(EnipFrame, usize),
    Need(usize),
}

/// Attempt to parse one encapsulation frame from the front of `buf`.
pub fn try_parse(buf: &[u8]) -> ParseOutcome {
    if buf.len() < HEADER_LEN {
        return ParseOutcome::Need(HEADER_LEN - buf.len());
    }
    let command = Command::from_u16(u16::from_le_bytes([buf[0], buf[1]]));
    let length = u16::from_le_bytes([buf[2], buf[3]]) as usize;
    let session_handle = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let status = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let mut sender_context = [0u8; 8];
    sender_context.copy_from_slice(&buf[12..20]);
    let options = u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]);

    let total = HEADER_LEN + length;
    if buf.len() < total {
        return ParseOutcome::Need(total - buf.len());
    }
    let payload = buf[HEADER_LEN..total].to_vec();
    let frame = EnipFrame { command, session_handle, status, sender_context, options, payload };
    ParseOutcome::Done(frame, total)
}

/// Encode a frame back to its wire bytes. Round-trips byte-identically with
/// `try_parse` for any frame it produced (§4.B).
pub fn encode(frame: &EnipFrame) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    out.extend_from_slice(&frame.command.code().to_le_bytes());
    out.extend_from_slice(&(frame.payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&frame.session_handle.to_le_bytes());
    out.extend_from_slice(&frame.status.to_le_bytes());
    out.extend_from_slice(&frame.sender_context);
    out.extend_from_slice(&frame.options.to_le_bytes());
    out.extend_from_slice(&frame.payload);
    out
}
