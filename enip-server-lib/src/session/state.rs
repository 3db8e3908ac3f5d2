//! Per-connection session loop (§4.G): register/unregister, SendRRData
//! dispatch, partial-frame suspension, artificial delay, and the
//! control-plane EOF kill-switch.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::cip::{message, service, TagRegistry};
use crate::control::{ConnectionStats, Delay};
use crate::encap::cpf::Cpf;
use crate::encap::frame::{self, Command, EnipFrame, ParseOutcome};
use crate::encap::sendrrdata;
use crate::encap::ByteSource;

/// Refill timeout: the handler owns the buffer and a bounded-timeout socket
/// read so it can notice the control plane's `eof` flag without blocking
/// forever on an idle peer (§4.G, §9 "cooperative timing").
const REFILL_TIMEOUT: Duration = Duration::from_millis(100);

/// Encapsulation status for an invalid/unsupported command or session (§7).
const ENCAP_INVALID_COMMAND: u32 = 0x0000_0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Unregistered,
    Registered(u32),
}

impl SessionState {
    fn handle(self) -> u32 {
        match self {
            SessionState::Unregistered => 0,
            SessionState::Registered(h) => h,
        }
    }
}

/// Monotonic session-handle allocator, shared across every connection on a
/// listener so handles stay unique for the process lifetime (§4.G).
#[derive(Debug, Default)]
pub struct SessionHandles(AtomicU32);

impl SessionHandles {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Allocate the next non-zero handle.
    pub fn next(&self) -> u32 {
        loop {
            let candidate = self.0.fetch_add(1, Ordering::Relaxed) + 1;
            if candidate != 0 {
                return candidate;
            }
        }
    }
}

fn reply_frame(command: Command, session_handle: u32, status: u32, sender_context: [u8; 8], payload: Vec<u8>) -> EnipFrame {
    EnipFrame { command, session_handle, status, sender_context, options: 0, payload }
}

/// Handle one fully-parsed frame, returning the reply to send (if any) and
/// whether the session should keep running afterward.
fn handle_frame(state: &mut SessionState, registry: &TagRegistry, handles: &SessionHandles, frame: EnipFrame) -> (Option<EnipFrame>, bool) {
    match frame.command {
        Command::RegisterSession => {
            let new_handle = handles.next();
            *state = SessionState::Registered(new_handle);
            let reply = reply_frame(frame.command, new_handle, 0, frame.sender_context, frame.payload);
            (Some(reply), true)
        }
        Command::UnRegisterSession => (None, false),
        Command::ListServices => {
            let cpf = Cpf {
                items: vec![crate::encap::cpf::CpfItem {
                    type_id: crate::encap::cpf::TYPE_LIST_SERVICES_RESPONSE,
                    data: list_services_item(),
                }],
            };
            let reply = reply_frame(
                frame.command,
                state.handle(),
                0,
                frame.sender_context,
                crate::encap::cpf::encode(&cpf),
            );
            (Some(reply), true)
        }
        Command::ListIdentity => {
            let reply = reply_frame(frame.command, state.handle(), 0, frame.sender_context, Vec::new());
            (Some(reply), true)
        }
        Command::ListInterfaces => {
            let reply = reply_frame(frame.command, state.handle(), 0, frame.sender_context, Vec::new());
            (Some(reply), true)
        }
        Command::SendRrData => {
            if *state != SessionState::Registered(frame.session_handle) {
                let reply = reply_frame(frame.command, state.handle(), ENCAP_INVALID_COMMAND, frame.sender_context, Vec::new());
                return (Some(reply), true);
            }
            let reply_payload = match sendrrdata::decode(&frame.payload) {
                Ok(send_rr) => match send_rr.cpf.unconnected_payload() {
                    Some(cip_bytes) => {
                        let cip_reply = match message::parse_request(cip_bytes) {
                            Ok(req) => service::dispatch(registry, &req),
                            Err(status) => message::CipReply::error(0x80, status),
                        };
                        sendrrdata::encode(&sendrrdata::wrap_reply(message::encode_reply(&cip_reply)))
                    }
                    None => Vec::new(),
                },
                Err(()) => Vec::new(),
            };
            let reply = reply_frame(frame.command, state.handle(), 0, frame.sender_context, reply_payload);
            (Some(reply), true)
        }
        Command::SendUnitData | Command::Unknown(_) => {
            let reply = reply_frame(frame.command, state.handle(), ENCAP_INVALID_COMMAND, frame.sender_context, Vec::new());
            (Some(reply), true)
        }
    }
}

/// One `0x0100` ListServices item body: protocol version, capability flags
/// (CIP encapsulation over TCP, no UDP-based I/O), and a short service name.
fn list_services_item() -> Vec<u8> {
    const CAPABILITY_TCP: u16 = 0x0020;
    let name = b"Communications\0";
    let mut out = Vec::with_capacity(4 + name.len());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&CAPABILITY_TCP.to_le_bytes());
    out.extend_from_slice(name);
    out
}

/// Run one connection's session to completion. Consumes the stream; returns
/// once the peer disconnects, the control plane forces `eof`, or a
/// transport/parse error occurs (§4.G, §5).
pub async fn run(
    mut stream: TcpStream,
    registry: Arc<TagRegistry>,
    handles: Arc<SessionHandles>,
    stats: Arc<ConnectionStats>,
    delay: Arc<Delay>,
) {
    let mut state = SessionState::Unregistered;
    let mut source = ByteSource::new();
    let mut read_buf = [0u8; 4096];

    'session: loop {
        if stats.should_close() {
            debug!("control plane requested eof, closing session");
            break;
        }

        loop {
            match frame::try_parse(source.peek()) {
                ParseOutcome::Done(incoming_frame, consumed) => {
                    source.forget(consumed);
                    stats.requests.fetch_add(1, Ordering::Relaxed);
                    let (reply, keep_going) = handle_frame(&mut state, &registry, &handles, incoming_frame);
                    if let Some(reply) = reply {
                        let wait = delay.get();
                        if wait > 0.0 && wait.is_finite() {
                            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                        } else if wait < 0.0 || !wait.is_finite() {
                            warn!(delay = wait, "invalid artificial delay value, ignoring");
                        }
                        if stream.write_all(&frame::encode(&reply)).await.is_err() {
                            break 'session;
                        }
                        stats.processed.fetch_add(1, Ordering::Relaxed);
                    }
                    if !keep_going {
                        break 'session;
                    }
                    continue;
                }
                ParseOutcome::Need(_) => break,
            }
        }

        if source.over_capacity() {
            warn!(buffered = source.peek().len(), "byte source exceeded capacity without progress, closing");
            break;
        }

        match tokio::time::timeout(REFILL_TIMEOUT, stream.read(&mut read_buf)).await {
            Ok(Ok(0)) => {
                if source.is_empty() {
                    debug!("peer closed connection cleanly");
                } else {
                    warn!(
                        memory = ?source.memory(),
                        remaining = ?source.peek(),
                        sent = source.sent(),
                        "peer closed mid-frame"
                    );
                }
                break;
            }
            Ok(Ok(n)) => {
                source.chain(&read_buf[..n]);
                stats.received.fetch_add(n as u64, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "socket read error, closing session");
                break;
            }
            Err(_) => continue, // refill timeout: loop back to re-check stats.eof
        }
    }

    info!(requests = stats.requests.load(Ordering::Relaxed), "session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cip::{CipType, Primitive};
    use crate::encap::frame::encode;

    fn registry_with_scada() -> TagRegistry {
        let mut reg = TagRegistry::new();
        reg.create("SCADA", CipType::Int, 1, Primitive::Int(0)).unwrap();
        reg
    }

    #[test]
    fn register_session_assigns_nonzero_handle_and_echoes_context() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        let mut state = SessionState::Unregistered;
        let frame = EnipFrame {
            command: Command::RegisterSession,
            session_handle: 0,
            status: 0,
            sender_context: [7; 8],
            options: 0,
            payload: vec![1, 0, 0, 0],
        };
        let (reply, keep_going) = handle_frame(&mut state, &registry, &handles, frame);
        let reply = reply.unwrap();
        assert!(keep_going);
        assert_ne!(reply.session_handle, 0);
        assert_eq!(reply.sender_context, [7; 8]);
        assert_eq!(state, SessionState::Registered(reply.session_handle));
    }

    #[test]
    fn unregister_session_produces_no_reply_and_stops() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        let mut state = SessionState::Registered(5);
        let frame = EnipFrame {
            command: Command::UnRegisterSession,
            session_handle: 5,
            status: 0,
            sender_context: [0; 8],
            options: 0,
            payload: Vec::new(),
        };
        let (reply, keep_going) = handle_frame(&mut state, &registry, &handles, frame);
        assert!(reply.is_none());
        assert!(!keep_going);
    }

    #[test]
    fn send_rr_data_before_registration_is_invalid_session() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        let mut state = SessionState::Unregistered;
        let frame = EnipFrame {
            command: Command::SendRrData,
            session_handle: 0,
            status: 0,
            sender_context: [0; 8],
            options: 0,
            payload: Vec::new(),
        };
        let (reply, _) = handle_frame(&mut state, &registry, &handles, frame);
        assert_eq!(reply.unwrap().status, ENCAP_INVALID_COMMAND);
    }

    #[test]
    fn unknown_command_after_registration_is_invalid_command() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        let mut state = SessionState::Registered(9);
        let frame = EnipFrame {
            command: Command::Unknown(0x00FF),
            session_handle: 9,
            status: 0,
            sender_context: [3; 8],
            options: 0,
            payload: Vec::new(),
        };
        let (reply, keep_going) = handle_frame(&mut state, &registry, &handles, frame);
        let reply = reply.unwrap();
        assert!(keep_going);
        assert_eq!(reply.status, ENCAP_INVALID_COMMAND);
        assert!(reply.payload.is_empty());
        assert_eq!(reply.sender_context, [3; 8]);
    }

    #[test]
    fn list_services_reply_carries_one_cpf_item_named_communications() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        let mut state = SessionState::Registered(9);
        let frame = EnipFrame {
            command: Command::ListServices,
            session_handle: 9,
            status: 0,
            sender_context: [0; 8],
            options: 0,
            payload: Vec::new(),
        };
        let (reply, keep_going) = handle_frame(&mut state, &registry, &handles, frame);
        let reply = reply.unwrap();
        assert!(keep_going);
        assert_eq!(reply.status, 0);
        let cpf = crate::encap::cpf::decode(&reply.payload).unwrap();
        assert_eq!(cpf.items.len(), 1);
        assert_eq!(cpf.items[0].type_id, crate::encap::cpf::TYPE_LIST_SERVICES_RESPONSE);
        assert!(cpf.items[0].data.ends_with(b"Communications\0"));
    }

    #[test]
    fn list_identity_and_list_interfaces_reply_with_empty_payload() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        for command in [Command::ListIdentity, Command::ListInterfaces] {
            let mut state = SessionState::Unregistered;
            let frame = EnipFrame {
                command,
                session_handle: 0,
                status: 0,
                sender_context: [0; 8],
                options: 0,
                payload: Vec::new(),
            };
            let (reply, keep_going) = handle_frame(&mut state, &registry, &handles, frame);
            let reply = reply.unwrap();
            assert!(keep_going);
            assert_eq!(reply.status, 0);
            assert!(reply.payload.is_empty());
        }
    }

    #[test]
    fn send_rr_data_round_trips_cip_reply_through_cpf() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        let mut state = SessionState::Registered(9);

        let cip_req = message::CipRequest {
            service: 0x4C,
            path: vec![crate::cip::EpathSegment::Symbolic("SCADA".to_string())],
            data: vec![1, 0],
        };
        let cip_bytes = message::encode_request(&cip_req);
        let send_rr = sendrrdata::SendRrData {
            interface_handle: 0,
            timeout: 0,
            cpf: Cpf::unconnected_data(cip_bytes),
        };
        let frame = EnipFrame {
            command: Command::SendRrData,
            session_handle: 9,
            status: 0,
            sender_context: [0; 8],
            options: 0,
            payload: sendrrdata::encode(&send_rr),
        };
        let (reply, _) = handle_frame(&mut state, &registry, &handles, frame);
        let reply = reply.unwrap();
        assert_eq!(reply.status, 0);
        let decoded = sendrrdata::decode(&reply.payload).unwrap();
        let cip_bytes = decoded.cpf.unconnected_payload().unwrap();
        assert_eq!(cip_bytes, &[0xCC, 0x00, 0x00, 0x00, 0xC3, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn session_handles_never_yield_zero() {
        let handles = SessionHandles::new();
        for _ in 0..10 {
            assert_ne!(handles.next(), 0);
        }
    }

    #[test]
    fn register_session_reply_encodes_to_header_plus_echoed_payload() {
        let registry = registry_with_scada();
        let handles = SessionHandles::new();
        let mut state = SessionState::Unregistered;
        let frame = EnipFrame {
            command: Command::RegisterSession,
            session_handle: 0,
            status: 0,
            sender_context: [0; 8],
            options: 0,
            payload: vec![1, 0, 0, 0],
        };
        let (reply, _) = handle_frame(&mut state, &registry, &handles, frame);
        let bytes = encode(&reply.unwrap());
        assert_eq!(bytes.len(), 24 + 4);
    }
}
