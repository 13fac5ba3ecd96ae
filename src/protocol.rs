//! Shared protocol constants for the companion-app framed transport

// Every message on the wire is an 8-byte header followed by a payload whose
// length sits in the last 2 header bytes (big-endian).
pub const HEADER_LEN: usize = 8;

// Offset of the big-endian u16 payload length within the header
pub const LEN_OFFSET: usize = 6;

// Byte 0 of every server-originated frame (hello and acks)
pub const SERVER_OPCODE: u8 = 0x07;

// In an ack header, byte 4 echoes byte 0 of the frame being acknowledged
pub const ACK_ECHO_OFFSET: usize = 4;

// First 6 bytes of the server hello header are static; the last 2 carry the
// payload length. Observed from the original companion app - the client
// validates these, so they are a compatibility contract.
pub const HELLO_HEADER_PREFIX: [u8; 6] = [0x07, 0x00, 0x00, 0x01, 0x01, 0x00];

// Maximum frame payload size - bounded by the 2-byte length field
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

// Packet size assumed for clients that omit acceptedPacketSize
pub const DEFAULT_PACKET_SIZE: u32 = 1024;

// Port the original companion app connects to
pub const DEFAULT_BIND: &str = "0.0.0.0:60010";

// Centralized timeout constants. The original implementation blocked without
// bound on every read and write; a stalled peer hung the handler forever.
// Every I/O step here runs under an explicit deadline instead.
pub mod timeouts {
    // How long to wait for the next frame header (ms). Generous because the
    // phone pauses between protocol stages while the user interacts with it.
    pub const FRAME_HEADER_MS: u64 = 30_000;

    // Base timeout for payload reads (ms)
    pub const READ_BASE_MS: u64 = 10_000;

    // Base timeout for writes (ms)
    pub const WRITE_BASE_MS: u64 = 10_000;

    // Additional timeout per MB of payload (ms) - chunks arrive over Wi-Fi
    pub const PER_MB_MS: u64 = 200;

    // Calculate read deadline based on payload size (ms)
    pub fn read_deadline_ms(payload_len: usize) -> u64 {
        let mb = (payload_len as u64 + 1_048_575) / 1_048_576;
        READ_BASE_MS + mb * PER_MB_MS
    }

    // Calculate write deadline based on payload size (ms)
    pub fn write_deadline_ms(payload_len: usize) -> u64 {
        let mb = (payload_len as u64 + 1_048_575) / 1_048_576;
        WRITE_BASE_MS + mb * PER_MB_MS
    }
}
