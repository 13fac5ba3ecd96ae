//! Async transport for the vrlink daemon: frame codec, handshake, receive
//! session, and the accept loop.
//!
//! The codec functions are generic over any `AsyncRead`/`AsyncWrite` stream
//! so the session logic can be exercised against in-memory pipes; the accept
//! loop runs one isolated tokio task per connection with nothing shared
//! between handlers.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

use crate::error::ProtocolError;
use crate::log::{TransferLog, TransferLogEntry};
use crate::messages::{ClientHello, FileMetadata, ServerIdentity};
use crate::progress::TransferProgress;
use crate::protocol::timeouts::{read_deadline_ms, write_deadline_ms, FRAME_HEADER_MS};
use crate::protocol::HEADER_LEN;
use crate::protocol_core::{
    build_hello_header, ensure_parent_exists, make_ack, normalize_under_root, payload_len,
};

/// One wire message: raw 8-byte header plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: [u8; HEADER_LEN],
    pub payload: Vec<u8>,
}

/// Read into `buf`, accumulating partial reads. Returns false if the stream
/// closes before `buf` fills - end of stream is a state, not an error.
async fn read_exact_or_eof<S>(stream: &mut S, buf: &mut [u8]) -> Result<bool, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

async fn read_payload<S>(
    stream: &mut S,
    header: [u8; HEADER_LEN],
) -> Result<Option<Frame>, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let len = payload_len(&header);
    let mut payload = vec![0u8; len];
    if len > 0 && !read_exact_or_eof(stream, &mut payload).await? {
        return Ok(None);
    }
    Ok(Some(Frame { header, payload }))
}

/// Read one frame. `Ok(None)` means the peer closed the stream, whether
/// before the header completed or mid-payload.
pub async fn read_frame<S>(stream: &mut S) -> Result<Option<Frame>, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if !read_exact_or_eof(stream, &mut header).await? {
        return Ok(None);
    }
    read_payload(stream, header).await
}

/// Read one frame with the header and payload phases each under their own
/// deadline (payload deadline scales with the declared length).
pub async fn read_frame_timed<S>(stream: &mut S) -> Result<Option<Frame>, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match timeout(
        Duration::from_millis(FRAME_HEADER_MS),
        read_exact_or_eof(stream, &mut header),
    )
    .await
    {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => return Ok(None),
        Ok(Err(e)) => return Err(e),
        Err(_) => return Err(ProtocolError::Timeout("frame header", FRAME_HEADER_MS)),
    }
    let ms = read_deadline_ms(payload_len(&header));
    match timeout(Duration::from_millis(ms), read_payload(stream, header)).await {
        Ok(res) => res,
        Err(_) => Err(ProtocolError::Timeout("frame payload", ms)),
    }
}

/// Write one frame: header then payload as a single buffered write. Each
/// call is exactly one frame on the wire - never split, never coalesced
/// with a neighbor. The caller guarantees the header's length field already
/// encodes `payload.len()`.
pub async fn write_frame<S>(
    stream: &mut S,
    header: &[u8; HEADER_LEN],
    payload: &[u8],
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    debug_assert_eq!(payload_len(header), payload.len());
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(header);
    buf.extend_from_slice(payload);
    stream.write_all(&buf).await?;
    Ok(())
}

async fn write_frame_timed<S>(
    stream: &mut S,
    header: &[u8; HEADER_LEN],
    payload: &[u8],
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    let ms = write_deadline_ms(payload.len());
    match timeout(Duration::from_millis(ms), write_frame(stream, header, payload)).await {
        Ok(res) => res,
        Err(_) => Err(ProtocolError::Timeout("frame write", ms)),
    }
}

/// Write an ack: the 8 header bytes alone, no payload, regardless of what
/// the inherited length field claims. Bypasses `write_frame` on purpose -
/// its header/payload consistency check does not hold for acks.
async fn write_ack_timed<S>(
    stream: &mut S,
    ack: &[u8; HEADER_LEN],
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    let ms = write_deadline_ms(0);
    match timeout(Duration::from_millis(ms), stream.write_all(ack)).await {
        Ok(res) => res.map_err(ProtocolError::from),
        Err(_) => Err(ProtocolError::Timeout("ack write", ms)),
    }
}

/// Run the handshake: client hello in, server hello out.
///
/// `peer_ip` is the connection's observed peer address; the original
/// companion app reports it back as its own address in the hello, and the
/// client accepts that, so we do the same.
pub async fn negotiate_handshake<S>(
    stream: &mut S,
    identity: &ServerIdentity,
    peer_ip: &str,
) -> Result<ClientHello, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = read_frame_timed(stream)
        .await?
        .ok_or(ProtocolError::PeerClosed)?;
    let hello: ClientHello = serde_json::from_slice(&frame.payload)
        .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;

    let payload = serde_json::to_vec(&identity.hello(peer_ip))
        .map_err(|e| ProtocolError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    let len = u16::try_from(payload.len()).map_err(|_| {
        ProtocolError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            "server hello payload exceeds frame limit",
        ))
    })?;
    write_frame_timed(stream, &build_hello_header(len), &payload).await?;
    Ok(hello)
}

/// What a completed transfer looked like.
#[derive(Debug, Clone)]
pub struct ReceiveOutcome {
    pub file_name: String,
    pub path: PathBuf,
    pub declared_size: u64,
    pub bytes_received: u64,
}

/// Receive one file: metadata frame, metadata ack, then the chunk loop.
///
/// Every chunk is appended to the sink before its ack goes out; the client
/// waits on each ack, so the ordering doubles as flow control. A final chunk
/// may overshoot the declared size - chunk sizing is client-driven - and is
/// written in full; completion is `bytes_received >= declared`.
pub async fn receive_file<S>(
    stream: &mut S,
    dest_root: &Path,
    show_progress: bool,
) -> Result<ReceiveOutcome, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = read_frame_timed(stream)
        .await?
        .ok_or(ProtocolError::PeerClosed)?;
    let meta: FileMetadata = serde_json::from_slice(&frame.payload)
        .map_err(|e| ProtocolError::MalformedMetadata(e.to_string()))?;

    let meta_ack = make_ack(&frame.header)?;
    write_ack_timed(stream, &meta_ack).await?;

    let sink_err = |e: anyhow::Error| {
        ProtocolError::SinkUnavailable(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
    };
    let path = normalize_under_root(dest_root, Path::new(&meta.file_name)).map_err(sink_err)?;
    ensure_parent_exists(&path).map_err(sink_err)?;
    let mut sink = tokio::fs::File::create(&path)
        .await
        .map_err(ProtocolError::SinkUnavailable)?;

    let progress = TransferProgress::new(&meta.file_name, meta.file_size, show_progress);
    let mut bytes_received: u64 = 0;
    while bytes_received < meta.file_size {
        let frame = match read_frame_timed(stream).await? {
            Some(f) => f,
            None => {
                return Err(ProtocolError::TransferInterrupted(format!(
                    "stream closed at {}/{} bytes",
                    bytes_received, meta.file_size
                )))
            }
        };
        if frame.payload.is_empty() {
            return Err(ProtocolError::TransferInterrupted(format!(
                "empty data frame at {}/{} bytes",
                bytes_received, meta.file_size
            )));
        }

        sink.write_all(&frame.payload)
            .await
            .map_err(ProtocolError::SinkUnavailable)?;
        bytes_received += frame.payload.len() as u64;

        // Ack only after the bytes are handed to the sink
        let ack = make_ack(&frame.header)?;
        write_ack_timed(stream, &ack).await?;
        progress.update(bytes_received);
    }

    sink.flush().await.map_err(ProtocolError::SinkUnavailable)?;
    progress.finish();

    Ok(ReceiveOutcome {
        file_name: meta.file_name,
        path,
        declared_size: meta.file_size,
        bytes_received,
    })
}

/// Everything the server needs for one run: where to listen, where received
/// files land, and the identity presented during the handshake.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub dest_dir: PathBuf,
    pub identity: ServerIdentity,
    pub log_file: Option<PathBuf>,
    pub show_progress: bool,
}

impl ServerConfig {
    pub fn new(bind: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind: bind.into(),
            dest_dir: dest_dir.into(),
            identity: ServerIdentity::default(),
            log_file: None,
            show_progress: false,
        }
    }
}

/// Drive one connection start to finish: handshake, then a single file
/// transfer. Any failure aborts the connection; nothing is retried.
pub async fn handle_conn(
    stream: &mut TcpStream,
    peer: SocketAddr,
    config: &ServerConfig,
) -> Result<ReceiveOutcome, ProtocolError> {
    let peer_ip = peer.ip().to_string();
    let hello = negotiate_handshake(stream, &config.identity, &peer_ip).await?;
    eprintln!(
        "handshake from {} (packet size: {})",
        hello.device.device_name, hello.accepted_packet_size
    );
    receive_file(stream, &config.dest_dir, config.show_progress).await
}

/// Accept loop. Each connection runs on its own task; a failed transfer is
/// logged and the loop keeps accepting.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    eprintln!(
        "vrlinkd listening on {} dest={}",
        config.bind,
        config.dest_dir.display()
    );

    let log = config.log_file.as_ref().map(|p| TransferLog::new(p.clone()));
    let config = Arc::new(config);
    let log = Arc::new(log);

    loop {
        let (mut stream, peer) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        eprintln!("conn from {}", peer);

        let config = Arc::clone(&config);
        let log = Arc::clone(&log);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = handle_conn(&mut stream, peer, &config).await;
            match &result {
                Ok(outcome) => {
                    eprintln!(
                        "received {} ({} bytes) from {} in {:.1}s",
                        outcome.file_name,
                        outcome.bytes_received,
                        peer.ip(),
                        started.elapsed().as_secs_f64()
                    );
                }
                Err(e) if e.is_disconnect() => {
                    eprintln!("client {} disconnected: {}", peer.ip(), e);
                }
                Err(e) => {
                    eprintln!("connection error from {}: {}", peer.ip(), e);
                }
            }
            if let Some(log) = log.as_ref() {
                let entry = TransferLogEntry::from_result(peer, &result);
                if let Err(e) = log.add_entry(entry) {
                    eprintln!("transfer log write failed: {}", e);
                }
            }
            // Dropping the stream closes the transport on every path
            eprintln!("connection with {} closed", peer.ip());
        });
    }
}
