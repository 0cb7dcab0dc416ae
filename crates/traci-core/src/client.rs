//! Async client for a running traffic simulator.
//!
//! [`SimClient`] owns one byte stream to the simulator, writes encoded request
//! frames to it and reads exactly one response frame per request. Incoming
//! bytes are buffered and split on the length prefix, so a response that
//! arrives in fragments is reassembled before it is decoded.
//!
//! The client is half-duplex and requires `&mut self` for every call. To share
//! one connection between tasks, wrap it in a
//! [`ClientHandle`](crate::worker::ClientHandle).
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use traci_core::client::SimClient;
//! use traci_core::simulation;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr: SocketAddr = "127.0.0.1:8813".parse()?;
//! let mut client = SimClient::new(addr);
//!
//! client.connect().await?;
//! let now = client.execute(&simulation::current_time()).await?;
//! println!("simulation time: {:?}", now.value());
//! client.close();
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tracing::{debug, debug_span, error, trace, warn, Instrument};

use crate::command::CommandDescriptor;
use crate::config::ClientConfig;
use crate::protocol::{
    self, DecodedValue, ProtocolError, StatusCode, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE,
};
use crate::value::TypeTag;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Timeout for establishing a TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for reading a response frame from the simulator.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// SimStream trait
// ---------------------------------------------------------------------------

/// A bidirectional async stream the client can speak the protocol over.
///
/// [`TcpStream`] and in-memory [`tokio::io::DuplexStream`]s both qualify.
pub trait SimStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SimStream for T {}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the simulator.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No connection has been established, or it was torn down.
    #[error("not connected to simulator")]
    NotConnected,

    /// Failed to establish a TCP connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// An I/O error occurred on the stream. The connection has been dropped.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be encoded. Nothing was sent.
    #[error("encoding error: {0}")]
    Encoding(ProtocolError),

    /// The response was malformed. The connection has been dropped.
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    /// The simulator rejected the command. The connection stays usable.
    #[error("simulator reported {code}: {description}")]
    Status { code: StatusCode, description: String },

    /// The response value is not of the type the command expects.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: TypeTag, actual: TypeTag },

    /// Another request is in flight and the busy policy rejects waiting.
    #[error("client busy with another request")]
    Busy,

    /// The client was closed.
    #[error("client closed")]
    Closed,

    /// A connect or read exceeded its timeout.
    #[error("operation timed out")]
    Timeout,

    /// A previous request was abandoned while its frame was partially written.
    #[error("previous request abandoned mid-write; connection dropped")]
    AbandonedWrite,
}

impl ClientError {
    /// Whether this error tore down (or never had) a connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::ConnectionFailed(_)
                | Self::Io(_)
                | Self::Protocol(_)
                | Self::AbandonedWrite
        )
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Status { code, description } => Self::Status { code, description },
            ProtocolError::TypeMismatch { expected, actual } => Self::TypeMismatch { expected, actual },
            other => Self::Protocol(other),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Connection lifecycle of a [`SimClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No stream. [`connect`](SimClient::connect) is the only way forward.
    Disconnected,
    /// Idle and ready to send.
    Connected,
    /// A request frame is being written.
    Sending,
    /// A request was sent and its response has not been consumed yet.
    AwaitingResponse,
    /// Terminal. Every further operation fails with [`ClientError::Closed`].
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Sending => "sending",
            Self::AwaitingResponse => "awaiting-response",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Frame reassembly
// ---------------------------------------------------------------------------

/// Splits whole frames off a receive buffer.
///
/// Yields the complete frame, length prefix included, once all of its bytes
/// have arrived.
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    max_frame_size: u32,
}

impl FrameDecoder {
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameDecoder {
    type Item = BytesMut;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, ClientError> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }
        let declared = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        let len = declared as usize;
        if len < LENGTH_PREFIX_SIZE {
            return Err(ClientError::Protocol(ProtocolError::InvalidPayload(format!(
                "frame length {declared} is shorter than its own prefix"
            ))));
        }
        if declared > self.max_frame_size {
            return Err(ClientError::Protocol(ProtocolError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            }));
        }
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }
        Ok(Some(src.split_to(len)))
    }
}

// ---------------------------------------------------------------------------
// SimClient
// ---------------------------------------------------------------------------

/// Async client for one simulator connection.
pub struct SimClient {
    stream: Option<Box<dyn SimStream>>,
    addr: Option<SocketAddr>,
    state: ClientState,
    rx: BytesMut,
    decoder: FrameDecoder,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl SimClient {
    /// Create a new client targeting the given address.
    ///
    /// No connection is established until [`connect`](Self::connect) is called.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            stream: None,
            addr: Some(addr),
            state: ClientState::Disconnected,
            rx: BytesMut::new(),
            decoder: FrameDecoder::default(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Create a client targeting `addr` with timeouts and limits from `config`.
    pub fn with_config(addr: SocketAddr, config: &ClientConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config.max_frame_size),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            ..Self::new(addr)
        }
    }

    /// Create a client from a pre-connected stream.
    ///
    /// The client starts in [`ClientState::Connected`].
    pub fn from_stream(stream: impl SimStream + 'static) -> Self {
        Self {
            stream: Some(Box::new(stream)),
            addr: None,
            state: ClientState::Connected,
            rx: BytesMut::new(),
            decoder: FrameDecoder::default(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Resolve the configured host and connect to it.
    pub async fn connect_with(config: &ClientConfig) -> Result<Self, ClientError> {
        let addr = config
            .resolve()
            .await
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        let mut client = Self::with_config(addr, config);
        client.connect().await?;
        Ok(client)
    }

    /// Replace the per-response read timeout.
    pub fn set_read_timeout(&mut self, read_timeout: Duration) {
        self.read_timeout = read_timeout;
    }

    /// Replace the frame size limit applied in both directions.
    pub fn set_max_frame_size(&mut self, max_frame_size: u32) {
        self.decoder = FrameDecoder::new(max_frame_size);
    }

    /// Establish a TCP connection to the simulator.
    ///
    /// A no-op when already connected. Only valid for clients created with an
    /// address; clients created with [`from_stream`](Self::from_stream) cannot
    /// reconnect.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        match self.state {
            ClientState::Closed => return Err(ClientError::Closed),
            ClientState::Disconnected => {}
            _ => return Ok(()),
        }
        let addr = self
            .addr
            .ok_or_else(|| ClientError::ConnectionFailed("no address configured".into()))?;

        debug!(%addr, "connecting to simulator");

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;
        stream.set_nodelay(true)?;

        self.stream = Some(Box::new(stream));
        self.rx.clear();
        self.state = ClientState::Connected;
        debug!("connected to simulator");
        Ok(())
    }

    /// Close the connection. The client cannot be used afterwards.
    pub fn close(&mut self) {
        if self.state != ClientState::Closed {
            debug!(state = %self.state, "closing client");
        }
        self.stream.take();
        self.rx.clear();
        self.state = ClientState::Closed;
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Returns `true` if the client currently holds an open connection.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Send `cmd` and wait for its decoded response.
    pub async fn execute(&mut self, cmd: &CommandDescriptor) -> Result<DecodedValue, ClientError> {
        let read_timeout = self.read_timeout;
        self.execute_timeout(cmd, read_timeout).await
    }

    /// Like [`execute`](Self::execute) with an explicit response timeout.
    ///
    /// On timeout the request stays outstanding: the next call first consumes
    /// and discards its response before sending anything.
    pub async fn execute_timeout(
        &mut self,
        cmd: &CommandDescriptor,
        read_timeout: Duration,
    ) -> Result<DecodedValue, ClientError> {
        let span = debug_span!("sim_send", command = cmd.name());
        async {
            self.ready().await?;

            let frame = protocol::encode_request(cmd).map_err(ClientError::Encoding)?;
            let max = self.decoder.max_frame_size;
            if frame.len() > max as usize {
                return Err(ClientError::Encoding(ProtocolError::FrameTooLarge {
                    size: frame.len(),
                    max,
                }));
            }

            self.state = ClientState::Sending;
            self.write_frame(&frame).await?;
            self.state = ClientState::AwaitingResponse;

            let response = self.read_frame(read_timeout).await?;
            self.state = ClientState::Connected;
            self.finish(cmd, &response)
        }
        .instrument(span)
        .await
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Bring the client to [`ClientState::Connected`] or explain why not.
    async fn ready(&mut self) -> Result<(), ClientError> {
        match self.state {
            ClientState::Connected => Ok(()),
            ClientState::Closed => Err(ClientError::Closed),
            ClientState::Disconnected => Err(ClientError::NotConnected),
            ClientState::Sending => {
                warn!("previous request abandoned mid-write, dropping connection");
                self.teardown();
                Err(ClientError::AbandonedWrite)
            }
            ClientState::AwaitingResponse => {
                warn!("draining response of an abandoned request");
                let read_timeout = self.read_timeout;
                let stale = self.read_frame(read_timeout).await?;
                trace!(frame_bytes = stale.len(), "discarded stale response");
                self.state = ClientState::Connected;
                Ok(())
            }
        }
    }

    /// Map the decode outcome of one response onto the client's error model.
    fn finish(&mut self, cmd: &CommandDescriptor, frame: &[u8]) -> Result<DecodedValue, ClientError> {
        match protocol::decode_response(frame, cmd) {
            Ok(value) => {
                trace!("response decoded");
                Ok(value)
            }
            Err(ProtocolError::Status { code, description }) => {
                debug!(%code, %description, "simulator rejected command");
                Err(ClientError::Status { code, description })
            }
            Err(ProtocolError::TypeMismatch { expected, actual }) => {
                error!(command = cmd.name(), %expected, %actual, "response type mismatch");
                Err(ClientError::TypeMismatch { expected, actual })
            }
            Err(err) => {
                warn!(error = %err, "malformed response, dropping connection");
                self.teardown();
                Err(ClientError::Protocol(err))
            }
        }
    }

    /// Drop the stream and any buffered bytes. `Closed` stays `Closed`.
    fn teardown(&mut self) {
        self.stream.take();
        self.rx.clear();
        if self.state != ClientState::Closed {
            self.state = ClientState::Disconnected;
        }
    }

    /// Write a complete frame (header included) to the stream.
    async fn write_frame(&mut self, data: &[u8]) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        trace!(frame_bytes = data.len(), "writing frame");
        let result = async {
            stream.write_all(data).await?;
            stream.flush().await
        }
        .await;
        if let Err(err) = result {
            self.teardown();
            return Err(ClientError::Io(err));
        }
        Ok(())
    }

    /// Read one complete frame, buffering partial reads.
    ///
    /// Cancel-safe: bytes read before a timeout stay in the receive buffer. A
    /// timeout leaves the connection in place; any other failure drops it.
    async fn read_frame(&mut self, read_timeout: Duration) -> Result<BytesMut, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let rx = &mut self.rx;
        let decoder = &mut self.decoder;

        let result = timeout(read_timeout, async {
            loop {
                if let Some(frame) = decoder.decode(rx)? {
                    trace!(frame_bytes = frame.len(), "read frame");
                    return Ok(frame);
                }
                let n = stream.read_buf(rx).await?;
                if n == 0 {
                    return Err(ClientError::ConnectionFailed(
                        "simulator closed the connection".into(),
                    ));
                }
                trace!(bytes = n, buffered = rx.len(), "read chunk");
            }
        })
        .await;

        match result {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(err)) => {
                self.teardown();
                Err(err)
            }
            Err(_) => {
                debug!(buffered = self.rx.len(), "response timed out");
                Err(ClientError::Timeout)
            }
        }
    }
}
