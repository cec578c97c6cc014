//! WebSocket transport.
//!
//! The TCP connect and the HTTP upgrade run on the calling thread, each
//! bounded by the handshake timeout. Once upgraded, the stream is switched to
//! non-blocking so `try_recv` can be called from a polling loop. `wss://`
//! goes through rustls with the webpki root store.

use std::fmt;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};
use tungstenite::client::{uri_mode, IntoClientRequest};
use tungstenite::handshake::HandshakeError;
use tungstenite::stream::{MaybeTlsStream, Mode};
use tungstenite::{Message, WebSocket};

use crate::state::connection::{Transport, TransportError};

/// Upper bound for the TCP connect and for each read or write of the upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    socket: Option<Socket>,
    handshake_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self {
            socket: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }
}

impl fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("open", &self.socket.is_some())
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

fn is_would_block(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e) if e.kind() == ErrorKind::WouldBlock)
}

fn connect_tcp(addrs: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = io::Error::new(ErrorKind::NotFound, "host resolved to no addresses");
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = e;
            }
        }
    }
    Err(last_err)
}

/// Switch the TCP stream underneath either variant to non-blocking mode.
fn set_nonblocking(stream: &MaybeTlsStream<TcpStream>) -> io::Result<()> {
    match stream {
        MaybeTlsStream::Plain(tcp) => tcp.set_nonblocking(true),
        MaybeTlsStream::Rustls(tls) => tls.get_ref().set_nonblocking(true),
        _ => Err(io::Error::new(ErrorKind::Unsupported, "unsupported stream kind")),
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, url: &str) -> Result<(), TransportError> {
        let open_err = |reason: String| TransportError::Open {
            url: url.to_string(),
            reason,
        };

        let request = url
            .into_client_request()
            .map_err(|e| open_err(e.to_string()))?;
        let mode = uri_mode(request.uri()).map_err(|e| open_err(e.to_string()))?;
        let host = request
            .uri()
            .host()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .ok_or_else(|| open_err("URL has no host".to_string()))?;
        let port = request.uri().port_u16().unwrap_or(match mode {
            Mode::Plain => 80,
            Mode::Tls => 443,
        });

        let addrs: Vec<SocketAddr> = (host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| open_err(e.to_string()))?
            .collect();
        let stream =
            connect_tcp(&addrs, self.handshake_timeout).map_err(|e| open_err(e.to_string()))?;
        stream
            .set_read_timeout(Some(self.handshake_timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.handshake_timeout)))
            .map_err(|e| open_err(e.to_string()))?;
        // nodelay is a latency hint only
        stream.set_nodelay(true).ok();

        if matches!(mode, Mode::Tls) {
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        }

        let (socket, response) = match tungstenite::client_tls(request, stream) {
            Ok(pair) => pair,
            Err(HandshakeError::Interrupted(_)) => {
                warn!("WebSocket handshake with {} timed out", url);
                return Err(open_err(format!(
                    "handshake timed out after {:?}",
                    self.handshake_timeout
                )));
            }
            Err(HandshakeError::Failure(e)) => return Err(open_err(e.to_string())),
        };
        info!("WebSocket handshake complete ({})", response.status());

        set_nonblocking(socket.get_ref()).map_err(|e| open_err(e.to_string()))?;

        self.socket = Some(socket);
        Ok(())
    }

    fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::Closed)?;
        match socket.send(Message::Text(frame)) {
            Ok(()) => Ok(()),
            // queued; flushed on the next read or write
            Err(e) if is_would_block(&e) => Ok(()),
            Err(e) => {
                self.socket = None;
                Err(TransportError::Io(e.to_string()))
            }
        }
    }

    fn try_recv(&mut self) -> Result<Option<String>, TransportError> {
        let socket = self.socket.as_mut().ok_or(TransportError::Closed)?;

        loop {
            match socket.read() {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Close(frame)) => {
                    debug!("Server closed the socket: {:?}", frame);
                    self.socket = None;
                    return Err(TransportError::Closed);
                }
                // control frames are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) if is_would_block(&e) => return Ok(None),
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    self.socket = None;
                    return Err(TransportError::Closed);
                }
                Err(e) => {
                    warn!("WebSocket read failed: {}", e);
                    self.socket = None;
                    return Err(TransportError::Io(e.to_string()));
                }
            }
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn close(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None) {
                debug!("Error while closing socket: {}", e);
            }
            let _ = socket.flush();
        }
    }
}
