//! Blocking streaming transport
//!
//! The subscription client talks to the log service through the
//! [`Connector`] and [`Connection`] traits so the reconnect logic can be
//! driven by a scripted transport in tests. [`WsConnector`] is the real
//! implementation on top of `tungstenite`.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;
use tungstenite::protocol::Message;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{HandshakeError, WebSocket};
use url::Url;

use crate::error::TransportError;

/// Outcome of a single read from a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame arrived
    Text(String),
    /// Nothing to process: the read timed out or a control frame arrived
    Idle,
    /// The peer closed the connection, with the close reason if one was sent
    Closed(Option<String>),
}

/// An open, blocking, message-oriented connection
pub trait Connection: Send {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Wait for the next message. Must return [`Inbound::Idle`] periodically
    /// so the caller can observe a stop request.
    fn recv(&mut self) -> Result<Inbound, TransportError>;

    /// Best-effort close; errors are swallowed.
    fn close(&mut self);
}

/// Opens connections to a streaming endpoint
pub trait Connector: Send + Sync + 'static {
    type Connection: Connection + 'static;

    /// Open a connection. `read_timeout` bounds every blocking step,
    /// including the TCP connect and the handshake.
    fn connect(&self, url: &str, read_timeout: Duration)
        -> Result<Self::Connection, TransportError>;
}

/// WebSocket connector backed by `tungstenite`
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

/// WebSocket connection produced by [`WsConnector`]
pub struct WsConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl Connector for WsConnector {
    type Connection = WsConnection;

    fn connect(&self, url: &str, read_timeout: Duration) -> Result<WsConnection, TransportError> {
        let stream = open_socket(url, read_timeout)?;

        // A blocking socket with a read timeout surfaces a silent peer as
        // WouldBlock, which tungstenite reports as an interrupted handshake.
        let (socket, response) = tungstenite::client_tls_with_config(url, stream, None, None)
            .map_err(|e| match e {
                HandshakeError::Interrupted(_) => TransportError::Connect(format!(
                    "Handshake with {url} timed out after {read_timeout:?}"
                )),
                HandshakeError::Failure(e) => TransportError::Connect(e.to_string()),
            })?;
        debug!("WebSocket handshake completed with status {}", response.status());

        Ok(WsConnection { socket })
    }
}

/// Resolve `url` and open a TCP stream with every timeout already applied.
fn open_socket(url: &str, timeout: Duration) -> Result<TcpStream, TransportError> {
    let parsed =
        Url::parse(url).map_err(|e| TransportError::Connect(format!("Invalid URL {url}: {e}")))?;
    let addrs = parsed
        .socket_addrs(|| None)
        .map_err(|e| TransportError::Connect(format!("Failed to resolve {url}: {e}")))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(timeout))?;
                stream.set_write_timeout(Some(timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(TransportError::Connect(match last_error {
        Some(e) => format!("{url}: {e}"),
        None => format!("{url} resolved to no addresses"),
    }))
}

impl Connection for WsConnection {
    fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.socket
            .send(Message::Text(text.to_string()))
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn recv(&mut self) -> Result<Inbound, TransportError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Inbound::Text(text)),
            Ok(Message::Close(frame)) => Ok(Inbound::Closed(
                frame.map(|f| format!("{} {}", u16::from(f.code), f.reason)),
            )),
            Ok(Message::Binary(bytes)) => {
                debug!("Ignoring {} byte binary frame", bytes.len());
                Ok(Inbound::Idle)
            }
            Ok(_) => Ok(Inbound::Idle),
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(Inbound::Idle)
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(Inbound::Closed(None))
            }
            Err(e) => Err(TransportError::Receive(e.to_string())),
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_connect_refused_is_connect_error() {
        // Port 9 (discard) on loopback is closed on any sane test host.
        let result = WsConnector.connect("ws://127.0.0.1:9", Duration::from_millis(100));
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[test]
    fn test_invalid_url_is_connect_error() {
        let result = WsConnector.connect("not a url", Duration::from_millis(100));
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[test]
    fn test_silent_server_times_out_handshake() {
        // Accepted by the kernel backlog but never answered
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let started = Instant::now();
        let result = WsConnector.connect(&url, Duration::from_millis(100));

        assert!(matches!(result, Err(TransportError::Connect(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[test]
    fn test_handshake_and_receive_from_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut socket = tungstenite::accept(stream).unwrap();
            socket.send(Message::Text("hello".to_string())).unwrap();
            let _ = socket.read();
        });

        let mut connection = WsConnector.connect(&url, Duration::from_secs(2)).unwrap();
        let first = loop {
            match connection.recv().unwrap() {
                Inbound::Idle => continue,
                other => break other,
            }
        };
        assert_eq!(first, Inbound::Text("hello".to_string()));

        connection.close();
        server.join().unwrap();
    }
}
