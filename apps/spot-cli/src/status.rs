use std::net::TcpStream;
use tracing::{debug, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Best-effort WebSocket mirror of the status messages shown to the user.
///
/// A failed connect or send disables the channel; the control loop never
/// waits on it or fails because of it.
pub struct StatusChannel {
    url: String,
    socket: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
}

impl StatusChannel {
    pub fn connect(url: &str) -> Self {
        let socket = match tungstenite::connect(url) {
            Ok((socket, _)) => {
                info!(%url, "status channel connected");
                Some(socket)
            }
            Err(e) => {
                warn!(%url, "status channel unavailable: {}", e);
                None
            }
        };
        Self {
            url: url.to_string(),
            socket,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    pub fn send(&mut self, message: &str) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match socket.send(Message::text(message)) {
            Ok(()) => debug!(url = %self.url, "status sent"),
            Err(e) => {
                warn!(url = %self.url, "status channel dropped: {}", e);
                self.socket = None;
            }
        }
    }
}

impl Drop for StatusChannel {
    fn drop(&mut self) {
        if let Some(socket) = self.socket.as_mut() {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
    }
}
