use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::codec::{self, FrameReader};
use crate::frame::Frame;

/// How long `close` waits for in-flight replies to drain.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-client state shared between the connection handler and the engines:
/// the currently selected logical database.
pub struct ClientState {
    db_index: AtomicUsize,
}

impl ClientState {
    pub fn new() -> ClientState {
        ClientState {
            db_index: AtomicUsize::new(0),
        }
    }

    pub fn db_index(&self) -> usize {
        self.db_index.load(Ordering::Relaxed)
    }

    pub fn select_db(&self, index: usize) {
        self.db_index.store(index, Ordering::Relaxed);
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

/// One accepted client connection: a framed read half, a write half whose
/// access is serialized by a mutex so reply frames never interleave, and
/// the client's selected-DB state.
pub struct Connection {
    reader: FrameReader<OwnedReadHalf>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    pub state: Arc<ClientState>,
    addr: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Connection {
        let (read_half, write_half) = stream.into_split();
        Connection {
            reader: FrameReader::new(read_half),
            writer: Arc::new(Mutex::new(write_half)),
            state: Arc::new(ClientState::new()),
            addr,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn read_frame(&mut self) -> Result<Option<Frame>, codec::Error> {
        self.reader.read_frame().await
    }

    pub async fn write_frame(&self, frame: &Frame) -> std::io::Result<()> {
        self.write_bytes(&frame.serialize()).await
    }

    pub async fn write_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await
    }

    /// Waits for pending writes to drain, then shuts the socket down. A
    /// writer stuck past the timeout loses the connection anyway.
    pub async fn close(&self) {
        if let Ok(mut writer) = timeout(CLOSE_TIMEOUT, self.writer.lock()).await {
            let _ = writer.shutdown().await;
        }
    }
}
