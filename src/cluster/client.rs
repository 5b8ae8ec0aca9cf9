use std::io;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, warn};

use crate::codec::FrameReader;
use crate::frame::Frame;

const QUEUE_SIZE: usize = 256;
const SEND_TIMEOUT: Duration = Duration::from_secs(3);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const WRITE_RETRIES: usize = 3;

/// One in-flight command to a peer. The reply slot doubles as the done
/// signal: resolving it wakes the waiting caller, and a slot whose caller
/// timed out swallows its late reply without disturbing FIFO matching.
struct Request {
    args: Vec<Bytes>,
    reply: oneshot::Sender<Frame>,
    heartbeat: bool,
}

/// A pipelined client to one peer node. A writer task drains the pending
/// queue onto the socket, a reader task matches replies to requests in
/// strict FIFO order, and a heartbeat task keeps the connection warm.
pub struct PeerClient {
    pending: mpsc::Sender<Request>,
    heartbeat: JoinHandle<()>,
}

impl PeerClient {
    pub async fn connect(addr: String) -> io::Result<PeerClient> {
        let stream = TcpStream::connect(&addr).await?;
        let (read_half, write_half) = stream.into_split();

        let (pending_tx, pending_rx) = mpsc::channel(QUEUE_SIZE);
        let (waiting_tx, waiting_rx) = mpsc::channel(QUEUE_SIZE);
        // Carries the fresh read half to the reader after a reconnect.
        let (read_half_tx, read_half_rx) = mpsc::channel(1);

        read_half_tx
            .try_send(read_half)
            .expect("fresh channel cannot be full");

        tokio::spawn(write_loop(
            addr,
            write_half,
            pending_rx,
            waiting_tx,
            read_half_tx,
        ));
        tokio::spawn(read_loop(read_half_rx, waiting_rx));

        let heartbeat = tokio::spawn(heartbeat_loop(pending_tx.clone()));

        Ok(PeerClient {
            pending: pending_tx,
            heartbeat,
        })
    }

    /// Sends one command and waits for its reply. Failures come back as
    /// error replies, never as panics: `server time out` after three
    /// seconds, `request failed` when the connection is beyond retry.
    pub async fn send(&self, args: Vec<Bytes>) -> Frame {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = Request {
            args,
            reply: reply_tx,
            heartbeat: false,
        };

        if self.pending.send(request).await.is_err() {
            return Frame::err("request failed");
        }

        match timeout(SEND_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Frame::err("request failed"),
            Err(_) => Frame::err("server time out"),
        }
    }
}

impl Drop for PeerClient {
    fn drop(&mut self) {
        // Stops the heartbeat's clone of the pending sender, which lets the
        // writer and reader tasks wind down.
        self.heartbeat.abort();
    }
}

async fn write_loop(
    addr: String,
    mut write_half: OwnedWriteHalf,
    mut pending_rx: mpsc::Receiver<Request>,
    waiting_tx: mpsc::Sender<Request>,
    read_half_tx: mpsc::Sender<OwnedReadHalf>,
) {
    while let Some(request) = pending_rx.recv().await {
        let bytes = Frame::from_cmdline(&request.args).serialize();

        let mut result = write_half.write_all(&bytes).await;
        let mut attempts = 0;
        while result.is_err() && attempts < WRITE_RETRIES {
            attempts += 1;
            // Each retry redials first; the reader picks up the new read
            // half and resumes matching replies.
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    let (read_half, new_write_half) = stream.into_split();
                    write_half = new_write_half;
                    if read_half_tx.send(read_half).await.is_err() {
                        break;
                    }
                    result = write_half.write_all(&bytes).await;
                }
                Err(err) => result = Err(err),
            }
        }

        match result {
            Ok(()) => {
                if waiting_tx.send(request).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                if request.heartbeat {
                    debug!("peer {}: heartbeat write failed: {}", addr, err);
                } else {
                    warn!("peer {}: write failed after retries: {}", addr, err);
                }
                let _ = request.reply.send(Frame::err("request failed"));
            }
        }
    }
}

async fn read_loop(
    mut read_half_rx: mpsc::Receiver<OwnedReadHalf>,
    mut waiting_rx: mpsc::Receiver<Request>,
) {
    while let Some(read_half) = read_half_rx.recv().await {
        let mut frames = FrameReader::new(read_half);
        loop {
            let reply = match frames.read_frame().await {
                Ok(Some(frame)) => frame,
                // Stream over; wait for a reconnected read half.
                Ok(None) => break,
                Err(err) if err.is_terminal() => break,
                Err(err) => Frame::err(err.to_string()),
            };

            match waiting_rx.recv().await {
                // A resolved slot whose sender timed out just drops the
                // reply; ordering for later requests is unaffected.
                Some(request) => {
                    let _ = request.reply.send(reply);
                }
                None => return,
            }
        }
    }
}

async fn heartbeat_loop(pending_tx: mpsc::Sender<Request>) {
    let mut ticker = interval(HEARTBEAT_INTERVAL);
    // The first tick fires immediately; skip it so a freshly pooled client
    // does not race its first real command.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let (reply_tx, _reply_rx) = oneshot::channel();
        let request = Request {
            args: vec![Bytes::from_static(b"PING")],
            reply: reply_tx,
            heartbeat: true,
        };
        // The receiver is dropped right away: the PONG is discarded when
        // the reader resolves the slot.
        if pending_tx.send(request).await.is_err() {
            return;
        }
    }
}
