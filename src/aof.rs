use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Mutex;
use std::thread;

use bytes::Bytes;

use tracing::{error, info, warn};

use crate::codec::FrameReader;
use crate::connection::ClientState;
use crate::engine::StandaloneEngine;
use crate::frame::Frame;

/// Capacity of the queue between executors and the writer. Enqueueing into
/// a full queue blocks the executor, which is the backpressure we want.
const AOF_QUEUE_SIZE: usize = 1 << 16;

struct Payload {
    db_index: usize,
    cmdline: Vec<Bytes>,
}

enum Message {
    Record(Payload),
    // Drains the queue, then acknowledges so `close` can return once every
    // record ahead of it is on disk.
    Shutdown(SyncSender<()>),
}

/// The executor-facing handle: one per database, cheap to clone.
#[derive(Clone)]
pub struct AofSender {
    tx: SyncSender<Message>,
}

impl AofSender {
    pub fn append(&self, db_index: usize, cmdline: Vec<Bytes>) {
        // A send error means the writer already shut down; the record is
        // dropped, like any other best-effort write failure.
        let _ = self.tx.send(Message::Record(Payload { db_index, cmdline }));
    }
}

/// Append-only-file persistence: replays the existing log on startup, then
/// owns the file handle through a single writer thread fed by a bounded
/// channel.
pub struct Aof {
    tx: SyncSender<Message>,
    writer: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Aof {
    /// Replays `path` through `engine`, then opens it for appending. The
    /// engine must not have append hooks installed yet or replay would
    /// re-log every record.
    pub async fn new(path: &str, engine: &StandaloneEngine) -> crate::Result<Aof> {
        replay(path, engine).await;

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .read(true)
            .mode(0o600)
            .open(path)?;

        let (tx, rx) = sync_channel(AOF_QUEUE_SIZE);
        let handle = thread::spawn(move || write_loop(file, rx));

        Ok(Aof {
            tx,
            writer: Mutex::new(Some(handle)),
        })
    }

    pub fn sender(&self) -> AofSender {
        AofSender {
            tx: self.tx.clone(),
        }
    }

    /// Flushes everything queued so far and stops the writer. Records
    /// enqueued after this point are dropped.
    pub fn close(&self) {
        let (ack_tx, ack_rx) = sync_channel(1);
        if self.tx.send(Message::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
        if let Ok(mut writer) = self.writer.lock() {
            if let Some(handle) = writer.take() {
                let _ = handle.join();
            }
        }
    }
}

/// The writer keeps track of which database the previous record targeted
/// and emits a synthetic `SELECT n` whenever the context changes, so the
/// log replays into the right keyspaces.
fn write_loop(mut file: File, rx: Receiver<Message>) {
    let mut current_db = 0usize;

    while let Ok(message) = rx.recv() {
        let payload = match message {
            Message::Record(payload) => payload,
            Message::Shutdown(ack) => {
                let _ = file.flush();
                let _ = ack.send(());
                return;
            }
        };

        if payload.db_index != current_db {
            let select = Frame::from_cmdline(&[
                Bytes::from_static(b"SELECT"),
                Bytes::from(payload.db_index.to_string()),
            ]);
            if let Err(err) = file.write_all(&select.serialize()) {
                warn!("aof: failed to write SELECT record: {}", err);
                // Without the context switch the record would land in the
                // wrong database; skip it.
                continue;
            }
            current_db = payload.db_index;
        }

        let record = Frame::from_cmdline(&payload.cmdline);
        if let Err(err) = file.write_all(&record.serialize()) {
            warn!("aof: failed to write record: {}", err);
        }
    }
}

/// Re-executes the log against `engine` through a synthetic client, so
/// `SELECT n` records restore the write context exactly as a client would.
async fn replay(path: &str, engine: &StandaloneEngine) {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            warn!("aof: no log to replay at {}: {}", path, err);
            return;
        }
    };

    let mut reader = FrameReader::new(file);
    let state = ClientState::new();
    let mut replayed = 0usize;

    loop {
        let frame = match reader.read_frame().await {
            Ok(Some(frame)) => frame,
            // Clean end of log.
            Ok(None) => break,
            Err(err) if err.is_terminal() => {
                error!("aof: replay stopped early: {}", err);
                break;
            }
            Err(err) => {
                error!("aof: parse error in log: {}", err);
                continue;
            }
        };

        let cmdline = match frame.into_cmdline() {
            Some(cmdline) if !cmdline.is_empty() => cmdline,
            _ => {
                warn!("aof: skipping non multi-bulk record");
                continue;
            }
        };

        let reply = engine.exec(&state, &cmdline);
        if let Frame::Error(err) = reply {
            error!("aof: replayed command failed: {}", err);
        }
        replayed += 1;
    }

    info!("aof: replayed {} records from {}", replayed, path);
}
