use std::io;

use tokio::sync::Mutex;

use super::client::PeerClient;

/// Idle clients kept per peer; returns beyond this are dropped, which
/// closes the underlying connection.
const MAX_IDLE: usize = 8;

/// A borrow-exclusive pool of pipelined clients for one peer address.
/// Borrowing pops an idle client or dials a new one; a borrowed client is
/// never shared, so relayed `SELECT`s from different callers cannot
/// interleave.
pub struct Pool {
    addr: String,
    idle: Mutex<Vec<PeerClient>>,
}

impl Pool {
    pub fn new(addr: String) -> Pool {
        Pool {
            addr,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub async fn get(&self) -> io::Result<PeerClient> {
        if let Some(client) = self.idle.lock().await.pop() {
            return Ok(client);
        }
        // No liveness validation here; clients reconnect on their own.
        PeerClient::connect(self.addr.clone()).await
    }

    pub async fn put(&self, client: PeerClient) {
        let mut idle = self.idle.lock().await;
        if idle.len() < MAX_IDLE {
            idle.push(client);
        }
        // Beyond the cap the client drops here and its tasks wind down.
    }
}
