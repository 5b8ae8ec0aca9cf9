//! Server-side cluster, transparent to clients: connect to any node and
//! reach all data in the cluster. Each node runs a standalone engine for
//! the keys it owns and relays everything else to the owning peer.

pub mod client;
pub mod pool;
pub mod ring;
pub mod router;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::error;

use crate::config::Config;
use crate::connection::ClientState;
use crate::engine::StandaloneEngine;
use crate::frame::Frame;

use pool::Pool;
use ring::Ring;
use router::Strategy;

/// One node of the cluster: holds its share of the data and coordinates
/// with the peers for the rest.
pub struct ClusterEngine {
    self_addr: String,
    nodes: Vec<String>,
    ring: Ring,
    pools: HashMap<String, Pool>,
    local: StandaloneEngine,
}

impl ClusterEngine {
    pub async fn new(config: &Config) -> crate::Result<ClusterEngine> {
        let local = StandaloneEngine::new(config).await?;

        let mut nodes = Vec::with_capacity(config.peers.len() + 1);
        nodes.push(config.self_addr.clone());
        nodes.extend(config.peers.iter().cloned());

        let mut ring = Ring::new();
        ring.add_nodes(&nodes);

        let pools = config
            .peers
            .iter()
            .map(|peer| (peer.clone(), Pool::new(peer.clone())))
            .collect();

        Ok(ClusterEngine {
            self_addr: config.self_addr.clone(),
            nodes,
            ring,
            pools,
            local,
        })
    }

    /// Executes one command at the cluster level. Runs in its own task so a
    /// panic anywhere in the dispatch surfaces as an UNKNOWN error reply
    /// instead of tearing the handler down.
    pub async fn exec(self: Arc<Self>, state: Arc<ClientState>, cmdline: Vec<Bytes>) -> Frame {
        let engine = self;

        match tokio::spawn(async move { engine.dispatch(&state, cmdline).await }).await {
            Ok(reply) => reply,
            Err(err) => {
                error!("cluster dispatch failed: {}", err);
                Frame::err("ERR unknown")
            }
        }
    }

    async fn dispatch(&self, state: &ClientState, cmdline: Vec<Bytes>) -> Frame {
        let name = match cmdline.first() {
            Some(head) => String::from_utf8_lossy(head).to_lowercase(),
            None => return Frame::err("ERR unknown"),
        };

        let strategy = match router::route(&name) {
            Some(strategy) => strategy,
            None => {
                return Frame::err(format!(
                    "ERR unknown command '{}', or not supported in cluster mode",
                    name
                ))
            }
        };

        match strategy {
            Strategy::Local => self.local.exec(state, &cmdline),
            Strategy::KeyRouted => {
                if cmdline.len() < 2 {
                    return Frame::arg_num_err(&name);
                }
                let key = String::from_utf8_lossy(&cmdline[1]).into_owned();
                let peer = self.owner_of(&key);
                self.relay(&peer, state, &cmdline).await
            }
            Strategy::SameSlot => {
                if cmdline.len() != 3 {
                    return Frame::arg_num_err(&name);
                }
                let src = String::from_utf8_lossy(&cmdline[1]).into_owned();
                let dst = String::from_utf8_lossy(&cmdline[2]).into_owned();

                let src_peer = self.owner_of(&src);
                let dst_peer = self.owner_of(&dst);
                if src_peer != dst_peer {
                    return Frame::err("ERR rename must within one slot in cluster mode");
                }
                self.relay(&src_peer, state, &cmdline).await
            }
            Strategy::Broadcast => {
                for (_, reply) in self.broadcast(state, &cmdline).await {
                    if let Frame::Error(detail) = reply {
                        return Frame::err(format!("error occurs: {}", detail));
                    }
                }
                Frame::ok()
            }
            Strategy::BroadcastSum => {
                let mut sum = 0i64;
                for (_, reply) in self.broadcast(state, &cmdline).await {
                    match reply {
                        Frame::Integer(count) => sum += count,
                        Frame::Error(detail) => {
                            return Frame::err(format!("error occurs: {}", detail));
                        }
                        _ => return Frame::err("error occurs: unexpected reply type"),
                    }
                }
                Frame::Integer(sum)
            }
        }
    }

    fn owner_of(&self, key: &str) -> String {
        self.ring
            .pick_node(key)
            .unwrap_or(&self.self_addr)
            .to_string()
    }

    /// Forwards one command to `peer` and returns its reply verbatim. The
    /// borrowed client first selects the caller's database so the command
    /// runs in the right keyspace, and goes back to the pool on every path.
    async fn relay(&self, peer: &str, state: &ClientState, args: &[Bytes]) -> Frame {
        if peer == self.self_addr {
            return self.local.exec(state, args);
        }

        let pool = match self.pools.get(peer) {
            Some(pool) => pool,
            None => return Frame::err("connection factory not found"),
        };
        let peer_client = match pool.get().await {
            Ok(client) => client,
            Err(err) => return Frame::err(err.to_string()),
        };

        let select = vec![
            Bytes::from_static(b"SELECT"),
            Bytes::from(state.db_index().to_string()),
        ];
        let _ = peer_client.send(select).await;
        let reply = peer_client.send(args.to_vec()).await;

        pool.put(peer_client).await;
        reply
    }

    /// Relays one command to every node in the cluster, collecting each
    /// node's reply.
    async fn broadcast(&self, state: &ClientState, args: &[Bytes]) -> Vec<(String, Frame)> {
        let mut replies = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let reply = self.relay(node, state, args).await;
            replies.push((node.clone(), reply));
        }
        replies
    }

    /// This node's own engine, holding the share of the data it owns.
    pub fn local(&self) -> &StandaloneEngine {
        &self.local
    }

    pub fn after_client_close(&self, state: &Arc<ClientState>) {
        self.local.after_client_close(state);
    }

    pub fn close(&self) {
        self.local.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<Bytes> {
        parts
            .iter()
            .map(|p| Bytes::copy_from_slice(p.as_bytes()))
            .collect()
    }

    fn cluster_config(self_addr: &str, peers: &[&str]) -> Config {
        Config {
            self_addr: self_addr.to_string(),
            peers: peers.iter().map(|p| p.to_string()).collect(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn unknown_commands_are_rejected() {
        let config = cluster_config("127.0.0.1:16001", &["127.0.0.1:16002"]);
        let engine = Arc::new(ClusterEngine::new(&config).await.unwrap());
        let state = Arc::new(ClientState::new());

        let reply = engine.clone().exec(state.clone(), cmd(&["KEYS", "*"])).await;
        assert_eq!(
            reply,
            Frame::err("ERR unknown command 'keys', or not supported in cluster mode")
        );
    }

    #[tokio::test]
    async fn ping_and_select_stay_local() {
        let config = cluster_config("127.0.0.1:16003", &["127.0.0.1:16004"]);
        let engine = Arc::new(ClusterEngine::new(&config).await.unwrap());
        let state = Arc::new(ClientState::new());

        assert_eq!(
            engine.clone().exec(state.clone(), cmd(&["PING"])).await,
            Frame::pong()
        );
        assert_eq!(
            engine.clone().exec(state.clone(), cmd(&["SELECT", "2"])).await,
            Frame::ok()
        );
        assert_eq!(state.db_index(), 2);
    }

    #[tokio::test]
    async fn self_owned_keys_execute_locally() {
        // With no live peers, only keys the ring assigns to self can be
        // exercised; find one and round-trip it without any relaying.
        let self_addr = "127.0.0.1:16005";
        let config = cluster_config(self_addr, &["127.0.0.1:16006"]);
        let engine = Arc::new(ClusterEngine::new(&config).await.unwrap());
        let state = Arc::new(ClientState::new());

        let local_key = (0..1024)
            .map(|i| format!("key-{}", i))
            .find(|key| engine.ring.pick_node(key) == Some(self_addr))
            .expect("some key must hash to self");

        let reply = engine
            .clone()
            .exec(state.clone(), cmd(&["SET", &local_key, "v"]))
            .await;
        assert_eq!(reply, Frame::ok());
        assert_eq!(
            engine.clone().exec(state.clone(), cmd(&["GET", &local_key])).await,
            Frame::Bulk(Bytes::from("v"))
        );
    }
}
