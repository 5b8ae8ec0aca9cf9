use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use tracing::error;

use crate::aof::Aof;
use crate::cluster::ClusterEngine;
use crate::commands::CommandRegistry;
use crate::config::Config;
use crate::connection::ClientState;
use crate::db::Db;
use crate::frame::Frame;

const DEFAULT_DATABASES: usize = 16;

/// The command engine a connection handler talks to: either a standalone
/// multi-database engine or a cluster node wrapping one.
pub enum Engine {
    Standalone(StandaloneEngine),
    Cluster(Arc<ClusterEngine>),
}

impl Engine {
    pub async fn new(config: &Config) -> crate::Result<Engine> {
        if config.cluster_mode() {
            let cluster = ClusterEngine::new(config).await?;
            Ok(Engine::Cluster(Arc::new(cluster)))
        } else {
            let standalone = StandaloneEngine::new(config).await?;
            Ok(Engine::Standalone(standalone))
        }
    }

    pub async fn exec(&self, state: &Arc<ClientState>, cmdline: Vec<Bytes>) -> Frame {
        match self {
            Engine::Standalone(engine) => engine.exec(state, &cmdline),
            Engine::Cluster(engine) => engine.clone().exec(state.clone(), cmdline).await,
        }
    }

    pub fn after_client_close(&self, state: &Arc<ClientState>) {
        match self {
            Engine::Standalone(engine) => engine.after_client_close(state),
            Engine::Cluster(engine) => engine.after_client_close(state),
        }
    }

    pub fn close(&self) {
        match self {
            Engine::Standalone(engine) => engine.close(),
            Engine::Cluster(engine) => engine.close(),
        }
    }
}

/// Owns the fixed set of logical databases and reserves `SELECT` as the
/// one command handled above the per-DB layer.
pub struct StandaloneEngine {
    dbs: Vec<Arc<Db>>,
    aof: Option<Aof>,
}

impl StandaloneEngine {
    pub async fn new(config: &Config) -> crate::Result<StandaloneEngine> {
        let registry = Arc::new(CommandRegistry::standard());

        let databases = if config.databases == 0 {
            DEFAULT_DATABASES
        } else {
            config.databases
        };
        let dbs: Vec<Arc<Db>> = (0..databases)
            .map(|index| Arc::new(Db::new(index, registry.clone())))
            .collect();

        let mut engine = StandaloneEngine { dbs, aof: None };

        if config.appendonly {
            // Replay runs before the hooks are installed, so recovered
            // commands do not re-log themselves.
            let aof = Aof::new(&config.appendfilename, &engine).await?;
            for db in &engine.dbs {
                db.install_aof(aof.sender());
            }
            engine.aof = Some(aof);
        }

        Ok(engine)
    }

    /// Executes one command line for the given client. `SELECT` mutates the
    /// client's database index; everything else goes to the selected DB.
    pub fn exec(&self, state: &ClientState, cmdline: &[Bytes]) -> Frame {
        let name = match cmdline.first() {
            Some(head) => String::from_utf8_lossy(head).to_lowercase(),
            None => return Frame::err("ERR unknown"),
        };

        if name == "select" {
            if cmdline.len() != 2 {
                return Frame::arg_num_err("select");
            }
            return self.exec_select(state, &cmdline[1]);
        }

        let db = &self.dbs[state.db_index()];

        // One misbehaving executor must not take the server down; a panic
        // surfaces as an UNKNOWN error reply on this connection only.
        match panic::catch_unwind(AssertUnwindSafe(|| db.exec(cmdline))) {
            Ok(reply) => reply,
            Err(cause) => {
                error!("executor panicked running '{}': {:?}", name, cause);
                Frame::err("ERR unknown")
            }
        }
    }

    fn exec_select(&self, state: &ClientState, arg: &Bytes) -> Frame {
        let index = match std::str::from_utf8(arg)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            Some(index) => index,
            None => return Frame::err("ERR invalid DB index"),
        };

        if index >= self.dbs.len() {
            return Frame::err("ERR DB index is out of range");
        }

        state.select_db(index);
        Frame::ok()
    }

    pub fn db(&self, index: usize) -> &Arc<Db> {
        &self.dbs[index]
    }

    pub fn database_count(&self) -> usize {
        self.dbs.len()
    }

    pub fn after_client_close(&self, _state: &Arc<ClientState>) {}

    pub fn close(&self) {
        if let Some(aof) = &self.aof {
            aof.close();
        }
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

    async fn engine() -> StandaloneEngine {
        StandaloneEngine::new(&Config::default()).await.unwrap()
    }

    #[tokio::test]
    async fn select_isolates_databases() {
        let engine = engine().await;
        let state = ClientState::new();

        assert_eq!(engine.exec(&state, &cmd(&["SELECT", "1"])), Frame::ok());
        assert_eq!(engine.exec(&state, &cmd(&["SET", "k", "v1"])), Frame::ok());
        assert_eq!(engine.exec(&state, &cmd(&["SELECT", "0"])), Frame::ok());
        assert_eq!(engine.exec(&state, &cmd(&["GET", "k"])), Frame::Null);
    }

    #[tokio::test]
    async fn select_rejects_bad_indexes() {
        let engine = engine().await;
        let state = ClientState::new();

        assert_eq!(
            engine.exec(&state, &cmd(&["SELECT", "abc"])),
            Frame::err("ERR invalid DB index")
        );
        assert_eq!(
            engine.exec(&state, &cmd(&["SELECT", "-1"])),
            Frame::err("ERR invalid DB index")
        );
        assert_eq!(
            engine.exec(&state, &cmd(&["SELECT", "16"])),
            Frame::err("ERR DB index is out of range")
        );
        assert_eq!(
            engine.exec(&state, &cmd(&["SELECT"])),
            Frame::arg_num_err("select")
        );
        assert_eq!(state.db_index(), 0);
    }

    #[tokio::test]
    async fn executor_panics_become_unknown_error_replies() {
        let mut registry = CommandRegistry::standard();
        registry.register("boom", |_, _| panic!("kaboom"), 1);
        let registry = Arc::new(registry);

        let dbs = vec![Arc::new(Db::new(0, registry))];
        let engine = StandaloneEngine { dbs, aof: None };
        let state = ClientState::new();

        assert_eq!(
            engine.exec(&state, &cmd(&["BOOM"])),
            Frame::err("ERR unknown")
        );
        // The engine keeps serving afterwards.
        assert_eq!(engine.exec(&state, &cmd(&["PING"])), Frame::pong());
    }

    #[tokio::test]
    async fn unknown_and_arity_errors_pass_through() {
        let engine = engine().await;
        let state = ClientState::new();

        assert_eq!(
            engine.exec(&state, &cmd(&["WAT"])),
            Frame::err("ERR unknown command 'wat'")
        );
        assert_eq!(
            engine.exec(&state, &cmd(&["GET"])),
            Frame::err("ERR wrong number of arguments for 'get' command")
        );
    }
}
