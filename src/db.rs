use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::aof::AofSender;
use crate::commands::CommandRegistry;
use crate::frame::Frame;
use crate::store::{Entity, Store};

/// One logical database: an index, its key space and the append-only-file
/// hook the executors write through when they mutate.
pub struct Db {
    index: usize,
    store: Store,
    registry: Arc<CommandRegistry>,
    // Left empty while the AOF is disabled and during replay, so replayed
    // commands do not re-log themselves.
    aof: OnceLock<AofSender>,
}

impl Db {
    pub fn new(index: usize, registry: Arc<CommandRegistry>) -> Db {
        Db {
            index,
            store: Store::new(),
            registry,
            aof: OnceLock::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Executes one command line against this database: registry lookup,
    /// arity validation, dispatch.
    pub fn exec(&self, cmdline: &[Bytes]) -> Frame {
        let name = String::from_utf8_lossy(&cmdline[0]).to_lowercase();

        let spec = match self.registry.lookup(&name) {
            Some(spec) => spec,
            None => return Frame::err(format!("ERR unknown command '{}'", name)),
        };
        if !spec.arity_matches(cmdline.len()) {
            return Frame::arg_num_err(&name);
        }

        (spec.exec)(self, &cmdline[1..])
    }

    /// Installs the append hook once the AOF file is open and replayed.
    pub fn install_aof(&self, sender: AofSender) {
        let _ = self.aof.set(sender);
    }

    /// Records a mutation in the append-only log, reconstructing the full
    /// command line from the canonical name and the executor's arguments.
    pub(crate) fn log(&self, name: &str, args: &[Bytes]) {
        if let Some(aof) = self.aof.get() {
            let mut cmdline = Vec::with_capacity(args.len() + 1);
            cmdline.push(Bytes::copy_from_slice(name.as_bytes()));
            cmdline.extend_from_slice(args);
            aof.append(self.index, cmdline);
        }
    }

    /* ---- data access used by the executors ---- */

    pub fn get_entity(&self, key: &str) -> Option<Entity> {
        self.store.get(key)
    }

    pub fn put_entity(&self, key: String, entity: Entity) -> usize {
        self.store.put(key, entity)
    }

    pub fn put_if_absent(&self, key: String, entity: Entity) -> usize {
        self.store.put_if_absent(key, entity)
    }

    pub fn put_if_exists(&self, key: String, entity: Entity) -> usize {
        self.store.put_if_exists(key, entity)
    }

    pub fn remove(&self, key: &str) -> Option<Entity> {
        self.store.remove(key)
    }

    /// Removes every present key; returns how many existed.
    pub fn removes(&self, keys: impl Iterator<Item = String>) -> usize {
        keys.filter(|key| self.store.remove(key).is_some()).count()
    }

    pub fn flush(&self) {
        self.store.clear();
    }
}
