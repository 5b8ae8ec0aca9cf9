pub mod del;
pub mod exists;
pub mod flushdb;
pub mod get;
pub mod getset;
pub mod keys;
pub mod ping;
pub mod rename;
pub mod renamenx;
pub mod set;
pub mod setnx;
pub mod strlen;
pub mod type_;

use std::collections::HashMap;

use bytes::Bytes;

use crate::db::Db;
use crate::frame::Frame;

/// A command executor. `args` excludes the command name itself, so `SET k v`
/// dispatches with `["k", "v"]`.
pub type CommandFn = fn(&Db, &[Bytes]) -> Frame;

pub struct CommandSpec {
    pub exec: CommandFn,
    /// Allowed argument count, counting the command name: `arity >= 0`
    /// requires exactly that many, `arity < 0` requires at least `-arity`.
    /// `GET` is 2, `DEL` is -2.
    pub arity: i32,
}

impl CommandSpec {
    pub fn arity_matches(&self, argc: usize) -> bool {
        if self.arity >= 0 {
            argc == self.arity as usize
        } else {
            argc >= (-self.arity) as usize
        }
    }
}

/// The name to executor table. Populated once at startup by each command
/// module's `register` hook and read-only afterwards, so lookups take no
/// lock.
pub struct CommandRegistry {
    table: HashMap<String, CommandSpec>,
}

impl CommandRegistry {
    pub fn new() -> CommandRegistry {
        CommandRegistry {
            table: HashMap::new(),
        }
    }

    /// Builds the registry with every supported command.
    pub fn standard() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        del::register(&mut registry);
        exists::register(&mut registry);
        flushdb::register(&mut registry);
        get::register(&mut registry);
        getset::register(&mut registry);
        keys::register(&mut registry);
        ping::register(&mut registry);
        rename::register(&mut registry);
        renamenx::register(&mut registry);
        set::register(&mut registry);
        setnx::register(&mut registry);
        strlen::register(&mut registry);
        type_::register(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, exec: CommandFn, arity: i32) {
        self.table
            .insert(name.to_lowercase(), CommandSpec { exec, arity });
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandSpec> {
        self.table.get(name)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::CommandRegistry;
    use crate::db::Db;

    /// A DB over a fresh store with the standard registry, for command
    /// unit tests.
    pub fn fresh_db() -> Db {
        Db::new(0, Arc::new(CommandRegistry::standard()))
    }

    pub fn args(parts: &[&str]) -> Vec<Bytes> {
        parts
            .iter()
            .map(|part| Bytes::copy_from_slice(part.as_bytes()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_lowercase_only() {
        let registry = CommandRegistry::standard();
        assert!(registry.lookup("get").is_some());
        assert!(registry.lookup("GET").is_none());
    }

    #[test]
    fn arity_semantics() {
        let exact = CommandSpec {
            exec: |_, _| Frame::ok(),
            arity: 2,
        };
        assert!(exact.arity_matches(2));
        assert!(!exact.arity_matches(1));
        assert!(!exact.arity_matches(3));

        let at_least = CommandSpec {
            exec: |_, _| Frame::ok(),
            arity: -2,
        };
        assert!(at_least.arity_matches(2));
        assert!(at_least.arity_matches(5));
        assert!(!at_least.arity_matches(1));
    }
}
