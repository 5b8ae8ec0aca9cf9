use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    // Variadic for compatibility: extra arguments are accepted and ignored.
    registry.register("flushdb", flushdb, -1);
}

// https://redis.io/commands/flushdb
pub fn flushdb(db: &Db, _args: &[Bytes]) -> Frame {
    db.flush();
    db.log("FLUSHDB", &[]);
    Frame::ok()
}
