use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("del", del, -2);
}

// https://redis.io/commands/del
pub fn del(db: &Db, args: &[Bytes]) -> Frame {
    let keys = args
        .iter()
        .map(|arg| String::from_utf8_lossy(arg).into_owned());

    let deleted = db.removes(keys);
    if deleted > 0 {
        db.log("DEL", args);
    }

    Frame::Integer(deleted as i64)
}
