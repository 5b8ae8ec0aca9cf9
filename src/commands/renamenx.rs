use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("renamenx", renamenx, 3);
}

// https://redis.io/commands/renamenx
pub fn renamenx(db: &Db, args: &[Bytes]) -> Frame {
    let src = String::from_utf8_lossy(&args[0]).into_owned();
    let dst = String::from_utf8_lossy(&args[1]).into_owned();

    if db.get_entity(&dst).is_some() {
        return Frame::Integer(0);
    }

    let entity = match db.get_entity(&src) {
        Some(entity) => entity,
        None => return Frame::err("no such key"),
    };

    db.remove(&src);
    db.put_entity(dst, entity);
    db.log("RENAMENX", args);
    Frame::Integer(1)
}
