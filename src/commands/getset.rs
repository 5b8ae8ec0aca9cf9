use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;
use crate::store::Entity;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("getset", getset, 3);
}

// https://redis.io/commands/getset
pub fn getset(db: &Db, args: &[Bytes]) -> Frame {
    let key = String::from_utf8_lossy(&args[0]).into_owned();
    let value = args[1].clone();

    let previous = db.get_entity(&key);
    db.put_entity(key, Entity::String(value));
    db.log("GETSET", args);

    match previous {
        Some(Entity::String(old)) => Frame::Bulk(old),
        None => Frame::Null,
    }
}
