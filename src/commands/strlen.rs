use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;
use crate::store::Entity;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("strlen", strlen, 2);
}

// https://redis.io/commands/strlen
pub fn strlen(db: &Db, args: &[Bytes]) -> Frame {
    let key = String::from_utf8_lossy(&args[0]);

    match db.get_entity(&key) {
        Some(Entity::String(value)) => Frame::Integer(value.len() as i64),
        None => Frame::Null,
    }
}
