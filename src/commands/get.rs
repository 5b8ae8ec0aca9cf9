use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;
use crate::store::Entity;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("get", get, 2);
}

// https://redis.io/commands/get
pub fn get(db: &Db, args: &[Bytes]) -> Frame {
    let key = String::from_utf8_lossy(&args[0]);

    match db.get_entity(&key) {
        Some(Entity::String(value)) => Frame::Bulk(value),
        None => Frame::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{args, fresh_db};

    #[test]
    fn missing_key_is_null_bulk() {
        let db = fresh_db();
        assert_eq!(db.exec(&args(&["GET", "nope"])), Frame::Null);
    }

    #[test]
    fn returns_stored_value() {
        let db = fresh_db();
        db.put_entity("foo".into(), Entity::String(Bytes::from("bar")));
        assert_eq!(
            db.exec(&args(&["GET", "foo"])),
            Frame::Bulk(Bytes::from("bar"))
        );
    }
}
