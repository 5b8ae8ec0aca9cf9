use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("rename", rename, 3);
}

// https://redis.io/commands/rename
pub fn rename(db: &Db, args: &[Bytes]) -> Frame {
    let src = String::from_utf8_lossy(&args[0]).into_owned();
    let dst = String::from_utf8_lossy(&args[1]).into_owned();

    let entity = match db.get_entity(&src) {
        Some(entity) => entity,
        None => return Frame::err("no such key"),
    };

    db.put_entity(dst, entity);
    db.remove(&src);
    db.log("RENAME", args);
    Frame::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{args, fresh_db};
    use crate::store::Entity;

    #[test]
    fn moves_the_entity() {
        let db = fresh_db();
        db.exec(&args(&["SET", "src", "v"]));

        assert_eq!(db.exec(&args(&["RENAME", "src", "dst"])), Frame::ok());
        assert!(db.get_entity("src").is_none());
        assert_eq!(db.get_entity("dst"), Some(Entity::String(Bytes::from("v"))));
    }

    #[test]
    fn missing_source_is_an_error() {
        let db = fresh_db();
        assert_eq!(
            db.exec(&args(&["RENAME", "ghost", "dst"])),
            Frame::err("no such key")
        );
    }

    #[test]
    fn overwrites_existing_destination() {
        let db = fresh_db();
        db.exec(&args(&["SET", "src", "new"]));
        db.exec(&args(&["SET", "dst", "old"]));

        assert_eq!(db.exec(&args(&["RENAME", "src", "dst"])), Frame::ok());
        assert_eq!(
            db.get_entity("dst"),
            Some(Entity::String(Bytes::from("new")))
        );
    }
}
