use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;
use crate::store::Entity;

pub(crate) fn register(registry: &mut CommandRegistry) {
    // Variadic so trailing options are tolerated; only key and value are
    // interpreted.
    registry.register("set", set, -3);
}

// https://redis.io/commands/set
pub fn set(db: &Db, args: &[Bytes]) -> Frame {
    let key = String::from_utf8_lossy(&args[0]).into_owned();
    let value = args[1].clone();

    db.put_entity(key, Entity::String(value));
    db.log("SET", args);
    Frame::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{args, fresh_db};

    #[test]
    fn stores_the_value() {
        let db = fresh_db();
        assert_eq!(db.exec(&args(&["SET", "foo", "bar"])), Frame::ok());
        assert_eq!(
            db.get_entity("foo"),
            Some(Entity::String(Bytes::from("bar")))
        );
    }

    #[test]
    fn overwrites_existing_value() {
        let db = fresh_db();
        db.exec(&args(&["SET", "foo", "one"]));
        db.exec(&args(&["SET", "foo", "two"]));
        assert_eq!(
            db.get_entity("foo"),
            Some(Entity::String(Bytes::from("two")))
        );
    }
}
