use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;
use crate::store::Entity;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("setnx", setnx, 3);
}

// https://redis.io/commands/setnx
pub fn setnx(db: &Db, args: &[Bytes]) -> Frame {
    let key = String::from_utf8_lossy(&args[0]).into_owned();
    let value = args[1].clone();

    let inserted = db.put_if_absent(key, Entity::String(value));
    db.log("SETNX", args);
    Frame::Integer(inserted as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{args, fresh_db};

    #[test]
    fn sets_only_when_absent() {
        let db = fresh_db();
        assert_eq!(db.exec(&args(&["SETNX", "k", "one"])), Frame::Integer(1));
        assert_eq!(db.exec(&args(&["SETNX", "k", "two"])), Frame::Integer(0));
        assert_eq!(db.get_entity("k"), Some(Entity::String(Bytes::from("one"))));
    }
}
