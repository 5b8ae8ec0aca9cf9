use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("exists", exists, -2);
}

// https://redis.io/commands/exists
pub fn exists(db: &Db, args: &[Bytes]) -> Frame {
    let count = args
        .iter()
        .filter(|arg| db.store().exists(&String::from_utf8_lossy(arg)))
        .count();

    Frame::Integer(count as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{args, fresh_db};

    #[test]
    fn counts_existing_keys() {
        let db = fresh_db();
        db.exec(&args(&["SET", "a", "1"]));
        db.exec(&args(&["SET", "b", "2"]));

        assert_eq!(
            db.exec(&args(&["EXISTS", "a", "b", "missing"])),
            Frame::Integer(2)
        );
    }
}
