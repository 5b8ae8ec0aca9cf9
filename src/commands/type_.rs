use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("type", type_, 2);
}

// https://redis.io/commands/type
pub fn type_(db: &Db, args: &[Bytes]) -> Frame {
    let key = String::from_utf8_lossy(&args[0]);

    match db.get_entity(&key) {
        Some(entity) => Frame::Simple(entity.type_name().to_string()),
        None => Frame::Simple("none".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{args, fresh_db};

    #[test]
    fn string_keys_report_string() {
        let db = fresh_db();
        db.exec(&args(&["SET", "k", "v"]));
        assert_eq!(
            db.exec(&args(&["TYPE", "k"])),
            Frame::Simple("string".to_string())
        );
    }

    #[test]
    fn missing_keys_report_none() {
        let db = fresh_db();
        assert_eq!(
            db.exec(&args(&["TYPE", "nope"])),
            Frame::Simple("none".to_string())
        );
    }
}
