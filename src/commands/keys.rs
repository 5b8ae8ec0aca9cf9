use bytes::Bytes;
use glob_match::glob_match;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("keys", keys, 2);
}

// https://redis.io/commands/keys
pub fn keys(db: &Db, args: &[Bytes]) -> Frame {
    let pattern = String::from_utf8_lossy(&args[0]).into_owned();

    let mut matches = vec![];
    db.store().for_each(|key, _| {
        if glob_match(&pattern, key) {
            matches.push(Frame::Bulk(Bytes::copy_from_slice(key.as_bytes())));
        }
    });

    Frame::Array(matches)
}
