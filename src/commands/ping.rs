use bytes::Bytes;

use crate::commands::CommandRegistry;
use crate::db::Db;
use crate::frame::Frame;

pub(crate) fn register(registry: &mut CommandRegistry) {
    registry.register("ping", ping, -1);
}

/// Returns PONG if no argument is provided, otherwise returns a copy of the
/// argument as a bulk.
///
// https://redis.io/commands/ping
pub fn ping(_db: &Db, args: &[Bytes]) -> Frame {
    match args {
        [] => Frame::pong(),
        [message] => Frame::Bulk(message.clone()),
        _ => Frame::arg_num_err("ping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{args, fresh_db};

    #[test]
    fn bare_ping_pongs() {
        let db = fresh_db();
        assert_eq!(db.exec(&args(&["PING"])), Frame::pong());
    }

    #[test]
    fn ping_echoes_its_argument() {
        let db = fresh_db();
        assert_eq!(
            db.exec(&args(&["PING", "hello"])),
            Frame::Bulk(Bytes::from("hello"))
        );
    }

    #[test]
    fn too_many_arguments_is_an_error() {
        let db = fresh_db();
        assert_eq!(
            db.exec(&args(&["PING", "a", "b"])),
            Frame::arg_num_err("ping")
        );
    }
}
