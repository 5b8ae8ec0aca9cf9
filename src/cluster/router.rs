/// How the cluster layer carries out one command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Execute on this node's own engine.
    Local,
    /// Route by the key in `args[1]` to its owning peer.
    KeyRouted,
    /// Both keys must hash to the same peer; relay there.
    SameSlot,
    /// Send to every node; any error reply fails the whole command.
    Broadcast,
    /// Send to every node and sum the integer replies.
    BroadcastSum,
}

/// The cluster-level command table. Commands absent here are not supported
/// in cluster mode.
pub fn route(name: &str) -> Option<Strategy> {
    let strategy = match name {
        "ping" | "select" => Strategy::Local,

        "get" | "set" | "setnx" | "getset" | "exists" | "type" => Strategy::KeyRouted,

        "rename" | "renamenx" => Strategy::SameSlot,

        "flushdb" => Strategy::Broadcast,

        "del" => Strategy::BroadcastSum,

        _ => return None,
    };
    Some(strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands_have_strategies() {
        assert_eq!(route("ping"), Some(Strategy::Local));
        assert_eq!(route("get"), Some(Strategy::KeyRouted));
        assert_eq!(route("rename"), Some(Strategy::SameSlot));
        assert_eq!(route("flushdb"), Some(Strategy::Broadcast));
        assert_eq!(route("del"), Some(Strategy::BroadcastSum));
    }

    #[test]
    fn unsupported_commands_route_nowhere() {
        assert_eq!(route("keys"), None);
        assert_eq!(route("flushall"), None);
        assert_eq!(route("subscribe"), None);
    }
}
