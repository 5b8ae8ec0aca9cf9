use std::collections::HashMap;

/// Consistent-hash ring mapping keys to the peer that owns them. Node
/// addresses are hashed once with CRC32-IEEE; a key routes to the first
/// node hash at or after its own, wrapping around the ring.
pub struct Ring {
    // Sorted ascending after every mutation.
    hashes: Vec<u32>,
    nodes: HashMap<u32, String>,
}

impl Ring {
    pub fn new() -> Ring {
        Ring {
            hashes: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn add_nodes<S: AsRef<str>>(&mut self, addrs: &[S]) {
        for addr in addrs {
            let addr = addr.as_ref();
            if addr.is_empty() {
                continue;
            }
            let hash = crc32fast::hash(addr.as_bytes());
            // On a hash collision the node inserted first keeps the slot.
            if self.nodes.contains_key(&hash) {
                continue;
            }
            self.hashes.push(hash);
            self.nodes.insert(hash, addr.to_string());
        }
        self.hashes.sort_unstable();
    }

    /// Picks the owning node for `key`; `None` on an empty ring (callers
    /// treat that as "route to self").
    pub fn pick_node(&self, key: &str) -> Option<&str> {
        if self.is_empty() {
            return None;
        }

        let hash = crc32fast::hash(key.as_bytes());
        let mut index = self.hashes.partition_point(|&node_hash| node_hash < hash);
        if index == self.hashes.len() {
            index = 0;
        }

        self.nodes.get(&self.hashes[index]).map(|addr| addr.as_str())
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_picks_nothing() {
        let ring = Ring::new();
        assert!(ring.is_empty());
        assert_eq!(ring.pick_node("any"), None);
    }

    #[test]
    fn picks_are_deterministic() {
        let mut ring = Ring::new();
        ring.add_nodes(&["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"]);

        for key in ["alpha", "beta", "gamma", "delta", ""] {
            let first = ring.pick_node(key).map(str::to_string);
            for _ in 0..8 {
                assert_eq!(ring.pick_node(key).map(str::to_string), first);
            }
        }
    }

    #[test]
    fn every_pick_is_a_member() {
        let nodes = ["a:1", "b:2", "c:3"];
        let mut ring = Ring::new();
        ring.add_nodes(&nodes);

        for i in 0..64 {
            let picked = ring.pick_node(&format!("key-{}", i)).unwrap();
            assert!(nodes.contains(&picked));
        }
    }

    #[test]
    fn single_node_owns_everything() {
        let mut ring = Ring::new();
        ring.add_nodes(&["only:1"]);

        for key in ["a", "b", "c", "zzzzz"] {
            assert_eq!(ring.pick_node(key), Some("only:1"));
        }
    }

    #[test]
    fn empty_addresses_are_skipped() {
        let mut ring = Ring::new();
        ring.add_nodes(&["", "real:1", ""]);
        assert_eq!(ring.pick_node("k"), Some("real:1"));
    }

    #[test]
    fn duplicate_addresses_keep_first_insert() {
        let mut ring = Ring::new();
        ring.add_nodes(&["node:1"]);
        ring.add_nodes(&["node:1"]);
        assert_eq!(ring.pick_node("k"), Some("node:1"));
    }

    #[test]
    fn wraps_around_past_the_highest_hash() {
        let mut ring = Ring::new();
        ring.add_nodes(&["a:1", "b:2"]);

        // Probe enough keys that both arcs of the ring are exercised,
        // including the wrap past the highest node hash.
        let mut seen = std::collections::HashSet::new();
        for i in 0..256 {
            seen.insert(ring.pick_node(&format!("probe-{}", i)).unwrap());
        }
        assert_eq!(seen.len(), 2);
    }
}
