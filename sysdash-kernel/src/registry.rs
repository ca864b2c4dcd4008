/**
 * NODE REGISTRY - Directory of every node this process knows about
 *
 * ROLE: the local node (always present) plus remote nodes that registered
 * or were seeded from the config, keyed by `host:port`.
 *
 * CONCURRENCY: one RwLock around all entries. `register` updates under the
 * write lock, so readers see an entry either before or after the update.
 * Nothing is persisted; the registry lives as long as the process.
 */

use crate::node::{node_key, unix_now, Node};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

struct Entries {
    local: Node,
    remote: HashMap<String, Node>,
}

pub struct NodeRegistry {
    entries: RwLock<Entries>,
    local_key: String,
}

impl NodeRegistry {
    /// The local node's key is fixed here and never changes afterwards
    pub fn new(local: Node) -> Self {
        let local_key = local.key();
        info!("Registry created with local node {} ({})", local_key, local.name);
        Self {
            entries: RwLock::new(Entries { local, remote: HashMap::new() }),
            local_key,
        }
    }

    /// Insert or refresh the node at `host:port`.
    ///
    /// An existing entry keeps its identity: only `name` and
    /// `last_registered` change.
    pub fn register(&self, name: &str, host: &str, port: u16) -> Node {
        let key = node_key(host, port);
        let now = unix_now();
        let mut entries = self.entries.write();

        let node = if key == self.local_key {
            &mut entries.local
        } else {
            entries
                .remote
                .entry(key.clone())
                .or_insert_with(|| {
                    info!("New node registered: {} ({})", key, name);
                    Node::remote(name, host, port, now)
                })
        };

        node.name = name.to_string();
        node.last_registered = now;
        debug!("Node {} refreshed at {}", key, now);
        node.clone()
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        let entries = self.entries.read();
        if key == self.local_key {
            return Some(entries.local.clone());
        }
        entries.remote.get(key).cloned()
    }

    /// Point-in-time copy of all entries
    pub fn list(&self) -> HashMap<String, Node> {
        let entries = self.entries.read();
        let mut all = entries.remote.clone();
        all.insert(self.local_key.clone(), entries.local.clone());
        all
    }

    pub fn local_node(&self) -> Node {
        self.entries.read().local.clone()
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn len(&self) -> usize {
        self.entries.read().remote.len() + 1
    }

    /// Never true: the local node is always present
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LocalNode;
    use std::sync::Arc;

    fn registry() -> NodeRegistry {
        let empty: [&str; 0] = [];
        NodeRegistry::new(Node::local("master", "0.0.0.0", 5000, LocalNode::new(&empty)))
    }

    #[test]
    fn test_local_node_is_added() {
        let reg = registry();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.local_key(), "0.0.0.0:5000");
        assert!(reg.get("0.0.0.0:5000").unwrap().is_local());
        assert!(reg.local_node().is_local());
    }

    #[test]
    fn test_register_node_creates_proper_node() {
        let reg = registry();
        let now = unix_now();
        let node = reg.register("examplehost", "example.org", 5000);
        assert_eq!(node.host, "example.org");
        assert_eq!(node.port, 5000);
        assert_eq!(node.name, "examplehost");
        assert!(node.last_registered >= now);
        assert!(!node.is_local());
    }

    #[test]
    fn test_reregister_node_is_idempotent() {
        let reg = registry();
        let first = reg.register("node-a", "10.0.0.1", 5000);
        let second = reg.register("node-a-renamed", "10.0.0.1", 5000);

        assert_eq!(reg.len(), 2);
        assert!(second.last_registered >= first.last_registered);
        let stored = reg.get("10.0.0.1:5000").unwrap();
        assert_eq!(stored.name, "node-a-renamed");
        assert_eq!(stored.last_registered, second.last_registered);
    }

    #[test]
    fn test_key_uniqueness() {
        let reg = registry();
        let registrations = [
            ("a", "10.0.0.1", 5000),
            ("b", "10.0.0.1", 5001),
            ("c", "10.0.0.2", 5000),
            ("a", "10.0.0.1", 5000),
            ("c2", "10.0.0.2", 5000),
        ];
        for (name, host, port) in registrations {
            reg.register(name, host, port);
        }
        assert_eq!(reg.len(), 3 + 1);
        assert_eq!(reg.list().len(), reg.len());
    }

    #[test]
    fn test_get_all_nodes() {
        let reg = registry();
        reg.register("examplehost", "example.org", 5000);
        let nodes = reg.list();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.contains_key("example.org:5000"));
        assert!(nodes.contains_key("0.0.0.0:5000"));
        assert!(reg.get("missing:1").is_none());
    }

    #[test]
    fn test_registering_local_key_keeps_local_metrics() {
        let reg = registry();
        let node = reg.register("renamed", "0.0.0.0", 5000);
        assert!(node.is_local());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.local_node().name, "renamed");
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let reg = registry();
        let before = reg.list();
        reg.register("late", "10.0.0.9", 5000);
        assert_eq!(before.len(), 1);
        assert_eq!(reg.list().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_registrations() {
        let reg = Arc::new(registry());
        let mut handles = Vec::new();
        for i in 0..16u16 {
            let reg = reg.clone();
            handles.push(tokio::spawn(async move {
                // every task hits the same four keys
                reg.register(&format!("n{}", i), "10.0.0.1", 6000 + (i % 4));
                reg.list().len()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap() >= 2);
        }
        assert_eq!(reg.len(), 4 + 1);
    }
}
