//! Local/remote name mapping for one bridge

use dashmap::DashMap;

/// Outbound links map local → remote; inbound links map remote → local.
///
/// An inbound message whose remote name has no entry is never delivered.
#[derive(Debug, Default)]
pub struct NameMapping {
    outbound: DashMap<String, String>,
    inbound: DashMap<String, String>,
}

impl NameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_outbound(&self, local: &str, remote: &str) {
        self.outbound.insert(local.to_string(), remote.to_string());
    }

    pub fn map_inbound(&self, remote: &str, local: &str) {
        self.inbound.insert(remote.to_string(), local.to_string());
    }

    pub fn remote_for(&self, local: &str) -> Option<String> {
        self.outbound.get(local).map(|r| r.value().clone())
    }

    pub fn local_for(&self, remote: &str) -> Option<String> {
        self.inbound.get(remote).map(|l| l.value().clone())
    }

    pub fn unmap_outbound(&self, local: &str) {
        self.outbound.remove(local);
    }

    pub fn unmap_inbound(&self, remote: &str) {
        self.inbound.remove(remote);
    }

    pub fn clear(&self) {
        self.outbound.clear();
        self.inbound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions_are_independent() {
        let names = NameMapping::new();
        names.map_outbound("local.orders", "ORDERS.OUT");
        names.map_inbound("ORDERS.IN", "local.orders");

        assert_eq!(names.remote_for("local.orders").as_deref(), Some("ORDERS.OUT"));
        assert_eq!(names.local_for("ORDERS.IN").as_deref(), Some("local.orders"));
        assert!(names.local_for("ORDERS.OUT").is_none());
        assert!(names.remote_for("ORDERS.IN").is_none());
    }

    #[test]
    fn test_remap_and_clear() {
        let names = NameMapping::new();
        names.map_inbound("orders", "a");
        names.map_inbound("orders", "b");
        assert_eq!(names.local_for("orders").as_deref(), Some("b"));

        names.unmap_inbound("orders");
        assert!(names.local_for("orders").is_none());

        names.map_outbound("x", "y");
        names.clear();
        assert!(names.remote_for("x").is_none());
    }
}
