use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Edges {
    trainer_by_client: HashMap<i64, i64>,
    clients_by_trainer: HashMap<i64, HashSet<i64>>,
}

/// Who trains whom. A client has at most one trainer; a trainer has any
/// number of clients. Both directions live under one lock so readers never
/// observe half an assignment.
#[derive(Default)]
pub struct RelationshipGraph {
    edges: RwLock<Edges>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links a client to a trainer, displacing the client's previous
    /// trainer if any.
    pub fn assign(&self, trainer_id: i64, client_id: i64) {
        let mut edges = self.edges.write().unwrap();
        if let Some(previous) = edges.trainer_by_client.insert(client_id, trainer_id) {
            if previous != trainer_id {
                if let Some(clients) = edges.clients_by_trainer.get_mut(&previous) {
                    clients.remove(&client_id);
                    if clients.is_empty() {
                        edges.clients_by_trainer.remove(&previous);
                    }
                }
                debug!("client {client_id} moved from trainer {previous} to {trainer_id}");
            }
        }
        edges
            .clients_by_trainer
            .entry(trainer_id)
            .or_default()
            .insert(client_id);
    }

    /// Removes the client's training edge. Returns whether one existed.
    pub fn unassign(&self, client_id: i64) -> bool {
        let mut edges = self.edges.write().unwrap();
        let Some(trainer_id) = edges.trainer_by_client.remove(&client_id) else {
            return false;
        };
        if let Some(clients) = edges.clients_by_trainer.get_mut(&trainer_id) {
            clients.remove(&client_id);
            if clients.is_empty() {
                edges.clients_by_trainer.remove(&trainer_id);
            }
        }
        true
    }

    pub fn trainer_of(&self, client_id: i64) -> Option<i64> {
        self.edges.read().unwrap().trainer_by_client.get(&client_id).copied()
    }

    /// Sorted for stable iteration in logs and tests.
    pub fn clients_of(&self, trainer_id: i64) -> Vec<i64> {
        let edges = self.edges.read().unwrap();
        let mut clients: Vec<i64> = edges
            .clients_by_trainer
            .get(&trainer_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        clients.sort_unstable();
        clients
    }

    pub fn edge_count(&self) -> usize {
        self.edges.read().unwrap().trainer_by_client.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_links_both_directions() {
        let graph = RelationshipGraph::new();
        graph.assign(10, 1);
        graph.assign(10, 2);

        assert_eq!(graph.trainer_of(1), Some(10));
        assert_eq!(graph.clients_of(10), vec![1, 2]);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_reassign_displaces_previous_trainer() {
        let graph = RelationshipGraph::new();
        graph.assign(10, 1);
        graph.assign(20, 1);

        assert_eq!(graph.trainer_of(1), Some(20));
        assert!(graph.clients_of(10).is_empty());
        assert_eq!(graph.clients_of(20), vec![1]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_reassign_to_same_trainer_is_stable() {
        let graph = RelationshipGraph::new();
        graph.assign(10, 1);
        graph.assign(10, 1);

        assert_eq!(graph.trainer_of(1), Some(10));
        assert_eq!(graph.clients_of(10), vec![1]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_unassign_clears_both_directions() {
        let graph = RelationshipGraph::new();
        graph.assign(10, 1);

        assert!(graph.unassign(1));
        assert!(!graph.unassign(1));
        assert_eq!(graph.trainer_of(1), None);
        assert!(graph.clients_of(10).is_empty());
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_unknown_users_have_no_edges() {
        let graph = RelationshipGraph::new();
        assert_eq!(graph.trainer_of(99), None);
        assert!(graph.clients_of(99).is_empty());
    }
}
