use dashmap::DashMap;
use std::collections::HashSet;

use super::event::EventCategory;

/// Per-user category filters. The model is opt-out: a user the table has
/// never seen receives every category, and an entry drained back to empty
/// behaves the same as no entry.
#[derive(Default)]
pub struct SubscriptionTable {
    filters: DashMap<i64, HashSet<EventCategory>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Narrows the user's traffic to the categories subscribed so far.
    pub fn subscribe(&self, user_id: i64, category: EventCategory) {
        self.filters.entry(user_id).or_default().insert(category);
    }

    /// Returns whether the category was in the user's filter. Dropping the
    /// last category removes the entry, restoring receive-all.
    pub fn unsubscribe(&self, user_id: i64, category: EventCategory) -> bool {
        let mut removed = false;
        let mut emptied = false;
        if let Some(mut entry) = self.filters.get_mut(&user_id) {
            removed = entry.remove(&category);
            emptied = entry.is_empty();
        }
        if emptied {
            self.filters
                .remove_if(&user_id, |_, filter| filter.is_empty());
        }
        removed
    }

    pub fn is_subscribed(&self, user_id: i64, category: EventCategory) -> bool {
        self.filters
            .get(&user_id)
            .map(|filter| filter.is_empty() || filter.contains(&category))
            .unwrap_or(true)
    }

    /// Total explicit category entries across all users.
    pub fn subscription_count(&self) -> usize {
        self.filters.iter().map(|entry| entry.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_users_receive_everything() {
        let table = SubscriptionTable::new();
        assert!(table.is_subscribed(1, EventCategory::MealCompleted));
        assert!(table.is_subscribed(1, EventCategory::System));
    }

    #[test]
    fn test_explicit_filter_narrows_traffic() {
        let table = SubscriptionTable::new();
        table.subscribe(1, EventCategory::DirectMessage);
        table.subscribe(1, EventCategory::UploadCompleted);

        assert!(table.is_subscribed(1, EventCategory::DirectMessage));
        assert!(table.is_subscribed(1, EventCategory::UploadCompleted));
        assert!(!table.is_subscribed(1, EventCategory::MealCompleted));
        assert_eq!(table.subscription_count(), 2);
    }

    #[test]
    fn test_draining_the_filter_restores_receive_all() {
        let table = SubscriptionTable::new();
        table.subscribe(1, EventCategory::DirectMessage);
        assert!(!table.is_subscribed(1, EventCategory::System));

        assert!(table.unsubscribe(1, EventCategory::DirectMessage));
        assert!(!table.unsubscribe(1, EventCategory::DirectMessage));
        assert!(table.is_subscribed(1, EventCategory::System));
        assert_eq!(table.subscription_count(), 0);
    }

    #[test]
    fn test_filters_are_per_user() {
        let table = SubscriptionTable::new();
        table.subscribe(1, EventCategory::DirectMessage);

        assert!(!table.is_subscribed(1, EventCategory::MealCompleted));
        assert!(table.is_subscribed(2, EventCategory::MealCompleted));
    }
}
