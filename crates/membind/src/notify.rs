//! Change notification
//!
//! Observers subscribe to one field (or to every field) and are called
//! synchronously with a [`FieldChange`] when the binder sees a new value.

use std::fmt;

use crate::value::Value;

/// A field value changed
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    /// `None` on the first load after attach
    pub old: Option<Value>,
    pub new: Value,
}

/// Handle returned by subscribe, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type ChangeCallback = Box<dyn FnMut(&FieldChange) + Send>;

enum Topic {
    Field(String),
    All,
}

struct Subscriber {
    id: SubscriptionId,
    topic: Topic,
    callback: ChangeCallback,
}

impl Subscriber {
    fn wants(&self, field: &str) -> bool {
        match &self.topic {
            Topic::Field(name) => name == field,
            Topic::All => true,
        }
    }
}

#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, topic: Topic, callback: ChangeCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            topic,
            callback,
        });
        id
    }

    /// Subscribe to changes of a single field
    pub fn subscribe<F>(&mut self, field: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: FnMut(&FieldChange) + Send + 'static,
    {
        self.add(Topic::Field(field.into()), Box::new(callback))
    }

    /// Subscribe to changes of every field
    pub fn subscribe_all<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&FieldChange) + Send + 'static,
    {
        self.add(Topic::All, Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Deliver one change to every interested subscriber, in subscription order
    pub fn publish(&mut self, change: &FieldChange) {
        for subscriber in self.subscribers.iter_mut() {
            if subscriber.wants(&change.field) {
                (subscriber.callback)(change);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn change(field: &str, new: f32) -> FieldChange {
        FieldChange {
            field: field.to_string(),
            old: None,
            new: Value::F32(new),
        }
    }

    #[test]
    fn test_field_subscription_filters() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = ChangeNotifier::new();

        let sink = Arc::clone(&seen);
        notifier.subscribe("Zoom", move |c| sink.lock().unwrap().push(c.field.clone()));

        notifier.publish(&change("Zoom", 1.0));
        notifier.publish(&change("Pan", 1.0));

        assert_eq!(*seen.lock().unwrap(), vec!["Zoom".to_string()]);
    }

    #[test]
    fn test_delivery_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut notifier = ChangeNotifier::new();

        let first = Arc::clone(&seen);
        notifier.subscribe_all(move |c| first.lock().unwrap().push(format!("all:{}", c.field)));
        let second = Arc::clone(&seen);
        notifier.subscribe("Zoom", move |c| second.lock().unwrap().push(format!("zoom:{}", c.field)));

        notifier.publish(&change("Zoom", 1.0));
        notifier.publish(&change("Rotation", 0.5));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["all:Zoom", "zoom:Zoom", "all:Rotation"]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut notifier = ChangeNotifier::new();

        let sink = Arc::clone(&count);
        let id = notifier.subscribe_all(move |_| *sink.lock().unwrap() += 1);

        notifier.publish(&change("Zoom", 1.0));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.publish(&change("Zoom", 2.0));

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(notifier.is_empty());
    }
}
