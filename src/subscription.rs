//! The subscription model (§4.4 / §GLOSSARY).
//!
//! A subscription key selects which queue carries events from a source to a
//! processor. Two keys are equal iff both fields are equal; a broadcast
//! source binds every processor-agent through a single implicit key, a
//! keyed source requires an explicit subscription per processor.

use std::fmt;
use std::sync::Arc;

/// Identifies an event source by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey(pub Arc<str>);

impl SourceKey {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        SourceKey(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Selects which of a processor's callbacks an event should be routed to.
/// `OnEvent` is the default broadcast-style callback; `Custom` names an
/// application-defined callback type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallbackType {
    OnEvent,
    Custom(Arc<str>),
}

/// `(sourceName, callbackType)` — the unit of subscription and the key
/// that identifies a target queue together with its consumer agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub source: SourceKey,
    pub callback: CallbackType,
}

impl SubscriptionKey {
    pub fn on_event(source: impl Into<Arc<str>>) -> Self {
        SubscriptionKey {
            source: SourceKey::new(source),
            callback: CallbackType::OnEvent,
        }
    }

    pub fn custom(source: impl Into<Arc<str>>, callback_name: impl Into<Arc<str>>) -> Self {
        SubscriptionKey {
            source: SourceKey::new(source),
            callback: CallbackType::Custom(callback_name.into()),
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.callback {
            CallbackType::OnEvent => write!(f, "{}/onEvent", self.source),
            CallbackType::Custom(name) => write!(f, "{}/{}", self.source, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_equal_fields_are_equal() {
        let a = SubscriptionKey::on_event("feed");
        let b = SubscriptionKey::on_event("feed");
        assert_eq!(a, b);
    }

    #[test]
    fn custom_callback_differs_from_on_event() {
        let a = SubscriptionKey::on_event("feed");
        let b = SubscriptionKey::custom("feed", "onTick");
        assert_ne!(a, b);
    }
}
