use serde::{Deserialize, Serialize};

use crate::payload::Payload;
use crate::trigger_type::{CancelPolicy, TriggerType};

/// Value a trigger hands back to the host through the return slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReturnValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Lines(Vec<String>),
}

/// State of a single dispatch.
///
/// Built right before the dispatch and handed back to the host afterwards.
/// The cancellation flag only ever goes from `false` to `true`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    trigger_type: TriggerType,
    cancelled: bool,
    payload: Payload,
    return_value: Option<ReturnValue>,
}

impl EventContext {
    pub fn new(payload: Payload) -> Self {
        Self {
            trigger_type: payload.trigger_type(),
            cancelled: false,
            payload,
            return_value: None,
        }
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger_type
    }

    pub fn cancel_policy(&self) -> CancelPolicy {
        self.trigger_type.cancel_policy()
    }

    pub fn is_cancellable(&self) -> bool {
        self.trigger_type.cancellable()
    }

    /// Request cancellation of the host's default behavior.
    ///
    /// Returns `false` and leaves the flag untouched when the event type is
    /// not cancellable.
    pub fn cancel(&mut self) -> bool {
        if !self.is_cancellable() {
            return false;
        }
        self.cancelled = true;
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn set_return(&mut self, value: ReturnValue) {
        self.return_value = Some(value);
    }

    pub fn return_value(&self) -> Option<&ReturnValue> {
        self.return_value.as_ref()
    }

    pub fn take_return(&mut self) -> Option<ReturnValue> {
        self.return_value.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{ChatEvent, TickEvent};

    #[test]
    fn test_cancel_is_monotonic() {
        let mut ctx = EventContext::new(Payload::Chat(ChatEvent::plain("hi")));
        assert!(!ctx.is_cancelled());
        assert!(ctx.cancel());
        assert!(ctx.cancel());
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_cancel_ignored_for_non_cancellable() {
        let mut ctx = EventContext::new(Payload::Tick(TickEvent { ticks: 3 }));
        assert!(!ctx.cancel());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_return_slot() {
        let mut ctx = EventContext::new(Payload::GameLoad);
        assert_eq!(ctx.return_value(), None);
        ctx.set_return(ReturnValue::Text("x".into()));
        assert_eq!(ctx.take_return(), Some(ReturnValue::Text("x".into())));
        assert_eq!(ctx.return_value(), None);
    }
}
