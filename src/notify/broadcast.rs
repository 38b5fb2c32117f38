use super::CompletionNotifier;
use crate::core::Result;
use crate::result::{ExecutionResult, PlanExecuted};
use tokio::sync::broadcast;

/// Publishes [`PlanExecuted`] events on a broadcast channel.
///
/// Sending never blocks. With no live subscriber the event is dropped;
/// a lagging subscriber loses the oldest events, not the executor's time.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<PlanExecuted>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlanExecuted> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl CompletionNotifier for BroadcastNotifier {
    fn notify(&self, result: &ExecutionResult) -> Result<()> {
        if self.sender.send(result.event()).is_err() {
            log::debug!(
                "No subscribers for completion of plan '{}'",
                result.plan_name()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let notifier = BroadcastNotifier::new(4);
        let mut receiver = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);

        let result = ExecutionResult::begin("p", "a").finish();
        notifier.notify(&result).unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.plan_name, "p");
        assert_eq!(event.final_state, "a");
    }

    #[test]
    fn test_no_subscribers_is_not_an_error() {
        let notifier = BroadcastNotifier::default();
        let result = ExecutionResult::begin("p", "").finish();
        assert!(notifier.notify(&result).is_ok());
    }
}
