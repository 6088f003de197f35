//! Worker pool for slow events.
//!
//! Voice and photo events wait on downloads and external recognition. The
//! dispatcher hands them to a bounded queue and returns at once; a fixed
//! number of worker tasks drain the queues through the controller.
//!
//! Every worker owns its own queue and a conversation always maps to the
//! same worker, so slow events from one chat are handled in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

use super::controller::SubmissionController;
use super::events::InboundEvent;
use crate::draft::ConversationId;

pub struct RecognitionQueue {
    senders: Vec<mpsc::Sender<InboundEvent>>,
}

impl RecognitionQueue {
    /// Spawn `workers` tasks, each serving a queue of at most `queue_size`
    /// events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(controller: Arc<SubmissionController>, workers: usize, queue_size: usize) -> Self {
        let workers = workers.max(1);
        let mut senders = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let (sender, mut receiver) = mpsc::channel::<InboundEvent>(queue_size.max(1));
            let controller = Arc::clone(&controller);
            tokio::spawn(async move {
                while let Some(event) = receiver.recv().await {
                    debug!(worker_id, chat_id = %event.conversation, "Worker picked up event");
                    controller.dispatch(event).await;
                }
                debug!(worker_id, "Recognition worker stopped");
            });
            senders.push(sender);
        }

        info!(workers, queue_size, "Recognition workers started");
        Self { senders }
    }

    /// Index of the worker that owns `conversation`
    pub fn worker_for(&self, conversation: ConversationId) -> usize {
        // Group chat ids are negative
        conversation.0.rem_euclid(self.senders.len() as i64) as usize
    }

    /// Queue an event without waiting. A full or closed queue hands the
    /// event back.
    pub fn enqueue(&self, event: InboundEvent) -> Result<(), InboundEvent> {
        let sender = &self.senders[self.worker_for(event.conversation)];
        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) | TrySendError::Closed(event) => event,
        })
    }
}

/// Run fast events inline and push slow ones onto the worker queue
pub async fn route(event: InboundEvent, controller: &SubmissionController, queue: &RecognitionQueue) {
    if !event.is_slow() {
        controller.dispatch(event).await;
        return;
    }

    if let Err(rejected) = queue.enqueue(event) {
        controller
            .notify_busy(rejected.conversation, &rejected.language)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::controller::Collaborators;
    use crate::bot::events::MediaRef;
    use crate::bot::gateway::ChatGateway;
    use crate::config::DraftSettings;
    use crate::draft::MessageRef;
    use crate::errors::{GatewayError, PersistenceError, RecognitionError};
    use crate::ocr::TextExtractor;
    use crate::sheets::TaskSink;
    use crate::speech::Transcriber;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl ChatGateway for Silent {
        async fn send_text(&self, _: ConversationId, _: &str) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn send_control_message(
            &self,
            conversation: ConversationId,
            _: &str,
            _: &str,
        ) -> Result<MessageRef, GatewayError> {
            Ok(MessageRef {
                conversation,
                message_id: 1,
            })
        }
        async fn remove_keyboard(&self, _: MessageRef) -> Result<(), GatewayError> {
            Ok(())
        }
        async fn download(&self, _: &MediaRef) -> Result<Vec<u8>, GatewayError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl Transcriber for Silent {
        async fn transcribe(&self, _: &[u8], _: &str) -> Result<Option<String>, RecognitionError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl TextExtractor for Silent {
        async fn extract(&self, _: &[u8]) -> Result<Option<String>, RecognitionError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl TaskSink for Silent {
        async fn append_task(&self, _: &str, _: &str, _: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_conversation_always_maps_to_same_worker() {
        let silent = Arc::new(Silent);
        let controller = Arc::new(SubmissionController::new(
            DraftSettings::default(),
            Collaborators {
                gateway: silent.clone(),
                transcriber: silent.clone(),
                extractor: silent.clone(),
                tasks: silent,
            },
        ));
        let queue = RecognitionQueue::start(controller, 3, 4);

        assert_eq!(queue.worker_for(ConversationId(7)), 1);
        assert_eq!(queue.worker_for(ConversationId(7)), queue.worker_for(ConversationId(7)));
        assert_eq!(queue.worker_for(ConversationId(-1001)), 1);
        assert!(queue.worker_for(ConversationId(-2)) < 3);
    }
}
