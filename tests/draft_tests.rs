//! # Draft Store Tests
//!
//! Concurrency behaviour of the shared per-conversation drafts.

use std::sync::Arc;

use taskdraft::draft::{ConversationId, DraftState, DraftStore};
use taskdraft::errors::DraftError;

#[tokio::test]
async fn test_concurrent_appends_never_exceed_capacity() {
    let store = Arc::new(DraftStore::new(3));
    let conversation = ConversationId(1);

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let shared = store.get_or_create(conversation);
            let mut draft = shared.lock().await;
            draft.append(&format!("entry {i}"))
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(DraftError::CapacityExceeded { capacity }) => {
                assert_eq!(capacity, 3);
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(rejected, 17);

    let shared = store.get_or_create(conversation);
    let draft = shared.lock().await;
    assert_eq!(draft.len(), 3);
    assert_eq!(draft.state(), DraftState::Full);
}

#[tokio::test]
async fn test_flush_cycle_reuses_draft() {
    let store = DraftStore::new(2);
    let shared = store.get_or_create(ConversationId(9));

    {
        let mut draft = shared.lock().await;
        draft.append("buy milk").unwrap();
        draft.append("call Alex").unwrap();
        assert_eq!(draft.description(), "buy milk\ncall Alex");
        draft.clear();
        assert_eq!(draft.state(), DraftState::Empty);
    }

    let mut draft = shared.lock().await;
    draft.append("next task").unwrap();
    assert_eq!(draft.entries(), &["next task"]);
}
