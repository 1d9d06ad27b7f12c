use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use storage_queue_http::{
    ClientSettings, GetMessagesOptions, ListQueuesOptions, Payload, PeekMessagesOptions,
    PutMessageOptions, QueueClient, RequestOptions, UpdateMessageOptions,
};

fn load_live_settings() -> Result<ClientSettings, String> {
    ClientSettings::from_env().map_err(|err| err.to_string())
}

fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock must be after epoch")
        .as_millis()
}

#[tokio::test]
async fn live_queue_lifecycle() {
    let settings = match load_live_settings() {
        Ok(settings) => settings,
        Err(_) => {
            eprintln!("skipping live test: CLOUD_STORAGE_ACCOUNT not set");
            return;
        }
    };

    let client = QueueClient::new(settings).expect("live settings must be valid");
    let queue = format!("live-{}", unique_suffix());
    let none = RequestOptions::default();

    assert!(client
        .create_queue(&queue, &none)
        .await
        .expect("queue creation must succeed"));

    let listed = client
        .list_queues(&ListQueuesOptions {
            prefix: Some(queue.clone()),
            ..ListQueuesOptions::default()
        })
        .await
        .expect("listing must succeed");
    assert!(listed.names.contains(&queue));

    client
        .put_message(
            &queue,
            &Payload::json(json!({ "step": 1, "note": "<&>" })),
            &PutMessageOptions::default(),
        )
        .await
        .expect("put must succeed");

    let peeked = client
        .peek_messages(&queue, &PeekMessagesOptions::default())
        .await
        .expect("peek must succeed");
    assert_eq!(peeked.len(), 1);
    assert_eq!(peeked[0].pop_receipt, None);

    let received = client
        .get_messages(&queue, &GetMessagesOptions::default())
        .await
        .expect("get must succeed");
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].content,
        Payload::json(json!({ "step": 1, "note": "<&>" }))
    );

    let message_id = received[0]
        .message_id
        .clone()
        .expect("received message must have an id");
    let pop_receipt = received[0]
        .pop_receipt
        .clone()
        .expect("received message must have a pop receipt");

    let updated = client
        .update_message(
            &queue,
            &message_id,
            &pop_receipt,
            0,
            &Payload::json(json!({ "step": 2 })),
            &UpdateMessageOptions::default(),
        )
        .await
        .expect("update must succeed");
    let pop_receipt = updated
        .pop_receipt
        .expect("update must return a new pop receipt");

    client
        .delete_message(&queue, &message_id, &pop_receipt, &none)
        .await
        .expect("delete must succeed");

    client
        .clear_messages(&queue, &none)
        .await
        .expect("clear must succeed");

    let count = client
        .count_messages(&queue, &none)
        .await
        .expect("count must succeed");
    assert_eq!(count, 0);

    client
        .delete_queue(&queue, &none)
        .await
        .expect("queue deletion must succeed");
}
