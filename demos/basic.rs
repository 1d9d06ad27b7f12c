use serde_json::json;
use storage_queue_http::{
    GetMessagesOptions, Payload, PutMessageOptions, QueueClient, RequestOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = QueueClient::from_env()?;
    let none = RequestOptions::default();

    client.create_queue("demo-basic", &none).await?;

    client
        .put_message(
            "demo-basic",
            &Payload::json(json!({ "task": "resize", "width": 640 })),
            &PutMessageOptions::default(),
        )
        .await?;

    let messages = client
        .get_messages("demo-basic", &GetMessagesOptions::default())
        .await?;

    for message in messages {
        println!("{:?}: {:?}", message.message_id, message.content);
        if let (Some(id), Some(receipt)) = (&message.message_id, &message.pop_receipt) {
            client
                .delete_message("demo-basic", id, receipt, &none)
                .await?;
        }
    }

    Ok(())
}
