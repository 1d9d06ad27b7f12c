use std::time::Duration;

use storage_queue_http::{
    EncodingOptions, ListQueuesOptions, Payload, PeekMessagesOptions, PutMessageOptions,
    QueueClient, QueueError, RequestOptions, RetryMode, RetryPolicy, SettingsOverride,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Raw (base64) messages with a short, fast-retrying policy.
    let client = QueueClient::from_env()?
        .derive(&SettingsOverride {
            json: Some(false),
            timeout_ms: Some(5_000),
            ..SettingsOverride::default()
        })?
        .with_retry(RetryMode::Policy(RetryPolicy {
            retries: 5,
            first_delay: Duration::from_millis(500),
            ..RetryPolicy::default()
        }));
    let none = RequestOptions::default();

    client.create_queue("demo-messages", &none).await?;

    for line in ["first", "second", "third"] {
        client
            .put_message(
                "demo-messages",
                &Payload::text(line),
                &PutMessageOptions {
                    message_ttl: Some(3_600),
                    ..PutMessageOptions::default()
                },
            )
            .await?;
    }

    println!(
        "approximate count: {}",
        client.count_messages("demo-messages", &none).await?
    );

    let peeked = client
        .peek_messages(
            "demo-messages",
            &PeekMessagesOptions {
                encoding: EncodingOptions::raw(),
                max_messages: Some(32),
                ..PeekMessagesOptions::default()
            },
        )
        .await?;
    for message in &peeked {
        println!("peeked {:?}", message.content.as_text());
    }

    let mut marker = None;
    loop {
        let page = client
            .list_queues(&ListQueuesOptions {
                prefix: Some("demo-".to_owned()),
                marker,
                max_results: Some(10),
                ..ListQueuesOptions::default()
            })
            .await?;
        for name in &page.names {
            println!("queue {name}");
        }
        match page.next_marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    match client.delete_queue("demo-messages", &none).await {
        Ok(()) => println!("deleted demo-messages"),
        Err(QueueError::Service { code, .. }) if code == "QueueNotFound" => {}
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
