use reqwest::Method;
use serde_json::Value as JsonValue;

use crate::{
    codec, xml, GetMessagesOptions, ListQueuesOptions, Message, MessageEncoding, Payload,
    PeekMessagesOptions, PutMessageOptions, QueryParams, QueueClient, QueueError, QueueList,
    RequestOptions, Response, Result, UpdateMessageOptions, UpdatedMessage,
};

const APPROXIMATE_MESSAGES_COUNT: &str = "x-ms-approximate-messages-count";
const POP_RECEIPT: &str = "x-ms-popreceipt";
const TIME_NEXT_VISIBLE: &str = "x-ms-time-next-visible";

impl QueueClient {
    /// Creates a queue. Returns `true` when it was created and `false` when
    /// it already existed with the same metadata.
    pub async fn create_queue(&self, queue: &str, options: &RequestOptions) -> Result<bool> {
        let response = self
            .issue_signed_request(Method::PUT, queue, timeout_query(options.timeout), None)
            .await?;
        match response.status {
            201 => Ok(true),
            204 => Ok(false),
            _ => Err(unexpected_status(&response)),
        }
    }

    /// Lists one page of queues. Pass `next_marker` back as `marker` to
    /// continue.
    pub async fn list_queues(&self, options: &ListQueuesOptions) -> Result<QueueList> {
        let mut query = QueryParams::new().with("comp", "list");
        query.insert_opt("prefix", options.prefix.as_deref());
        query.insert_opt("marker", options.marker.as_deref());
        query.insert_opt("maxresults", options.max_results);
        query.insert_opt("timeout", options.timeout);

        let response = self
            .issue_signed_request(Method::GET, "", query, None)
            .await?;
        let response = expect_status(response, 200)?;
        let results = structured(&response)?
            .get("enumerationResults")
            .ok_or_else(|| QueueError::Protocol("listing has no EnumerationResults".to_owned()))?;

        let names = xml::sequence(results.get("queues").and_then(|queues| queues.get("queue")))
            .into_iter()
            .filter_map(|queue| xml::text(queue.get("name")).map(str::to_owned))
            .collect();
        let next_marker = xml::text(results.get("nextMarker")).map(str::to_owned);

        Ok(QueueList { names, next_marker })
    }

    pub async fn delete_queue(&self, queue: &str, options: &RequestOptions) -> Result<()> {
        let response = self
            .issue_signed_request(Method::DELETE, queue, timeout_query(options.timeout), None)
            .await?;
        expect_status(response, 204).map(drop)
    }

    /// Approximate number of messages in the queue.
    pub async fn count_messages(&self, queue: &str, options: &RequestOptions) -> Result<u64> {
        let mut query = QueryParams::new().with("comp", "metadata");
        query.insert_opt("timeout", options.timeout);

        let response = self
            .issue_signed_request(Method::HEAD, queue, query, None)
            .await?;
        let response = expect_status(response, 200)?;
        response
            .header(APPROXIMATE_MESSAGES_COUNT)
            .and_then(|count| count.trim().parse().ok())
            .ok_or_else(|| {
                QueueError::Protocol(format!("missing or invalid {APPROXIMATE_MESSAGES_COUNT} header"))
            })
    }

    /// Adds a message to the queue.
    pub async fn put_message(
        &self,
        queue: &str,
        payload: &Payload,
        options: &PutMessageOptions,
    ) -> Result<()> {
        let body = self.encode_message(&options.encoding, payload)?;
        let mut query = QueryParams::new();
        query.insert_opt("visibilitytimeout", options.visibility_timeout);
        query.insert_opt("messagettl", options.message_ttl);
        query.insert_opt("timeout", options.timeout);

        let response = self
            .issue_signed_request(Method::POST, &messages_path(queue), query, Some(body))
            .await?;
        expect_status(response, 201).map(drop)
    }

    /// Deletes every message in the queue.
    pub async fn clear_messages(&self, queue: &str, options: &RequestOptions) -> Result<()> {
        let response = self
            .issue_signed_request(
                Method::DELETE,
                &messages_path(queue),
                timeout_query(options.timeout),
                None,
            )
            .await?;
        expect_status(response, 204).map(drop)
    }

    /// Retrieves messages and hides them for the visibility timeout.
    pub async fn get_messages(
        &self,
        queue: &str,
        options: &GetMessagesOptions,
    ) -> Result<Vec<Message>> {
        let mut query = QueryParams::new();
        query.insert_opt("numofmessages", options.max_messages);
        query.insert_opt("visibilitytimeout", options.visibility_timeout);
        query.insert_opt("timeout", options.timeout);

        let response = self
            .issue_signed_request(Method::GET, &messages_path(queue), query, None)
            .await?;
        let response = expect_status(response, 200)?;
        decode_message_list(&response, options.encoding.resolve(self.encoding()))
    }

    /// Retrieves messages without changing their visibility. Peeked messages
    /// carry no pop receipt.
    pub async fn peek_messages(
        &self,
        queue: &str,
        options: &PeekMessagesOptions,
    ) -> Result<Vec<Message>> {
        let mut query = QueryParams::new().with("peekonly", "true");
        query.insert_opt("numofmessages", options.max_messages);
        query.insert_opt("timeout", options.timeout);

        let response = self
            .issue_signed_request(Method::GET, &messages_path(queue), query, None)
            .await?;
        let response = expect_status(response, 200)?;
        decode_message_list(&response, options.encoding.resolve(self.encoding()))
    }

    /// Replaces a message's content and visibility timeout. The returned pop
    /// receipt supersedes the one passed in.
    pub async fn update_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        visibility_timeout: u32,
        payload: &Payload,
        options: &UpdateMessageOptions,
    ) -> Result<UpdatedMessage> {
        let body = self.encode_message(&options.encoding, payload)?;
        let mut query = QueryParams::new()
            .with("popreceipt", pop_receipt)
            .with("visibilitytimeout", visibility_timeout);
        query.insert_opt("timeout", options.timeout);

        let response = self
            .issue_signed_request(
                Method::PUT,
                &message_path(queue, message_id),
                query,
                Some(body),
            )
            .await?;
        let response = expect_status(response, 204)?;

        Ok(UpdatedMessage {
            pop_receipt: response.header(POP_RECEIPT).map(str::to_owned),
            time_next_visible: response
                .header(TIME_NEXT_VISIBLE)
                .and_then(codec::parse_timestamp),
        })
    }

    pub async fn delete_message(
        &self,
        queue: &str,
        message_id: &str,
        pop_receipt: &str,
        options: &RequestOptions,
    ) -> Result<()> {
        let mut query = QueryParams::new().with("popreceipt", pop_receipt);
        query.insert_opt("timeout", options.timeout);

        let response = self
            .issue_signed_request(
                Method::DELETE,
                &message_path(queue, message_id),
                query,
                None,
            )
            .await?;
        expect_status(response, 204).map(drop)
    }
}

fn messages_path(queue: &str) -> String {
    format!("{queue}/messages")
}

fn message_path(queue: &str, message_id: &str) -> String {
    format!("{queue}/messages/{message_id}")
}

fn timeout_query(timeout: Option<u32>) -> QueryParams {
    let mut query = QueryParams::new();
    query.insert_opt("timeout", timeout);
    query
}

fn expect_status(response: Response, expected: u16) -> Result<Response> {
    if response.status == expected {
        Ok(response)
    } else {
        Err(unexpected_status(&response))
    }
}

fn unexpected_status(response: &Response) -> QueueError {
    QueueError::UnexpectedStatus {
        status: response.status,
    }
}

fn structured(response: &Response) -> Result<&JsonValue> {
    response
        .body
        .as_structured()
        .ok_or_else(|| QueueError::Protocol("expected an XML response body".to_owned()))
}

fn decode_message_list(response: &Response, encoding: MessageEncoding) -> Result<Vec<Message>> {
    let list = structured(response)?
        .get("queueMessagesList")
        .ok_or_else(|| QueueError::Protocol("response has no QueueMessagesList".to_owned()))?;

    Ok(xml::sequence(list.get("queueMessage"))
        .into_iter()
        .map(|raw| codec::decode_message(encoding, raw))
        .collect())
}
