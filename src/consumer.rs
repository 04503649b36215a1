//! NATS subscription for incoming service requests

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for one request subject.
///
/// With `queue_group` set, several service instances share the subject and
/// each request is delivered to exactly one of them.
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    /// Create a new consumer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: None,
        }
    }

    /// Share the subject with other instances in the same queue group
    pub fn with_queue_group(mut self, group: &str) -> Self {
        self.queue_group = Some(group.to_string());
        self
    }

    /// Subscribe to the subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await?
            }
            None => self.client.subscribe(self.subject.clone()).await?,
        };
        info!(subject = %self.subject, queue_group = ?self.queue_group, "Subscribed to request subject");
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
