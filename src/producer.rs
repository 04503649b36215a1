//! NATS reply publisher

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::debug;

/// Publishes JSON replies to request reply subjects
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    /// Create a new reply publisher
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Serialize and publish a reply
    pub async fn reply<T: Serialize>(&self, reply_to: Subject, body: &T) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        let size = payload.len();

        self.client.publish(reply_to.clone(), payload.into()).await?;

        debug!(reply_to = %reply_to, bytes = size, "Published reply");
        Ok(())
    }

    /// Flush pending replies before shutdown
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
