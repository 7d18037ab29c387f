//! Message ports: the outbound half of the cross-window channel.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::envelope::{BridgeMessage, ResponseEnvelope, TargetOrigin};

/// Raw inbound traffic delivered to the embedded page.
pub type InboundStream = BoxStream<'static, Value>;

/// Port error.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Channel to the host window is closed")]
    Closed,
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Posts messages to the host window.
///
/// Implement this trait to bind the dispatcher to a real channel.
#[async_trait]
pub trait MessagePort: Send + Sync {
    /// Post `message` to the host, restricted to `target_origin`.
    async fn post_message(
        &self,
        message: &BridgeMessage,
        target_origin: &TargetOrigin,
    ) -> Result<(), PortError>;
}

/// A message as seen by the host window.
#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub message: BridgeMessage,
    pub target_origin: TargetOrigin,
}

/// In-memory port backed by an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelPort {
    tx: mpsc::UnboundedSender<PostedMessage>,
}

#[async_trait]
impl MessagePort for ChannelPort {
    async fn post_message(
        &self,
        message: &BridgeMessage,
        target_origin: &TargetOrigin,
    ) -> Result<(), PortError> {
        self.tx
            .send(PostedMessage {
                message: message.clone(),
                target_origin: target_origin.clone(),
            })
            .map_err(|_| PortError::Closed)
    }
}

/// Embedded page side of an in-memory channel.
pub struct EmbeddedFrame {
    /// Outbound port.
    pub port: ChannelPort,
    /// Inbound traffic from the host.
    pub inbound: InboundStream,
}

/// Host side of an in-memory channel.
pub struct ParentWindow {
    posted: mpsc::UnboundedReceiver<PostedMessage>,
    deliver: mpsc::UnboundedSender<Value>,
}

impl ParentWindow {
    /// Wait for the next message posted by the embedded page.
    pub async fn next_posted(&mut self) -> Option<PostedMessage> {
        self.posted.recv().await
    }

    /// Take a posted message if one is queued.
    pub fn try_next_posted(&mut self) -> Option<PostedMessage> {
        self.posted.try_recv().ok()
    }

    /// Deliver arbitrary traffic to the embedded page.
    ///
    /// # Errors
    /// Returns error if the embedded page is gone.
    pub fn deliver(&self, raw: Value) -> Result<(), PortError> {
        self.deliver.send(raw).map_err(|_| PortError::Closed)
    }

    /// Deliver a response envelope.
    ///
    /// # Errors
    /// Returns error if the embedded page is gone.
    pub fn respond(&self, response: ResponseEnvelope) -> Result<(), PortError> {
        let raw = serde_json::to_value(BridgeMessage::Response(response))?;
        self.deliver(raw)
    }

    /// Split into the posted-message receiver and the delivery sender.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<PostedMessage>,
        mpsc::UnboundedSender<Value>,
    ) {
        (self.posted, self.deliver)
    }
}

/// Create a connected embedded page / host window pair.
#[must_use]
pub fn window_pair() -> (EmbeddedFrame, ParentWindow) {
    let (posted_tx, posted_rx) = mpsc::unbounded_channel();
    let (deliver_tx, deliver_rx) = mpsc::unbounded_channel();

    let frame = EmbeddedFrame {
        port: ChannelPort { tx: posted_tx },
        inbound: UnboundedReceiverStream::new(deliver_rx).boxed(),
    };
    let parent = ParentWindow {
        posted: posted_rx,
        deliver: deliver_tx,
    };
    (frame, parent)
}
