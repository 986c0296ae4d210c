//! # Bus Contract and Scale-Out Bus
//!
//! [`MessageBus`] is what producers see: publish one message, dispose the
//! bus. [`ScaleoutBus`] is what backplane adapters implement: deliver a batch
//! to one of N parallel streams.
//!
//! Every [`ScaleoutBus`] is a [`MessageBus`] through a blanket impl, so an
//! adapter only has to supply `send_to_stream`. Forgetting it is a compile
//! error rather than a runtime failure.

use async_trait::async_trait;
use backplane_types::{BusError, BusResult, Message, StreamIndex, DEFAULT_STREAM};

/// Publish contract exposed to producers.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a message.
    ///
    /// Completes once the backplane accepted the message, or fails without
    /// retrying.
    async fn publish(&self, message: Message) -> BusResult<()>;

    /// Release the bus and its backplane resources.
    async fn dispose(&self);
}

/// Multi-stream backplane.
#[async_trait]
pub trait ScaleoutBus: Send + Sync {
    /// Number of parallel streams this backplane writes to.
    fn stream_count(&self) -> usize {
        1
    }

    /// Deliver a batch to one stream.
    async fn send_to_stream(
        &self,
        stream_index: StreamIndex,
        messages: Vec<Message>,
    ) -> BusResult<()>;

    /// Deliver a batch using the default single stream.
    async fn send(&self, messages: Vec<Message>) -> BusResult<()> {
        self.send_to_stream(DEFAULT_STREAM, messages).await
    }

    /// Release backplane resources. Called by [`MessageBus::dispose`].
    async fn shutdown(&self) {}
}

#[async_trait]
impl<T> MessageBus for T
where
    T: ScaleoutBus + ?Sized,
{
    async fn publish(&self, message: Message) -> BusResult<()> {
        // TODO: coalesce concurrent publishes into one batch per stream
        self.send(vec![message]).await
    }

    async fn dispose(&self) {
        self.shutdown().await;
    }
}

/// Hook invoked after every successful (re)connect so a consumer can resume
/// reading a stream from the right position.
pub trait StreamHook: Send + Sync {
    fn open_stream(&self, stream_index: StreamIndex);
}

/// Default hook: does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStreamHook;

impl StreamHook for NoopStreamHook {
    fn open_stream(&self, _stream_index: StreamIndex) {}
}

/// Reject stream indices outside `0..stream_count`.
pub fn check_stream(stream_index: StreamIndex, stream_count: usize) -> BusResult<()> {
    if stream_index < stream_count {
        Ok(())
    } else {
        Err(BusError::InvalidStream {
            index: stream_index,
            count: stream_count,
        })
    }
}
