//! Event bus port — notifications from the provider to the host platform.

use std::future::Future;

use minicam_domain::error::MiniCamError;
use minicam_domain::event::Event;

/// Publishes device, interface and sensor changes to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), MiniCamError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), MiniCamError>> + Send {
        (**self).publish(event)
    }
}
