//! Media transport port — the bridge to the external media pipeline.
//!
//! Every resource handed out as a [`TransportHandle`] must be given back
//! through [`MediaTransport::release`]; the stream controller guarantees it
//! does so exactly once per handle.

use std::future::Future;

use minicam_domain::device::DeviceRecord;
use minicam_domain::error::MiniCamError;
use minicam_domain::media::{
    MediaDescriptor, Picture, PictureOptions, ResponseStreamOptions, StreamOptions,
};
use minicam_domain::stream::TransportHandle;

/// Outcome of a successful video negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    pub handle: TransportHandle,
    pub descriptor: MediaDescriptor,
}

/// Negotiates and tears down media sessions with the upstream device.
pub trait MediaTransport: Send + Sync + 'static {
    /// Prepare an outbound video feed for `device`.
    fn negotiate_video(
        &self,
        device: &DeviceRecord,
        options: &StreamOptions,
    ) -> impl Future<Output = Result<Negotiated, MiniCamError>> + Send;

    /// Start playing the host's audio feed, described by `media`, on the
    /// device speaker.
    fn open_intercom(
        &self,
        device: &DeviceRecord,
        media: &MediaDescriptor,
    ) -> impl Future<Output = Result<TransportHandle, MiniCamError>> + Send;

    /// Give a resource back. Must not block.
    fn release(&self, handle: &TransportHandle);

    /// Stream variants the device can serve.
    fn stream_options(
        &self,
        device: &DeviceRecord,
    ) -> impl Future<Output = Result<Vec<ResponseStreamOptions>, MiniCamError>> + Send;

    /// Grab a still image.
    fn take_picture(
        &self,
        device: &DeviceRecord,
        options: &PictureOptions,
    ) -> impl Future<Output = Result<Picture, MiniCamError>> + Send;
}
