//! File-backed media transport.
//!
//! Video streams loop the configured clip through `ffmpeg` input arguments;
//! the media pipeline does the actual decoding. Snapshots read the still
//! image from disk on every call.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use minicam_app::ports::{MediaTransport, Negotiated};
use minicam_domain::device::DeviceRecord;
use minicam_domain::error::MiniCamError;
use minicam_domain::media::{
    MediaDescriptor, Picture, PictureOptions, ResponseStreamOptions, StreamOptions, VideoOptions,
};
use minicam_domain::stream::TransportHandle;

use crate::config::SampleConfig;
use crate::error::SampleError;

/// Id of the single stream variant served.
pub const STREAM_ID: &str = "stream";

pub struct SampleTransport {
    config: SampleConfig,
    next: AtomicU64,
    leases: Mutex<HashSet<TransportHandle>>,
}

impl SampleTransport {
    #[must_use]
    pub fn new(config: SampleConfig) -> Self {
        Self {
            config,
            next: AtomicU64::new(0),
            leases: Mutex::new(HashSet::new()),
        }
    }

    /// Number of handles handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.leases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lease(&self, kind: &str, device: &DeviceRecord) -> TransportHandle {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = TransportHandle::new(format!("{kind}-{}-{n}", device.native_id));
        self.leases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.clone());
        handle
    }

    fn video_descriptor(&self) -> MediaDescriptor {
        MediaDescriptor::new(vec![
            "-re".to_string(),
            "-stream_loop".to_string(),
            "-1".to_string(),
            "-i".to_string(),
            self.config.video_path().display().to_string(),
        ])
    }
}

impl MediaTransport for SampleTransport {
    fn negotiate_video(
        &self,
        device: &DeviceRecord,
        options: &StreamOptions,
    ) -> impl Future<Output = Result<Negotiated, MiniCamError>> + Send {
        let result: Result<Negotiated, MiniCamError> = match options.id.as_deref() {
            Some(id) if id != STREAM_ID => Err(SampleError::UnknownStream(id.to_string()).into()),
            _ => Ok(Negotiated {
                handle: self.lease("video", device),
                descriptor: self.video_descriptor(),
            }),
        };
        async { result }
    }

    fn open_intercom(
        &self,
        device: &DeviceRecord,
        media: &MediaDescriptor,
    ) -> impl Future<Output = Result<TransportHandle, MiniCamError>> + Send {
        // A real camera would spawn ffmpeg with these arguments and push the
        // output to the speaker endpoint.
        tracing::info!(
            native_id = %device.native_id,
            arguments = ?media.input_arguments,
            "intercom playback requested"
        );
        let handle = self.lease("intercom", device);
        async { Ok(handle) }
    }

    fn release(&self, handle: &TransportHandle) {
        let known = self
            .leases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
        if known {
            tracing::debug!(%handle, "transport handle released");
        } else {
            tracing::warn!(%handle, "release of unknown transport handle");
        }
    }

    fn stream_options(
        &self,
        _device: &DeviceRecord,
    ) -> impl Future<Output = Result<Vec<ResponseStreamOptions>, MiniCamError>> + Send {
        async {
            Ok(vec![ResponseStreamOptions {
                id: STREAM_ID.to_string(),
                video: Some(VideoOptions {
                    codec: "h264".to_string(),
                }),
                audio: None,
            }])
        }
    }

    fn take_picture(
        &self,
        _device: &DeviceRecord,
        _options: &PictureOptions,
    ) -> impl Future<Output = Result<Picture, MiniCamError>> + Send {
        let path = self.config.image_path();
        async move {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|source| SampleError::MediaRead { path, source })?;
            Ok(Picture {
                mime_type: "image/jpeg".to_string(),
                data,
            })
        }
    }
}
