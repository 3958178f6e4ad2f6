//! Media descriptors exchanged with the external media pipeline.
//!
//! The pipeline owns the codecs and transcoding; this crate only describes
//! *how* a feed can be fetched (`ffmpeg` input arguments plus an optional URL).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Mime type of a JSON-encoded [`MediaDescriptor`].
pub const FFMPEG_INPUT_MIME: &str = "x-scrypted/x-ffmpeg-input";

/// Describes how the media pipeline can read a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    /// Hint for pipelines that can consume URLs directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Arguments placed before the output arguments on an `ffmpeg` command line.
    pub input_arguments: Vec<String>,
}

impl MediaDescriptor {
    #[must_use]
    pub fn new(input_arguments: Vec<String>) -> Self {
        Self {
            url: None,
            input_arguments,
        }
    }

    /// Decode the JSON payload handed over by the host.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedMediaDescriptor`] when the payload
    /// is not a descriptor, or [`ValidationError::EmptyMediaDescriptor`]
    /// when it carries no input arguments.
    pub fn from_json(payload: &[u8]) -> Result<Self, ValidationError> {
        let descriptor: Self = serde_json::from_slice(payload)
            .map_err(|_| ValidationError::MalformedMediaDescriptor)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Encode for the host's media object transport.
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        // A struct of strings always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyMediaDescriptor`] when there are no
    /// input arguments.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input_arguments.is_empty() {
            return Err(ValidationError::EmptyMediaDescriptor);
        }
        Ok(())
    }
}

/// Options a caller passes when requesting a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Id of one of the [`ResponseStreamOptions`] the device advertised.
    pub id: Option<String>,
}

/// Video parameters of an advertised stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOptions {
    pub codec: String,
}

/// Audio parameters of an advertised stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioOptions {
    pub codec: String,
}

/// A stream variant a device can serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStreamOptions {
    pub id: String,
    pub video: Option<VideoOptions>,
    pub audio: Option<AudioOptions>,
}

/// Requested picture size, honoured when the upstream can.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A still image.
#[derive(Clone, PartialEq, Eq)]
pub struct Picture {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Picture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Picture")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_encode_descriptor_in_pipeline_shape() {
        let descriptor = MediaDescriptor::new(vec!["-i".into(), "dog.mp4".into()]);
        let json: serde_json::Value = serde_json::from_slice(&descriptor.to_json()).unwrap();
        assert_eq!(json, serde_json::json!({"inputArguments": ["-i", "dog.mp4"]}));
    }

    #[test]
    fn should_decode_descriptor_with_url() {
        let payload = br#"{"url":"rtsp://cam/1","inputArguments":["-i","rtsp://cam/1"]}"#;
        let descriptor = MediaDescriptor::from_json(payload).unwrap();
        assert_eq!(descriptor.url.as_deref(), Some("rtsp://cam/1"));
        assert_eq!(descriptor.input_arguments.len(), 2);
    }

    #[test]
    fn should_reject_descriptor_without_arguments() {
        let result = MediaDescriptor::from_json(br#"{"inputArguments":[]}"#);
        assert_eq!(result, Err(ValidationError::EmptyMediaDescriptor));
    }

    #[test]
    fn should_reject_payload_that_is_not_a_descriptor() {
        let result = MediaDescriptor::from_json(b"not json");
        assert_eq!(result, Err(ValidationError::MalformedMediaDescriptor));
    }

    #[test]
    fn should_not_dump_picture_bytes_in_debug() {
        let picture = Picture {
            mime_type: "image/jpeg".to_string(),
            data: vec![0xff; 64],
        };
        assert_eq!(
            format!("{picture:?}"),
            r#"Picture { mime_type: "image/jpeg", len: 64 }"#
        );
    }
}
