//! Finished recording artifacts

use bytes::{Bytes, BytesMut};
use rand::Rng;
use std::time::SystemTime;
use tracing::info;

use crate::config::NamingPolicy;
use crate::encode::extension_for_mime;
use crate::types::Handle;

/// Prefix of every generated artifact name
pub const ARTIFACT_NAME_PREFIX: &str = "screen-recorder-result-";

/// Largest random suffix in a generated name
const NAME_SUFFIX_MAX: u32 = 100_000;

/// Generate a file name like `screen-recorder-result-4821.webm`
pub fn artifact_file_name(mime_type: &str, naming: NamingPolicy) -> String {
    let suffix = rand::thread_rng().gen_range(0..=NAME_SUFFIX_MAX);
    let extension = match naming {
        NamingPolicy::FromContainer => extension_for_mime(mime_type),
        NamingPolicy::LegacyMp4 => "mp4",
    };
    format!("{}{}.{}", ARTIFACT_NAME_PREFIX, suffix, extension)
}

/// The recorded media of one finished session
///
/// Immutable; cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    id: Handle,
    name: String,
    mime_type: String,
    data: Bytes,
    chunk_count: usize,
    created_at: SystemTime,
}

impl Artifact {
    /// Concatenate `chunks` in order into one artifact
    pub fn assemble(chunks: &[Bytes], mime_type: &str, naming: NamingPolicy) -> Self {
        let total: usize = chunks.iter().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }

        let artifact = Self {
            id: Handle::new(),
            name: artifact_file_name(mime_type, naming),
            mime_type: mime_type.to_string(),
            data: data.freeze(),
            chunk_count: chunks.len(),
            created_at: SystemTime::now(),
        };

        info!(
            "Artifact {} assembled: {} bytes from {} chunk(s) ({})",
            artifact.name,
            artifact.data.len(),
            artifact.chunk_count,
            artifact.mime_type
        );

        artifact
    }

    pub fn id(&self) -> Handle {
        self.id
    }

    /// Generated display/file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container MIME type reported by the encoder
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Recorded bytes
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of encoder chunks the artifact was built from
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Reference for offering the artifact as a download
    pub fn download(&self) -> DownloadRef {
        DownloadRef {
            file_name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            data: self.data.clone(),
        }
    }

    /// Reference for playing the artifact back
    pub fn preview(&self) -> PreviewRef {
        PreviewRef {
            mime_type: self.mime_type.clone(),
            data: self.data.clone(),
        }
    }
}

/// Downloadable view of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRef {
    /// Suggested file name
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Playable view of an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRef {
    pub mime_type: String,
    pub data: Bytes,
}
