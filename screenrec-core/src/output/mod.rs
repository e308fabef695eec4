//! Recording outputs
//!
//! A finished session produces one in-memory [`Artifact`]: the encoded
//! bytes, their container type and a generated file name.

mod artifact;

pub use artifact::{artifact_file_name, Artifact, DownloadRef, PreviewRef, ARTIFACT_NAME_PREFIX};
