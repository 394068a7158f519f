//! Model persistence
//!
//! - [`serializer`]: the versioned, checksummed envelope every blob is wrapped in
//! - [`artifact`]: the on-disk (encoder, model, metrics) unit served by the API

mod artifact;
mod serializer;

pub use artifact::{ArtifactManifest, ArtifactStore, LoadedArtifact, ENCODER_FILE, METRICS_FILE, MODEL_FILE};
pub use serializer::{
    decode_artifact, encode_artifact, load_artifact, read_blob, save_artifact, write_atomic, ArtifactHeader,
    ArtifactKind, FORMAT_VERSION,
};
