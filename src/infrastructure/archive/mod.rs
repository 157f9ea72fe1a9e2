//! Vox Archive - 音色档案（manifest + 命名二进制条目）

pub mod manifest;
pub mod vox;

pub use manifest::{
    EmbeddingEntry, Provenance, ReferenceAudioEntry, VoxManifest, DEFAULT_EMBEDDING_KEY,
    FORMAT_VERSION, LEGACY_PROMPT_PATH, MANIFEST_PATH, SAMPLE_AUDIO_PATH,
};
pub use vox::{ArchiveError, VoxArchive};
