//! Vox Archive - 音色档案容器
//!
//! zstd 压缩的 tar 容器：`manifest.json` + 以档案内相对路径寻址的
//! 二进制条目。更新采用整文件读取、内存修改、整文件重写，
//! 不做增量追加；同一文件的互斥写入由调用方保证。

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use thiserror::Error;

use super::manifest::{
    EmbeddingEntry, Provenance, ReferenceAudioEntry, VoxManifest, DEFAULT_EMBEDDING_KEY,
    FORMAT_VERSION, LEGACY_PROMPT_PATH, MANIFEST_PATH, MIN_MAJOR_VERSION, SAMPLE_AUDIO_PATH,
};
use crate::domain::VoiceProfile;

/// zstd 压缩级别（与通用 bundle 一致的均衡值）
const COMPRESSION_LEVEL: i32 = 3;

/// 档案错误
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Malformed(String),

    #[error("Archive manifest missing ({MANIFEST_PATH})")]
    MissingManifest,

    #[error("Unsupported manifest version: {found}")]
    UnsupportedVersion { found: String },

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// 音色档案
///
/// 内存中的完整档案内容：清单 + 条目字节。所有修改只作用于内存，
/// 直到 `write` 整体落盘。
#[derive(Debug, Clone)]
pub struct VoxArchive {
    manifest: VoxManifest,
    blobs: BTreeMap<String, Vec<u8>>,
}

impl VoxArchive {
    /// 新建空档案
    pub fn new(voice: VoiceProfile, provenance: Option<Provenance>) -> Self {
        Self {
            manifest: VoxManifest::new(voice, provenance),
            blobs: BTreeMap::new(),
        }
    }

    pub fn manifest(&self) -> &VoxManifest {
        &self.manifest
    }

    /// 按档案内路径取条目
    pub fn blob(&self, path: &str) -> Option<&[u8]> {
        self.blobs.get(path).map(|b| b.as_slice())
    }

    /// 写入或替换 clone prompt 条目
    ///
    /// 条目位于模型范围路径下，同时维护 embeddings 索引行；
    /// 其余条目与索引行保持不变。
    pub fn set_clone_prompt(
        &mut self,
        key: &str,
        model: &str,
        engine: &str,
        format: &str,
        description: &str,
        bytes: Vec<u8>,
    ) {
        let path = VoxManifest::prompt_path(engine, key);
        tracing::debug!(key = %key, path = %path, size = bytes.len(), "Storing clone prompt entry");
        self.blobs.insert(path.clone(), bytes);
        self.manifest.embeddings.insert(
            key.to_string(),
            EmbeddingEntry {
                model: model.to_string(),
                engine: engine.to_string(),
                path,
                format: format.to_string(),
                description: description.to_string(),
            },
        );
    }

    /// 按语义 key 取 clone prompt
    ///
    /// 先查索引；索引无此 key 且请求的是默认 key 时，
    /// 探测旧版固定路径并将命中视作默认模型的条目。
    pub fn clone_prompt(&self, key: &str) -> Option<(&EmbeddingEntry, &[u8])> {
        if let Some(entry) = self.manifest.embeddings.get(key) {
            return self.blobs.get(&entry.path).map(|b| (entry, b.as_slice()));
        }
        None
    }

    /// 取 clone prompt 字节，含旧版回退
    pub fn clone_prompt_bytes(&self, key: &str) -> Option<&[u8]> {
        if let Some((_, bytes)) = self.clone_prompt(key) {
            return Some(bytes);
        }
        // 旧版档案：单一无范围路径，无索引
        if key == DEFAULT_EMBEDDING_KEY {
            return self.blob(LEGACY_PROMPT_PATH);
        }
        None
    }

    /// 可用的 embedding key 列表（旧版档案暴露默认 key）
    pub fn embedding_keys(&self) -> Vec<String> {
        if self.manifest.embeddings.is_empty() && self.blobs.contains_key(LEGACY_PROMPT_PATH) {
            return vec![DEFAULT_EMBEDDING_KEY.to_string()];
        }
        self.manifest.embeddings.keys().cloned().collect()
    }

    /// 写入或替换样例音频（固定路径）
    pub fn set_sample_audio(&mut self, wav: Vec<u8>) {
        self.blobs.insert(SAMPLE_AUDIO_PATH.to_string(), wav);
    }

    pub fn sample_audio(&self) -> Option<&[u8]> {
        self.blob(SAMPLE_AUDIO_PATH)
    }

    /// 添加参考音频条目
    ///
    /// 同名文件覆盖旧条目，清单中的转写一并更新。
    pub fn add_reference_audio(&mut self, file: &str, wav: Vec<u8>, transcript: &str) {
        self.blobs.insert(VoxManifest::reference_path(file), wav);
        if let Some(existing) = self
            .manifest
            .reference_audio
            .iter_mut()
            .find(|e| e.file == file)
        {
            existing.transcript = transcript.to_string();
        } else {
            self.manifest.reference_audio.push(ReferenceAudioEntry {
                file: file.to_string(),
                transcript: transcript.to_string(),
            });
        }
    }

    pub fn reference_audio(&self, file: &str) -> Option<&[u8]> {
        self.blob(&VoxManifest::reference_path(file))
    }

    /// 序列化为档案字节（tar + zstd）
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        let mut builder = tar::Builder::new(Vec::new());

        let manifest_json = serde_json::to_vec_pretty(&self.manifest)?;
        append_entry(&mut builder, MANIFEST_PATH, &manifest_json)?;
        for (path, bytes) in &self.blobs {
            append_entry(&mut builder, path, bytes)?;
        }

        let tar_bytes = builder
            .into_inner()
            .map_err(|e| ArchiveError::Malformed(format!("Failed to finish tar archive: {}", e)))?;

        let compressed = zstd::encode_all(Cursor::new(tar_bytes), COMPRESSION_LEVEL)
            .map_err(|e| ArchiveError::Malformed(format!("zstd compression failed: {}", e)))?;
        Ok(compressed)
    }

    /// 从档案字节还原
    pub fn from_bytes(data: &[u8]) -> Result<Self, ArchiveError> {
        let tar_bytes = zstd::decode_all(Cursor::new(data))
            .map_err(|e| ArchiveError::Malformed(format!("zstd decompression failed: {}", e)))?;

        let mut entries = BTreeMap::new();
        let mut archive = tar::Archive::new(Cursor::new(tar_bytes));
        for entry in archive
            .entries()
            .map_err(|e| ArchiveError::Malformed(format!("Failed to read tar entries: {}", e)))?
        {
            let mut entry =
                entry.map_err(|e| ArchiveError::Malformed(format!("Corrupt tar entry: {}", e)))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .map_err(|e| ArchiveError::Malformed(format!("Invalid entry path: {}", e)))?
                .to_string_lossy()
                .into_owned();
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes)?;
            entries.insert(path, bytes);
        }

        let manifest_json = entries
            .remove(MANIFEST_PATH)
            .ok_or(ArchiveError::MissingManifest)?;
        let manifest: VoxManifest = serde_json::from_slice(&manifest_json)?;

        let current_major: u32 = FORMAT_VERSION
            .split('.')
            .next()
            .and_then(|m| m.parse().ok())
            .unwrap_or(0);
        match manifest.major_version() {
            Some(major) if (MIN_MAJOR_VERSION..=current_major).contains(&major) => {}
            _ => {
                return Err(ArchiveError::UnsupportedVersion {
                    found: manifest.format_version.clone(),
                });
            }
        }

        Ok(Self {
            manifest,
            blobs: entries,
        })
    }

    /// 从文件读取档案
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let archive = Self::from_bytes(&data)?;
        tracing::debug!(
            path = %path.display(),
            entries = archive.blobs.len(),
            voice = %archive.manifest.voice.name,
            "Vox archive loaded"
        );
        Ok(archive)
    }

    /// 整文件写入档案
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ArchiveError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes)?;
        tracing::info!(
            path = %path.display(),
            size = bytes.len(),
            entries = self.blobs.len(),
            "Vox archive written"
        );
        Ok(())
    }
}

fn append_entry(
    builder: &mut tar::Builder<Vec<u8>>,
    path: &str,
    bytes: &[u8],
) -> Result<(), ArchiveError> {
    let mut header = tar::Header::new_gnu();
    header
        .set_path(path)
        .map_err(|e| ArchiveError::Malformed(format!("Invalid entry path {}: {}", path, e)))?;
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append(&header, bytes)
        .map_err(|e| ArchiveError::Malformed(format!("Failed to append {}: {}", path, e)))?;
    Ok(())
}
