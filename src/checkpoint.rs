use crate::error::{PinnError, Result};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use std::path::{Path, PathBuf};

/// チェックポイントファイルの拡張子。
const EXTENSION: &str = "mpk";

/// モデルの全パラメータを保存・復元します。
///
/// 同じタグで保存すると前回のチェックポイントは上書きされます。
pub trait Checkpointer<B: Backend, M: Module<B>> {
    /// `model` を `tag` として保存します。
    fn save(&mut self, tag: &str, model: &M) -> Result<()>;

    /// `tag` の最新のチェックポイントを `model` に読み込みます。
    fn restore(&self, tag: &str, model: M, device: &B::Device) -> Result<M>;
}

/// `<dir>/<tag>.mpk` に保存するチェックポイント。
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    dir: PathBuf,
}

impl FileCheckpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `tag` のチェックポイントファイルのパス。
    pub fn file_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{tag}.{EXTENSION}"))
    }

    fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
        NamedMpkFileRecorder::<FullPrecisionSettings>::new()
    }
}

impl<B: Backend, M: Module<B>> Checkpointer<B, M> for FileCheckpointer {
    fn save(&mut self, tag: &str, model: &M) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_path(tag);
        model
            .clone()
            .save_file(path.clone(), &Self::recorder())
            .map_err(|source| PinnError::Checkpoint { path, source })
    }

    fn restore(&self, tag: &str, model: M, device: &B::Device) -> Result<M> {
        let path = self.file_path(tag);
        if !path.exists() {
            return Err(PinnError::MissingCheckpoint(path));
        }
        model
            .load_file(path.clone(), &Self::recorder(), device)
            .map_err(|source| PinnError::Checkpoint { path, source })
    }
}
