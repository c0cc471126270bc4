use burn::record::RecorderError;
use std::path::PathBuf;
use thiserror::Error;

/// ソルバー全体で使用するエラー型。
#[derive(Debug, Error)]
pub enum PinnError {
    /// 境界に必須フィールド（x, y, conditions）が設定されていません。
    #[error("境界 '{boundary}' に必須フィールド '{field}' が設定されていません")]
    MissingField {
        boundary: String,
        field: &'static str,
    },

    /// 境界の座標列・法線列の長さが一致しません。
    #[error("境界 '{boundary}' の {field} の長さ {found} が点数 {expected} と一致しません")]
    LengthMismatch {
        boundary: String,
        field: &'static str,
        expected: usize,
        found: usize,
    },

    /// 内部コロケーション点の座標が設定されていません。
    #[error("内部コロケーション点の座標 '{0}' が設定されていません")]
    MissingInterior(&'static str),

    #[error("設定が不正です: {0}")]
    InvalidConfig(String),

    #[error("未実装です: {0}")]
    Unimplemented(&'static str),

    #[error("チェックポイント '{}' の読み書きに失敗しました: {source}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: RecorderError,
    },

    #[error("チェックポイント '{}' が見つかりません", .0.display())]
    MissingCheckpoint(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("損失グラフの描画に失敗しました: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, PinnError>;
