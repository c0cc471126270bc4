//! # 物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）を構築し、
//! 2次元の定常非圧縮Navier-Stokes方程式を解くための主要なコンポーネントを提供します。
//!
//! - [`loss::LossEngine`]: 内部点での方程式の残差と境界条件の誤差から損失を計算します。
//! - [`training::Trainer`]: 学習率を減衰させながらモデルを更新し、
//!   損失の記録・グラフ描画・チェックポイント保存を行います。

pub mod boundary;
pub mod cavity;
pub mod checkpoint;
pub mod cli;
pub mod derivatives;
pub mod error;
pub mod inference;
pub mod jet;
pub mod loss;
pub mod mesh;
pub mod model;
pub mod plot;
pub mod residual;
pub mod schedule;
pub mod training;

use std::path::{Path, PathBuf};

pub use error::{PinnError, Result};

/// チェックポイントを保存するディレクトリ
pub const CHECKPOINT_DIR: &str = "trained_models";

/// 損失グラフを保存するファイル名
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";

/// 問題ごとのモデル構造設定ファイルのパス。
pub fn model_config_path(dir: &Path, problem_id: &str) -> PathBuf {
    dir.join(format!("{problem_id}.model.json"))
}
