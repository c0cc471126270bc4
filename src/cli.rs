use crate::cavity::{PROBLEM_ID, Sampling};
use crate::CHECKPOINT_DIR;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A Physics-Informed Neural Network (PINN) solver for steady incompressible Navier-Stokes with Burn", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 損失の内訳などデバッグ出力を表示します
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// 実行するサブコマンドを定義します（train または infer）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// キャビティ流れのPINNモデルを学習し、結果をファイルに保存します
    Train(TrainArgs),
    /// 保存されたPINNモデルを使い、推論を実行します
    Infer(InferArgs),
}

/// チェックポイントの保存先。
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// 問題の識別子（チェックポイントのファイル名になります）
    #[arg(long, default_value = PROBLEM_ID)]
    pub problem_id: String,
    #[arg(long, default_value = CHECKPOINT_DIR)]
    pub checkpoint_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[arg(long, default_value_t = 10000)]
    pub epochs: usize,
    #[arg(long, default_value_t = 100)]
    pub print_interval: usize,
    #[arg(long, default_value_t = 10000)]
    pub autosave_interval: usize,
    /// 内部コロケーション点の数
    #[arg(long, default_value_t = 2000)]
    pub interior_points: usize,
    /// 各辺の境界点の数
    #[arg(long, default_value_t = 100)]
    pub boundary_points: usize,
    #[arg(long, value_enum, default_value_t = Sampling::Random)]
    pub sampling: Sampling,
    /// 動粘性係数
    #[arg(long, default_value_t = 0.01)]
    pub nu: f32,
    #[arg(long, default_value_t = 0.01)]
    pub learning_rate: f64,
    /// 隠れ層のユニット数（カンマ区切り）
    #[arg(long, value_delimiter = ',', default_values_t = vec![20, 20, 20])]
    pub hidden: Vec<usize>,
    /// 点の生成に使う乱数シード
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InferArgs {
    /// 推論格子の一辺の点数
    #[arg(long, default_value_t = 50)]
    pub resolution: usize,
    #[command(flatten)]
    pub output: OutputArgs,
}
