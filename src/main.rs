//! # 物理情報ニューラルネットワーク (PINN) ソルバー
//!
//! 上辺が動く正方形キャビティ内の定常流れを、Navier-Stokes方程式の残差を
//! 最小化するニューラルネットワークで求めます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --epochs 10000 --print-interval 100
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer
//! ```

use clap::Parser;
use ns_pinn::cli::{Cli, Commands};
use ns_pinn::{inference, training};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、`train`または`infer`の処理に振り分けます。
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .init();

    match &cli.command {
        Commands::Train(args) => training::run(args),
        Commands::Infer(args) => inference::run(args),
    }
}
