use crate::cavity::LidDrivenCavity;
use crate::checkpoint::{Checkpointer, FileCheckpointer};
use crate::cli::InferArgs;
use crate::model::{ModelConfig, OUTPUT_SIZE, P, U, V};
use crate::model_config_path;
use burn::backend::NdArray;
use burn::config::Config;
use burn::tensor::Tensor;
use std::time::Instant;
use tracing::info;

type MyBackend = NdArray<f32>;

/// `infer`サブコマンドを実行します。
pub fn run(args: &InferArgs) -> Result<(), Box<dyn std::error::Error>> {
    let device = Default::default();
    let dir = &args.output.checkpoint_dir;
    let problem_id = &args.output.problem_id;

    info!("推論を実行します - バックエンド: NdArray (CPU)");
    let inference_start = Instant::now();

    let config_path = model_config_path(dir, problem_id);
    let model_config = ModelConfig::load(&config_path).map_err(|e| {
        format!(
            "モデル設定 '{}' を読み込めません: {e}\n最初に 'train' コマンドでモデルを学習・保存してください。",
            config_path.display()
        )
    })?;
    let checkpointer = FileCheckpointer::new(dir);
    info!(
        "保存済みモデルを '{}' からロード中...",
        checkpointer.file_path(problem_id).display()
    );
    let model = Checkpointer::<MyBackend, _>::restore(
        &checkpointer,
        problem_id,
        model_config.init::<MyBackend>(&device),
        &device,
    )?;

    let n = args.resolution;
    let grid = LidDrivenCavity::default().grid(n, n);
    let flat: Vec<f32> = grid.iter().flatten().copied().collect();
    let coords = Tensor::<MyBackend, 1>::from_floats(flat.as_slice(), &device).reshape([grid.len(), 2]);
    let predictions = model.forward(coords);
    let inference_duration = inference_start.elapsed();

    let dims = predictions.dims();
    let values: Vec<f32> = predictions.into_data().iter::<f32>().collect();
    let (mut u_max, mut v_max) = (0.0_f32, 0.0_f32);
    let (mut p_min, mut p_max) = (f32::INFINITY, f32::NEG_INFINITY);
    for row in values.chunks_exact(OUTPUT_SIZE) {
        u_max = u_max.max(row[U].abs());
        v_max = v_max.max(row[V].abs());
        p_min = p_min.min(row[P]);
        p_max = p_max.max(row[P]);
    }

    info!(
        "推論が完了しました。入力グリッド数: {}x{}={}, 出力テンソルの形状: {:?}",
        n,
        n,
        n * n,
        dims
    );
    info!(
        "=> max|u| = {:.4}, max|v| = {:.4}, p ∈ [{:.4}, {:.4}]",
        u_max, v_max, p_min, p_max
    );
    info!("=> 推論時間: {:.2?}", inference_duration);

    Ok(())
}
