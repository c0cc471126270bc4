use crate::cavity::LidDrivenCavity;
use crate::checkpoint::{Checkpointer, FileCheckpointer};
use crate::cli::TrainArgs;
use crate::error::PinnError;
use crate::loss::LossEngine;
use crate::mesh::Mesh;
use crate::model::{FieldModel, ModelConfig, Pinn};
use crate::plot::plot_loss_history;
use crate::schedule::ExponentialDecay;
use crate::{LOSS_GRAPH_FILENAME, model_config_path};
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use burn::module::{AutodiffModule, Module, ModuleVisitor, ParamId};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Tensor};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{Level, debug, info, warn};

type MyBackend = Autodiff<NdArray<f32>>;

/// 学習の設定。
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// 問題の識別子。チェックポイントのタグに使います。
    pub problem_id: String,
    /// 動粘性係数。
    #[config(default = 0.01)]
    pub nu: f32,
    /// 初期学習率。
    #[config(default = 0.01)]
    pub learning_rate: f64,
    #[config(default = 0.9)]
    pub decay_rate: f64,
    #[config(default = 1000)]
    pub decay_steps: usize,
    /// 損失グラフの出力先。`None` なら描画しません。
    #[config(default = "None")]
    pub loss_plot: Option<String>,
}

/// 学習ループの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Idle,
    Running,
    /// エポック数を使い切って終了しました。
    Completed,
    /// 最終エポックでチェックポイントを保存して終了しました。
    Autosaved,
    /// エラーにより中断しました。
    Terminated,
}

/// 学習過程の `(エポック, 損失)` の記録。
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    entries: Vec<(usize, f32)>,
}

impl LossHistory {
    pub fn push(&mut self, epoch: usize, loss: f32) {
        self.entries.push((epoch, loss));
    }

    pub fn entries(&self) -> &[(usize, f32)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<(usize, f32)> {
        self.entries.last().copied()
    }
}

/// PINNの学習ループ。
///
/// 学習中のモデルはこの構造体が所有し、外部からは `predict` と
/// チェックポイントを通してのみ参照します。
pub struct Trainer<B, M, O, C>
where
    B: AutodiffBackend,
    M: FieldModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
    C: Checkpointer<B, M>,
{
    model: M,
    optim: O,
    engine: LossEngine<B>,
    checkpointer: C,
    schedule: ExponentialDecay,
    config: TrainingConfig,
    device: B::Device,
    history: LossHistory,
    state: TrainingState,
    epoch: usize,
    step: usize,
}

impl<B, M, O, C> Trainer<B, M, O, C>
where
    B: AutodiffBackend,
    M: FieldModel<B> + AutodiffModule<B>,
    M::InnerModule: FieldModel<B::InnerBackend>,
    O: Optimizer<M, B>,
    C: Checkpointer<B, M>,
{
    /// 学習器を作ります。メッシュと設定の誤りはここで検出されます。
    pub fn new(
        model: M,
        optim: O,
        mesh: &Mesh,
        config: TrainingConfig,
        checkpointer: C,
        device: &B::Device,
    ) -> crate::Result<Self> {
        if config.problem_id.is_empty() {
            return Err(PinnError::InvalidConfig(
                "問題の識別子が空です".to_string(),
            ));
        }
        let engine = LossEngine::new(mesh, config.nu, device)?;
        let schedule =
            ExponentialDecay::new(config.learning_rate, config.decay_rate, config.decay_steps)?;
        Ok(Self {
            model,
            optim,
            engine,
            checkpointer,
            schedule,
            config,
            device: device.clone(),
            history: LossHistory::default(),
            state: TrainingState::Idle,
            epoch: 0,
            step: 0,
        })
    }

    /// `epochs` 回の更新を行います。
    ///
    /// エポック番号は `train` の呼び出しをまたいで通算します。通算エポックが
    /// `print_interval` の倍数なら損失を記録・表示し、`autosave_interval` の倍数なら
    /// チェックポイントを上書き保存します。損失または勾配が有限でないエポックでは
    /// パラメータを更新しません。
    pub fn train(
        &mut self,
        epochs: usize,
        print_interval: usize,
        autosave_interval: usize,
    ) -> crate::Result<()> {
        if print_interval == 0 || autosave_interval == 0 {
            return Err(PinnError::InvalidConfig(format!(
                "表示間隔と保存間隔は 1 以上である必要があります (print={print_interval}, autosave={autosave_interval})"
            )));
        }

        self.state = TrainingState::Running;
        info!(
            problem = %self.config.problem_id,
            epochs,
            nu = self.engine.nu(),
            "学習を開始します"
        );
        let training_start = Instant::now();
        let mut autosaved = false;

        for _ in 0..epochs {
            self.epoch += 1;
            let epoch = self.epoch;
            let terms = self.engine.total_loss(&self.model);
            let loss = terms.total();
            let loss_value = loss.clone().into_scalar().elem::<f32>();
            let lr = self.schedule.learning_rate(self.step);

            let grads = loss_value
                .is_finite()
                .then(|| GradientsParams::from_grads(loss.backward(), &self.model));
            match grads {
                Some(grads) if finite_gradients::<B, M>(&self.model, &grads) => {
                    self.model = self.optim.step(lr, self.model.clone(), grads);
                    self.step += 1;
                }
                Some(_) => {
                    warn!(epoch, loss = loss_value, "勾配が有限でないため更新をスキップします");
                }
                None => {
                    warn!(epoch, loss = loss_value, "損失が有限でないため更新をスキップします");
                }
            }

            if epoch % print_interval == 0 {
                self.history.push(epoch, loss_value);
                self.redraw();
                info!("[Epoch {}] Loss: {:.6e}, lr: {:.3e}", epoch, loss_value, lr);
                if tracing::enabled!(Level::DEBUG) {
                    debug!("[Epoch {}] {}", epoch, terms.describe());
                }
            }

            autosaved = epoch % autosave_interval == 0;
            if autosaved {
                if let Err(e) = self.checkpoint() {
                    self.state = TrainingState::Terminated;
                    return Err(e);
                }
                info!(problem = %self.config.problem_id, epoch, "チェックポイントを保存しました");
            }
        }

        self.state = if autosaved {
            TrainingState::Autosaved
        } else {
            TrainingState::Completed
        };
        info!("学習が完了しました。");
        info!("=> 学習時間: {:.2?}", training_start.elapsed());
        Ok(())
    }

    fn redraw(&self) {
        let Some(path) = &self.config.loss_plot else {
            return;
        };
        if let Err(e) = plot_loss_history(self.history.entries(), &PathBuf::from(path)) {
            warn!("{e}");
        }
    }

    /// 学習済みモデルで (u, v, p) を予測します。自動微分は行いません。
    pub fn predict(&self, points: &[[f32; 2]]) -> Vec<[f32; 3]> {
        if points.is_empty() {
            return Vec::new();
        }
        let flat: Vec<f32> = points.iter().flatten().copied().collect();
        let coords = Tensor::<B::InnerBackend, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([points.len(), 2]);
        let values: Vec<f32> = self
            .model
            .valid()
            .forward(coords)
            .into_data()
            .iter::<f32>()
            .collect();
        values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
    }

    /// 現在のモデルをチェックポイントとして保存します。
    pub fn checkpoint(&mut self) -> crate::Result<()> {
        self.checkpointer.save(&self.config.problem_id, &self.model)
    }

    /// 最新のチェックポイントからモデルを復元します。
    pub fn restore(&mut self) -> crate::Result<()> {
        self.model = self.checkpointer.restore(
            &self.config.problem_id,
            self.model.clone(),
            &self.device,
        )?;
        info!(problem = %self.config.problem_id, "チェックポイントから復元しました");
        Ok(())
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// 通算のエポック数。
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// これまでに適用した更新の回数。
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn checkpointer(&self) -> &C {
        &self.checkpointer
    }

    pub fn engine(&self) -> &LossEngine<B> {
        &self.engine
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }
}

/// 勾配に NaN や無限大が含まれていないかを調べる訪問者。
struct FiniteGradients<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    finite: bool,
    backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for FiniteGradients<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.finite &= grad.abs().sum().into_scalar().elem::<f32>().is_finite();
        }
    }
}

/// `model` の全パラメータの勾配が有限かどうか。
fn finite_gradients<B: AutodiffBackend, M: AutodiffModule<B>>(
    model: &M,
    grads: &GradientsParams,
) -> bool {
    let mut visitor = FiniteGradients::<B> {
        grads,
        finite: true,
        backend: PhantomData,
    };
    model.visit(&mut visitor);
    visitor.finite
}

/// `train`サブコマンドを実行します。
///
/// キャビティ流れのメッシュを作り、モデルを学習してチェックポイントを保存します。
pub fn run(args: &TrainArgs) -> Result<(), Box<dyn std::error::Error>> {
    let device = Default::default();
    let dir = &args.output.checkpoint_dir;
    let problem_id = &args.output.problem_id;

    // --- データセットの準備 ---
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mesh = LidDrivenCavity::default().mesh(
        args.interior_points,
        args.boundary_points,
        args.sampling,
        &mut rng,
    );

    // --- モデルとオプティマイザの初期化 ---
    let model_config = ModelConfig::new(args.hidden.clone());
    let config = TrainingConfig::new(problem_id.clone())
        .with_nu(args.nu)
        .with_learning_rate(args.learning_rate)
        .with_loss_plot(Some(LOSS_GRAPH_FILENAME.to_string()));
    std::fs::create_dir_all(dir)?;
    model_config.save(model_config_path(dir, problem_id))?;

    let model = model_config.init::<MyBackend>(&device);
    let optim = AdamConfig::new().init();
    let mut trainer: Trainer<MyBackend, Pinn<MyBackend>, _, _> = Trainer::new(
        model,
        optim,
        &mesh,
        config,
        FileCheckpointer::new(dir),
        &device,
    )?;
    info!("バックエンド: NdArray (CPU)");

    // --- 学習ループ ---
    trainer.train(args.epochs, args.print_interval, args.autosave_interval)?;

    // --- 結果の保存 ---
    trainer.checkpoint()?;
    info!(
        "=> モデルを '{}' に保存しました。",
        FileCheckpointer::new(dir).file_path(problem_id).display()
    );
    if let Some((epoch, loss)) = trainer.history().last() {
        info!("=> 最終損失 (Epoch {}): {:.6e}", epoch, loss);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_gradients_are_finite() {
        let device = Default::default();
        let model = ModelConfig::new(vec![4]).init::<MyBackend>(&device);
        let coords = Tensor::<MyBackend, 2>::ones([3, 2], &device);
        let loss = model.forward(coords).powf_scalar(2.0).mean();
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        assert!(finite_gradients::<MyBackend, _>(&model, &grads));
    }

    #[test]
    fn finite_loss_with_non_finite_gradients_is_detected() {
        let device = Default::default();
        let model = ModelConfig::new(vec![4]).init::<MyBackend>(&device);
        let coords = Tensor::<MyBackend, 2>::ones([3, 2], &device);
        let out = model.forward(coords);
        // sqrt の微分が 0 で発散する
        let loss = (out.clone() - out).abs().sqrt().sum();
        assert_eq!(loss.clone().into_scalar(), 0.0);
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        assert!(!finite_gradients::<MyBackend, _>(&model, &grads));
    }
}
