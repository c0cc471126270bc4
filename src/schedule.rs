use crate::error::{PinnError, Result};
use burn::LearningRate;

/// 指数減衰する学習率 `lr(step) = lr0 * decay_rate^(step / decay_steps)`。
///
/// 指数は連続値で、階段状には減衰しません。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDecay {
    initial: LearningRate,
    decay_rate: f64,
    decay_steps: usize,
}

impl ExponentialDecay {
    pub fn new(initial: LearningRate, decay_rate: f64, decay_steps: usize) -> Result<Self> {
        if !(initial.is_finite() && initial > 0.0) {
            return Err(PinnError::InvalidConfig(format!(
                "学習率は正の有限値である必要があります: {initial}"
            )));
        }
        if !(decay_rate > 0.0 && decay_rate <= 1.0) {
            return Err(PinnError::InvalidConfig(format!(
                "減衰率は (0, 1] の範囲である必要があります: {decay_rate}"
            )));
        }
        if decay_steps == 0 {
            return Err(PinnError::InvalidConfig(
                "減衰ステップ数は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self {
            initial,
            decay_rate,
            decay_steps,
        })
    }

    /// `step` 回目（0 始まり）の更新で使う学習率。
    pub fn learning_rate(&self, step: usize) -> LearningRate {
        self.initial * self.decay_rate.powf(step as f64 / self.decay_steps as f64)
    }
}
