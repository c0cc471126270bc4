use crate::jet::{Jet, Order};
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Tanh};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 入力チャンネル数 (x, y)。
pub const INPUT_SIZE: usize = 2;
/// 出力チャンネル数 (u, v, p)。
pub const OUTPUT_SIZE: usize = 3;

/// 出力チャンネルの並び。
pub const U: usize = 0;
pub const V: usize = 1;
pub const P: usize = 2;

/// 座標 (x, y) から物理量 (u, v, p) への微分可能な写像。
///
/// 損失計算からはこのトレイトを通してのみモデルを扱います。
pub trait FieldModel<B: Backend> {
    /// `[N, 2]` の座標から `[N, 3]` の予測値を計算します。
    fn forward(&self, coords: Tensor<B, 2>) -> Tensor<B, 2>;

    /// 入力座標に対する微分を運ぶジェットを順伝播させます。
    fn forward_jet<T: Order<B>>(&self, input: Jet<B, T>) -> Jet<B, T>;
}

/// モデル構造の設定。
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 隠れ層ごとのユニット数。空なら (x, y) → (u, v, p) の単一の全結合層になります。
    pub hidden_layers: Vec<usize>,
}

impl ModelConfig {
    /// 設定に従ってモデルを初期化します。
    pub fn init<B: Backend>(&self, device: &B::Device) -> Pinn<B> {
        let mut hidden = Vec::with_capacity(self.hidden_layers.len());
        let mut width = INPUT_SIZE;
        for &units in &self.hidden_layers {
            hidden.push(LinearConfig::new(width, units).init(device));
            width = units;
        }
        Pinn {
            hidden,
            output: LinearConfig::new(width, OUTPUT_SIZE).init(device),
            activation: Tanh::new(),
        }
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 座標(x, y)を入力とし、その点における速度 (u, v) と圧力 p を予測する
/// 多層パーセプトロン（MLP）です。
#[derive(Module, Debug)]
pub struct Pinn<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
    activation: Tanh,
}

impl<B: Backend> Pinn<B> {
    /// モデルの順伝播を実行します。
    pub fn forward(&self, coords: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = coords;
        for layer in &self.hidden {
            x = layer.forward(x);
            x = self.activation.forward(x);
        }
        self.output.forward(x)
    }

    /// 微分付きの順伝播を実行します。
    pub fn forward_jet<T: Order<B>>(&self, input: Jet<B, T>) -> Jet<B, T> {
        let mut jet = input;
        for layer in &self.hidden {
            jet = jet.affine(layer).tanh();
        }
        jet.affine(&self.output)
    }
}

impl<B: Backend> FieldModel<B> for Pinn<B> {
    fn forward(&self, coords: Tensor<B, 2>) -> Tensor<B, 2> {
        Pinn::forward(self, coords)
    }

    fn forward_jet<T: Order<B>>(&self, input: Jet<B, T>) -> Jet<B, T> {
        Pinn::forward_jet(self, input)
    }
}
