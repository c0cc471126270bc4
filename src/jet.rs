//! 前進モード自動微分。
//!
//! `burn` の `Autodiff` バックエンドでは、入力に対する勾配が内部バックエンドの
//! テンソルとして返るため計算グラフから切り離され、さらに微分することも、
//! パラメータの学習に使うこともできません。そこで空間微分は前進モードで求めます。
//! [`Jet`] は各層の値とその接ベクトル（∂/∂x, ∂/∂y と必要なら ∂²/∂x², ∂²/∂y²）を
//! 連鎖律に従って伝播させます。すべて通常のテンソル演算なので、
//! 最終的な損失から一度の逆伝播で全パラメータの勾配が得られます。

use burn::nn::Linear;
use burn::prelude::Backend;
use burn::tensor::Tensor;
use core::fmt::Debug;

/// 計算する微分の階数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeOrder {
    /// 値と一階微分のみ。
    First,
    /// 一階微分に加えて、各軸方向の二階微分。
    Second,
}

/// ジェットが一階微分に加えて運ぶ高階の接ベクトル。
///
/// 階数は型で決まるので、二階のジェットが二階微分を欠くことはありません。
pub trait Order<B: Backend>: Clone + Debug {
    const ORDER: DerivativeOrder;

    /// 座標を独立変数とする種。二階の種はすべて 0 です。
    fn seed(n: usize, device: &B::Device) -> Self;

    /// 全結合層の重み `W` を掛けます。
    fn affine(self, weight: &Tensor<B, 2>) -> Self;

    /// tanh を通します。`slope = 1 - a²` で、`d_dx`, `d_dy` は層に入る前の一階微分です。
    fn tanh(
        self,
        a: &Tensor<B, 2>,
        slope: &Tensor<B, 2>,
        d_dx: &Tensor<B, 2>,
        d_dy: &Tensor<B, 2>,
    ) -> Self;

    /// 各テンソルに `f` を適用します。
    fn map(&self, f: impl Fn(&Tensor<B, 2>) -> Tensor<B, 2>) -> Self;
}

/// 一階微分だけを運ぶジェットの印。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstOrder;

impl<B: Backend> Order<B> for FirstOrder {
    const ORDER: DerivativeOrder = DerivativeOrder::First;

    fn seed(_n: usize, _device: &B::Device) -> Self {
        FirstOrder
    }

    fn affine(self, _weight: &Tensor<B, 2>) -> Self {
        self
    }

    fn tanh(
        self,
        _a: &Tensor<B, 2>,
        _slope: &Tensor<B, 2>,
        _d_dx: &Tensor<B, 2>,
        _d_dy: &Tensor<B, 2>,
    ) -> Self {
        self
    }

    fn map(&self, _f: impl Fn(&Tensor<B, 2>) -> Tensor<B, 2>) -> Self {
        FirstOrder
    }
}

/// 各軸方向の二階微分（混合微分は不要なので持ちません）。
#[derive(Debug, Clone)]
pub struct SecondTangents<B: Backend> {
    pub d2_dx2: Tensor<B, 2>,
    pub d2_dy2: Tensor<B, 2>,
}

impl<B: Backend> Order<B> for SecondTangents<B> {
    const ORDER: DerivativeOrder = DerivativeOrder::Second;

    fn seed(n: usize, device: &B::Device) -> Self {
        Self {
            d2_dx2: Tensor::zeros([n, 2], device),
            d2_dy2: Tensor::zeros([n, 2], device),
        }
    }

    fn affine(self, weight: &Tensor<B, 2>) -> Self {
        Self {
            d2_dx2: self.d2_dx2.matmul(weight.clone()),
            d2_dy2: self.d2_dy2.matmul(weight.clone()),
        }
    }

    /// `a'' = -2 a a'` なので `∂²a/∂x² = a' z_xx + a'' z_x²` です。
    fn tanh(
        self,
        a: &Tensor<B, 2>,
        slope: &Tensor<B, 2>,
        d_dx: &Tensor<B, 2>,
        d_dy: &Tensor<B, 2>,
    ) -> Self {
        let bend = a.clone().mul(slope.clone()).mul_scalar(-2.0);
        Self {
            d2_dx2: slope.clone().mul(self.d2_dx2)
                + bend.clone().mul(d_dx.clone().powf_scalar(2.0)),
            d2_dy2: slope.clone().mul(self.d2_dy2) + bend.mul(d_dy.clone().powf_scalar(2.0)),
        }
    }

    fn map(&self, f: impl Fn(&Tensor<B, 2>) -> Tensor<B, 2>) -> Self {
        Self {
            d2_dx2: f(&self.d2_dx2),
            d2_dy2: f(&self.d2_dy2),
        }
    }
}

/// 値と、入力座標 (x, y) に対するその微分の組。
///
/// すべてのテンソルは `[点数, チャンネル数]` の同じ形状を持ちます。
#[derive(Debug, Clone)]
pub struct Jet<B: Backend, T: Order<B>> {
    pub value: Tensor<B, 2>,
    pub d_dx: Tensor<B, 2>,
    pub d_dy: Tensor<B, 2>,
    pub higher: T,
}

/// 一階微分までのジェット。
pub type FirstJet<B> = Jet<B, FirstOrder>;
/// 二階微分までのジェット。
pub type SecondJet<B> = Jet<B, SecondTangents<B>>;

impl<B: Backend, T: Order<B>> Jet<B, T> {
    /// 座標 `[N, 2]` を独立変数とするジェットを作ります。
    ///
    /// 一階の種は x 列に対して (1, 0)、y 列に対して (0, 1) です。
    pub fn seed(coords: Tensor<B, 2>) -> Self {
        let [n, _] = coords.dims();
        let device = coords.device();
        let ones = Tensor::<B, 2>::ones([n, 1], &device);
        let zeros = Tensor::<B, 2>::zeros([n, 1], &device);
        Self {
            value: coords,
            d_dx: Tensor::cat(vec![ones.clone(), zeros.clone()], 1),
            d_dy: Tensor::cat(vec![zeros, ones], 1),
            higher: T::seed(n, &device),
        }
    }

    /// このジェットが運んでいる微分の階数。
    pub fn order(&self) -> DerivativeOrder {
        T::ORDER
    }

    /// 全結合層 `y = xW + b` を通します。接ベクトルには `W` だけが掛かります。
    pub fn affine(self, layer: &Linear<B>) -> Self {
        let weight = layer.weight.val();
        Self {
            value: layer.forward(self.value),
            d_dx: self.d_dx.matmul(weight.clone()),
            d_dy: self.d_dy.matmul(weight.clone()),
            higher: self.higher.affine(&weight),
        }
    }

    /// 要素ごとの tanh を通します。
    ///
    /// `a = tanh(z)` に対して `a' = 1 - a²` なので `∂a/∂x = a' z_x` です。
    pub fn tanh(self) -> Self {
        let a = self.value.tanh();
        let slope = a.clone().powf_scalar(2.0).neg().add_scalar(1.0);
        let higher = self.higher.tanh(&a, &slope, &self.d_dx, &self.d_dy);
        Self {
            value: a,
            d_dx: slope.clone().mul(self.d_dx),
            d_dy: slope.mul(self.d_dy),
            higher,
        }
    }

    /// `c` 番目のチャンネルだけを取り出したジェット（形状 `[N, 1]`）。
    pub fn channel(&self, c: usize) -> Self {
        let pick = |t: &Tensor<B, 2>| {
            let [n, _] = t.dims();
            t.clone().slice([0..n, c..c + 1])
        };
        Self {
            value: pick(&self.value),
            d_dx: pick(&self.d_dx),
            d_dy: pick(&self.d_dy),
            higher: self.higher.map(pick),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::LinearConfig;

    type TestBackend = NdArray<f32>;

    fn to_vec(t: Tensor<TestBackend, 2>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn seed_is_identity_on_coordinates() {
        let device = Default::default();
        let coords = Tensor::<TestBackend, 1>::from_floats([0.5, -1.0, 2.0, 3.0], &device)
            .reshape([2, 2]);
        let jet = SecondJet::seed(coords);
        assert_eq!(jet.order(), DerivativeOrder::Second);
        assert_eq!(to_vec(jet.d_dx), vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(to_vec(jet.d_dy), vec![0.0, 1.0, 0.0, 1.0]);
        assert!(to_vec(jet.higher.d2_dx2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn first_order_jet_carries_no_curvature() {
        let device = Default::default();
        let coords = Tensor::<TestBackend, 2>::zeros([3, 2], &device);
        let layer = LinearConfig::new(2, 4).init::<TestBackend>(&device);
        let jet = FirstJet::seed(coords).affine(&layer).tanh();
        assert_eq!(jet.order(), DerivativeOrder::First);
        assert_eq!(jet.d_dx.dims(), [3, 4]);
    }

    #[test]
    fn tanh_matches_closed_form_derivatives() {
        let device = Default::default();
        // z = x を直接 tanh に通す: d/dx = sech², d²/dx² = -2 tanh sech²
        let xs = [-1.5_f32, -0.2, 0.0, 0.7, 1.3];
        let coords = Tensor::<TestBackend, 1>::from_floats(
            xs.iter().flat_map(|x| [*x, 0.0]).collect::<Vec<_>>().as_slice(),
            &device,
        )
        .reshape([xs.len(), 2]);
        let jet = SecondJet::seed(coords).tanh().channel(0);
        let d1 = to_vec(jet.d_dx);
        let d2 = to_vec(jet.higher.d2_dx2);
        for (i, x) in xs.iter().enumerate() {
            let t = x.tanh();
            let sech2 = 1.0 - t * t;
            approx::assert_relative_eq!(d1[i], sech2, epsilon = 1e-5);
            approx::assert_relative_eq!(d2[i], -2.0 * t * sech2, epsilon = 1e-5);
        }
    }
}
