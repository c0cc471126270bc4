//! モデル出力 (u, v, p) の空間微分。
//!
//! 一階微分を求める [`first_pass`] と、u, v の二階微分まで求める
//! [`second_pass`] の二段構成です。

use crate::jet::{FirstJet, Jet, Order, SecondJet};
use crate::model::{FieldModel, P, U, V};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 各点での予測値。すべて `[N, 1]`。
#[derive(Debug, Clone)]
pub struct FieldValues<B: Backend> {
    pub u: Tensor<B, 2>,
    pub v: Tensor<B, 2>,
    pub p: Tensor<B, 2>,
}

/// (∂/∂x, ∂/∂y)
#[derive(Debug, Clone)]
pub struct Gradient<B: Backend> {
    pub dx: Tensor<B, 2>,
    pub dy: Tensor<B, 2>,
}

/// (∂²/∂x², ∂²/∂y²)
#[derive(Debug, Clone)]
pub struct Curvature<B: Backend> {
    pub dxx: Tensor<B, 2>,
    pub dyy: Tensor<B, 2>,
}

/// u, v, p の一階偏微分。
#[derive(Debug, Clone)]
pub struct FirstPartials<B: Backend> {
    pub u: Gradient<B>,
    pub v: Gradient<B>,
    pub p: Gradient<B>,
}

/// u, v の二階偏微分。圧力の二階微分はこの方程式では使いません。
#[derive(Debug, Clone)]
pub struct SecondPartials<B: Backend> {
    pub u: Curvature<B>,
    pub v: Curvature<B>,
}

/// 一階微分までの結果。
#[derive(Debug, Clone)]
pub struct FirstPass<B: Backend> {
    pub fields: FieldValues<B>,
    pub first: FirstPartials<B>,
}

/// 二階微分までの結果。
#[derive(Debug, Clone)]
pub struct SecondPass<B: Backend> {
    pub fields: FieldValues<B>,
    pub first: FirstPartials<B>,
    pub second: SecondPartials<B>,
}

fn gradient<B: Backend, T: Order<B>>(jet: &Jet<B, T>, channel: usize) -> Gradient<B> {
    let c = jet.channel(channel);
    Gradient {
        dx: c.d_dx,
        dy: c.d_dy,
    }
}

fn split<B: Backend, T: Order<B>>(jet: &Jet<B, T>) -> (FieldValues<B>, FirstPartials<B>) {
    let [n, _] = jet.value.dims();
    let column = |c: usize| jet.value.clone().slice([0..n, c..c + 1]);
    let fields = FieldValues {
        u: column(U),
        v: column(V),
        p: column(P),
    };
    let first = FirstPartials {
        u: gradient(jet, U),
        v: gradient(jet, V),
        p: gradient(jet, P),
    };
    (fields, first)
}

/// 座標 `[N, 2]` での予測値と一階偏微分を計算します。
pub fn first_pass<B: Backend, M: FieldModel<B>>(model: &M, coords: Tensor<B, 2>) -> FirstPass<B> {
    let jet = model.forward_jet(FirstJet::seed(coords));
    let (fields, first) = split(&jet);
    FirstPass { fields, first }
}

/// 一階の結果に、u と v の各軸方向の二階偏微分を加えて計算します。
pub fn second_pass<B: Backend, M: FieldModel<B>>(model: &M, coords: Tensor<B, 2>) -> SecondPass<B> {
    let jet = model.forward_jet(SecondJet::seed(coords));
    let (fields, first) = split(&jet);
    let curvature = |channel: usize| {
        let c = jet.channel(channel).higher;
        Curvature {
            dxx: c.d2_dx2,
            dyy: c.d2_dy2,
        }
    };
    SecondPass {
        fields,
        first,
        second: SecondPartials {
            u: curvature(U),
            v: curvature(V),
        },
    }
}
