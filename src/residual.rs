use crate::derivatives::{FieldValues, FirstPartials, SecondPartials};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 定常非圧縮Navier-Stokes方程式の残差。各点ごとに `[N, 1]`。
#[derive(Debug, Clone)]
pub struct Residuals<B: Backend> {
    pub continuity: Tensor<B, 2>,
    pub momentum_x: Tensor<B, 2>,
    pub momentum_y: Tensor<B, 2>,
}

/// 残差を計算します。
///
/// - 連続の式: `u_x + v_y`
/// - x方向運動量: `u u_x + v u_y + p_x - ν (u_xx + u_yy)`
/// - y方向運動量: `u v_x + v v_y + p_y - ν (v_xx + v_yy)`
///
/// 非有限値はそのまま伝播します。
pub fn navier_stokes<B: Backend>(
    fields: &FieldValues<B>,
    first: &FirstPartials<B>,
    second: &SecondPartials<B>,
    nu: f32,
) -> Residuals<B> {
    let u = fields.u.clone();
    let v = fields.v.clone();

    let continuity = first.u.dx.clone() + first.v.dy.clone();

    let advection_u = u.clone() * first.u.dx.clone() + v.clone() * first.u.dy.clone();
    let diffusion_u = (second.u.dxx.clone() + second.u.dyy.clone()).mul_scalar(nu);
    let momentum_x = advection_u + first.p.dx.clone() - diffusion_u;

    let advection_v = u * first.v.dx.clone() + v * first.v.dy.clone();
    let diffusion_v = (second.v.dxx.clone() + second.v.dyy.clone()).mul_scalar(nu);
    let momentum_y = advection_v + first.p.dy.clone() - diffusion_v;

    Residuals {
        continuity,
        momentum_x,
        momentum_y,
    }
}

impl<B: Backend> Residuals<B> {
    /// 各残差の二乗平均 `(continuity, momentum_x, momentum_y)`。
    pub fn mean_squares(&self) -> (Tensor<B, 1>, Tensor<B, 1>, Tensor<B, 1>) {
        let ms = |t: &Tensor<B, 2>| t.clone().powf_scalar(2.0).mean();
        (
            ms(&self.continuity),
            ms(&self.momentum_x),
            ms(&self.momentum_y),
        )
    }
}
