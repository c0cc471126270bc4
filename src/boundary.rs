//! 境界条件と境界損失。

use crate::error::{PinnError, Result};
use crate::jet::{FirstJet, FirstOrder};
use crate::model::{FieldModel, P, U, V};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// ノイマン条件で微分をとる方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    X,
    Y,
    /// 境界に与えられた点ごとの法線方向。
    Normal,
}

/// 1成分に対する境界条件。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Condition {
    /// 拘束なし。損失には常に 0 を寄与します。
    #[default]
    Free,
    /// 値を固定します（ディリクレ条件）。
    Dirichlet(f32),
    /// 方向微分を固定します（ノイマン条件）。
    Neumann { gradient: f32, direction: Direction },
}

impl Condition {
    /// 勾配ゼロのノイマン条件。
    pub fn zero_gradient(direction: Direction) -> Self {
        Condition::Neumann {
            gradient: 0.0,
            direction,
        }
    }
}

/// (u, v, p) それぞれの境界条件。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Conditions {
    pub u: Condition,
    pub v: Condition,
    pub p: Condition,
}

impl Conditions {
    pub fn new(u: Condition, v: Condition, p: Condition) -> Self {
        Self { u, v, p }
    }

    /// 速度を固定し、圧力は拘束しない条件（壁・移動壁）。
    pub fn velocity(u: f32, v: f32) -> Self {
        Self::new(Condition::Dirichlet(u), Condition::Dirichlet(v), Condition::Free)
    }
}

/// 方向微分をとる向き。法線は点ごとの `[N, 2]` を持ちます。
#[derive(Debug, Clone)]
enum Along<B: Backend> {
    X,
    Y,
    Normal(Tensor<B, 2>),
}

/// 境界の点と突き合わせ済みの、1成分に対する拘束。
#[derive(Debug, Clone)]
enum Constraint<B: Backend> {
    Free,
    Value(f32),
    Slope { gradient: f32, along: Along<B> },
}

/// 損失計算に使える状態まで検証済みの境界。
#[derive(Debug, Clone)]
pub struct Boundary<B: Backend> {
    name: String,
    coords: Tensor<B, 2>,
    conditions: Conditions,
    /// u, v, p の順。
    constraints: [Constraint<B>; 3],
    len: usize,
}

impl<B: Backend> Boundary<B> {
    /// 座標と条件から境界を作り、デバイス上のテンソルに変換します。
    pub fn new(
        name: &str,
        x: &[f32],
        y: &[f32],
        normals: Option<&[[f32; 2]]>,
        conditions: Conditions,
        device: &B::Device,
    ) -> Result<Self> {
        let len = x.len();
        if y.len() != len {
            return Err(PinnError::LengthMismatch {
                boundary: name.to_string(),
                field: "y",
                expected: len,
                found: y.len(),
            });
        }
        if let Some(n) = normals {
            if n.len() != len {
                return Err(PinnError::LengthMismatch {
                    boundary: name.to_string(),
                    field: "normals",
                    expected: len,
                    found: n.len(),
                });
            }
        }

        let normals = normals.map(|n| to_pairs(n.iter().flatten().copied(), len, device));
        let resolve = |condition: Condition| -> Result<Constraint<B>> {
            Ok(match condition {
                Condition::Free => Constraint::Free,
                Condition::Dirichlet(target) => Constraint::Value(target),
                Condition::Neumann {
                    gradient,
                    direction,
                } => {
                    let along = match direction {
                        Direction::X => Along::X,
                        Direction::Y => Along::Y,
                        Direction::Normal => Along::Normal(normals.clone().ok_or_else(|| {
                            PinnError::MissingField {
                                boundary: name.to_string(),
                                field: "normals",
                            }
                        })?),
                    };
                    Constraint::Slope { gradient, along }
                }
            })
        };
        let constraints = [
            resolve(conditions.u)?,
            resolve(conditions.v)?,
            resolve(conditions.p)?,
        ];

        Ok(Self {
            name: name.to_string(),
            coords: to_pairs(x.iter().zip(y).flat_map(|(a, b)| [*a, *b]), len, device),
            conditions,
            constraints,
            len,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn coords(&self) -> Tensor<B, 2> {
        self.coords.clone()
    }

    fn needs_gradient(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::Slope { .. }))
    }
}

fn to_pairs<B: Backend>(
    values: impl Iterator<Item = f32>,
    len: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let flat: Vec<f32> = values.collect();
    Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([len, 2])
}

/// 1つの境界が寄与する成分ごとの損失。
#[derive(Debug, Clone)]
pub struct BoundaryTerms<B: Backend> {
    pub u: Tensor<B, 1>,
    pub v: Tensor<B, 1>,
    pub p: Tensor<B, 1>,
}

impl<B: Backend> BoundaryTerms<B> {
    fn zeros(device: &B::Device) -> Self {
        Self {
            u: Tensor::zeros([1], device),
            v: Tensor::zeros([1], device),
            p: Tensor::zeros([1], device),
        }
    }

    pub fn total(&self) -> Tensor<B, 1> {
        self.u.clone() + self.v.clone() + self.p.clone()
    }
}

/// 境界上でモデルを評価し、条件との二乗平均誤差を成分ごとに計算します。
///
/// 拘束のない成分や点を持たない境界は 0 を返します。
pub fn boundary_loss<B: Backend, M: FieldModel<B>>(
    model: &M,
    boundary: &Boundary<B>,
) -> BoundaryTerms<B> {
    let device = boundary.coords.device();
    if boundary.is_empty() {
        return BoundaryTerms::zeros(&device);
    }

    // ノイマン条件がなければ微分は読まれない
    let jet = if boundary.needs_gradient() {
        model.forward_jet(FirstJet::seed(boundary.coords()))
    } else {
        let value = model.forward(boundary.coords());
        FirstJet {
            d_dx: Tensor::zeros_like(&value),
            d_dy: Tensor::zeros_like(&value),
            value,
            higher: FirstOrder,
        }
    };

    let term = |channel: usize, constraint: &Constraint<B>| -> Tensor<B, 1> {
        match constraint {
            Constraint::Free => Tensor::zeros([1], &device),
            Constraint::Value(target) => {
                let c = jet.channel(channel);
                c.value.sub_scalar(*target).powf_scalar(2.0).mean()
            }
            Constraint::Slope { gradient, along } => {
                let c = jet.channel(channel);
                let derivative = match along {
                    Along::X => c.d_dx,
                    Along::Y => c.d_dy,
                    Along::Normal(normals) => {
                        let n = boundary.len;
                        let nx = normals.clone().slice([0..n, 0..1]);
                        let ny = normals.clone().slice([0..n, 1..2]);
                        nx * c.d_dx + ny * c.d_dy
                    }
                };
                derivative.sub_scalar(*gradient).powf_scalar(2.0).mean()
            }
        }
    };

    let [u, v, p] = &boundary.constraints;
    BoundaryTerms {
        u: term(U, u),
        v: term(V, v),
        p: term(P, p),
    }
}
