use crate::boundary::{BoundaryTerms, boundary_loss};
use crate::derivatives::second_pass;
use crate::error::{PinnError, Result};
use crate::mesh::{Collocation, Mesh};
use crate::model::FieldModel;
use crate::residual::navier_stokes;
use burn::prelude::Backend;
use burn::tensor::{ElementConversion, Tensor};

/// 損失の内訳。
#[derive(Debug, Clone)]
pub struct LossTerms<B: Backend> {
    pub continuity: Tensor<B, 1>,
    pub momentum_x: Tensor<B, 1>,
    pub momentum_y: Tensor<B, 1>,
    /// 境界名と、その境界の成分ごとの損失。
    pub boundaries: Vec<(String, BoundaryTerms<B>)>,
}

impl<B: Backend> LossTerms<B> {
    /// 内部点での物理損失（3つの残差の二乗平均の和）。
    pub fn physics(&self) -> Tensor<B, 1> {
        self.continuity.clone() + self.momentum_x.clone() + self.momentum_y.clone()
    }

    /// 全境界の損失の和。
    pub fn boundary(&self) -> Tensor<B, 1> {
        let device = self.continuity.device();
        self.boundaries
            .iter()
            .fold(Tensor::zeros([1], &device), |acc, (_, terms)| acc + terms.total())
    }

    /// 最小化する総損失。
    pub fn total(&self) -> Tensor<B, 1> {
        self.physics() + self.boundary()
    }

    /// ログ出力用に内訳を一行の文字列にします。
    pub fn describe(&self) -> String {
        let value = |t: &Tensor<B, 1>| t.clone().into_scalar().elem::<f32>();
        let mut line = format!(
            "continuity={:.3e} momentum_x={:.3e} momentum_y={:.3e}",
            value(&self.continuity),
            value(&self.momentum_x),
            value(&self.momentum_y)
        );
        for (name, terms) in &self.boundaries {
            line.push_str(&format!(
                " {name}=({:.3e}, {:.3e}, {:.3e})",
                value(&terms.u),
                value(&terms.v),
                value(&terms.p)
            ));
        }
        line
    }
}

/// 定常非圧縮Navier-Stokes方程式の損失を計算します。
///
/// 内部点での残差と、登録されたすべての境界の条件との誤差を足し合わせます。
/// 点と条件は構築時に検証され、その後は変更されません。
#[derive(Debug, Clone)]
pub struct LossEngine<B: Backend> {
    collocation: Collocation<B>,
    nu: f32,
}

impl<B: Backend> LossEngine<B> {
    /// メッシュを検証して損失エンジンを作ります。
    ///
    /// `nu` は動粘性係数です。
    pub fn new(mesh: &Mesh, nu: f32, device: &B::Device) -> Result<Self> {
        if !nu.is_finite() || nu < 0.0 {
            return Err(PinnError::InvalidConfig(format!(
                "動粘性係数は非負の有限値である必要があります: {nu}"
            )));
        }
        Ok(Self {
            collocation: Collocation::from_mesh(mesh, device)?,
            nu,
        })
    }

    pub fn nu(&self) -> f32 {
        self.nu
    }

    pub fn collocation(&self) -> &Collocation<B> {
        &self.collocation
    }

    /// 物理損失と境界損失を計算します。
    pub fn total_loss<M: FieldModel<B>>(&self, model: &M) -> LossTerms<B> {
        let pass = second_pass(model, self.collocation.interior());
        let residuals = navier_stokes(&pass.fields, &pass.first, &pass.second, self.nu);
        let (continuity, momentum_x, momentum_y) = residuals.mean_squares();

        let boundaries = self
            .collocation
            .boundaries()
            .iter()
            .map(|b| (b.name().to_string(), boundary_loss(model, b)))
            .collect();

        LossTerms {
            continuity,
            momentum_x,
            momentum_y,
            boundaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{Condition, Conditions};
    use crate::jet::{Jet, Order};
    use crate::mesh::{BoundarySpec, Dimension};
    use crate::model::{ModelConfig, OUTPUT_SIZE};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    /// 常に u = v = p = 0 を返すモデル。
    struct Quiescent;

    impl FieldModel<TestBackend> for Quiescent {
        fn forward(&self, coords: Tensor<TestBackend, 2>) -> Tensor<TestBackend, 2> {
            let [n, _] = coords.dims();
            Tensor::zeros([n, OUTPUT_SIZE], &coords.device())
        }

        fn forward_jet<T: Order<TestBackend>>(
            &self,
            input: Jet<TestBackend, T>,
        ) -> Jet<TestBackend, T> {
            let value = self.forward(input.value);
            Jet {
                d_dx: value.zeros_like(),
                d_dy: value.zeros_like(),
                higher: input.higher.map(|_| value.zeros_like()),
                value,
            }
        }
    }

    fn cavity_like(top: Conditions) -> Mesh {
        let side = |x: Vec<f32>, y: Vec<f32>, c| BoundarySpec::new(x, y, c);
        let wall = Conditions::new(
            Condition::Dirichlet(0.0),
            Condition::Dirichlet(0.0),
            Condition::Dirichlet(0.0),
        );
        Mesh::new(Dimension::TwoD)
            .with_interior(vec![0.2, 0.5, 0.8], vec![0.3, 0.5, 0.7])
            .with_boundary("top", side(vec![0.0, 0.5, 1.0], vec![1.0; 3], top))
            .with_boundary("bottom", side(vec![0.0, 0.5, 1.0], vec![0.0; 3], wall))
            .with_boundary("left", side(vec![0.0; 3], vec![0.0, 0.5, 1.0], wall))
            .with_boundary("right", side(vec![1.0; 3], vec![0.0, 0.5, 1.0], wall))
    }

    #[test]
    fn trivial_solution_has_zero_loss() {
        let device = Default::default();
        let wall = Conditions::new(
            Condition::Dirichlet(0.0),
            Condition::Dirichlet(0.0),
            Condition::Dirichlet(0.0),
        );
        let engine = LossEngine::<TestBackend>::new(&cavity_like(wall), 0.01, &device).unwrap();
        let terms = engine.total_loss(&Quiescent);
        assert_eq!(terms.total().into_scalar(), 0.0);
        assert_eq!(terms.boundaries.len(), 4);
    }

    #[test]
    fn moving_lid_penalizes_resting_fluid() {
        let device = Default::default();
        let engine =
            LossEngine::<TestBackend>::new(&cavity_like(Conditions::velocity(1.0, 0.0)), 0.01, &device)
                .unwrap();
        let terms = engine.total_loss(&Quiescent);
        assert_eq!(terms.physics().into_scalar(), 0.0);
        // 上辺の u = 1 との誤差だけが残る
        approx::assert_relative_eq!(terms.total().into_scalar(), 1.0);
    }

    #[test]
    fn total_is_sum_of_physics_and_boundary_terms() {
        let device = Default::default();
        let model = ModelConfig::new(vec![8, 8]).init::<TestBackend>(&device);
        let engine =
            LossEngine::<TestBackend>::new(&cavity_like(Conditions::velocity(1.0, 0.0)), 0.01, &device)
                .unwrap();
        let terms = engine.total_loss(&model);
        let total = terms.total().into_scalar();
        let parts = terms.physics().into_scalar()
            + terms
                .boundaries
                .iter()
                .map(|(_, t)| t.total().into_scalar())
                .sum::<f32>();
        approx::assert_relative_eq!(total, parts, max_relative = 1e-5);
        assert!(total > 0.0);
        assert!(terms.describe().contains("top="));
    }

    #[test]
    fn loss_is_deterministic() {
        let device = Default::default();
        let model = ModelConfig::new(vec![8]).init::<TestBackend>(&device);
        let engine =
            LossEngine::<TestBackend>::new(&cavity_like(Conditions::velocity(1.0, 0.0)), 0.01, &device)
                .unwrap();
        let a = engine.total_loss(&model).total().into_scalar();
        let b = engine.total_loss(&model).total().into_scalar();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn rejects_negative_viscosity() {
        let device = Default::default();
        let err = LossEngine::<TestBackend>::new(&cavity_like(Conditions::default()), -1.0, &device)
            .unwrap_err();
        assert!(matches!(err, PinnError::InvalidConfig(_)));
    }
}
