//! コロケーション点と境界の受け渡し。
//!
//! 点の生成そのものはこのクレートの外側で行い、ここでは生成済みの点と
//! 境界条件を受け取って、学習前に一度だけ検証・テンソル化します。

use crate::boundary::{Boundary, Conditions};
use crate::error::{PinnError, Result};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use std::collections::BTreeMap;

/// 問題の次元。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimension {
    #[default]
    TwoD,
    ThreeD,
}

/// 境界の記述。各フィールドは設定されるまで `None` です。
#[derive(Debug, Clone, Default)]
pub struct BoundarySpec {
    pub x: Option<Vec<f32>>,
    pub y: Option<Vec<f32>>,
    /// 点ごとの単位法線。`Direction::Normal` の条件を使う場合に必要です。
    pub normals: Option<Vec<[f32; 2]>>,
    pub conditions: Option<Conditions>,
}

impl BoundarySpec {
    pub fn new(x: Vec<f32>, y: Vec<f32>, conditions: Conditions) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            normals: None,
            conditions: Some(conditions),
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 2]>) -> Self {
        self.normals = Some(normals);
        self
    }

    fn validate<B: Backend>(&self, name: &str, device: &B::Device) -> Result<Boundary<B>> {
        let missing = |field| PinnError::MissingField {
            boundary: name.to_string(),
            field,
        };
        let x = self.x.as_deref().ok_or_else(|| missing("x"))?;
        let y = self.y.as_deref().ok_or_else(|| missing("y"))?;
        let conditions = self.conditions.ok_or_else(|| missing("conditions"))?;
        Boundary::new(name, x, y, self.normals.as_deref(), conditions, device)
    }
}

/// 内部点と境界の集合。
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub dimension: Dimension,
    pub x: Option<Vec<f32>>,
    pub y: Option<Vec<f32>>,
    /// 外部境界（流入口、壁など）。
    pub boundaries: BTreeMap<String, BoundarySpec>,
    /// 領域内部にある境界（翼面など）。
    pub interior_boundaries: BTreeMap<String, BoundarySpec>,
}

impl Mesh {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// 内部コロケーション点を設定します。
    pub fn with_interior(mut self, x: Vec<f32>, y: Vec<f32>) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_boundary(mut self, name: impl Into<String>, spec: BoundarySpec) -> Self {
        self.boundaries.insert(name.into(), spec);
        self
    }

    pub fn with_interior_boundary(mut self, name: impl Into<String>, spec: BoundarySpec) -> Self {
        self.interior_boundaries.insert(name.into(), spec);
        self
    }
}

/// 検証済みのコロケーション点。
#[derive(Debug, Clone)]
pub struct Collocation<B: Backend> {
    interior: Tensor<B, 2>,
    boundaries: Vec<Boundary<B>>,
}

impl<B: Backend> Collocation<B> {
    /// メッシュを検証し、すべての点を f32 のテンソルとしてデバイスに載せます。
    ///
    /// 3次元は未実装で、欠けているフィールドはここで設定エラーになります。
    pub fn from_mesh(mesh: &Mesh, device: &B::Device) -> Result<Self> {
        if mesh.dimension == Dimension::ThreeD {
            return Err(PinnError::Unimplemented(
                "3次元の損失関数はまだ実装されていません",
            ));
        }

        let x = mesh.x.as_deref().ok_or(PinnError::MissingInterior("x"))?;
        let y = mesh.y.as_deref().ok_or(PinnError::MissingInterior("y"))?;
        if x.len() != y.len() {
            return Err(PinnError::InvalidConfig(format!(
                "内部点の x ({}) と y ({}) の長さが一致しません",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(PinnError::InvalidConfig(
                "内部コロケーション点が1つもありません".to_string(),
            ));
        }
        let flat: Vec<f32> = x.iter().zip(y).flat_map(|(a, b)| [*a, *b]).collect();
        let interior = Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([x.len(), 2]);

        let boundaries = mesh
            .boundaries
            .iter()
            .chain(&mesh.interior_boundaries)
            .map(|(name, spec)| spec.validate(name, device))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            interior,
            boundaries,
        })
    }

    /// 内部点 `[N, 2]`。
    pub fn interior(&self) -> Tensor<B, 2> {
        self.interior.clone()
    }

    pub fn boundaries(&self) -> &[Boundary<B>] {
        &self.boundaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn square() -> Mesh {
        Mesh::new(Dimension::TwoD)
            .with_interior(vec![0.5, 0.25], vec![0.5, 0.75])
            .with_boundary(
                "top",
                BoundarySpec::new(vec![0.0, 1.0], vec![1.0, 1.0], Conditions::velocity(1.0, 0.0)),
            )
    }

    #[test]
    fn builds_interior_and_boundaries() {
        let device = Default::default();
        let mesh = square().with_interior_boundary(
            "Airfoil",
            BoundarySpec::new(vec![0.5], vec![0.5], Conditions::velocity(0.0, 0.0)),
        );
        let collocation = Collocation::<TestBackend>::from_mesh(&mesh, &device).unwrap();
        assert_eq!(collocation.interior().dims(), [2, 2]);
        let names: Vec<_> = collocation.boundaries().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["top", "Airfoil"]);
    }

    #[test]
    fn three_dimensional_mesh_is_unimplemented() {
        let device = Default::default();
        let mut mesh = square();
        mesh.dimension = Dimension::ThreeD;
        let err = Collocation::<TestBackend>::from_mesh(&mesh, &device).unwrap_err();
        assert!(matches!(err, PinnError::Unimplemented(_)));
    }

    #[test]
    fn missing_conditions_names_the_boundary() {
        let device = Default::default();
        let mut spec = BoundarySpec::new(vec![0.0], vec![0.0], Conditions::default());
        spec.conditions = None;
        let mesh = square().with_boundary("Outlet", spec);
        let err = Collocation::<TestBackend>::from_mesh(&mesh, &device).unwrap_err();
        match err {
            PinnError::MissingField { boundary, field } => {
                assert_eq!(boundary, "Outlet");
                assert_eq!(field, "conditions");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unset_coordinates_are_rejected() {
        let device = Default::default();
        let mesh = square().with_boundary("Inlet", BoundarySpec::default());
        let err = Collocation::<TestBackend>::from_mesh(&mesh, &device).unwrap_err();
        assert!(matches!(err, PinnError::MissingField { field: "x", .. }));

        let no_interior = Mesh::new(Dimension::TwoD);
        let err = Collocation::<TestBackend>::from_mesh(&no_interior, &device).unwrap_err();
        assert!(matches!(err, PinnError::MissingInterior("x")));
    }
}
