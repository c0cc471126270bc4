//! 正方形キャビティ流れ（上辺が動く箱の中の流れ）のコロケーション点。
//!
//! 上辺は u = 1, v = 0、他の3辺は u = v = 0 の滑りなし壁で、圧力は
//! どの境界でも拘束しません。

use crate::boundary::Conditions;
use crate::mesh::{BoundarySpec, Dimension, Mesh};
use rand::Rng;

/// 問題の識別子。
pub const PROBLEM_ID: &str = "LidDrivenCavity";

/// 点の配置方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Sampling {
    /// 一様乱数。
    Random,
    /// 等間隔の格子。
    Uniform,
}

/// 矩形領域のキャビティ問題。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LidDrivenCavity {
    pub x_range: (f32, f32),
    pub y_range: (f32, f32),
    /// 上辺の速度。
    pub lid_velocity: f32,
}

impl Default for LidDrivenCavity {
    fn default() -> Self {
        Self {
            x_range: (0.0, 1.0),
            y_range: (0.0, 1.0),
            lid_velocity: 1.0,
        }
    }
}

fn linspace(lo: f32, hi: f32, n: usize) -> Vec<f32> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => (0..n)
            .map(|i| lo + (hi - lo) * i as f32 / (n - 1) as f32)
            .collect(),
    }
}

impl LidDrivenCavity {
    /// 内部点 `n_interior` 点と、各辺 `n_boundary` 点からなるメッシュを作ります。
    ///
    /// `Uniform` の内部点は一辺 `floor(sqrt(n_interior))` 点の格子で、辺上の点を除いた
    /// 内側に置きます。
    pub fn mesh<R: Rng>(
        &self,
        n_interior: usize,
        n_boundary: usize,
        sampling: Sampling,
        rng: &mut R,
    ) -> Mesh {
        let (x_min, x_max) = self.x_range;
        let (y_min, y_max) = self.y_range;

        let (x, y) = match sampling {
            Sampling::Random => (0..n_interior)
                .map(|_| (rng.random_range(x_min..x_max), rng.random_range(y_min..y_max)))
                .unzip(),
            Sampling::Uniform => {
                let side = (n_interior as f64).sqrt().floor() as usize;
                let xs = linspace(x_min, x_max, side + 2);
                let ys = linspace(y_min, y_max, side + 2);
                let inner = |v: &[f32]| v[1..v.len() - 1].to_vec();
                let (xs, ys) = (inner(&xs), inner(&ys));
                ys.iter()
                    .flat_map(|y| xs.iter().map(move |x| (*x, *y)))
                    .unzip()
            }
        };

        let along = |lo: f32, hi: f32, rng: &mut R| -> Vec<f32> {
            match sampling {
                Sampling::Random => (0..n_boundary).map(|_| rng.random_range(lo..hi)).collect(),
                Sampling::Uniform => linspace(lo, hi, n_boundary),
            }
        };
        let wall = Conditions::velocity(0.0, 0.0);

        let left_y = along(y_min, y_max, &mut *rng);
        let right_y = along(y_min, y_max, &mut *rng);
        let bottom_x = along(x_min, x_max, &mut *rng);
        let top_x = along(x_min, x_max, &mut *rng);

        Mesh::new(Dimension::TwoD)
            .with_interior(x, y)
            .with_boundary(
                "left",
                BoundarySpec::new(vec![x_min; left_y.len()], left_y, wall),
            )
            .with_boundary(
                "right",
                BoundarySpec::new(vec![x_max; right_y.len()], right_y, wall),
            )
            .with_boundary(
                "bottom",
                BoundarySpec::new(bottom_x.clone(), vec![y_min; bottom_x.len()], wall),
            )
            .with_boundary(
                "top",
                BoundarySpec::new(
                    top_x.clone(),
                    vec![y_max; top_x.len()],
                    Conditions::velocity(self.lid_velocity, 0.0),
                ),
            )
    }

    /// 推論用の `nx × ny` 格子点（境界を含む）。
    pub fn grid(&self, nx: usize, ny: usize) -> Vec<[f32; 2]> {
        let xs = linspace(self.x_range.0, self.x_range.1, nx);
        let ys = linspace(self.y_range.0, self.y_range.1, ny);
        ys.iter()
            .flat_map(|y| xs.iter().map(move |x| [*x, *y]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::Condition;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_points_stay_inside_the_box() {
        let mut rng = StdRng::seed_from_u64(7);
        let mesh = LidDrivenCavity::default().mesh(50, 8, Sampling::Random, &mut rng);
        let x = mesh.x.unwrap();
        let y = mesh.y.unwrap();
        assert_eq!(x.len(), 50);
        assert!(x.iter().chain(&y).all(|v| (0.0..1.0).contains(v)));
        assert_eq!(mesh.boundaries.len(), 4);
        for spec in mesh.boundaries.values() {
            assert_eq!(spec.x.as_ref().unwrap().len(), 8);
        }
    }

    #[test]
    fn uniform_interior_is_a_grid_without_walls() {
        let mut rng = StdRng::seed_from_u64(0);
        let mesh = LidDrivenCavity::default().mesh(10, 4, Sampling::Uniform, &mut rng);
        let x = mesh.x.unwrap();
        assert_eq!(x.len(), 9);
        assert!(x.iter().all(|v| *v > 0.0 && *v < 1.0));
        let top = &mesh.boundaries["top"];
        assert_eq!(top.x.as_deref().unwrap(), &[0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0]);
    }

    #[test]
    fn only_the_lid_moves_and_pressure_is_free() {
        let mut rng = StdRng::seed_from_u64(1);
        let mesh = LidDrivenCavity::default().mesh(4, 4, Sampling::Random, &mut rng);
        for (name, spec) in &mesh.boundaries {
            let c = spec.conditions.unwrap();
            let lid = if name == "top" { 1.0 } else { 0.0 };
            assert_eq!(c.u, Condition::Dirichlet(lid));
            assert_eq!(c.v, Condition::Dirichlet(0.0));
            assert_eq!(c.p, Condition::Free);
        }
    }

    #[test]
    fn grid_spans_the_domain() {
        let grid = LidDrivenCavity::default().grid(3, 2);
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0], [0.0, 0.0]);
        assert_eq!(grid[5], [1.0, 1.0]);
    }
}
