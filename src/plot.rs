use crate::error::{PinnError, Result};
use plotters::prelude::*;
use std::path::Path;

/// 学習過程の損失 `(ステップ, 損失)` をグラフとしてPNGファイルに出力します。
///
/// 縦軸は log10 スケールです。有限でない損失は描画から除きます。
pub fn plot_loss_history(history: &[(usize, f32)], path: &Path) -> Result<()> {
    draw(history, path).map_err(|e| PinnError::Plot(e.to_string()))
}

/// 描画範囲 `(x_max, y_min, y_max)` を求めます。描ける点がなければ `None`。
fn bounds(points: &[(usize, f32)]) -> Option<(usize, f32, f32)> {
    let x_max = points.iter().map(|(s, _)| *s).max()?;
    let (lo, hi) = points
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), (_, v)| {
            (lo.min(*v), hi.max(*v))
        });
    Some((x_max.max(1), lo - 0.5, hi + 0.5))
}

fn draw(history: &[(usize, f32)], path: &Path) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let points: Vec<(usize, f32)> = history
        .iter()
        .filter(|(_, loss)| loss.is_finite() && *loss > 0.0)
        .map(|(step, loss)| (*step, loss.log10()))
        .collect();
    let Some((x_max, min_log_loss, max_log_loss)) = bounds(&points) else {
        return Ok(());
    };

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..x_max, min_log_loss..max_log_loss)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Epoch")
        .draw()?;
    chart
        .draw_series(LineSeries::new(points.iter().copied(), &RED))?
        .label("Training Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
