use std::path::Path;

use plotters::prelude::*;

use crate::snapshot::Observation;

pub const WIDTH: u32 = 700;
pub const HEIGHT: u32 = 450;

/// Draw the history of one station as a png line chart.  No text is drawn,
/// the page the image links to has the title and axes.
pub fn write_png(path: &Path, history: &[Observation]) -> Result<(), Box<dyn std::error::Error>> {
    if history.is_empty() {
        return Err("no observations to plot".into());
    }
    let data: Vec<(i64, i64)> = history
        .iter()
        .map(|e| {
            (
                e.zoned.timestamp().as_second(),
                i64::from(e.total_locked_cycle_count),
            )
        })
        .collect();

    let (x_min, x_max) = data
        .iter()
        .fold((data[0].0, data[0].0), |(min, max), (x, _)| (min.min(*x), max.max(*x)));
    let y_max = data.iter().map(|(_, y)| *y).max().unwrap_or(0);
    // a single point still needs a non empty range
    let x_range = x_min..(x_max.max(x_min + 1));
    let y_range = 0..(y_max + 1 + y_max / 10);

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(x_range, y_range)?;
    chart.draw_series(LineSeries::new(data, &BLUE))?;
    root.present()?;

    Ok(())
}
