use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::display::orchestrate::{CombinedScope, LabeledTrace, ScanComparison, ScanPanel, SequencerScope};
use crate::error::ScopeError;
use crate::sequencer::Timeline;

const TIME_AXIS: &str = "Time increment (10 ns)";
/// Height of a high clock state inside its unit-tall row.
const STATE_HEIGHT: f64 = 0.8;

#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub foreground: RGBColor,
    pub clock_color: RGBColor,
    pub palette: Vec<RGBColor>,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1300,
            height: 800,
            background: RGBColor(10, 10, 10),
            foreground: WHITE,
            clock_color: RGBColor(255, 165, 0),
            palette: vec![BLUE, RED, GREEN, CYAN, MAGENTA, YELLOW, WHITE],
        }
    }
}

impl PlotStyle {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Palette slot `index`, wrapping; the foreground when the palette is empty.
    fn color(&self, index: usize) -> RGBColor {
        match self.palette.len() {
            0 => self.foreground,
            len => self.palette[index % len],
        }
    }

    fn canvas(&self) -> Vec<u8> {
        vec![0u8; self.width as usize * self.height as usize * 3]
    }

    fn text(&self, size: u32) -> TextStyle<'static> {
        ("sans-serif", f64::from(size)).into_font().color(&self.foreground)
    }
}

fn value_bounds(traces: &[LabeledTrace]) -> (f64, f64) {
    let (min, max) = traces
        .iter()
        .flat_map(|t| t.trace.iter().copied())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1.0);
    (min - pad, max + pad)
}

/// Post-step outline of each clock, row `i` drawn between `i` and `i + 0.8`.
fn clock_paths(timeline: &Timeline, style: &PlotStyle) -> Vec<PathElement<(f64, f64)>> {
    timeline
        .rows
        .iter()
        .enumerate()
        .map(|(row, clock)| {
            let mut points = Vec::with_capacity(clock.states.len() * 2);
            for (i, &high) in clock.states.iter().enumerate() {
                let y = row as f64 + if high { STATE_HEIGHT } else { 0.0 };
                points.push((i as f64, y));
                points.push((i as f64 + 1.0, y));
            }
            PathElement::new(points, style.clock_color.stroke_width(2))
        })
        .collect()
}

fn clock_labels(timeline: &Timeline, style: &PlotStyle) -> Vec<Text<'static, (f64, f64), String>> {
    let x = timeline.window_len() as f64 * 0.005;
    timeline
        .rows
        .iter()
        .enumerate()
        .map(|(row, clock)| Text::new(clock.clock.clone(), (x, row as f64 + 0.35), style.text(12)))
        .collect()
}

fn tick_lines(ticks: &[usize], top: f64, style: &PlotStyle) -> Vec<PathElement<(f64, f64)>> {
    ticks
        .iter()
        .map(|&x| {
            PathElement::new(
                vec![(x as f64, 0.0), (x as f64, top)],
                style.foreground.mix(0.25).stroke_width(1),
            )
        })
        .collect()
}

fn tick_labels(ticks: &[(usize, String)], y: f64, style: &PlotStyle) -> Vec<Text<'static, (f64, f64), String>> {
    ticks
        .iter()
        .map(|(x, label)| Text::new(label.clone(), (*x as f64, y), style.text(10)))
        .collect()
}

fn numbered(ticks: &[usize]) -> Vec<(usize, String)> {
    ticks.iter().map(|&t| (t, t.to_string())).collect()
}

pub fn render_sequencer_png(scope: &SequencerScope, style: &PlotStyle) -> Result<Vec<u8>, ScopeError> {
    let timeline = &scope.timeline;
    let rows = timeline.rows.len().max(1) as f64;
    let x_max = timeline.window_len() as f64;
    let mut buffer = style.canvas();
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(scope.function(), style.text(20))
            .set_label_area_size(LabelAreaPosition::Left, 45)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(0f64..x_max, 0f64..rows)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .y_label_formatter(&|_| String::new())
            .x_desc(TIME_AXIS)
            .y_desc("Sequencer states")
            .label_style(style.text(12))
            .axis_desc_style(style.text(14))
            .draw()?;
        chart.draw_series(tick_lines(&scope.ticks, rows, style))?;
        chart.draw_series(tick_labels(&numbered(&scope.ticks), rows - 0.05, style))?;
        chart.draw_series(clock_paths(timeline, style))?;
        chart.draw_series(clock_labels(timeline, style))?;
        root.present()?;
    }
    encode_png(buffer, style.width, style.height)
}

pub fn render_combined_png(scope: &CombinedScope, style: &PlotStyle) -> Result<Vec<u8>, ScopeError> {
    let timeline = &scope.sequencer.timeline;
    let rows = timeline.rows.len().max(1) as f64;
    let x_max = timeline.window_len() as f64;
    let (y_min, y_max) = value_bounds(&scope.traces);
    let mut buffer = style.canvas();
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(&scope.title, style.text(20))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Right, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(0f64..x_max, y_min..y_max)?
            .set_secondary_coord(0f64..x_max, 0f64..rows);
        chart
            .configure_mesh()
            .disable_y_mesh()
            .light_line_style(&style.foreground.mix(0.1))
            .x_desc(TIME_AXIS)
            .y_desc("Scan (ADU)")
            .label_style(style.text(12))
            .axis_desc_style(style.text(14))
            .draw()?;
        chart
            .configure_secondary_axes()
            .y_label_formatter(&|_| String::new())
            .y_desc("Sequencer states")
            .label_style(style.text(12))
            .axis_desc_style(style.text(14))
            .draw()?;
        chart.draw_secondary_series(tick_lines(&scope.sequencer.ticks, rows, style))?;
        chart.draw_secondary_series(tick_labels(&numbered(&scope.sequencer.ticks), rows - 0.05, style))?;
        chart.draw_secondary_series(clock_paths(timeline, style))?;
        chart.draw_secondary_series(clock_labels(timeline, style))?;
        for labeled in &scope.traces {
            let color = style.color(labeled.color_index);
            let series = labeled.trace.iter().enumerate().map(|(i, v)| (i as f64, *v));
            chart
                .draw_series(LineSeries::new(series, &color))?
                .label(labeled.label.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        if !scope.traces.is_empty() {
            chart
                .configure_series_labels()
                .border_style(&style.foreground.mix(0.2))
                .background_style(&style.background)
                .label_font(style.text(12))
                .draw()?;
        }
        root.present()?;
    }
    encode_png(buffer, style.width, style.height)
}

fn draw_scan_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    panel: &ScanPanel,
    style: &PlotStyle,
) -> Result<(), ScopeError> {
    let x_max = panel
        .traces
        .iter()
        .map(|t| t.trace.len())
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let (y_min, y_max) = value_bounds(&panel.traces);
    let mut chart = ChartBuilder::on(area)
        .margin(8)
        .caption(&panel.title, style.text(14))
        .set_label_area_size(LabelAreaPosition::Left, 50)
        .set_label_area_size(LabelAreaPosition::Bottom, 30)
        .build_cartesian_2d(0f64..x_max, y_min..y_max)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(&style.foreground.mix(0.1))
        .y_desc("Scan (ADU)")
        .label_style(style.text(10))
        .axis_desc_style(style.text(12))
        .draw()?;
    let positions: Vec<usize> = panel.ticks.iter().map(|(x, _)| *x).collect();
    chart.draw_series(tick_lines(&positions, y_max, style))?;
    chart.draw_series(tick_labels(&panel.ticks, y_min, style))?;
    for labeled in &panel.traces {
        let color = style.color(labeled.color_index);
        let series = labeled.trace.iter().enumerate().map(|(i, v)| (i as f64, *v));
        chart
            .draw_series(LineSeries::new(series, &color))?
            .label(labeled.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }
    if !panel.traces.is_empty() {
        chart
            .configure_series_labels()
            .border_style(&style.foreground.mix(0.2))
            .background_style(&style.background)
            .label_font(style.text(10))
            .draw()?;
    }
    Ok(())
}

pub fn render_scan_png(comparison: &ScanComparison, style: &PlotStyle) -> Result<Vec<u8>, ScopeError> {
    if comparison.panels.is_empty() {
        return Err(ScopeError::Plot("scan comparison has no channels".into()));
    }
    let count = comparison.panels.len();
    let cols = (count as f64).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);
    let mut buffer = style.canvas();
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let areas = root.split_evenly((rows, cols));
        for (panel, area) in comparison.panels.iter().zip(areas.iter()) {
            draw_scan_panel(area, panel, style)?;
        }
        root.present()?;
    }
    encode_png(buffer, style.width, style.height)
}

/// Encode an RGB canvas of `width` x `height` pixels as PNG bytes.
fn encode_png(canvas: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let len = canvas.len();
    let frame = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, canvas).ok_or_else(|| {
        ScopeError::Plot(format!("{len} canvas bytes do not cover a {width}x{height} RGB frame"))
    })?;
    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(frame).write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}

pub fn write_png(path: &Path, png: &[u8]) -> Result<(), ScopeError> {
    std::fs::write(path, png).map_err(|source| ScopeError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::ClockRow;
    use crate::types::Trace;

    fn timeline() -> Timeline {
        Timeline {
            function: "ReadPixel".into(),
            offset: 0,
            extend: 1,
            rows: vec![
                ClockRow { clock: "RG".into(), states: vec![true, false, true] },
                ClockRow { clock: "TRG".into(), states: vec![false, true, false] },
            ],
            transitions: vec![0, 1, 2],
        }
    }

    #[test]
    fn clock_rows_step_inside_their_band() {
        let style = PlotStyle::default();
        let labels = clock_labels(&timeline(), &style);
        assert_eq!(labels.len(), 2);
        let paths = clock_paths(&timeline(), &style);
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn bounds_pad_flat_and_empty_traces() {
        assert_eq!(value_bounds(&[]), (0.0, 1.0));
        let flat = LabeledTrace {
            label: "DSI".into(),
            color_index: 0,
            trace: Trace::from_elem(4, 10.0),
        };
        assert_eq!(value_bounds(&[flat]), (9.0, 11.0));
    }

    #[test]
    fn encodes_png_signature() {
        let style = PlotStyle::sized(4, 3);
        let png = encode_png(style.canvas(), 4, 3).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(matches!(
            encode_png(vec![0u8; 5], 4, 3),
            Err(ScopeError::Plot(message)) if message.contains("4x3")
        ));
    }

    #[test]
    fn empty_palette_falls_back_to_foreground() {
        let style = PlotStyle {
            palette: Vec::new(),
            ..PlotStyle::default()
        };
        assert_eq!(style.color(3).rgb(), style.foreground.rgb());
        let style = PlotStyle::default();
        assert_eq!(style.color(8).rgb(), style.palette[1].rgb());
    }
}
