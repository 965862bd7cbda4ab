//! Chart rendering. Every chart is drawn with plotters onto an in-memory SVG
//! document, rasterised to PNG with resvg and handed back as a base64 [`Chart`].

use std::sync::{Arc, OnceLock};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use super::stats::{percentile, sample_std};
use crate::error::AppError;
use crate::models::{AssociationMatrix, Chart};

const FONT: &str = "sans-serif";
const MAX_BINS: usize = 100;
const KDE_POINTS: usize = 200;
const LABEL_CHARS: usize = 24;
const SANS_FAMILIES: [&str; 3] = ["DejaVu Sans", "Liberation Sans", "Arial"];
const BAR_COLOR: RGBColor = RGBColor(76, 114, 176);
const KDE_COLOR: RGBColor = RGBColor(196, 78, 82);

/// Colour scale used for heatmap cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    /// Diverging blue-white-red over [-1, 1].
    CoolWarm,
    /// Sequential white-to-navy over [0, 1].
    Blues,
}

impl Palette {
    pub fn color(self, value: Option<f64>) -> RGBColor {
        let Some(value) = value.filter(|v| v.is_finite()) else {
            return RGBColor(220, 220, 220);
        };
        match self {
            Palette::CoolWarm => {
                let t = value.clamp(-1.0, 1.0);
                if t < 0.0 {
                    lerp((221, 221, 221), (59, 76, 192), -t)
                } else {
                    lerp((221, 221, 221), (180, 4, 38), t)
                }
            }
            Palette::Blues => lerp((247, 251, 255), (8, 48, 107), value.clamp(0.0, 1.0)),
        }
    }

    fn is_dark(self, value: Option<f64>) -> bool {
        match (self, value) {
            (Palette::CoolWarm, Some(v)) => v.abs() > 0.6,
            (Palette::Blues, Some(v)) => v > 0.55,
            _ => false,
        }
    }
}

fn lerp(from: (u8, u8, u8), to: (u8, u8, u8), t: f64) -> RGBColor {
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

fn draw_svg<F>(size: (u32, u32), draw: F) -> Result<String, AppError>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), AppError>,
{
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }
    Ok(svg)
}

/// System fonts, loaded once. The generic `sans-serif` family plotters asks
/// for is pointed at the first common sans face found.
fn fonts() -> Arc<fontdb::Database> {
    static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            let has_family =
                |name: &str| db.faces().any(|face| face.families.iter().any(|(family, _)| family == name));
            let family = SANS_FAMILIES
                .iter()
                .copied()
                .find(|&name| has_family(name))
                .map(str::to_string)
                .or_else(|| db.faces().next().and_then(|face| face.families.first()).map(|(family, _)| family.clone()));
            match family {
                Some(family) => db.set_sans_serif_family(family),
                None => tracing::warn!("No system fonts found; chart text will not be drawn"),
            }
            tracing::debug!("Loaded {} font faces for chart rendering", db.len());
            Arc::new(db)
        })
        .clone()
}

fn rasterize(svg: &str, (width, height): (u32, u32)) -> Result<Vec<u8>, AppError> {
    let mut options = usvg::Options::default();
    options.fontdb = fonts();

    let tree = usvg::Tree::from_data(svg.as_bytes(), &options)
        .map_err(|e| AppError::ChartError(format!("SVG parse failed: {}", e)))?;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| AppError::ChartError(format!("Cannot allocate a {}x{} canvas", width, height)))?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::ChartError(format!("PNG encoding failed: {}", e)))?;
        writer
            .write_image_data(pixmap.data())
            .map_err(|e| AppError::ChartError(format!("PNG encoding failed: {}", e)))?;
        writer
            .finish()
            .map_err(|e| AppError::ChartError(format!("PNG encoding failed: {}", e)))?;
    }
    Ok(out)
}

fn to_chart(svg: &str, size: (u32, u32)) -> Result<Chart, AppError> {
    Ok(Chart::from_png(&rasterize(svg, size)?))
}

fn render_chart<F>(size: (u32, u32), draw: F) -> Result<Chart, AppError>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<(), AppError>,
{
    to_chart(&draw_svg(size, draw)?, size)
}

/// plotters only turns text in quarter steps; labels drawn with
/// `Rotate90` are tilted to 45 degrees in the SVG before rasterising.
fn slant_labels(svg: &str) -> String {
    svg.replace("transform=\"rotate(90, ", "transform=\"rotate(45, ")
}

fn short_label(label: &str) -> String {
    if label.chars().count() <= LABEL_CHARS {
        label.to_string()
    } else {
        let head: String = label.chars().take(LABEL_CHARS - 1).collect();
        format!("{}…", head)
    }
}

fn segment_label(value: &SegmentValue<&String>) -> String {
    match value {
        SegmentValue::Exact(label) | SegmentValue::CenterOf(label) => short_label(label),
        SegmentValue::Last => String::new(),
    }
}

/// Left and right edges of the `idx`-th of `n` index segments.
fn cell_span(idx: u32, n: u32) -> (SegmentValue<u32>, SegmentValue<u32>) {
    let end = if idx + 1 < n { SegmentValue::Exact(idx + 1) } else { SegmentValue::Last };
    (SegmentValue::Exact(idx), end)
}

fn index_label(names: &[String], value: &SegmentValue<u32>) -> String {
    match value {
        SegmentValue::Exact(idx) | SegmentValue::CenterOf(idx) => {
            names.get(*idx as usize).map(|name| short_label(name)).unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    }
}

/// Axis range padded so that a single repeated value still spans some width.
fn padded_range(min: f64, max: f64) -> (f64, f64) {
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(*v), hi.max(*v))
    })
}

fn no_data(area: &DrawingArea<SVGBackend<'_>, Shift>, caption: &str) -> Result<(), AppError> {
    let (w, h) = area.dim_in_pixel();
    let style = TextStyle::from((FONT, 18).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    area.draw(&Text::new(format!("{}: no data", caption), ((w / 2) as i32, (h / 2) as i32), style))?;
    Ok(())
}

/// Histogram bin edges and counts. Bin width is the smaller of the Sturges and
/// Freedman-Diaconis estimates.
pub fn histogram_bins(values: &[f64]) -> Vec<(f64, f64, usize)> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
    if max - min <= 0.0 {
        return vec![(min - 0.5, max + 0.5, sorted.len())];
    }

    let n = sorted.len() as f64;
    let range = max - min;
    let sturges = range / (n.log2() + 1.0);
    let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);
    let fd = 2.0 * iqr * n.powf(-1.0 / 3.0);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };
    let bins = ((range / width).ceil() as usize).clamp(1, MAX_BINS);
    let width = range / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in &sorted {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (min + i as f64 * width, min + (i + 1) as f64 * width, count))
        .collect()
}

/// Gaussian kernel density with Scott's bandwidth, evaluated over `[lo, hi]`.
/// Returns an empty curve when the data has no spread.
pub fn gaussian_kde(values: &[f64], lo: f64, hi: f64) -> Vec<(f64, f64)> {
    let std = sample_std(values);
    if !std.is_finite() || std <= 0.0 {
        return Vec::new();
    }
    let n = values.len() as f64;
    let bandwidth = std * n.powf(-0.2);
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());

    (0..KDE_POINTS)
        .map(|i| {
            let x = lo + (hi - lo) * i as f64 / (KDE_POINTS - 1) as f64;
            let density: f64 = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum();
            (x, density * norm)
        })
        .collect()
}

/// Annotated heatmap of an association matrix.
pub fn heatmap(matrix: &AssociationMatrix, title: &str, palette: Palette) -> Result<Chart, AppError> {
    to_chart(&heatmap_svg(matrix, title, palette)?, HEATMAP_SIZE)
}

const HEATMAP_SIZE: (u32, u32) = (1200, 800);

/// Cells sit on index axes: column `i` spans x segment `i`, row `i` spans
/// y segment `n - 1 - i` so the first row is drawn on top.
fn heatmap_svg(matrix: &AssociationMatrix, title: &str, palette: Palette) -> Result<String, AppError> {
    let names = matrix.columns();
    let n = names.len() as u32;
    // integer axes include their upper bound
    let last = n.saturating_sub(1).max(1);
    let y_names: Vec<String> = names.iter().rev().cloned().collect();

    draw_svg(HEATMAP_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption(title, (FONT, 24))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(160)
            .build_cartesian_2d((0u32..last).into_segmented(), (0u32..last).into_segmented())?;

        let x_label = |v: &SegmentValue<u32>| index_label(names, v);
        let y_label = |v: &SegmentValue<u32>| index_label(&y_names, v);
        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n as usize)
            .y_labels(n as usize)
            .x_label_formatter(&x_label)
            .y_label_formatter(&y_label)
            .label_style((FONT, 14))
            .draw()?;

        let cells: Vec<(u32, u32, Option<f64>)> = (0..n)
            .flat_map(|row| (0..n).map(move |col| (row, col)))
            .map(|(row, col)| (row, col, matrix.value(row as usize, col as usize)))
            .collect();

        chart.draw_series(cells.iter().map(|&(row, col, value)| {
            let (x0, x1) = cell_span(col, n);
            let (y0, y1) = cell_span(n - 1 - row, n);
            Rectangle::new([(x0, y0), (x1, y1)], palette.color(value).filled())
        }))?;

        chart.draw_series(cells.iter().map(|&(row, col, value)| {
            let text = value.map_or_else(|| "nan".to_string(), |v| format!("{:.2}", v));
            let color = if palette.is_dark(value) { &WHITE } else { &BLACK };
            let style = TextStyle::from((FONT, 16).into_font())
                .pos(Pos::new(HPos::Center, VPos::Center))
                .color(color);
            Text::new(
                text,
                (SegmentValue::CenterOf(col), SegmentValue::CenterOf(n - 1 - row)),
                style,
            )
        }))?;

        Ok(())
    })
}

/// Histogram with density curve beside a horizontal boxplot.
pub fn numeric_distribution(name: &str, values: &[f64]) -> Result<Chart, AppError> {
    // the boxplot sits on a plain [0, 1] band; only its value axis is labelled
    const BAND: f64 = 0.5;

    render_chart((1000, 400), |root| {
        let panels = root.split_evenly((1, 2));
        let dist_title = format!("{} Distribution", name);
        let box_title = format!("{} Boxplot", name);

        if values.is_empty() {
            no_data(&panels[0], &dist_title)?;
            no_data(&panels[1], &box_title)?;
            return Ok(());
        }

        let bins = histogram_bins(values);
        let (x_lo, x_hi) = padded_range(
            bins.first().map_or(0.0, |b| b.0),
            bins.last().map_or(1.0, |b| b.1),
        );
        let bin_width = bins.first().map_or(1.0, |b| b.1 - b.0);
        let curve: Vec<(f64, f64)> = gaussian_kde(values, x_lo, x_hi)
            .into_iter()
            .map(|(x, d)| (x, d * values.len() as f64 * bin_width))
            .collect();
        let peak = bins
            .iter()
            .map(|b| b.2 as f64)
            .chain(curve.iter().map(|p| p.1))
            .fold(1.0, f64::max);

        let mut hist = ChartBuilder::on(&panels[0])
            .caption(&dist_title, (FONT, 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(45)
            .build_cartesian_2d(x_lo..x_hi, 0f64..peak * 1.1)?;
        hist.configure_mesh().x_desc(name).y_desc("Count").draw()?;
        hist.draw_series(bins.iter().map(|&(lo, hi, count)| {
            Rectangle::new([(lo, 0.0), (hi, count as f64)], BAR_COLOR.mix(0.7).filled())
        }))?;
        if !curve.is_empty() {
            hist.draw_series(LineSeries::new(curve, KDE_COLOR.stroke_width(2)))?;
        }

        let (lo, hi) = min_max(values);
        let (b_lo, b_hi) = padded_range(lo, hi);
        let quartiles = Quartiles::new(values);
        let [lower_fence, _, _, _, upper_fence] = quartiles.values();

        let mut boxes = ChartBuilder::on(&panels[1])
            .caption(&box_title, (FONT, 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(20)
            .build_cartesian_2d(b_lo as f32..b_hi as f32, 0f64..1f64)?;
        boxes
            .configure_mesh()
            .disable_y_mesh()
            .disable_y_axis()
            .x_desc(name)
            .draw()?;
        boxes.draw_series(std::iter::once(
            Boxplot::new_horizontal(BAND, &quartiles)
                .width(60)
                .whisker_width(0.5)
                .style(BAR_COLOR.stroke_width(2)),
        ))?;
        boxes.draw_series(
            values
                .iter()
                .map(|v| *v as f32)
                .filter(|v| *v < lower_fence || *v > upper_fence)
                .map(|v| Circle::new((v, BAND), 3, BLACK.mix(0.6).filled())),
        )?;

        Ok(())
    })
}

/// Horizontal bar chart of the given `(category, count)` pairs, drawn top-down.
pub fn category_counts(name: &str, counts: &[(String, usize)]) -> Result<Chart, AppError> {
    // segments are laid out bottom-up, so reverse to keep the most frequent on top
    let labels: Vec<String> = counts.iter().rev().map(|(label, _)| label.clone()).collect();
    let peak = counts.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64;

    render_chart((1000, 600), |root| {
        let title = format!("{} Value Counts", name);
        if labels.is_empty() {
            return no_data(root, &title);
        }

        let mut chart = ChartBuilder::on(root)
            .caption(&title, (FONT, 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(180)
            .build_cartesian_2d(0f64..peak * 1.1, labels.as_slice().into_segmented())?;
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(labels.len())
            .y_label_formatter(&segment_label)
            .x_desc("count")
            .y_desc(name)
            .draw()?;
        chart.draw_series(
            Histogram::horizontal(&chart)
                .style(BAR_COLOR.mix(0.8).filled())
                .margin(6)
                .data(counts.iter().map(|(label, count)| (label, *count as f64))),
        )?;
        Ok(())
    })
}

/// Scatter matrix: histograms on the diagonal, pairwise scatter plots elsewhere.
/// Each column is given as `(name, values)` over the same sampled rows.
pub fn pair_grid(columns: &[(String, Vec<Option<f64>>)]) -> Result<Chart, AppError> {
    let k = columns.len();
    let side = (k as u32 * 240).max(480);

    render_chart((side, side), |root| {
        let panels = root.split_evenly((k, k));
        for (idx, panel) in panels.iter().enumerate() {
            let (row, col) = (idx / k, idx % k);
            let (x_name, x_values) = &columns[col];
            let (y_name, y_values) = &columns[row];
            let bottom = row + 1 == k;
            let left = col == 0;

            let mut builder = ChartBuilder::on(panel);
            builder
                .margin(6)
                .x_label_area_size(if bottom { 35 } else { 10 })
                .y_label_area_size(if left { 50 } else { 10 });

            if row == col {
                let present: Vec<f64> = x_values.iter().flatten().copied().collect();
                let bins = histogram_bins(&present);
                let (x_lo, x_hi) = padded_range(
                    bins.first().map_or(0.0, |b| b.0),
                    bins.last().map_or(1.0, |b| b.1),
                );
                let peak = bins.iter().map(|b| b.2).max().unwrap_or(1).max(1) as f64;
                let mut chart = builder.build_cartesian_2d(x_lo..x_hi, 0f64..peak * 1.1)?;
                let mut mesh = chart.configure_mesh();
                mesh.disable_mesh();
                if bottom {
                    mesh.x_desc(x_name.as_str());
                }
                if left {
                    mesh.y_desc(y_name.as_str());
                }
                mesh.draw()?;
                chart.draw_series(bins.iter().map(|&(lo, hi, count)| {
                    Rectangle::new([(lo, 0.0), (hi, count as f64)], BAR_COLOR.mix(0.7).filled())
                }))?;
            } else {
                let points: Vec<(f64, f64)> = x_values
                    .iter()
                    .zip(y_values)
                    .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                    .collect();
                let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
                let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
                let (x_lo, x_hi) = min_max(&xs);
                let (y_lo, y_hi) = min_max(&ys);
                let (x_lo, x_hi) = padded_range(x_lo, x_hi);
                let (y_lo, y_hi) = padded_range(y_lo, y_hi);

                let mut chart = builder.build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
                let mut mesh = chart.configure_mesh();
                mesh.disable_mesh();
                if bottom {
                    mesh.x_desc(x_name.as_str());
                }
                if left {
                    mesh.y_desc(y_name.as_str());
                }
                mesh.draw()?;
                chart.draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 2, BAR_COLOR.mix(0.6).filled())),
                )?;
            }
        }
        Ok(())
    })
}

pub fn scatter(x_name: &str, y_name: &str, points: &[(f64, f64)]) -> Result<Chart, AppError> {
    render_chart((1000, 600), |root| {
        let title = format!("{} vs {}", x_name, y_name);
        if points.is_empty() {
            return no_data(root, &title);
        }
        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let (x_lo, x_hi) = min_max(&xs);
        let (y_lo, y_hi) = min_max(&ys);
        let (x_lo, x_hi) = padded_range(x_lo, x_hi);
        let (y_lo, y_hi) = padded_range(y_lo, y_hi);

        let mut chart = ChartBuilder::on(root)
            .caption(&title, (FONT, 20))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
        chart.configure_mesh().x_desc(x_name).y_desc(y_name).draw()?;
        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, BAR_COLOR.mix(0.6).filled())),
        )?;
        Ok(())
    })
}

/// Boxplot and mean-bar chart of a numeric column split by category.
/// `groups` holds `(category, values)` in display order; empty groups are skipped.
pub fn grouped_numeric(
    cat_name: &str,
    num_name: &str,
    groups: &[(String, Vec<f64>)],
) -> Result<Chart, AppError> {
    let svg = grouped_numeric_svg(cat_name, num_name, groups)?;
    to_chart(&slant_labels(&svg), GROUPED_SIZE)
}

const GROUPED_SIZE: (u32, u32) = (1200, 600);

fn grouped_numeric_svg(
    cat_name: &str,
    num_name: &str,
    groups: &[(String, Vec<f64>)],
) -> Result<String, AppError> {
    let groups: Vec<&(String, Vec<f64>)> = groups.iter().filter(|(_, v)| !v.is_empty()).collect();
    let labels: Vec<String> = groups.iter().map(|(label, _)| label.clone()).collect();

    draw_svg(GROUPED_SIZE, |root| {
        let title = format!("{} by {}", num_name, cat_name);
        let panels = root.split_evenly((1, 2));
        if labels.is_empty() {
            no_data(&panels[0], &title)?;
            no_data(&panels[1], &title)?;
            return Ok(());
        }

        let all: Vec<f64> = groups.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        let (lo, hi) = min_max(&all);
        let (lo, hi) = padded_range(lo, hi);
        let rotated = || {
            TextStyle::from((FONT, 12).into_font().transform(FontTransform::Rotate90))
                .pos(Pos::new(HPos::Left, VPos::Center))
        };

        let mut boxes = ChartBuilder::on(&panels[0])
            .caption(&title, (FONT, 18))
            .margin(10)
            .x_label_area_size(110)
            .y_label_area_size(55)
            .build_cartesian_2d(labels.as_slice().into_segmented(), lo as f32..hi as f32)?;
        boxes
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&segment_label)
            .x_label_style(rotated())
            .x_desc(cat_name)
            .y_desc(num_name)
            .draw()?;
        boxes.draw_series(groups.iter().zip(&labels).map(|((_, values), label)| {
            Boxplot::new_vertical(SegmentValue::CenterOf(label), &Quartiles::new(values))
                .width(24)
                .whisker_width(0.5)
                .style(BAR_COLOR.stroke_width(2))
        }))?;

        let means: Vec<f64> = groups
            .iter()
            .map(|(_, v)| v.iter().sum::<f64>() / v.len() as f64)
            .collect();
        let (m_lo, m_hi) = min_max(&means);
        let (m_lo, m_hi) = (m_lo.min(0.0), m_hi.max(0.0));
        let (m_lo, m_hi) = if m_lo == m_hi { (0.0, 1.0) } else { (m_lo * 1.1, m_hi * 1.1) };

        let mut bars = ChartBuilder::on(&panels[1])
            .caption(&title, (FONT, 18))
            .margin(10)
            .x_label_area_size(110)
            .y_label_area_size(55)
            .build_cartesian_2d(labels.as_slice().into_segmented(), m_lo..m_hi)?;
        bars.configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_formatter(&segment_label)
            .x_label_style(rotated())
            .x_desc(cat_name)
            .y_desc(num_name)
            .draw()?;
        bars.draw_series(
            Histogram::vertical(&bars)
                .style(BAR_COLOR.mix(0.8).filled())
                .margin(8)
                .data(labels.iter().zip(&means).map(|(label, mean)| (label, *mean))),
        )?;

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use base64::{engine::general_purpose::STANDARD, Engine as _};

    /// Decodes the chart and returns the PNG's pixel dimensions.
    fn png_size(chart: &Chart) -> (u32, u32) {
        let bytes = STANDARD.decode(chart.base64()).expect("valid base64");
        assert!(bytes.starts_with(b"\x89PNG\r\n"));
        let reader = png::Decoder::new(std::io::Cursor::new(bytes))
            .read_info()
            .expect("readable png");
        (reader.info().width, reader.info().height)
    }

    #[test]
    fn bins_cover_every_value() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let bins = histogram_bins(&values);
        assert!(bins.len() > 1);
        assert_eq!(bins.iter().map(|b| b.2).sum::<usize>(), 100);
        assert_eq!(bins[0].0, 0.0);
        assert!((bins.last().unwrap().1 - 99.0).abs() < 1e-9);
    }

    #[test]
    fn constant_values_fall_in_one_bin() {
        let bins = histogram_bins(&[4.0, 4.0, 4.0]);
        assert_eq!(bins, vec![(3.5, 4.5, 3)]);
        assert!(gaussian_kde(&[4.0, 4.0], 3.0, 5.0).is_empty());
    }

    #[test]
    fn kde_integrates_to_about_one() {
        let values: Vec<f64> = (0..50).map(|i| (i % 10) as f64).collect();
        let curve = gaussian_kde(&values, -10.0, 20.0);
        let step = curve[1].0 - curve[0].0;
        let area: f64 = curve.iter().map(|p| p.1 * step).sum();
        assert!((area - 1.0).abs() < 0.05, "area was {}", area);
    }

    #[test]
    fn palettes_span_their_ranges() {
        assert_eq!(Palette::Blues.color(Some(0.0)), RGBColor(247, 251, 255));
        assert_eq!(Palette::Blues.color(Some(1.0)), RGBColor(8, 48, 107));
        assert_eq!(Palette::CoolWarm.color(Some(-1.0)), RGBColor(59, 76, 192));
        assert_eq!(Palette::CoolWarm.color(None), RGBColor(220, 220, 220));
    }

    #[test]
    fn heatmap_annotates_every_cell() {
        let matrix = AssociationMatrix::build(vec!["a".into(), "b".into(), "c".into()], |_, _| Some(0.25));
        let svg = heatmap_svg(&matrix, "Numeric Correlation Matrix", Palette::CoolWarm).unwrap();
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("0.25").count(), 6);
        assert_eq!(svg.matches("1.00").count(), 3);
        assert!(svg.contains("Numeric Correlation Matrix"));

        let chart = heatmap(&matrix, "Numeric Correlation Matrix", Palette::CoolWarm).unwrap();
        assert_eq!(png_size(&chart), HEATMAP_SIZE);
    }

    #[test]
    fn undefined_cells_read_nan() {
        let matrix = AssociationMatrix::build(vec!["x".into(), "y".into()], |_, _| None);
        let svg = heatmap_svg(&matrix, "Categorical Association (Cramer's V)", Palette::Blues).unwrap();
        assert_eq!(svg.matches("nan").count(), 2);
    }

    #[test]
    fn empty_numeric_column_still_renders() {
        let chart = numeric_distribution("empty", &[]).unwrap();
        assert_eq!(png_size(&chart), (1000, 400));
    }

    #[test]
    fn distribution_and_counts_render() {
        let values: Vec<f64> = (0..40).map(|i| (i as f64).sqrt()).collect();
        assert_eq!(png_size(&numeric_distribution("root", &values).unwrap()), (1000, 400));
        assert_eq!(png_size(&numeric_distribution("one", &[3.0]).unwrap()), (1000, 400));
        assert_eq!(png_size(&numeric_distribution("flat", &[2.0, 2.0, 2.0]).unwrap()), (1000, 400));

        let counts = vec![("red".to_string(), 5), ("blue".to_string(), 2)];
        assert_eq!(png_size(&category_counts("colour", &counts).unwrap()), (1000, 600));
        assert_eq!(png_size(&category_counts("none", &[]).unwrap()), (1000, 600));
    }

    #[test]
    fn pair_grid_and_scatter_render() {
        let grid = vec![
            ("a".to_string(), vec![Some(1.0), Some(2.0), None, Some(4.0)]),
            ("b".to_string(), vec![Some(2.0), None, Some(1.0), Some(8.0)]),
        ];
        assert_eq!(png_size(&pair_grid(&grid).unwrap()), (480, 480));
        assert_eq!(png_size(&scatter("a", "b", &[(1.0, 2.0), (4.0, 8.0)]).unwrap()), (1000, 600));
    }

    #[test]
    fn grouped_chart_skips_empty_groups() {
        let groups = vec![
            ("north".to_string(), vec![1.0, 2.0, 3.0]),
            ("south".to_string(), vec![]),
            ("east".to_string(), vec![-4.0, 2.0]),
        ];
        let svg = grouped_numeric_svg("region", "sales", &groups).unwrap();
        assert!(svg.contains("sales by region"));
        assert!(svg.contains("north"));
        assert!(!svg.contains("south"));

        let chart = grouped_numeric("region", "sales", &groups).unwrap();
        assert_eq!(png_size(&chart), GROUPED_SIZE);
    }

    #[test]
    fn category_labels_are_tilted_to_45_degrees() {
        let groups = vec![("alpha".to_string(), vec![1.0, 2.0]), ("beta".to_string(), vec![3.0])];
        let svg = grouped_numeric_svg("kind", "value", &groups).unwrap();
        assert!(svg.contains("rotate(90, "));

        let slanted = slant_labels(&svg);
        assert!(!slanted.contains("rotate(90, "));
        assert_eq!(slanted.matches("rotate(45, ").count(), svg.matches("rotate(90, ").count());
    }
}
