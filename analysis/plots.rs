// SVG chart generation for the analysis report.
//
// Every chart is a self-contained SVG document built from strings. Empty or
// non-finite inputs are filtered out before scaling; a chart with nothing
// left to draw is an error rather than a blank image.

use ndarray::Array2;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::stats;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Nothing to draw for '{0}': no finite values.")]
    NoData(String),
    #[error("Failed to write plot '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

const WIDTH: f64 = 680.0;
const HEIGHT: f64 = 420.0;
const MARGIN: f64 = 60.0;
const AXIS_COLOR: &str = "#9ca3af";
const TEXT_COLOR: &str = "#374151";
const MUTED_TEXT: &str = "#6b7280";
const BAR_COLOR: &str = "#2563eb";
const ACCENT: &str = "#dc2626";

/// Sequential palette, light to dark, for binned map values.
const PALETTE: [&str; 9] = [
    "#fff5eb", "#fee6ce", "#fdd0a2", "#fdae6b", "#fd8d3c", "#f16913", "#d94801", "#a63603",
    "#7f2704",
];

/// Writes an SVG document to `path`, overwriting any existing file.
pub fn write_svg(path: &Path, svg: &str) -> Result<(), PlotError> {
    fs::write(path, svg).map_err(|source| PlotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// One region on the point map.
#[derive(Debug, Clone)]
pub struct MapPoint {
    pub label: String,
    pub longitude: f64,
    pub latitude: f64,
    pub value: f64,
}

/// Linear map from data space onto a pixel interval.
#[derive(Debug, Clone, Copy)]
struct Scale {
    min: f64,
    max: f64,
    start: f64,
    end: f64,
}

impl Scale {
    fn new(min: f64, max: f64, start: f64, end: f64) -> Self {
        // Pad a degenerate range so that a constant series still gets an axis.
        let (min, max) = if max > min {
            (min, max)
        } else {
            let pad = if min == 0.0 { 1.0 } else { min.abs() * 0.1 };
            (min - pad, max + pad)
        };
        Self { min, max, start, end }
    }

    fn from_values(values: impl Iterator<Item = f64>, start: f64, end: f64) -> Self {
        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        Self::new(min, max, start, end)
    }

    fn map(&self, v: f64) -> f64 {
        self.start + (v - self.min) / (self.max - self.min) * (self.end - self.start)
    }

    fn ticks(&self, count: usize) -> Vec<f64> {
        (0..=count)
            .map(|i| self.min + (self.max - self.min) * i as f64 / count as f64)
            .collect()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn format_tick(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && (a < 1e-3 || a >= 1e5) {
        format!("{v:.2e}")
    } else if a >= 100.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.3}")
    }
}

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Opening tag, title and axis labels shared by every chart.
fn document_start(title: &str, x_label: &str, y_label: &str) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" style="background:white">
  <text x="{cx}" y="28" text-anchor="middle" font-size="15" font-weight="600" fill="{TEXT_COLOR}">{title}</text>
  <text x="{cx}" y="{xl}" text-anchor="middle" font-size="12" fill="{MUTED_TEXT}">{x_label}</text>
  <text x="16" y="{cy}" text-anchor="middle" font-size="12" fill="{MUTED_TEXT}" transform="rotate(-90, 16, {cy})">{y_label}</text>
"##,
        w = WIDTH,
        h = HEIGHT,
        cx = WIDTH / 2.0,
        cy = HEIGHT / 2.0,
        xl = HEIGHT - 12.0,
        title = escape(title),
        x_label = escape(x_label),
        y_label = escape(y_label),
    )
}

fn draw_axes(svg: &mut String, x: Option<&Scale>, y: &Scale) {
    let bottom = HEIGHT - MARGIN;
    let _ = write!(
        svg,
        r##"  <line x1="{MARGIN}" y1="{bottom}" x2="{}" y2="{bottom}" stroke="{AXIS_COLOR}"/>
  <line x1="{MARGIN}" y1="{MARGIN}" x2="{MARGIN}" y2="{bottom}" stroke="{AXIS_COLOR}"/>
"##,
        WIDTH - MARGIN
    );
    for t in y.ticks(5) {
        let py = y.map(t);
        let _ = writeln!(
            svg,
            r##"  <text x="{:.1}" y="{:.1}" text-anchor="end" font-size="10" fill="{MUTED_TEXT}">{}</text>"##,
            MARGIN - 6.0,
            py + 3.0,
            format_tick(t)
        );
    }
    if let Some(x) = x {
        for t in x.ticks(5) {
            let _ = writeln!(
                svg,
                r##"  <text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="10" fill="{MUTED_TEXT}">{}</text>"##,
                x.map(t),
                bottom + 16.0,
                format_tick(t)
            );
        }
    }
}

/// Histogram with `bins` equal-width bins over the range of the data.
pub fn histogram_svg(
    title: &str,
    x_label: &str,
    values: &[f64],
    bins: usize,
) -> Result<String, PlotError> {
    let values = finite(values);
    if values.is_empty() {
        return Err(PlotError::NoData(title.to_string()));
    }
    let bins = bins.max(1);
    let x = Scale::from_values(values.iter().copied(), MARGIN, WIDTH - MARGIN);
    let width = (x.max - x.min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let idx = (((v - x.min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let max_count = counts.iter().copied().max().unwrap_or(1).max(1);
    let y = Scale::new(0.0, max_count as f64, HEIGHT - MARGIN, MARGIN);

    let mut svg = document_start(title, x_label, "Count");
    draw_axes(&mut svg, Some(&x), &y);
    for (i, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let x0 = x.map(x.min + i as f64 * width);
        let x1 = x.map(x.min + (i + 1) as f64 * width);
        let top = y.map(count as f64);
        let _ = writeln!(
            svg,
            r##"  <rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{BAR_COLOR}" opacity="0.8"/>"##,
            x0,
            top,
            (x1 - x0 - 1.0).max(0.5),
            (HEIGHT - MARGIN) - top
        );
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// One box per group: quartile box, median line and 1.5 IQR whiskers.
pub fn boxplot_svg(
    title: &str,
    y_label: &str,
    groups: &[(String, Vec<f64>)],
) -> Result<String, PlotError> {
    let groups: Vec<(&str, Vec<f64>)> = groups
        .iter()
        .map(|(label, values)| {
            let mut v = finite(values);
            v.sort_by(f64::total_cmp);
            (label.as_str(), v)
        })
        .filter(|(_, v)| !v.is_empty())
        .collect();
    if groups.is_empty() {
        return Err(PlotError::NoData(title.to_string()));
    }
    let y = Scale::from_values(
        groups.iter().flat_map(|(_, v)| v.iter().copied()),
        HEIGHT - MARGIN,
        MARGIN,
    );
    let slot = (WIDTH - 2.0 * MARGIN) / groups.len() as f64;

    let mut svg = document_start(title, "", y_label);
    draw_axes(&mut svg, None, &y);
    for (i, (label, sorted)) in groups.iter().enumerate() {
        let cx = MARGIN + slot * (i as f64 + 0.5);
        let half = (slot * 0.3).min(40.0);
        let q1 = stats::quantile_sorted(sorted, 0.25);
        let med = stats::quantile_sorted(sorted, 0.5);
        let q3 = stats::quantile_sorted(sorted, 0.75);
        let iqr = q3 - q1;
        let lo = sorted
            .iter()
            .copied()
            .find(|&v| v >= q1 - 1.5 * iqr)
            .unwrap_or(q1);
        let hi = sorted
            .iter()
            .rev()
            .copied()
            .find(|&v| v <= q3 + 1.5 * iqr)
            .unwrap_or(q3);
        let _ = write!(
            svg,
            r##"  <line x1="{cx:.1}" y1="{:.1}" x2="{cx:.1}" y2="{:.1}" stroke="{TEXT_COLOR}"/>
  <rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{BAR_COLOR}" fill-opacity="0.25" stroke="{BAR_COLOR}"/>
  <line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{TEXT_COLOR}" stroke-width="2"/>
  <text x="{cx:.1}" y="{:.1}" text-anchor="middle" font-size="11" fill="{MUTED_TEXT}">{}</text>
"##,
            y.map(lo),
            y.map(hi),
            cx - half,
            y.map(q3),
            2.0 * half,
            (y.map(q1) - y.map(q3)).max(0.5),
            cx - half,
            y.map(med),
            cx + half,
            y.map(med),
            HEIGHT - MARGIN + 16.0,
            escape(label)
        );
        for &v in sorted.iter().filter(|&&v| v < lo || v > hi) {
            let _ = writeln!(
                svg,
                r##"  <circle cx="{cx:.1}" cy="{:.1}" r="2.5" fill="none" stroke="{TEXT_COLOR}"/>"##,
                y.map(v)
            );
        }
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Diverging red/blue colour for a value in [-1, 1].
fn diverging_color(r: f64) -> String {
    if !r.is_finite() {
        return "#d1d5db".to_string();
    }
    let t = r.clamp(-1.0, 1.0);
    let (target, w) = if t >= 0.0 {
        ((178.0, 24.0, 43.0), t)
    } else {
        ((33.0, 102.0, 172.0), -t)
    };
    let mix = |c: f64| (255.0 + (c - 255.0) * w).round() as u8;
    format!("#{:02x}{:02x}{:02x}", mix(target.0), mix(target.1), mix(target.2))
}

/// Square matrix as an annotated heatmap, for correlation matrices.
pub fn heatmap_svg(title: &str, labels: &[&str], matrix: &Array2<f64>) -> Result<String, PlotError> {
    let k = labels.len();
    if k == 0 || matrix.nrows() != k || matrix.ncols() != k {
        return Err(PlotError::NoData(title.to_string()));
    }
    let left = 150.0;
    let top = 50.0;
    let cell = ((WIDTH - left - 20.0) / k as f64).min(60.0);
    let height = top + cell * k as f64 + 130.0;

    let mut svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height:.0}" viewBox="0 0 {WIDTH} {height:.0}" style="background:white">
  <text x="{:.1}" y="28" text-anchor="middle" font-size="15" font-weight="600" fill="{TEXT_COLOR}">{}</text>
"##,
        WIDTH / 2.0,
        escape(title)
    );
    for (i, row_label) in labels.iter().enumerate() {
        let y = top + cell * i as f64;
        let _ = writeln!(
            svg,
            r##"  <text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11" fill="{TEXT_COLOR}">{}</text>"##,
            left - 6.0,
            y + cell / 2.0 + 4.0,
            escape(row_label)
        );
        for j in 0..k {
            let r = matrix[[i, j]];
            let x = left + cell * j as f64;
            let text_fill = if r.abs() > 0.6 { "white" } else { TEXT_COLOR };
            let annotation = if r.is_finite() { format!("{r:.2}") } else { "NA".to_string() };
            let _ = write!(
                svg,
                r##"  <rect x="{x:.1}" y="{y:.1}" width="{cell:.1}" height="{cell:.1}" fill="{}" stroke="white"/>
  <text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="10" fill="{text_fill}">{annotation}</text>
"##,
                diverging_color(r),
                x + cell / 2.0,
                y + cell / 2.0 + 3.5
            );
        }
    }
    let label_y = top + cell * k as f64 + 8.0;
    for (j, col_label) in labels.iter().enumerate() {
        let x = left + cell * j as f64 + cell / 2.0;
        let _ = writeln!(
            svg,
            r##"  <text x="{x:.1}" y="{label_y:.1}" text-anchor="end" font-size="11" fill="{TEXT_COLOR}" transform="rotate(-45, {x:.1}, {label_y:.1})">{}</text>"##,
            escape(col_label)
        );
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Scatter plot with an optional horizontal reference line.
pub fn scatter_svg(
    title: &str,
    x_label: &str,
    y_label: &str,
    points: &[(f64, f64)],
    reference_y: Option<f64>,
) -> Result<String, PlotError> {
    let points: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();
    if points.is_empty() {
        return Err(PlotError::NoData(title.to_string()));
    }
    let x = Scale::from_values(points.iter().map(|p| p.0), MARGIN, WIDTH - MARGIN);
    let y = Scale::from_values(
        points.iter().map(|p| p.1).chain(reference_y),
        HEIGHT - MARGIN,
        MARGIN,
    );
    let mut svg = document_start(title, x_label, y_label);
    draw_axes(&mut svg, Some(&x), &y);
    if let Some(r) = reference_y {
        let _ = writeln!(
            svg,
            r##"  <line x1="{MARGIN}" y1="{:.1}" x2="{}" y2="{:.1}" stroke="{ACCENT}" stroke-dasharray="4,3"/>"##,
            y.map(r),
            WIDTH - MARGIN,
            y.map(r)
        );
    }
    for (px, py) in &points {
        let _ = writeln!(
            svg,
            r##"  <circle cx="{:.1}" cy="{:.1}" r="2.5" fill="{BAR_COLOR}" fill-opacity="0.6"/>"##,
            x.map(*px),
            y.map(*py)
        );
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Normal QQ plot of `values` with the line through the quartiles.
pub fn qq_svg(title: &str, values: &[f64]) -> Result<String, PlotError> {
    let mut sorted = finite(values);
    if sorted.len() < 2 {
        return Err(PlotError::NoData(title.to_string()));
    }
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    // Blom-type plotting positions, as used by qqnorm for n > 10.
    let a = if n <= 10 { 3.0 / 8.0 } else { 0.5 };
    let points: Vec<(f64, f64)> = sorted
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let p = (i as f64 + 1.0 - a) / (n as f64 + 1.0 - 2.0 * a);
            (stats::normal_quantile(p), v)
        })
        .collect();

    let x = Scale::from_values(points.iter().map(|p| p.0), MARGIN, WIDTH - MARGIN);
    let y = Scale::from_values(points.iter().map(|p| p.1), HEIGHT - MARGIN, MARGIN);
    let mut svg = document_start(title, "Theoretical quantiles", "Sample quantiles");
    draw_axes(&mut svg, Some(&x), &y);

    let (z1, z3) = (stats::normal_quantile(0.25), stats::normal_quantile(0.75));
    let (s1, s3) = (
        stats::quantile_sorted(&sorted, 0.25),
        stats::quantile_sorted(&sorted, 0.75),
    );
    if z3 > z1 {
        let slope = (s3 - s1) / (z3 - z1);
        let intercept = s1 - slope * z1;
        let _ = writeln!(
            svg,
            r##"  <line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{ACCENT}"/>"##,
            x.map(x.min),
            y.map(intercept + slope * x.min),
            x.map(x.max),
            y.map(intercept + slope * x.max)
        );
    }
    for (px, py) in &points {
        let _ = writeln!(
            svg,
            r##"  <circle cx="{:.1}" cy="{:.1}" r="2.5" fill="{BAR_COLOR}" fill-opacity="0.6"/>"##,
            x.map(*px),
            y.map(*py)
        );
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Line chart of `(x, mean, sd)` with a shaded ±1 SD band.
pub fn line_chart_svg(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[(f64, f64, f64)],
) -> Result<String, PlotError> {
    let series: Vec<(f64, f64, f64)> = series
        .iter()
        .copied()
        .filter(|(x, m, _)| x.is_finite() && m.is_finite())
        .map(|(x, m, sd)| (x, m, if sd.is_finite() { sd } else { 0.0 }))
        .collect();
    if series.is_empty() {
        return Err(PlotError::NoData(title.to_string()));
    }
    let x = Scale::from_values(series.iter().map(|p| p.0), MARGIN, WIDTH - MARGIN);
    let y = Scale::from_values(
        series.iter().flat_map(|&(_, m, sd)| [m - sd, m + sd]),
        HEIGHT - MARGIN,
        MARGIN,
    );
    let mut svg = document_start(title, x_label, y_label);
    draw_axes(&mut svg, Some(&x), &y);

    let upper = series.iter().map(|&(px, m, sd)| format!("{:.1},{:.1}", x.map(px), y.map(m + sd)));
    let lower = series
        .iter()
        .rev()
        .map(|&(px, m, sd)| format!("{:.1},{:.1}", x.map(px), y.map(m - sd)));
    let band: Vec<String> = upper.chain(lower).collect();
    let line: Vec<String> = series
        .iter()
        .map(|&(px, m, _)| format!("{:.1},{:.1}", x.map(px), y.map(m)))
        .collect();
    let _ = write!(
        svg,
        r##"  <polygon points="{}" fill="{BAR_COLOR}" fill-opacity="0.15"/>
  <polyline points="{}" fill="none" stroke="{BAR_COLOR}" stroke-width="2"/>
"##,
        band.join(" "),
        line.join(" ")
    );
    for p in &line {
        if let Some((cx, cy)) = p.split_once(',') {
            let _ = writeln!(svg, r##"  <circle cx="{cx}" cy="{cy}" r="3.5" fill="{BAR_COLOR}"/>"##);
        }
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Upper edges of `bins` equal-width bins spanning `[min, max]`.
pub fn equal_width_breaks(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let bins = bins.max(1);
    let width = (max - min) / bins as f64;
    (1..=bins).map(|i| min + width * i as f64).collect()
}

/// Bin index of `value` given upper edges from [`equal_width_breaks`].
pub fn bin_of(value: f64, breaks: &[f64]) -> usize {
    breaks
        .iter()
        .position(|&edge| value <= edge)
        .unwrap_or(breaks.len().saturating_sub(1))
}

/// Point-symbol map: one marker per region, coloured by equal-width bins of its value.
pub fn choropleth_svg(title: &str, points: &[MapPoint], bins: usize) -> Result<String, PlotError> {
    let points: Vec<&MapPoint> = points
        .iter()
        .filter(|p| p.longitude.is_finite() && p.latitude.is_finite() && p.value.is_finite())
        .collect();
    if points.is_empty() {
        return Err(PlotError::NoData(title.to_string()));
    }
    let bins = bins.clamp(1, PALETTE.len());
    let (vmin, vmax) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.value), hi.max(p.value))
    });
    let breaks = equal_width_breaks(vmin, vmax, bins);
    // Spread the palette over the requested number of bins.
    let colour = |bin: usize| {
        let idx = if bins == 1 { PALETTE.len() - 1 } else { bin * (PALETTE.len() - 1) / (bins - 1) };
        PALETTE[idx]
    };

    let map_right = WIDTH - 170.0;
    let x = Scale::from_values(points.iter().map(|p| p.longitude), MARGIN, map_right);
    let y = Scale::from_values(points.iter().map(|p| p.latitude), HEIGHT - MARGIN, MARGIN);
    let mut svg = document_start(title, "Longitude", "Latitude");
    draw_axes(&mut svg, Some(&x), &y);

    for p in &points {
        let _ = writeln!(
            svg,
            r##"  <circle cx="{:.1}" cy="{:.1}" r="6" fill="{}" stroke="{TEXT_COLOR}" stroke-width="0.5"><title>{}: {}</title></circle>"##,
            x.map(p.longitude),
            y.map(p.latitude),
            colour(bin_of(p.value, &breaks)),
            escape(&p.label),
            format_tick(p.value)
        );
    }

    let legend_x = map_right + 25.0;
    let mut lower = vmin;
    for (i, &upper) in breaks.iter().enumerate() {
        let ly = MARGIN + 22.0 * i as f64;
        let _ = write!(
            svg,
            r##"  <rect x="{legend_x:.1}" y="{ly:.1}" width="16" height="16" fill="{}" stroke="{AXIS_COLOR}"/>
  <text x="{:.1}" y="{:.1}" font-size="10" fill="{TEXT_COLOR}">{} to {}</text>
"##,
            colour(i),
            legend_x + 22.0,
            ly + 12.0,
            format_tick(lower),
            format_tick(upper)
        );
        lower = upper;
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_histogram_draws_one_bar_per_nonempty_bin() {
        let svg = histogram_svg("h", "x", &[0.0, 0.1, 0.9, 1.0, f64::NAN], 2).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<rect").count(), 2);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(histogram_svg("h", "x", &[f64::NAN], 5), Err(PlotError::NoData(_))));
        assert!(matches!(choropleth_svg("m", &[], 5), Err(PlotError::NoData(_))));
    }

    #[test]
    fn test_equal_width_bins() {
        let breaks = equal_width_breaks(0.0, 10.0, 5);
        assert_eq!(breaks, vec![2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(bin_of(0.0, &breaks), 0);
        assert_eq!(bin_of(2.0, &breaks), 0);
        assert_eq!(bin_of(2.5, &breaks), 1);
        assert_eq!(bin_of(10.0, &breaks), 4);
    }

    #[test]
    fn test_choropleth_has_marker_per_region_and_legend() {
        let points: Vec<MapPoint> = (0..4)
            .map(|i| MapPoint {
                label: format!("R{i}"),
                longitude: -50.0 + i as f64,
                latitude: -10.0 - i as f64,
                value: i as f64 * 0.01,
            })
            .collect();
        let svg = choropleth_svg("rates <2013>", &points, 3).unwrap();
        assert_eq!(svg.matches("<circle").count(), 4);
        assert_eq!(svg.matches("<rect").count(), 3);
        assert!(svg.contains("rates &lt;2013&gt;"));
    }

    #[test]
    fn test_heatmap_annotates_cells() {
        let m = array![[1.0, -0.5], [-0.5, 1.0]];
        let svg = heatmap_svg("corr", &["a", "b"], &m).unwrap();
        assert_eq!(svg.matches("-0.50").count(), 2);
        assert_eq!(svg.matches("1.00").count(), 2);
    }

    #[test]
    fn test_write_svg_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qq.svg");
        let svg = qq_svg("qq", &[0.3, -1.2, 0.5, 2.0, -0.1]).unwrap();
        write_svg(&path, &svg).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), svg);
    }
}
