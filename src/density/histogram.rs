use nalgebra::DMatrix;

use super::SkipReason;
use crate::summary::ValueSigma;

/// `n` evenly spaced values over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            out[n - 1] = stop;
            out
        }
    }
}

/// Mid-points of consecutive edges.
pub fn bin_centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

/// Bin of `x` given sorted `edges`.
///
/// Bins are half-open `[e_i, e_{i+1})` except the last one, which is closed. Values outside
/// `[e_0, e_n]` (and `NaN`) fall in no bin.
pub fn bin_index(edges: &[f64], x: f64) -> Option<usize> {
    let n = edges.len().checked_sub(1)?;
    if n == 0 || !(x >= edges[0] && x <= edges[n]) {
        return None;
    }
    let i = edges.partition_point(|&e| e <= x);
    Some((i - 1).min(n - 1))
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, x| match acc {
        None => Some((x, x)),
        Some((lo, hi)) => Some((f64::min(lo, x), f64::max(hi, x))),
    })
}

/// Bounds used to build the edges of one variable.
///
/// Samples strictly within `(median − c·σ₋, median + c·σ₊)` set the range; an empty or
/// collapsed clipped range falls back to the full sample range.
pub fn clipped_range(
    values: &[f64],
    summary: &ValueSigma,
    clip_sigmas: f64,
) -> Result<(f64, f64), SkipReason> {
    if summary.is_zero_spread() {
        return Err(SkipReason::ZeroSpread);
    }

    let low = summary.median - clip_sigmas * summary.sigma_minus;
    let high = summary.median + clip_sigmas * summary.sigma_plus;
    let clipped = min_max(values.iter().copied().filter(|&x| x > low && x < high));
    match clipped {
        Some((lo, hi)) if lo != hi => Ok((lo, hi)),
        _ => match min_max(values.iter().copied().filter(|x| !x.is_nan())) {
            Some((lo, hi)) if lo != hi => Ok((lo, hi)),
            _ => Err(SkipReason::CollapsedRange),
        },
    }
}

/// Normalized 1D histogram of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Hist1d {
    pub edges: Vec<f64>,
    pub centers: Vec<f64>,
    /// Bin counts divided by the total number of samples.
    pub density: Vec<f64>,
}

impl Hist1d {
    pub fn compute(values: &[f64], edges: Vec<f64>) -> Self {
        let mut counts = vec![0usize; edges.len().saturating_sub(1)];
        for &x in values {
            if let Some(b) = bin_index(&edges, x) {
                counts[b] += 1;
            }
        }
        let total = values.len().max(1) as f64;
        Hist1d {
            centers: bin_centers(&edges),
            density: counts.into_iter().map(|c| c as f64 / total).collect(),
            edges,
        }
    }
}

/// Peak-normalized 2D histogram of an ordered variable pair.
///
/// `density` rows are y bins and columns x bins; its largest cell equals 1 unless no
/// sample falls inside both ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Hist2d {
    pub x_name: String,
    pub y_name: String,
    pub x_centers: Vec<f64>,
    pub y_centers: Vec<f64>,
    pub density: DMatrix<f64>,
}

impl Hist2d {
    pub fn compute(
        (x_name, x_values, x_edges): (&str, &[f64], &[f64]),
        (y_name, y_values, y_edges): (&str, &[f64], &[f64]),
    ) -> Self {
        let nx = x_edges.len().saturating_sub(1);
        let ny = y_edges.len().saturating_sub(1);
        let mut counts = DMatrix::<f64>::zeros(ny, nx);
        for (&x, &y) in x_values.iter().zip(y_values) {
            if let (Some(i), Some(j)) = (bin_index(x_edges, x), bin_index(y_edges, y)) {
                counts[(j, i)] += 1.0;
            }
        }

        let peak = counts.max();
        if peak > 0.0 {
            counts /= peak;
        }
        Hist2d {
            x_name: x_name.to_string(),
            y_name: y_name.to_string(),
            x_centers: bin_centers(x_edges),
            y_centers: bin_centers(y_edges),
            density: counts,
        }
    }

    /// Table with the bin centers embedded: first row x centers, first column y centers.
    /// The corner cell is `None`.
    pub fn with_centers(&self) -> Vec<Vec<Option<f64>>> {
        let mut table = Vec::with_capacity(self.y_centers.len() + 1);
        table.push(
            std::iter::once(None)
                .chain(self.x_centers.iter().copied().map(Some))
                .collect(),
        );
        for (r, &yc) in self.y_centers.iter().enumerate() {
            table.push(
                std::iter::once(Some(yc))
                    .chain(self.density.row(r).iter().copied().map(Some))
                    .collect(),
            );
        }
        table
    }
}
