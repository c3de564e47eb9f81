use std::collections::BTreeMap;

use super::{Dataset, DatasetKind};
use crate::{constants::Day, postfit_errors::PostfitError};

/// Smallest time range used to build a grid (days).
pub const MIN_GRID_RANGE: Day = 0.1;
/// Margin added on both sides of a grid, as a fraction of the range.
pub const GRID_MARGIN: f64 = 0.10;
/// Time step of RV-like and full grids (days).
pub const DEFAULT_GRID_STEP: Day = 0.1;
/// Photometric grids sample each observation interval this many times.
pub const PHOT_OVERSAMPLING: f64 = 20.0;

/// Uniform time grid (times relative to the reference time).
#[derive(Debug, Clone, PartialEq)]
pub struct PlotGrid {
    pub start: Day,
    pub end: Day,
    pub step: Day,
    pub points: Vec<Day>,
}

impl PlotGrid {
    /// Grid over `[lo − 10% range, hi + 10% range)` with the given step; the range is
    /// floored at [`MIN_GRID_RANGE`].
    fn around(lo: Day, hi: Day, step: impl FnOnce(Day) -> Day) -> Result<Self, PostfitError> {
        let range = (hi - lo).max(MIN_GRID_RANGE);
        let start = lo - range * GRID_MARGIN;
        let end = hi + range * GRID_MARGIN;
        let step = step(range);
        if !(step > 0.0) || !start.is_finite() || !end.is_finite() {
            return Err(PostfitError::DataFormat(format!(
                "cannot build a time grid over [{lo}, {hi}] with step {step}"
            )));
        }
        let n = ((end - start) / step).ceil() as usize;
        let points = (0..n).map(|i| start + i as f64 * step).collect();
        Ok(Self {
            start,
            end,
            step,
            points,
        })
    }

    /// Grid of one dataset: step 0.1 days, or range/n/20 for photometry.
    pub fn for_dataset(dataset: &Dataset) -> Result<Self, PostfitError> {
        let (lo, hi) = dataset.time_span()?;
        let n = dataset.len() as f64;
        match dataset.kind {
            DatasetKind::Phot => Self::around(lo, hi, |range| range / n / PHOT_OVERSAMPLING),
            DatasetKind::Rv | DatasetKind::Other => {
                Self::around(lo, hi, |_| DEFAULT_GRID_STEP)
            }
        }
    }

    /// Grid spanning every dataset with a 0.1 day step.
    pub fn full(datasets: &[Dataset]) -> Result<Self, PostfitError> {
        let mut span: Option<(Day, Day)> = None;
        for ds in datasets {
            let (lo, hi) = ds.time_span()?;
            span = Some(match span {
                Some((a, b)) => (a.min(lo), b.max(hi)),
                None => (lo, hi),
            });
        }
        let (lo, hi) = span.ok_or_else(|| {
            PostfitError::DataFormat("no dataset to build the full time grid from".into())
        })?;
        Self::around(lo, hi, |_| DEFAULT_GRID_STEP)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// The full grid plus one grid per dataset; RV datasets share the full grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotGrids {
    pub full: PlotGrid,
    per_dataset: BTreeMap<String, PlotGrid>,
}

impl PlotGrids {
    pub fn build(datasets: &[Dataset]) -> Result<Self, PostfitError> {
        let full = PlotGrid::full(datasets)?;
        let mut per_dataset = BTreeMap::new();
        for ds in datasets {
            let grid = match ds.kind {
                DatasetKind::Rv => full.clone(),
                DatasetKind::Phot | DatasetKind::Other => PlotGrid::for_dataset(ds)?,
            };
            per_dataset.insert(ds.name.clone(), grid);
        }
        Ok(Self { full, per_dataset })
    }

    /// Grid of `dataset`, the full grid for an unknown name.
    pub fn for_dataset(&self, dataset: &str) -> &PlotGrid {
        self.per_dataset.get(dataset).unwrap_or(&self.full)
    }
}

#[cfg(test)]
mod grid_test {
    use super::*;
    use approx::assert_relative_eq;

    fn dataset(name: &str, kind: DatasetKind, x0: Vec<f64>) -> Dataset {
        let n = x0.len();
        Dataset::new(name, kind, x0, vec![0.0; n], vec![1.0; n]).unwrap()
    }

    #[test]
    fn test_rv_grid_margins() {
        let ds = dataset("harps", DatasetKind::Rv, vec![0.0, 10.0]);
        let grid = PlotGrid::for_dataset(&ds).unwrap();
        assert_relative_eq!(grid.start, -1.0);
        assert_relative_eq!(grid.end, 11.0);
        assert!((119..=121).contains(&grid.len()));
        assert!(*grid.points.last().unwrap() < grid.end);
    }

    #[test]
    fn test_phot_step_and_floor() {
        let ds = dataset("tess", DatasetKind::Phot, vec![0.0, 1.0, 2.0, 3.0]);
        let grid = PlotGrid::for_dataset(&ds).unwrap();
        assert_relative_eq!(grid.step, 3.0 / 4.0 / 20.0);

        let single = dataset("one", DatasetKind::Other, vec![5.0]);
        let grid = PlotGrid::for_dataset(&single).unwrap();
        assert_relative_eq!(grid.start, 4.99);
        assert_relative_eq!(grid.end, 5.01);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_rv_datasets_share_full_grid() {
        let a = dataset("a", DatasetKind::Rv, vec![0.0, 5.0]);
        let b = dataset("b", DatasetKind::Phot, vec![20.0, 30.0]);
        let grids = PlotGrids::build(&[a, b]).unwrap();
        assert_relative_eq!(grids.full.start, -3.0);
        assert_relative_eq!(grids.full.end, 33.0);
        assert_eq!(grids.for_dataset("a"), &grids.full);
        assert_ne!(grids.for_dataset("b"), &grids.full);
        assert!(PlotGrids::build(&[]).is_err());
    }
}
