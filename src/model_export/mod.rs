//! # Model exports
//!
//! Text tables of the best-fit model at a point estimate (median or MAP), consumed by
//! external plotting tools. For every dataset and every observation model attached to it:
//!
//! | File                         | Header                                                             |
//! |------------------------------|--------------------------------------------------------------------|
//! | `<dataset>_<model>.dat`      | `descriptor BJD BJD0 pha val,+- sys mod full val_compare,+- res,+-` |
//! | `<dataset>_<model>_full.dat` | `descriptor BJD BJD0 mod` (`mod,+-` with a standard deviation)      |
//! | `<dataset>_full.dat`         | `descriptor BJD BJD0 mod` (complete model)                         |
//!
//! and for every planet with a complete set of orbital elements (`P K e o f`):
//!
//! | File                     | Header                                     |
//! |--------------------------|--------------------------------------------|
//! | `RV_planet_<p>_kep.dat`  | `descriptor x_range x_range0 m_kepler`     |
//! | `RV_planet_<p>_pha.dat`  | `descriptor x_phase m_phase`               |
//!
//! Files are whitespace separated, values printed with six decimals. Median-based files go
//! to `model_files/`, MAP-based ones to `MAP_model_files/`.
//!
//! Model values come from a [`ModelEvaluator`], which knows how to compute the systematics,
//! each observation model and the complete model of a dataset at arbitrary times.
pub mod grid;

use std::{collections::BTreeMap, fmt, fs};

use camino::{Utf8Path, Utf8PathBuf};

use crate::{
    constants::Day,
    derived::{DerivedQuantitySet, ObservationModel, QuantityConverter},
    kepler::KeplerOrbit,
    postfit_errors::PostfitError,
};
pub use grid::{PlotGrid, PlotGrids};

const OBSERVATION_HEADER: [&str; 10] = [
    "descriptor",
    "BJD",
    "BJD0",
    "pha",
    "val,+-",
    "sys",
    "mod",
    "full",
    "val_compare,+-",
    "res,+-",
];

/// Orbital elements needed by the Kepler curves, in lookup order.
pub const ORBITAL_ELEMENTS: [&str; 5] = ["P", "K", "e", "o", "f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Rv,
    Phot,
    Other,
}

/// One fitted dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub kind: DatasetKind,
    /// Observation times relative to the reference time.
    pub x0: Vec<Day>,
    pub y: Vec<f64>,
    pub e: Vec<f64>,
    /// Observation models exported for this dataset.
    pub models: Vec<ObservationModel>,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        kind: DatasetKind,
        x0: Vec<Day>,
        y: Vec<f64>,
        e: Vec<f64>,
    ) -> Result<Self, PostfitError> {
        let name = name.into();
        if x0.is_empty() || x0.len() != y.len() || x0.len() != e.len() {
            return Err(PostfitError::DataFormat(format!(
                "dataset '{name}': {} times, {} values, {} uncertainties",
                x0.len(),
                y.len(),
                e.len()
            )));
        }
        Ok(Self {
            name,
            kind,
            x0,
            y,
            e,
            models: Vec::new(),
        })
    }

    pub fn with_model(mut self, model: ObservationModel) -> Self {
        self.models.push(model);
        self
    }

    pub fn len(&self) -> usize {
        self.x0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x0.is_empty()
    }

    /// First and last observation time.
    pub fn time_span(&self) -> Result<(Day, Day), PostfitError> {
        let lo = self.x0.iter().copied().reduce(f64::min);
        let hi = self.x0.iter().copied().reduce(f64::max);
        match (lo, hi) {
            (Some(lo), Some(hi)) if lo.is_finite() && hi.is_finite() => Ok((lo, hi)),
            _ => Err(PostfitError::DataFormat(format!(
                "dataset '{}' has no finite observation time",
                self.name
            ))),
        }
    }
}

/// One observation-model curve; a single value is broadcast over every time.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCurve {
    pub name: String,
    pub values: Vec<f64>,
    pub std: Option<Vec<f64>>,
}

/// Model components of one dataset at a set of times.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelComponents {
    pub systematics: Vec<f64>,
    pub complete: Vec<f64>,
    pub models: Vec<ModelCurve>,
}

impl ModelComponents {
    pub fn model(&self, name: &str) -> Option<&ModelCurve> {
        self.models.iter().find(|m| m.name == name)
    }
}

/// Evaluates the fitted model of a dataset.
pub trait ModelEvaluator {
    /// Components of `dataset` at `times` (relative to the reference time) for the
    /// parameter vector `theta`.
    fn evaluate(
        &self,
        theta: &[f64],
        dataset: &Dataset,
        times: &[Day],
    ) -> Result<ModelComponents, PostfitError>;
}

/// Point estimate the exports are computed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    Median,
    Map,
}

impl Estimate {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Estimate::Median => "model_files",
            Estimate::Map => "MAP_model_files",
        }
    }
}

/// Why no Kepler curve was written for a planet.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveSkip {
    /// The named element is absent or not a single value.
    MissingOrbitalElement(String),
    /// The elements are outside the domain of the RV model.
    InvalidOrbit(String),
}

impl fmt::Display for CurveSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveSkip::MissingOrbitalElement(el) => write!(f, "missing orbital element '{el}'"),
            CurveSkip::InvalidOrbit(msg) => write!(f, "invalid orbit: {msg}"),
        }
    }
}

/// Build the orbit of a planet from its derived quantities at a point estimate.
pub fn orbit_from_quantities(set: &DerivedQuantitySet) -> Result<KeplerOrbit, CurveSkip> {
    let mut el = [0.0; 5];
    for (slot, name) in el.iter_mut().zip(ORBITAL_ELEMENTS) {
        *slot = set
            .get(name)
            .and_then(|q| q.as_scalar())
            .ok_or_else(|| CurveSkip::MissingOrbitalElement(name.to_string()))?;
    }
    let [period, semi_amplitude, eccentricity, omega, mean_longitude] = el;
    Ok(KeplerOrbit {
        period,
        semi_amplitude,
        eccentricity,
        omega,
        mean_longitude,
    })
}

/// Files written for one point estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelExportReport {
    pub estimate: Estimate,
    pub dir: Utf8PathBuf,
    pub files: Vec<Utf8PathBuf>,
    pub skipped_planets: Vec<(String, CurveSkip)>,
}

fn space_writer(path: &Utf8Path) -> Result<csv::Writer<fs::File>, PostfitError> {
    Ok(csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)?)
}

fn fmt6(x: f64) -> String {
    format!("{x:.6}")
}

fn expand(values: &[f64], n: usize, what: &str) -> Result<Vec<f64>, PostfitError> {
    match values.len() {
        len if len == n => Ok(values.to_vec()),
        1 => Ok(vec![values[0]; n]),
        len => Err(PostfitError::DataFormat(format!(
            "{what}: {len} model values for {n} times"
        ))),
    }
}

/// Writes the model tables of a set of datasets.
pub struct ModelExporter<'a, E: ModelEvaluator + ?Sized> {
    evaluator: &'a E,
    datasets: &'a [Dataset],
    grids: PlotGrids,
    tref: Day,
}

impl<'a, E: ModelEvaluator + ?Sized> ModelExporter<'a, E> {
    pub fn new(evaluator: &'a E, datasets: &'a [Dataset], tref: Day) -> Result<Self, PostfitError> {
        Ok(Self {
            evaluator,
            datasets,
            grids: PlotGrids::build(datasets)?,
            tref,
        })
    }

    pub fn grids(&self) -> &PlotGrids {
        &self.grids
    }

    /// Write every dataset and planet table for one estimate under `root/<estimate dir>`.
    ///
    /// Arguments
    /// -----------------
    /// * `estimate`: which estimate `theta` is; selects the output directory.
    /// * `theta`: parameter vector.
    /// * `planets`: derived quantities of each planet at `theta`, by planet name.
    /// * `root`: parent output directory.
    ///
    /// Return
    /// ----------
    /// * The written files and the planets left without a Kepler curve.
    pub fn export(
        &self,
        estimate: Estimate,
        theta: &[f64],
        planets: &[(String, DerivedQuantitySet)],
        root: &Utf8Path,
    ) -> Result<ModelExportReport, PostfitError> {
        let dir = root.join(estimate.dir_name());
        fs::create_dir_all(&dir)?;

        let periods: BTreeMap<&str, f64> = planets
            .iter()
            .filter_map(|(name, set)| {
                let p = set.get("P")?.as_scalar()?;
                Some((name.as_str(), p))
            })
            .collect();

        let mut files = Vec::new();
        for ds in self.datasets {
            files.extend(self.write_dataset(ds, theta, &periods, &dir)?);
        }

        let mut skipped_planets = Vec::new();
        for (name, set) in planets {
            match self.write_planet(name, set, &dir) {
                Ok(written) => files.extend(written),
                Err(PlanetOutcome::Skipped(reason)) => {
                    log::warn!("Kepler curves of planet '{name}' skipped: {reason}");
                    skipped_planets.push((name.clone(), reason));
                }
                Err(PlanetOutcome::Failed(e)) => return Err(e),
            }
        }

        log::info!(
            "{} model files written to {dir}, {} planets skipped",
            files.len(),
            skipped_planets.len()
        );
        Ok(ModelExportReport {
            estimate,
            dir,
            files,
            skipped_planets,
        })
    }

    fn write_dataset(
        &self,
        ds: &Dataset,
        theta: &[f64],
        periods: &BTreeMap<&str, f64>,
        dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, PostfitError> {
        let grid = self.grids.for_dataset(&ds.name);
        let at_obs = self.evaluator.evaluate(theta, ds, &ds.x0)?;
        let on_grid = self.evaluator.evaluate(theta, ds, &grid.points)?;

        let n = ds.len();
        let systematics = expand(&at_obs.systematics, n, &ds.name)?;
        let complete = expand(&at_obs.complete, n, &ds.name)?;

        let mut files = Vec::new();
        for model in &ds.models {
            let label = format!("{}_{}", ds.name, model.name());
            let missing = || {
                PostfitError::DataFormat(format!("no values computed for model '{label}'"))
            };

            let curve = at_obs.model(model.name()).ok_or_else(missing)?;
            let values = expand(&curve.values, n, &label)?;
            // last referenced planet with a period sets the phase
            let period = model
                .common_refs()
                .iter()
                .rev()
                .find_map(|r| periods.get(r.as_str()).copied());

            let path = dir.join(format!("{label}.dat"));
            let mut w = space_writer(&path)?;
            w.write_record(OBSERVATION_HEADER)?;
            for i in 0..n {
                let x0 = ds.x0[i];
                let phase = period.map_or(0.0, |p| (x0 / p).rem_euclid(1.0));
                let (y, e) = (ds.y[i], ds.e[i]);
                w.write_record(
                    [
                        x0 + self.tref,
                        x0,
                        phase,
                        y,
                        e,
                        systematics[i],
                        values[i],
                        complete[i],
                        y - complete[i] + values[i],
                        e,
                        y - complete[i],
                        e,
                    ]
                    .map(fmt6),
                )?;
            }
            w.flush()?;
            files.push(path);

            let curve = on_grid.model(model.name()).ok_or_else(missing)?;
            let path = dir.join(format!("{label}_full.dat"));
            self.write_grid_curve(&path, &grid.points, &curve.values, curve.std.as_deref())?;
            files.push(path);
        }

        let path = dir.join(format!("{}_full.dat", ds.name));
        self.write_grid_curve(&path, &grid.points, &on_grid.complete, None)?;
        files.push(path);
        Ok(files)
    }

    fn write_grid_curve(
        &self,
        path: &Utf8Path,
        times: &[Day],
        values: &[f64],
        std: Option<&[f64]>,
    ) -> Result<(), PostfitError> {
        let n = times.len();
        let values = expand(values, n, path.as_str())?;
        let std = std.map(|s| expand(s, n, path.as_str())).transpose()?;

        let mut w = space_writer(path)?;
        let header = if std.is_some() { "mod,+-" } else { "mod" };
        w.write_record(["descriptor", "BJD", "BJD0", header])?;
        for (i, &x0) in times.iter().enumerate() {
            let mut row = vec![fmt6(x0 + self.tref), fmt6(x0), fmt6(values[i])];
            if let Some(s) = &std {
                row.push(fmt6(s[i]));
            }
            w.write_record(&row)?;
        }
        w.flush()?;
        Ok(())
    }

    fn write_planet(
        &self,
        name: &str,
        set: &DerivedQuantitySet,
        dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, PlanetOutcome> {
        let orbit = orbit_from_quantities(set).map_err(PlanetOutcome::Skipped)?;
        let invalid = |e: PostfitError| match e {
            PostfitError::NumericalDomain(msg) => {
                PlanetOutcome::Skipped(CurveSkip::InvalidOrbit(msg))
            }
            other => PlanetOutcome::Failed(other),
        };

        let times = &self.grids.full.points;
        let rv = orbit.rv_curve(times).map_err(invalid)?;
        let phased = orbit.phase_curve().map_err(invalid)?;

        let kep = dir.join(format!("RV_planet_{name}_kep.dat"));
        let pha = dir.join(format!("RV_planet_{name}_pha.dat"));
        let write = || -> Result<(), PostfitError> {
            let mut w = space_writer(&kep)?;
            w.write_record(["descriptor", "x_range", "x_range0", "m_kepler"])?;
            for (&x, &v) in times.iter().zip(&rv) {
                w.write_record([x + self.tref, x, v].map(fmt6))?;
            }
            w.flush()?;

            let mut w = space_writer(&pha)?;
            w.write_record(["descriptor", "x_phase", "m_phase"])?;
            for &(x, v) in &phased {
                w.write_record([x, v].map(fmt6))?;
            }
            w.flush()?;
            Ok(())
        };
        write().map_err(PlanetOutcome::Failed)?;
        Ok(vec![kep, pha])
    }
}

enum PlanetOutcome {
    Skipped(CurveSkip),
    Failed(PostfitError),
}

#[cfg(test)]
mod model_export_test {
    use super::*;
    use crate::derived::Quantity;

    /// Constant offset `theta[0]` as systematics plus a linear trend `theta[1]·t`.
    struct Linear;

    impl ModelEvaluator for Linear {
        fn evaluate(
            &self,
            theta: &[f64],
            _dataset: &Dataset,
            times: &[Day],
        ) -> Result<ModelComponents, PostfitError> {
            let trend: Vec<f64> = times.iter().map(|t| theta[1] * t).collect();
            Ok(ModelComponents {
                systematics: vec![theta[0]],
                complete: trend.iter().map(|v| v + theta[0]).collect(),
                models: vec![ModelCurve {
                    name: "trend".into(),
                    values: trend,
                    std: None,
                }],
            })
        }
    }

    fn planet(with_k: bool) -> DerivedQuantitySet {
        let mut set = DerivedQuantitySet::new();
        set.insert("P", Quantity::Scalar(4.0));
        if with_k {
            set.insert("K", Quantity::Scalar(10.0));
        }
        set.insert("e", Quantity::Scalar(0.1));
        set.insert("o", Quantity::Scalar(1.0));
        set.insert("f", Quantity::Scalar(0.5));
        set
    }

    #[test]
    fn test_export_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        let ds = Dataset::new(
            "harps",
            DatasetKind::Rv,
            vec![0.0, 1.0, 6.0],
            vec![1.0, 2.0, 3.0],
            vec![0.5, 0.5, 0.5],
        )
        .unwrap()
        .with_model(ObservationModel::new("trend", ["b"]));
        let datasets = [ds];
        let exporter = ModelExporter::new(&Linear, &datasets, 1000.0).unwrap();

        let planets = vec![("b".to_string(), planet(true)), ("c".to_string(), planet(false))];
        let report = exporter
            .export(Estimate::Map, &[0.5, 2.0], &planets, &root)
            .unwrap();

        assert_eq!(report.dir, root.join("MAP_model_files"));
        assert_eq!(
            report.skipped_planets,
            vec![("c".to_string(), CurveSkip::MissingOrbitalElement("K".into()))]
        );
        assert_eq!(report.files.len(), 5);

        let table = fs::read_to_string(report.dir.join("harps_trend.dat")).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines[0],
            "descriptor BJD BJD0 pha val,+- sys mod full val_compare,+- res,+-"
        );
        assert_eq!(lines.len(), 4);
        // t = 6: phase 6/4 mod 1, model 12, complete 12.5
        let row: Vec<f64> = lines[3].split(' ').map(|v| v.parse().unwrap()).collect();
        assert_eq!(row[0], 1006.0);
        assert_eq!(row[2], 0.5);
        assert_eq!(row[6], 12.0);
        assert_eq!(row[7], 12.5);
        assert_eq!(row[8], 3.0 - 12.5 + 12.0);
        assert_eq!(row[10], 3.0 - 12.5);

        let full = fs::read_to_string(report.dir.join("harps_full.dat")).unwrap();
        assert_eq!(full.lines().next().unwrap(), "descriptor BJD BJD0 mod");
        assert_eq!(full.lines().count(), exporter.grids().full.len() + 1);

        let pha = fs::read_to_string(report.dir.join("RV_planet_b_pha.dat")).unwrap();
        assert_eq!(pha.lines().count(), 2001);
        assert!(report.dir.join("RV_planet_b_kep.dat").is_file());
    }

    #[test]
    fn test_phase_follows_last_referenced_planet() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();

        let ds = Dataset::new(
            "harps",
            DatasetKind::Rv,
            vec![0.0, 1.0, 6.0],
            vec![1.0, 2.0, 3.0],
            vec![0.5, 0.5, 0.5],
        )
        .unwrap()
        .with_model(ObservationModel::new("trend", ["b", "c"]));
        let datasets = [ds];
        let exporter = ModelExporter::new(&Linear, &datasets, 0.0).unwrap();

        let mut outer = planet(true);
        outer.insert("P", Quantity::Scalar(5.0));
        let planets = vec![("b".to_string(), planet(true)), ("c".to_string(), outer)];
        let report = exporter
            .export(Estimate::Median, &[0.0, 1.0], &planets, &root)
            .unwrap();
        assert!(report.skipped_planets.is_empty());

        let table = fs::read_to_string(report.dir.join("harps_trend.dat")).unwrap();
        let phases: Vec<f64> = table
            .lines()
            .skip(1)
            .map(|l| l.split(' ').nth(2).unwrap().parse().unwrap())
            .collect();
        // P = 5 from `c`, not P = 4 from `b`
        assert_eq!(phases, vec![0.0, 0.2, 0.2]);
    }

    #[test]
    fn test_invalid_orbit_is_skipped() {
        let mut set = planet(true);
        set.insert("e", Quantity::Scalar(1.5));
        let orbit = orbit_from_quantities(&set).unwrap();
        assert!(orbit.rv(0.0).is_err());

        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let ds = Dataset::new("d", DatasetKind::Phot, vec![0.0, 1.0], vec![0.0; 2], vec![1.0; 2])
            .unwrap();
        let datasets = [ds];
        let exporter = ModelExporter::new(&Linear, &datasets, 0.0).unwrap();
        let report = exporter
            .export(Estimate::Median, &[0.0, 1.0], &[("b".into(), set)], &root)
            .unwrap();
        assert!(matches!(
            report.skipped_planets[0].1,
            CurveSkip::InvalidOrbit(_)
        ));
        assert_eq!(report.files, vec![root.join("model_files").join("d_full.dat")]);
    }

    #[test]
    fn test_dataset_validation() {
        assert!(Dataset::new("x", DatasetKind::Rv, vec![], vec![], vec![]).is_err());
        assert!(Dataset::new("x", DatasetKind::Rv, vec![0.0], vec![1.0, 2.0], vec![1.0]).is_err());
    }
}
