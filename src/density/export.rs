//! On-disk exports of a [`DensityReduction`].
//!
//! | File                              | Content                                                 |
//! |-----------------------------------|---------------------------------------------------------|
//! | `_hist1d.json.gz`                 | gzip JSON, group `hist1d`, datasets `<var>_x`/`<var>_y` |
//! | `_hist2d___<x>___<y>.csv`         | bin centers in first row/column, blank corner cell      |
//! | `median_sigmas.txt`               | `<var>,+,-` names, then median/+σ/−σ triples            |
use std::{
    collections::BTreeMap,
    fs,
    io::{BufReader, BufWriter, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use super::{DensityReduction, Hist2d};
use crate::{
    constants::{HIST1D_GROUP, HIST1D_STORE_FILE, HIST2D_PREFIX, MEDIAN_SIGMAS_FILE},
    postfit_errors::PostfitError,
};

/// Paths written by [`DensityReduction::export`].
#[derive(Debug, Clone, PartialEq)]
pub struct DensityExports {
    pub hist1d_store: Utf8PathBuf,
    pub hist2d_files: Vec<Utf8PathBuf>,
    pub median_sigmas: Utf8PathBuf,
}

/// Bar over `total` pair exports; the message names the pair being written.
#[cfg(feature = "progress")]
fn pair_export_bar(total: usize) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total.max(1) as u64);
    let style = ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {elapsed_precise} | ETA {eta_precise} | {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(std::time::Duration::from_millis(200));
    pb
}

/// File name of the CSV holding the `(x, y)` pair.
pub fn hist2d_file_name(x: &str, y: &str) -> String {
    format!("{HIST2D_PREFIX}{x}___{y}.csv")
}

impl DensityReduction {
    /// Write the 1D store, every 2D CSV and the median/sigma summary under `dir`.
    pub fn export(&self, dir: &Utf8Path) -> Result<DensityExports, PostfitError> {
        fs::create_dir_all(dir)?;
        let hist1d_store = self.write_hist1d_store(dir)?;
        let hist2d_files = self.write_hist2d_files(dir)?;
        let median_sigmas = self.write_median_sigmas(dir)?;
        log::info!(
            "Density exports written to {dir}: {} 1D datasets, {} pair files",
            self.retained().count(),
            hist2d_files.len()
        );
        Ok(DensityExports {
            hist1d_store,
            hist2d_files,
            median_sigmas,
        })
    }

    /// Gzip-compressed JSON store of the retained 1D histograms.
    pub fn write_hist1d_store(&self, dir: &Utf8Path) -> Result<Utf8PathBuf, PostfitError> {
        let mut group = serde_json::Map::new();
        for (var, hist) in self.retained() {
            group.insert(format!("{}_x", var.name), serde_json::to_value(&hist.centers)?);
            group.insert(format!("{}_y", var.name), serde_json::to_value(&hist.density)?);
        }
        let mut root = serde_json::Map::new();
        root.insert(HIST1D_GROUP.to_string(), serde_json::Value::Object(group));

        let path = dir.join(HIST1D_STORE_FILE);
        let mut encoder = GzEncoder::new(
            BufWriter::new(fs::File::create(&path)?),
            Compression::default(),
        );
        serde_json::to_writer(&mut encoder, &serde_json::Value::Object(root))?;
        encoder.finish()?.flush()?;
        Ok(path)
    }

    /// One CSV per ordered pair.
    pub fn write_hist2d_files(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, PostfitError> {
        #[cfg(feature = "progress")]
        let pb = pair_export_bar(self.pairs.len());

        let mut paths = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            #[cfg(feature = "progress")]
            pb.set_message(format!("{} vs {}", pair.x_name, pair.y_name));

            let path = dir.join(hist2d_file_name(&pair.x_name, &pair.y_name));
            write_hist2d_csv(&path, pair)?;
            paths.push(path);

            #[cfg(feature = "progress")]
            pb.inc(1);
        }

        #[cfg(feature = "progress")]
        pb.finish_and_clear();
        Ok(paths)
    }

    /// Two-line text summary of the retained variables.
    pub fn write_median_sigmas(&self, dir: &Utf8Path) -> Result<Utf8PathBuf, PostfitError> {
        let (names, values): (Vec<String>, Vec<String>) = self
            .retained()
            .map(|(v, _)| {
                (
                    format!("{},+,-", v.name),
                    format!(
                        "{} {} {}",
                        v.summary.median, v.summary.sigma_plus, v.summary.sigma_minus
                    ),
                )
            })
            .unzip();

        let path = dir.join(MEDIAN_SIGMAS_FILE);
        fs::write(&path, format!("{}\n{}\n", names.join(" "), values.join(" ")))?;
        Ok(path)
    }
}

fn write_hist2d_csv(path: &Utf8Path, pair: &Hist2d) -> Result<(), PostfitError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for row in pair.with_centers() {
        writer.write_record(
            row.iter().map(|cell| cell.map_or_else(String::new, |x| x.to_string())),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Read back a 1D store as `dataset name → values`.
pub fn read_hist1d_store(path: &Utf8Path) -> Result<BTreeMap<String, Vec<f64>>, PostfitError> {
    if !path.is_file() {
        return Err(PostfitError::MissingArtifact(path.to_path_buf()));
    }
    let decoder = GzDecoder::new(BufReader::new(fs::File::open(path)?));
    let mut root: BTreeMap<String, BTreeMap<String, Vec<f64>>> = serde_json::from_reader(decoder)?;
    root.remove(HIST1D_GROUP).ok_or_else(|| {
        PostfitError::DataFormat(format!("{path}: no '{HIST1D_GROUP}' group"))
    })
}
