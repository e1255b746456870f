//! Where the engine writes each named result inside a session workspace.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix the engine appends to every result it writes.
pub const DATA_SUFFIX: &str = ".txt";

/// Logical result name and the file stem it is written under.
pub const DEFAULT_OUTPUT_FILES: &[(&str, &str)] = &[
    ("original_predictor", "original_predictor"),
    ("out_of_sample_predictor", "original_forecast_predictor"),
    ("original_predictand", "original_predictand"),
    ("goodness_index", "goodness_index"),
    ("cca_x_timeseries", "predictor_cca_timeseries"),
    ("cca_y_timeseries", "predictand_cca_timeseries"),
    ("cca_canonical_correlation", "cca_canonical_correlation"),
    ("eof_x_timeseries", "predictor_eof_timeseries"),
    ("eof_x_explained_variance", "predictor_explained_variance"),
    ("eof_y_explained_variance", "predictand_explained_variance"),
    ("eof_y_timeseries", "predictand_eof_timeseries"),
    ("eof_x_loadings", "predictor_eof_spatial_loadings"),
    ("eof_y_loadings", "predictand_eof_spatial_loadings"),
    ("cca_x_loadings", "predictor_cca_spatial_loadings"),
    ("cca_y_loadings", "predictand_cca_spatial_loadings"),
    ("hindcast_values", "hindcast_values"),
    ("hindcast_probabilities", "hindcast_probabilities"),
    (
        "hindcast_prediction_error_variance",
        "hindcast_prediction_error_variance",
    ),
    ("forecast_probabilities", "forecast_probabilities"),
    ("forecast_values", "forecast_values"),
    (
        "forecast_prediction_error_variance",
        "forecast_prediction_error_variance",
    ),
    ("pearson", "pearson"),
    ("spearman", "spearman"),
    ("two_alternative_forced_choice", "two_alternative_forced_choice"),
    ("pct_variance", "pct_variance"),
    ("variance_ratio", "variance_ratio"),
    ("mean_bias", "mean_bias"),
    ("root_mean_squared_error", "root_mean_squared_error"),
    ("mean_absolute_error", "mean_absolute_error"),
    ("hit_score", "hit_score"),
    ("hit_skill_score", "hit_skill_score"),
    ("leps", "leps"),
    ("gerrity_score", "gerrity_score"),
    ("2afc_fcst_categories", "2afc_fcst_categories"),
    ("2afc_continuous_fcsts", "2afc_continuous_fcsts"),
    ("roc_area_below_normal", "roc_area_below_normal"),
    ("roc_area_above_normal", "roc_area_above_normal"),
    ("generalized_roc", "generalized_roc"),
    ("rank_probability_skill_score", "rank_probability_skill_score"),
    ("ignorance", "ignorance"),
];

/// Fixed name → path table for one session; built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRegistry {
    root: PathBuf,
    entries: Vec<(String, PathBuf)>,
}

impl OutputRegistry {
    /// Builds the registry from `(name, stem)` pairs; later pairs override
    /// earlier ones with the same name.
    pub fn new<I, N, S>(root: impl Into<PathBuf>, table: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<Path>,
    {
        let root = root.into();
        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        for (name, stem) in table {
            let name = name.into();
            let path = root.join(stem);
            match entries.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => entry.1 = path,
                None => entries.push((name, path)),
            }
        }
        Self { root, entries }
    }

    pub fn with_defaults(root: impl Into<PathBuf>) -> Self {
        Self::new(root, DEFAULT_OUTPUT_FILES.iter().copied())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path handed to the engine as the output file name.
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, path)| path.as_path())
    }

    /// Path the engine actually writes for `name`, suffix included.
    pub fn data_file(&self, name: &str) -> Option<PathBuf> {
        self.path(name).map(|path| {
            let mut file: OsString = path.as_os_str().to_owned();
            file.push(DATA_SUFFIX);
            PathBuf::from(file)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
