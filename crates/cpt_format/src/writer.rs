//! CPTv10 serialization.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::array::{CoordValues, LabeledArray};
use crate::date::{format_instant, format_range, format_stamp};
use crate::error::FormatError;
use crate::header::NAMESPACE;
use crate::number::format_significant;
use crate::roles::{guess_roles, RoleAssignment, RoleHints};
use crate::validate::validate;

/// Role overrides and attribute requirements for [`write_array`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub row: Option<String>,
    pub col: Option<String>,
    pub time: Option<String>,
    pub category: Option<String>,
    /// When false, a missing `missing` attribute is allowed and the tag is omitted.
    pub require_missing: bool,
    /// When false, a missing `units` attribute is allowed and the tag is omitted.
    pub require_units: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            row: None,
            col: None,
            time: None,
            category: None,
            require_missing: true,
            require_units: true,
        }
    }
}

impl WriteOptions {
    pub fn with_row(mut self, dim: impl Into<String>) -> Self {
        self.row = Some(dim.into());
        self
    }

    pub fn with_col(mut self, dim: impl Into<String>) -> Self {
        self.col = Some(dim.into());
        self
    }

    pub fn with_time(mut self, dim: impl Into<String>) -> Self {
        self.time = Some(dim.into());
        self
    }

    pub fn with_category(mut self, dim: impl Into<String>) -> Self {
        self.category = Some(dim.into());
        self
    }

    pub fn without_missing(mut self) -> Self {
        self.require_missing = false;
        self
    }

    pub fn without_units(mut self) -> Self {
        self.require_units = false;
        self
    }

    pub fn hints(&self) -> RoleHints {
        RoleHints {
            row: self.row.clone(),
            column: self.col.clone(),
            time: self.time.clone(),
            category: self.category.clone(),
        }
    }
}

/// Validates and writes `array` to `path` in one call; on any error the
/// target is left untouched.
pub fn write_array(
    array: &LabeledArray,
    path: impl AsRef<Path>,
    options: &WriteOptions,
) -> Result<PathBuf, FormatError> {
    let path = path.as_ref();
    let rendered = render_array(array, options)?;
    fs::write(path, rendered).map_err(|source| FormatError::io("writing CPTv10 file", path, source))?;
    debug!(field = array.name(), path = %path.display(), "wrote CPTv10 file");
    Ok(path.to_path_buf())
}

/// Renders the full CPTv10 text for `array`.
pub fn render_array(array: &LabeledArray, options: &WriteOptions) -> Result<String, FormatError> {
    let roles = guess_roles(array, &options.hints())?;
    validate(array, options)?;

    let canonical = array.transpose(&roles.block_order())?;
    let layout = Layout::new(&canonical, &roles, options)?;

    let mut out = String::new();
    out.push_str(NAMESPACE);
    out.push('\n');
    out.push_str("cpt:nfields=1\n");
    if roles.category.is_some() {
        out.push_str(&format!("cpt:ncats={}\n", layout.ncat));
    }

    let block_len = layout.nrow * layout.ncol;
    for t in 0..layout.ntime {
        for c in 0..layout.ncat {
            layout.write_header(&mut out, t, c);
            layout.write_block(&mut out, &canonical, (c * layout.ntime + t) * block_len);
        }
    }

    Ok(out)
}

struct Layout<'a> {
    field: &'a str,
    roles: &'a RoleAssignment,
    rows: Vec<String>,
    cols: Vec<String>,
    times: Vec<String>,
    starts: Option<Vec<String>>,
    categories: Vec<String>,
    nrow: usize,
    ncol: usize,
    ntime: usize,
    ncat: usize,
    units: Option<&'a str>,
    missing: Option<String>,
    clim_prob: Option<f64>,
}

impl<'a> Layout<'a> {
    fn new(
        array: &'a LabeledArray,
        roles: &'a RoleAssignment,
        options: &WriteOptions,
    ) -> Result<Self, FormatError> {
        let labels = |dim: &str| -> Result<Vec<String>, FormatError> {
            // Ti/Tf hang off T whichever role it plays.
            if dim == "T" {
                return time_labels(array, dim);
            }
            let coord = array
                .coord(dim)
                .ok_or_else(|| FormatError::MissingCoordinate {
                    dim: dim.to_string(),
                })?;
            Ok(render_all(&coord.values))
        };

        let rows = labels(&roles.row)?;
        let cols = labels(&roles.column)?;
        let times = match &roles.time {
            Some(time) => time_labels(array, time)?,
            None => Vec::new(),
        };
        let categories = match &roles.category {
            Some(category) => labels(category)?,
            None => Vec::new(),
        };
        // S rides on T; without a time role there is nothing to attach it to.
        let starts = match (&roles.time, array.coord("S")) {
            (Some(_), Some(coord)) => Some(match &coord.values {
                CoordValues::Time(values) => values.iter().map(|v| format_stamp(*v)).collect(),
                other => render_all(other),
            }),
            _ => None,
        };

        Ok(Self {
            field: array.name(),
            roles,
            nrow: rows.len(),
            ncol: cols.len(),
            ntime: times.len().max(1),
            ncat: categories.len().max(1),
            rows,
            cols,
            times,
            starts,
            categories,
            units: if options.require_units {
                array.attrs().units.as_deref()
            } else {
                None
            },
            missing: if options.require_missing {
                array.attrs().missing.map(format_significant)
            } else {
                None
            },
            clim_prob: array.attrs().clim_prob,
        })
    }

    fn write_header(&self, out: &mut String, t: usize, c: usize) {
        out.push_str(&format!("cpt:field={}", self.field));
        if let Some(time) = &self.roles.time {
            out.push_str(&format!(", cpt:{}={}", time, self.times[t]));
            if let Some(start) = self.starts.as_ref().and_then(|starts| starts.get(t)) {
                out.push_str(&format!(", cpt:S={start}"));
            }
        }
        if let Some(category) = &self.roles.category {
            out.push_str(&format!(", cpt:{}={}", category, self.categories[c]));
        }
        if let Some(clim_prob) = self.clim_prob {
            out.push_str(&format!(", cpt:clim_prob={}", format_significant(clim_prob)));
        }
        out.push_str(&format!(
            ", cpt:nrow={}, cpt:ncol={}, cpt:row={}, cpt:col={}",
            self.nrow, self.ncol, self.roles.row, self.roles.column
        ));
        if let Some(units) = self.units {
            out.push_str(&format!(", cpt:units={units}"));
        }
        if let Some(missing) = &self.missing {
            out.push_str(&format!(", cpt:missing={missing}"));
        }
        out.push('\n');
    }

    fn write_block(&self, out: &mut String, array: &LabeledArray, offset: usize) {
        for col in &self.cols {
            out.push('\t');
            out.push_str(col);
        }
        out.push('\n');

        let null = self.missing.as_deref().unwrap_or("NaN");
        let values = array.values();
        for (r, row) in self.rows.iter().enumerate() {
            out.push_str(row);
            for c in 0..self.ncol {
                out.push('\t');
                match values[offset + r * self.ncol + c] {
                    Some(value) => out.push_str(&format_significant(value)),
                    None => out.push_str(null),
                }
            }
            out.push('\n');
        }
    }
}

fn render_all(values: &CoordValues) -> Vec<String> {
    (0..values.len())
        .filter_map(|index| values.render(index))
        .collect()
}

/// Period tokens when `T` has `Ti`/`Tf`, single dates otherwise.
fn time_labels(array: &LabeledArray, dim: &str) -> Result<Vec<String>, FormatError> {
    let coord = array
        .coord(dim)
        .ok_or_else(|| FormatError::MissingCoordinate {
            dim: dim.to_string(),
        })?;

    let bounds = match (dim, array.coord("Ti"), array.coord("Tf")) {
        ("T", Some(start), Some(end)) => start.values.as_time().zip(end.values.as_time()),
        _ => None,
    };

    Ok(match (bounds, &coord.values) {
        (Some((starts, ends)), _) => starts
            .iter()
            .zip(ends)
            .map(|(start, end)| format_range(*start, *end))
            .collect(),
        (None, CoordValues::Time(values)) => values.iter().map(|v| format_instant(*v)).collect(),
        (None, other) => render_all(other),
    })
}
