//! CPTv10 parsing.
//!
//! A file is a namespace declaration followed by repeated header + block
//! pairs. Headers for the same field accumulate: each new time or category
//! value extends that axis, and the field's shape is only known once the
//! whole file has been read.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::array::{Attributes, CoordValues, LabeledArray, LabeledArrayBuilder};
use crate::date::DateToken;
use crate::error::FormatError;
use crate::header::{classify, HeaderTags, LineKind, RoleValue};
use crate::number::parse_number;

/// The fields of one CPTv10 file, in the order they first appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    fields: Vec<LabeledArray>,
}

impl Dataset {
    pub fn get(&self, name: &str) -> Option<&LabeledArray> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(LabeledArray::name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabeledArray> {
        self.fields.iter()
    }

    pub fn into_fields(self) -> Vec<LabeledArray> {
        self.fields
    }
}

impl IntoIterator for Dataset {
    type Item = LabeledArray;
    type IntoIter = std::vec::IntoIter<LabeledArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a LabeledArray;
    type IntoIter = std::slice::Iter<'a, LabeledArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

pub fn read_dataset(path: impl AsRef<Path>) -> Result<Dataset, FormatError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|source| FormatError::io("reading CPTv10 file", path, source))?;
    parse_dataset(&text, path)
}

/// Parses CPTv10 text; `origin` is only used in error messages.
pub fn parse_dataset(text: &str, origin: impl AsRef<Path>) -> Result<Dataset, FormatError> {
    let origin = origin.as_ref();
    let lines: Vec<&str> = text.lines().collect();
    let mut saw_namespace = false;
    let mut previous = HeaderTags::default();
    let mut builders: Vec<FieldBuilder> = Vec::new();

    let mut index = 0;
    while index < lines.len() {
        let line_no = index + 1;
        match classify(lines[index]) {
            LineKind::Blank
            | LineKind::ForeignNamespace
            | LineKind::FieldCount(_)
            | LineKind::CategoryCount(_) => index += 1,
            LineKind::Namespace => {
                saw_namespace = true;
                index += 1;
            }
            LineKind::Header(header) => {
                if !saw_namespace {
                    return Err(FormatError::MissingNamespace {
                        path: origin.to_path_buf(),
                    });
                }
                let mut tags =
                    HeaderTags::parse(header).map_err(|source| FormatError::Header {
                        path: origin.to_path_buf(),
                        line: line_no,
                        source,
                    })?;
                tags.inherit(&previous);

                let block = read_block(origin, &lines, index, &tags)?;
                let name = field_name(origin, line_no, &tags)?;
                let position = match builders.iter().position(|builder| builder.name == name) {
                    Some(position) => position,
                    None => {
                        builders.push(FieldBuilder::new(origin, line_no, name, &tags)?);
                        builders.len() - 1
                    }
                };
                builders[position].push(origin, line_no, &tags, block)?;

                index += 2 + block_rows(&tags);
                previous = tags;
            }
            LineKind::Data(_) => {
                if !saw_namespace {
                    return Err(FormatError::MissingNamespace {
                        path: origin.to_path_buf(),
                    });
                }
                return Err(FormatError::UnexpectedLine {
                    path: origin.to_path_buf(),
                    line: line_no,
                });
            }
        }
    }

    if !saw_namespace {
        return Err(FormatError::MissingNamespace {
            path: origin.to_path_buf(),
        });
    }

    let fields = builders
        .into_iter()
        .map(|builder| builder.finish(origin))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Dataset { fields })
}

fn field_name(origin: &Path, line: usize, tags: &HeaderTags) -> Result<String, FormatError> {
    tags.field
        .as_deref()
        .map(|name| name.replace(' ', "_"))
        .ok_or_else(|| missing_tag(origin, line, "field"))
}

fn missing_tag(origin: &Path, line: usize, tag: &'static str) -> FormatError {
    FormatError::MissingTag {
        path: origin.to_path_buf(),
        line,
        tag,
    }
}

fn block_rows(tags: &HeaderTags) -> usize {
    tags.nrow.unwrap_or(0)
}

/// One header's worth of data: column labels, row labels and row-major values.
struct Block {
    cols: Vec<String>,
    rows: Vec<String>,
    values: Vec<Option<f64>>,
}

fn read_block(
    origin: &Path,
    lines: &[&str],
    header_index: usize,
    tags: &HeaderTags,
) -> Result<Block, FormatError> {
    let header_line = header_index + 1;
    let nrow = tags
        .nrow
        .ok_or_else(|| missing_tag(origin, header_line, "nrow"))?;
    let ncol = tags
        .ncol
        .ok_or_else(|| missing_tag(origin, header_line, "ncol"))?;

    let col_line = lines
        .get(header_index + 1)
        .ok_or_else(|| FormatError::block(origin, header_line, "missing column coordinate line"))?;
    let col_text = col_line.trim_end();
    let cols: Vec<String> = col_text
        .strip_prefix('\t')
        .unwrap_or(col_text)
        .split('\t')
        .map(|label| label.trim().to_string())
        .collect();
    if cols.len() != ncol {
        return Err(FormatError::block(
            origin,
            header_line + 1,
            format!("expected {ncol} column labels, found {}", cols.len()),
        ));
    }

    let available = lines.len().saturating_sub(header_index + 2);
    if nrow > available {
        return Err(FormatError::block(
            origin,
            header_line,
            format!("expected {nrow} data rows, found {available}"),
        ));
    }
    let cells = nrow.checked_mul(ncol).ok_or_else(|| {
        FormatError::block(origin, header_line, format!("block of {nrow}x{ncol} is too large"))
    })?;

    let mut rows = Vec::with_capacity(nrow);
    let mut values = Vec::with_capacity(cells);
    for r in 0..nrow {
        let line_no = header_line + 2 + r;
        let line = lines.get(header_index + 2 + r).ok_or_else(|| {
            FormatError::block(
                origin,
                header_line,
                format!("expected {nrow} data rows, found {r}"),
            )
        })?;

        let mut cells = line.trim_end().split('\t');
        let label = cells.next().unwrap_or_default().trim();
        rows.push(label.to_string());

        let mut count = 0;
        for cell in cells {
            let value = parse_number(cell).ok_or_else(|| {
                FormatError::block(origin, line_no, format!("value {cell:?} is not a number"))
            })?;
            let is_missing = value.is_nan() || tags.missing.is_some_and(|missing| missing == value);
            values.push(if is_missing { None } else { Some(value) });
            count += 1;
        }
        if count != ncol {
            return Err(FormatError::block(
                origin,
                line_no,
                format!("expected {ncol} values, found {count}"),
            ));
        }
    }

    Ok(Block { cols, rows, values })
}

/// Accumulates every block of one field until the end of input.
struct FieldBuilder {
    name: String,
    row_dim: String,
    col_dim: String,
    time_dim: Option<&'static str>,
    category_dim: Option<&'static str>,
    rows: Vec<String>,
    cols: Vec<String>,
    times: Vec<String>,
    starts: Vec<Option<(usize, String)>>,
    categories: Vec<String>,
    /// Blocks per category value (a single group without a category role).
    groups: Vec<Vec<Vec<Option<f64>>>>,
    attrs: Attributes,
}

impl FieldBuilder {
    fn new(origin: &Path, line: usize, name: String, tags: &HeaderTags) -> Result<Self, FormatError> {
        let row_dim = tags.row.clone().ok_or_else(|| missing_tag(origin, line, "row"))?;
        let col_dim = tags.col.clone().ok_or_else(|| missing_tag(origin, line, "col"))?;
        let time_dim = tags.time.as_ref().map(|role| role.dim);
        let category_dim = tags.category.as_ref().map(|role| role.dim);

        let mut dims: Vec<&str> = vec![row_dim.as_str(), col_dim.as_str()];
        dims.extend(time_dim);
        dims.extend(category_dim);
        for (position, dim) in dims.iter().enumerate() {
            if dims[..position].contains(dim) {
                return Err(FormatError::dimensionality(
                    origin,
                    name,
                    format!("dimension '{dim}' is used by two roles"),
                ));
            }
        }

        Ok(Self {
            name,
            row_dim,
            col_dim,
            time_dim,
            category_dim,
            rows: Vec::new(),
            cols: Vec::new(),
            times: Vec::new(),
            starts: Vec::new(),
            categories: Vec::new(),
            groups: Vec::new(),
            attrs: Attributes::default(),
        })
    }

    fn push(
        &mut self,
        origin: &Path,
        line: usize,
        tags: &HeaderTags,
        block: Block,
    ) -> Result<(), FormatError> {
        let mismatch = |detail: String| {
            FormatError::dimensionality(origin, self.name.clone(), format!("line {line}: {detail}"))
        };

        if tags.row.as_deref() != Some(self.row_dim.as_str())
            || tags.col.as_deref() != Some(self.col_dim.as_str())
        {
            return Err(mismatch(format!(
                "row/col roles changed from {}/{}",
                self.row_dim, self.col_dim
            )));
        }

        if self.groups.is_empty() {
            self.rows = block.rows;
            self.cols = block.cols;
        } else if block.rows.len() != self.rows.len() || block.cols.len() != self.cols.len() {
            return Err(mismatch(format!(
                "block is {}x{} but the field is {}x{}",
                block.rows.len(),
                block.cols.len(),
                self.rows.len(),
                self.cols.len()
            )));
        }

        let time_value = role_value(self.time_dim, tags.time.as_ref()).map_err(&mismatch)?;
        if let Some(value) = time_value {
            if !self.times.iter().any(|seen| seen == value) {
                self.times.push(value.to_string());
                self.starts
                    .push(tags.start.as_ref().map(|start| (line, start.clone())));
            }
        }

        let category_value =
            role_value(self.category_dim, tags.category.as_ref()).map_err(&mismatch)?;
        let group = match category_value {
            Some(value) => match self.categories.iter().position(|seen| seen == value) {
                Some(position) => position,
                None => {
                    self.categories.push(value.to_string());
                    self.groups.push(Vec::new());
                    self.groups.len() - 1
                }
            },
            None => {
                if self.groups.is_empty() {
                    self.groups.push(Vec::new());
                }
                0
            }
        };

        if self.time_dim.is_none() && !self.groups[group].is_empty() {
            return Err(mismatch(
                "repeated block for a field without a time dimension".to_string(),
            ));
        }
        self.groups[group].push(block.values);

        self.attrs = Attributes {
            missing: tags.missing,
            units: tags.units.clone(),
            clim_prob: tags.clim_prob,
        };
        Ok(())
    }

    fn finish(self, origin: &Path) -> Result<LabeledArray, FormatError> {
        let ntime = if self.time_dim.is_some() {
            self.times.len()
        } else {
            1
        };
        for (index, group) in self.groups.iter().enumerate() {
            if group.len() != ntime {
                let label = self
                    .categories
                    .get(index)
                    .map(|value| format!("category '{value}'"))
                    .unwrap_or_else(|| "field".to_string());
                return Err(FormatError::dimensionality(
                    origin,
                    self.name,
                    format!(
                        "{label} has {} blocks but {ntime} time values",
                        group.len()
                    ),
                ));
            }
        }

        let mut builder = LabeledArray::builder(self.name.clone());
        if let Some(dim) = self.category_dim {
            builder = with_axis(builder, dim, &self.categories);
        }
        if let Some(dim) = self.time_dim {
            builder = with_axis(builder, dim, &self.times);
            builder = with_starts(builder, origin, dim, &self.name, &self.starts)?;
        }
        builder = with_axis(builder, &self.row_dim, &self.rows);
        builder = with_axis(builder, &self.col_dim, &self.cols);

        let array = builder
            .values(self.groups.into_iter().flatten().flatten())
            .attrs(self.attrs)
            .build()?;
        debug!(
            field = array.name(),
            dims = ?array.dims(),
            shape = ?array.shape(),
            "finalized CPTv10 field"
        );
        Ok(array)
    }
}

/// The value a header gives for a role already fixed on the field.
fn role_value<'t>(
    fixed: Option<&'static str>,
    tag: Option<&'t RoleValue>,
) -> Result<Option<&'t str>, String> {
    match (fixed, tag) {
        (None, None) => Ok(None),
        (Some(dim), Some(role)) if role.dim == dim => Ok(Some(role.value.as_str())),
        (Some(dim), _) => Err(format!("header lacks 'cpt:{dim}'")),
        (None, Some(role)) => Err(format!(
            "'cpt:{}' appears after the field's dimensions were fixed",
            role.dim
        )),
    }
}

/// Infers a coordinate for the whole sequence: numbers, else dates, else text.
fn with_axis(builder: LabeledArrayBuilder, dim: &str, labels: &[String]) -> LabeledArrayBuilder {
    if let Some(numbers) = labels
        .iter()
        .map(|label| parse_number(label))
        .collect::<Option<Vec<_>>>()
    {
        return builder.dim_with_coord(dim, numbers);
    }

    if let Ok(tokens) = labels
        .iter()
        .map(|label| DateToken::parse(label))
        .collect::<Result<Vec<_>, _>>()
    {
        let midpoints: Vec<_> = tokens.iter().map(DateToken::midpoint).collect();
        let mut builder = builder.dim_with_coord(dim, midpoints);
        if dim == "T" && tokens.iter().all(DateToken::is_range) {
            builder = builder
                .coord("Ti", "T", tokens.iter().map(DateToken::start).collect::<Vec<_>>())
                .coord("Tf", "T", tokens.iter().map(DateToken::end).collect::<Vec<_>>());
        }
        return builder;
    }

    builder.dim_with_coord(dim, CoordValues::Text(labels.to_vec()))
}

fn with_starts(
    builder: LabeledArrayBuilder,
    origin: &Path,
    dim: &str,
    field: &str,
    starts: &[Option<(usize, String)>],
) -> Result<LabeledArrayBuilder, FormatError> {
    if starts.iter().all(Option::is_none) {
        return Ok(builder);
    }

    let mut values = Vec::with_capacity(starts.len());
    for start in starts {
        let Some((line, raw)) = start else {
            return Err(FormatError::dimensionality(
                origin,
                field,
                "'cpt:S' is present on some time values but not others",
            ));
        };
        let token = DateToken::parse(raw).map_err(|source| FormatError::Date {
            path: PathBuf::from(origin),
            line: *line,
            source,
        })?;
        values.push(token.midpoint());
    }
    Ok(builder.coord("S", dim, values))
}
