//! The labeled n-dimensional array exchanged with the engine.

use std::collections::BTreeMap;

use time::PrimitiveDateTime;

use crate::date::format_instant;
use crate::error::FormatError;
use crate::number::format_significant;

/// Values of one coordinate sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordValues {
    Numeric(Vec<f64>),
    Text(Vec<String>),
    Time(Vec<PrimitiveDateTime>),
}

impl CoordValues {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
            Self::Time(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders entry `index` as it appears in a CPTv10 file.
    #[must_use]
    pub fn render(&self, index: usize) -> Option<String> {
        match self {
            Self::Numeric(values) => values.get(index).map(|value| format_significant(*value)),
            Self::Text(values) => values.get(index).cloned(),
            Self::Time(values) => values.get(index).map(|value| format_instant(*value)),
        }
    }

    #[must_use]
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Self::Numeric(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            Self::Text(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_time(&self) -> Option<&[PrimitiveDateTime]> {
        match self {
            Self::Time(values) => Some(values),
            _ => None,
        }
    }
}

impl From<Vec<f64>> for CoordValues {
    fn from(values: Vec<f64>) -> Self {
        Self::Numeric(values)
    }
}

impl From<Vec<String>> for CoordValues {
    fn from(values: Vec<String>) -> Self {
        Self::Text(values)
    }
}

impl From<Vec<&str>> for CoordValues {
    fn from(values: Vec<&str>) -> Self {
        Self::Text(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<PrimitiveDateTime>> for CoordValues {
    fn from(values: Vec<PrimitiveDateTime>) -> Self {
        Self::Time(values)
    }
}

/// A coordinate sequence and the dimension it indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub dim: String,
    pub values: CoordValues,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    pub missing: Option<f64>,
    pub units: Option<String>,
    pub clim_prob: Option<f64>,
}

/// Row-major values over `dims`, `None` marking nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledArray {
    name: String,
    dims: Vec<String>,
    shape: Vec<usize>,
    coords: BTreeMap<String, Coordinate>,
    values: Vec<Option<f64>>,
    attrs: Attributes,
}

impl LabeledArray {
    pub fn builder(name: impl Into<String>) -> LabeledArrayBuilder {
        LabeledArrayBuilder {
            name: name.into(),
            dims: Vec::new(),
            coords: BTreeMap::new(),
            values: None,
            attrs: Attributes::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn coords(&self) -> impl Iterator<Item = (&str, &Coordinate)> {
        self.coords.iter().map(|(name, coord)| (name.as_str(), coord))
    }

    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|dim| dim == name)
    }

    pub fn extent(&self, name: &str) -> Option<usize> {
        self.dim_index(name).map(|index| self.shape[index])
    }

    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1; self.shape.len()];
        for axis in (0..self.shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Value at a multi-index; `None` when out of bounds, `Some(None)` for nulls.
    pub fn get(&self, index: &[usize]) -> Option<Option<f64>> {
        if index.len() != self.shape.len()
            || index.iter().zip(&self.shape).any(|(i, extent)| i >= extent)
        {
            return None;
        }
        let offset: usize = index
            .iter()
            .zip(self.strides())
            .map(|(i, stride)| i * stride)
            .sum();
        self.values.get(offset).copied()
    }

    /// Returns a copy with dimensions reordered to `order`.
    pub fn transpose(&self, order: &[&str]) -> Result<LabeledArray, FormatError> {
        if order.len() != self.dims.len() {
            return Err(FormatError::DimensionCount { found: order.len() });
        }

        let mut permutation = Vec::with_capacity(order.len());
        for name in order {
            let axis = self
                .dim_index(name)
                .ok_or_else(|| FormatError::InvalidDimension {
                    name: (*name).to_string(),
                })?;
            if permutation.contains(&axis) {
                return Err(FormatError::DuplicateDimension {
                    name: (*name).to_string(),
                });
            }
            permutation.push(axis);
        }

        let old_strides = self.strides();
        let shape: Vec<usize> = permutation.iter().map(|&axis| self.shape[axis]).collect();
        let mut values = Vec::with_capacity(self.values.len());
        let mut cursor = vec![0usize; shape.len()];
        for _ in 0..self.values.len() {
            let offset: usize = cursor
                .iter()
                .zip(&permutation)
                .map(|(i, &axis)| i * old_strides[axis])
                .sum();
            values.push(self.values[offset]);
            for axis in (0..shape.len()).rev() {
                cursor[axis] += 1;
                if cursor[axis] < shape[axis] {
                    break;
                }
                cursor[axis] = 0;
            }
        }

        Ok(LabeledArray {
            name: self.name.clone(),
            dims: permutation.iter().map(|&axis| self.dims[axis].clone()).collect(),
            shape,
            coords: self.coords.clone(),
            values,
            attrs: self.attrs.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct LabeledArrayBuilder {
    name: String,
    dims: Vec<(String, usize)>,
    coords: BTreeMap<String, Coordinate>,
    values: Option<Vec<Option<f64>>>,
    attrs: Attributes,
}

impl LabeledArrayBuilder {
    pub fn dim(mut self, name: impl Into<String>, extent: usize) -> Self {
        self.dims.push((name.into(), extent));
        self
    }

    pub fn coord(
        mut self,
        name: impl Into<String>,
        dim: impl Into<String>,
        values: impl Into<CoordValues>,
    ) -> Self {
        self.coords.insert(
            name.into(),
            Coordinate {
                dim: dim.into(),
                values: values.into(),
            },
        );
        self
    }

    /// Adds a dimension whose extent and coordinate come from `values`.
    pub fn dim_with_coord(self, name: impl Into<String>, values: impl Into<CoordValues>) -> Self {
        let name = name.into();
        let values = values.into();
        let extent = values.len();
        self.dim(name.clone(), extent).coord(name.clone(), name, values)
    }

    pub fn values(mut self, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        self.values = Some(values.into_iter().collect());
        self
    }

    pub fn missing(mut self, missing: f64) -> Self {
        self.attrs.missing = Some(missing);
        self
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.attrs.units = Some(units.into());
        self
    }

    pub fn clim_prob(mut self, clim_prob: f64) -> Self {
        self.attrs.clim_prob = Some(clim_prob);
        self
    }

    pub fn attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Checks the value count against the shape; missing values default to nulls.
    pub fn build(self) -> Result<LabeledArray, FormatError> {
        let (dims, shape): (Vec<String>, Vec<usize>) = self.dims.into_iter().unzip();
        let expected: usize = shape.iter().product();
        let values = self.values.unwrap_or_else(|| vec![None; expected]);
        if values.len() != expected {
            return Err(FormatError::ShapeMismatch {
                name: self.name,
                shape,
                expected,
                found: values.len(),
            });
        }

        Ok(LabeledArray {
            name: self.name,
            dims,
            shape,
            coords: self.coords,
            values,
            attrs: self.attrs,
        })
    }
}
