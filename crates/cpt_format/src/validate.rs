//! Pre-write schema checks for labeled arrays.

use crate::array::{CoordValues, LabeledArray};
use crate::error::FormatError;
use crate::writer::WriteOptions;

/// Dimension names the engine understands.
pub const VALID_DIMS: [&str; 7] = ["T", "X", "Y", "Mode", "index", "C", "M"];

/// Coordinate names the engine understands: the dimensions plus the
/// auxiliary time coordinates.
pub const VALID_COORDS: [&str; 10] = ["T", "Ti", "Tf", "S", "X", "Y", "Mode", "index", "C", "M"];

const TIME_AUXILIARY: [&str; 3] = ["Ti", "Tf", "S"];

/// Characters that would split a header pair or a grid cell.
const SEPARATORS: [char; 4] = ['\t', ',', '\n', '\r'];

pub fn validate(array: &LabeledArray, options: &WriteOptions) -> Result<(), FormatError> {
    let ndim = array.ndim();
    if !(2..=4).contains(&ndim) {
        return Err(FormatError::DimensionCount { found: ndim });
    }

    for (position, dim) in array.dims().iter().enumerate() {
        if !VALID_DIMS.contains(&dim.as_str()) {
            return Err(FormatError::InvalidDimension { name: dim.clone() });
        }
        if array.dims()[..position].contains(dim) {
            return Err(FormatError::DuplicateDimension { name: dim.clone() });
        }
        match array.coord(dim) {
            Some(coord) if coord.dim == *dim => {}
            _ => return Err(FormatError::MissingCoordinate { dim: dim.clone() }),
        }
    }

    for (name, coord) in array.coords() {
        if !VALID_COORDS.contains(&name) {
            return Err(FormatError::InvalidCoordinate {
                name: name.to_string(),
            });
        }
        if TIME_AUXILIARY.contains(&name) && coord.dim != "T" {
            return Err(FormatError::MisplacedTimeCoordinate {
                name: name.to_string(),
                dim: coord.dim.clone(),
            });
        }
        // Coordinates must hang off a dimension the array actually has.
        let Some(expected) = array.extent(&coord.dim) else {
            return Err(FormatError::InvalidCoordinate {
                name: name.to_string(),
            });
        };
        if let CoordValues::Text(labels) = &coord.values {
            if let Some(label) = labels.iter().find(|label| label.contains(SEPARATORS)) {
                return Err(FormatError::InvalidText {
                    name: name.to_string(),
                    value: label.clone(),
                });
            }
        }
        if coord.values.len() != expected {
            return Err(FormatError::CoordinateLength {
                name: name.to_string(),
                dim: coord.dim.clone(),
                expected,
                found: coord.values.len(),
            });
        }
    }

    match (array.coord("Ti").is_some(), array.coord("Tf").is_some()) {
        (true, false) => {
            return Err(FormatError::UnpairedTimeBounds {
                present: "Ti",
                missing: "Tf",
            })
        }
        (false, true) => {
            return Err(FormatError::UnpairedTimeBounds {
                present: "Tf",
                missing: "Ti",
            })
        }
        _ => {}
    }

    if options.require_missing {
        match array.attrs().missing {
            None => return Err(FormatError::MissingAttribute { name: "missing" }),
            Some(missing) if missing.is_nan() => return Err(FormatError::NanMissingValue),
            Some(_) => {}
        }
    }
    match array.attrs().units.as_deref() {
        None if options.require_units => {
            return Err(FormatError::MissingAttribute { name: "units" })
        }
        Some(units) if units.contains(SEPARATORS) => {
            return Err(FormatError::InvalidText {
                name: "units".to_string(),
                value: units.to_string(),
            })
        }
        _ => {}
    }

    // The reader turns spaces into underscores, so a spaced name would not survive.
    let name = array.name();
    if name.trim().is_empty() || name.contains([',', '=', ' ', '\t', '\n', '\r']) {
        return Err(FormatError::InvalidFieldName {
            name: name.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate;
    use crate::array::LabeledArray;
    use crate::error::FormatError;
    use crate::writer::WriteOptions;
    use assert_matches::assert_matches;
    use time::macros::datetime;

    fn base() -> crate::array::LabeledArrayBuilder {
        LabeledArray::builder("prate")
            .dim_with_coord("Y", vec![1.0, 2.0])
            .dim_with_coord("X", vec![1.0])
            .missing(-999.0)
            .units("mm")
    }

    #[test]
    fn accepts_a_complete_grid() {
        let array = base().build().expect("array");
        assert!(validate(&array, &WriteOptions::default()).is_ok());
    }

    #[test]
    fn rejects_foreign_dimensions() {
        let array = base()
            .dim_with_coord("lat", vec![0.0])
            .build()
            .expect("array");
        assert_matches!(
            validate(&array, &WriteOptions::default()),
            Err(FormatError::InvalidDimension { name }) if name == "lat"
        );
    }

    #[test]
    fn rejects_single_dimension_arrays() {
        let array = LabeledArray::builder("series")
            .dim_with_coord("T", vec![1.0, 2.0])
            .missing(-999.0)
            .units("mm")
            .build()
            .expect("array");
        assert_matches!(
            validate(&array, &WriteOptions::default()),
            Err(FormatError::DimensionCount { found: 1 })
        );
    }

    #[test]
    fn coordinate_lengths_must_match() {
        let array = base()
            .coord("X", "X", vec![1.0, 2.0])
            .build()
            .expect("array");
        assert_matches!(
            validate(&array, &WriteOptions::default()),
            Err(FormatError::CoordinateLength { expected: 1, found: 2, .. })
        );
    }

    #[test]
    fn time_bounds_must_be_paired_and_on_t() {
        let stamp = datetime!(1990-01-01 0:00);
        let unpaired = base()
            .dim_with_coord("T", vec![stamp])
            .coord("Ti", "T", vec![stamp])
            .build()
            .expect("array");
        assert_matches!(
            validate(&unpaired, &WriteOptions::default()),
            Err(FormatError::UnpairedTimeBounds { present: "Ti", missing: "Tf" })
        );

        let misplaced = base().coord("S", "Y", vec![stamp, stamp]).build().expect("array");
        assert_matches!(
            validate(&misplaced, &WriteOptions::default()),
            Err(FormatError::MisplacedTimeCoordinate { .. })
        );
    }

    #[test]
    fn attributes_are_required_unless_waived() {
        let bare = LabeledArray::builder("prate")
            .dim_with_coord("Y", vec![1.0])
            .dim_with_coord("X", vec![1.0])
            .build()
            .expect("array");
        assert_matches!(
            validate(&bare, &WriteOptions::default()),
            Err(FormatError::MissingAttribute { name: "missing" })
        );

        let options = WriteOptions {
            require_missing: false,
            require_units: false,
            ..WriteOptions::default()
        };
        assert!(validate(&bare, &options).is_ok());
    }

    #[test]
    fn nan_missing_value_is_rejected() {
        let array = base().missing(f64::NAN).build().expect("array");
        assert_matches!(
            validate(&array, &WriteOptions::default()),
            Err(FormatError::NanMissingValue)
        );
    }

    #[test]
    fn field_names_cannot_break_headers() {
        let array = LabeledArray::builder("a=b")
            .dim_with_coord("Y", vec![1.0])
            .dim_with_coord("X", vec![1.0])
            .missing(-1.0)
            .units("K")
            .build()
            .expect("array");
        assert_matches!(
            validate(&array, &WriteOptions::default()),
            Err(FormatError::InvalidFieldName { .. })
        );

        let spaced = LabeledArray::builder("goodness index")
            .dim_with_coord("Y", vec![1.0])
            .dim_with_coord("X", vec![1.0])
            .missing(-1.0)
            .units("K")
            .build()
            .expect("array");
        assert_matches!(
            validate(&spaced, &WriteOptions::default()),
            Err(FormatError::InvalidFieldName { name }) if name == "goodness index"
        );
    }

    #[test]
    fn labels_and_units_cannot_hold_separators() {
        let tabbed = LabeledArray::builder("idx")
            .dim_with_coord("T", vec![1.0])
            .dim_with_coord("index", vec!["nino\t34"])
            .missing(-1.0)
            .units("K")
            .build()
            .expect("array");
        assert_matches!(
            validate(&tabbed, &WriteOptions::default()),
            Err(FormatError::InvalidText { name, .. }) if name == "index"
        );

        let units = base().units("mm, daily").build().expect("array");
        assert_matches!(
            validate(&units, &WriteOptions::default()),
            Err(FormatError::InvalidText { name, value }) if name == "units" && value == "mm, daily"
        );
    }
}
