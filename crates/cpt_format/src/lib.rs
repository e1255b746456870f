//! Reading and writing the CPTv10 tabular format.
//!
//! A CPTv10 file stores one or more fields as repeated header + block pairs.
//! [`read_dataset`] reconstructs each field as a [`LabeledArray`] with 2 to 4
//! dimensions; [`write_array`] does the reverse after checking the array
//! against the engine's naming rules.

pub mod array;
pub mod date;
pub mod error;
pub mod header;
pub mod number;
pub mod reader;
pub mod roles;
pub mod validate;
pub mod writer;

pub use array::{Attributes, CoordValues, Coordinate, LabeledArray, LabeledArrayBuilder};
pub use date::{format_instant, format_range, format_stamp, DateError, DateToken};
pub use error::FormatError;
pub use header::{HeaderError, HeaderTag, HeaderTags, NAMESPACE};
pub use number::format_significant;
pub use reader::{parse_dataset, read_dataset, read_dataset as read, Dataset};
pub use roles::{assign_roles, guess_roles, Role, RoleAssignment, RoleError, RoleHints, ROLE_RULES};
pub use validate::{validate, VALID_COORDS, VALID_DIMS};
pub use writer::{render_array, write_array, write_array as write, WriteOptions};
