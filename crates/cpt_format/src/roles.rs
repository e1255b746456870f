//! Dimension-role guessing.
//!
//! CPTv10 blocks are laid out by role: a row dimension, a column dimension,
//! and optionally a time and a category dimension. Roles the caller does not
//! name are taken from [`ROLE_RULES`], first unclaimed exact match wins.

use std::fmt;

use thiserror::Error;

use crate::array::LabeledArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Row,
    Column,
    Time,
    Category,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "col",
            Self::Time => "time",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate dimension names per role, in resolution order.
pub const ROLE_RULES: [(Role, &[&str]); 4] = [
    (Role::Row, &["Y", "T", "Mode"]),
    (Role::Column, &["X", "index"]),
    (Role::Time, &["T", "Mode"]),
    (Role::Category, &["C", "M"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    #[error("{role} role names '{name}', which is not a dimension of the array")]
    UnknownDimension { role: Role, name: String },

    #[error("dimension '{name}' is claimed by both the {first} and {second} roles")]
    AmbiguousRoles { name: String, first: Role, second: Role },

    #[error("cannot assign roles to dimensions {dims:?}: {detail}")]
    UnresolvedRoles { dims: Vec<String>, detail: String },
}

/// Caller-supplied role overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleHints {
    pub row: Option<String>,
    pub column: Option<String>,
    pub time: Option<String>,
    pub category: Option<String>,
}

impl RoleHints {
    fn slot(&self, role: Role) -> Option<&String> {
        match role {
            Role::Row => self.row.as_ref(),
            Role::Column => self.column.as_ref(),
            Role::Time => self.time.as_ref(),
            Role::Category => self.category.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub row: String,
    pub column: String,
    pub time: Option<String>,
    pub category: Option<String>,
}

impl RoleAssignment {
    /// Number of roles that resolved to a dimension.
    #[must_use]
    pub fn len(&self) -> usize {
        2 + usize::from(self.time.is_some()) + usize::from(self.category.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Block order used on disk: category, time, row, column.
    #[must_use]
    pub fn block_order(&self) -> Vec<&str> {
        let mut order = Vec::with_capacity(4);
        if let Some(category) = &self.category {
            order.push(category.as_str());
        }
        if let Some(time) = &self.time {
            order.push(time.as_str());
        }
        order.push(self.row.as_str());
        order.push(self.column.as_str());
        order
    }
}

pub fn guess_roles(array: &LabeledArray, hints: &RoleHints) -> Result<RoleAssignment, RoleError> {
    assign_roles(array.dims(), hints)
}

/// Resolves roles for a bare list of dimension names.
pub fn assign_roles<S: AsRef<str>>(
    dims: &[S],
    hints: &RoleHints,
) -> Result<RoleAssignment, RoleError> {
    let dims: Vec<&str> = dims.iter().map(AsRef::as_ref).collect();
    let mut claimed: Vec<(String, Role)> = Vec::with_capacity(4);
    let mut resolved: [Option<String>; 4] = Default::default();

    for (slot, (role, _)) in ROLE_RULES.iter().enumerate() {
        let Some(name) = hints.slot(*role) else {
            continue;
        };
        if !dims.contains(&name.as_str()) {
            return Err(RoleError::UnknownDimension {
                role: *role,
                name: name.clone(),
            });
        }
        if let Some((_, first)) = claimed.iter().find(|(taken, _)| taken == name) {
            return Err(RoleError::AmbiguousRoles {
                name: name.clone(),
                first: *first,
                second: *role,
            });
        }
        claimed.push((name.clone(), *role));
        resolved[slot] = Some(name.clone());
    }

    for (slot, (role, candidates)) in ROLE_RULES.iter().enumerate() {
        if resolved[slot].is_some() {
            continue;
        }
        let found = candidates.iter().find(|candidate| {
            dims.contains(*candidate) && !claimed.iter().any(|(name, _)| name == *candidate)
        });
        if let Some(name) = found {
            claimed.push(((*name).to_string(), *role));
            resolved[slot] = Some((*name).to_string());
        }
    }

    let owned_dims = || dims.iter().map(|dim| (*dim).to_string()).collect::<Vec<_>>();
    let [row, column, time, category] = resolved;
    let (Some(row), Some(column)) = (row, column) else {
        return Err(RoleError::UnresolvedRoles {
            dims: owned_dims(),
            detail: "row and column roles are both required".to_string(),
        });
    };

    let assignment = RoleAssignment {
        row,
        column,
        time,
        category,
    };
    if assignment.len() != dims.len() {
        return Err(RoleError::UnresolvedRoles {
            dims: owned_dims(),
            detail: format!(
                "{} roles assigned for {} dimensions",
                assignment.len(),
                dims.len()
            ),
        });
    }

    Ok(assignment)
}
