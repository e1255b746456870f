//! Typed tokenizer for CPTv10 header lines.
//!
//! A header line is `cpt:key=value[, cpt:key=value]*`. Every recognised key
//! maps to one [`HeaderTag`] variant; anything else is an error rather than
//! silently ignored.

use thiserror::Error;

use crate::number::parse_number;

/// The namespace declaration every CPTv10 file starts with.
pub const NAMESPACE: &str = "xmlns:cpt=http://iri.columbia.edu/CPT/v10/";

const PREFIX: &str = "cpt:";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("pair {pair:?} is not of the form key=value")]
    MalformedPair { pair: String },

    #[error("key {key:?} lacks the 'cpt:' prefix")]
    MissingPrefix { key: String },

    #[error("unknown header tag 'cpt:{key}'")]
    UnknownTag { key: String },

    #[error("header tag 'cpt:{key}' appears more than once")]
    DuplicateTag { key: String },

    #[error("header tag 'cpt:{key}' has invalid value {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderTag {
    Field(String),
    Row(String),
    Col(String),
    /// `cpt:T` or `cpt:Mode`.
    Time { dim: &'static str, value: String },
    /// `cpt:S`, the forecast start.
    Start(String),
    /// `cpt:C` or `cpt:M`.
    Category { dim: &'static str, value: String },
    NRow(usize),
    NCol(usize),
    Units(String),
    Missing(f64),
    ClimProb(f64),
}

impl HeaderTag {
    pub fn from_pair(key: &str, value: &str) -> Result<Self, HeaderError> {
        let invalid = || HeaderError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let text = value.to_string();

        let tag = match key {
            "field" => Self::Field(text),
            "row" => Self::Row(text),
            "col" => Self::Col(text),
            "T" => Self::Time { dim: "T", value: text },
            "Mode" => Self::Time {
                dim: "Mode",
                value: text,
            },
            "S" => Self::Start(text),
            "C" => Self::Category { dim: "C", value: text },
            "M" => Self::Category { dim: "M", value: text },
            "nrow" => Self::NRow(value.parse().map_err(|_| invalid())?),
            "ncol" => Self::NCol(value.parse().map_err(|_| invalid())?),
            "units" => Self::Units(text),
            "missing" => Self::Missing(parse_number(value).ok_or_else(invalid)?),
            "clim_prob" => Self::ClimProb(parse_number(value).ok_or_else(invalid)?),
            _ => {
                return Err(HeaderError::UnknownTag {
                    key: key.to_string(),
                })
            }
        };
        Ok(tag)
    }
}

/// Role value carried by a `T`/`Mode` or `C`/`M` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleValue {
    pub dim: &'static str,
    pub value: String,
}

/// All tags of one header line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderTags {
    pub field: Option<String>,
    pub row: Option<String>,
    pub col: Option<String>,
    pub time: Option<RoleValue>,
    pub start: Option<String>,
    pub category: Option<RoleValue>,
    pub nrow: Option<usize>,
    pub ncol: Option<usize>,
    pub units: Option<String>,
    pub missing: Option<f64>,
    pub clim_prob: Option<f64>,
}

impl HeaderTags {
    pub fn parse(line: &str) -> Result<Self, HeaderError> {
        let mut tags = Self::default();
        for pair in line.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                return Err(HeaderError::MalformedPair {
                    pair: pair.to_string(),
                });
            };
            let key = key.trim();
            let Some(key) = key.strip_prefix(PREFIX) else {
                return Err(HeaderError::MissingPrefix {
                    key: key.to_string(),
                });
            };
            tags.insert(key, HeaderTag::from_pair(key, value.trim())?)?;
        }
        Ok(tags)
    }

    fn insert(&mut self, key: &str, tag: HeaderTag) -> Result<(), HeaderError> {
        fn set<T>(slot: &mut Option<T>, value: T, key: &str) -> Result<(), HeaderError> {
            if slot.is_some() {
                return Err(HeaderError::DuplicateTag {
                    key: key.to_string(),
                });
            }
            *slot = Some(value);
            Ok(())
        }

        match tag {
            HeaderTag::Field(value) => set(&mut self.field, value, key),
            HeaderTag::Row(value) => set(&mut self.row, value, key),
            HeaderTag::Col(value) => set(&mut self.col, value, key),
            HeaderTag::Time { dim, value } => set(&mut self.time, RoleValue { dim, value }, key),
            HeaderTag::Start(value) => set(&mut self.start, value, key),
            HeaderTag::Category { dim, value } => {
                set(&mut self.category, RoleValue { dim, value }, key)
            }
            HeaderTag::NRow(value) => set(&mut self.nrow, value, key),
            HeaderTag::NCol(value) => set(&mut self.ncol, value, key),
            HeaderTag::Units(value) => set(&mut self.units, value, key),
            HeaderTag::Missing(value) => set(&mut self.missing, value, key),
            HeaderTag::ClimProb(value) => set(&mut self.clim_prob, value, key),
        }
    }

    /// Fills the sticky keys this header omitted from the previous header.
    /// Role values (`T`, `S`, `C`, ...) never carry over.
    pub fn inherit(&mut self, previous: &HeaderTags) {
        fn fill<T: Clone>(slot: &mut Option<T>, previous: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(previous);
            }
        }

        fill(&mut self.field, &previous.field);
        fill(&mut self.row, &previous.row);
        fill(&mut self.col, &previous.col);
        fill(&mut self.nrow, &previous.nrow);
        fill(&mut self.ncol, &previous.ncol);
        fill(&mut self.units, &previous.units);
        fill(&mut self.missing, &previous.missing);
        fill(&mut self.clim_prob, &previous.clim_prob);
    }
}

/// Coarse classification of one line of a CPTv10 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Namespace,
    /// Any other `xmlns:` declaration; ignored.
    ForeignNamespace,
    FieldCount(&'a str),
    CategoryCount(&'a str),
    Header(&'a str),
    Data(&'a str),
}

#[must_use]
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed == NAMESPACE {
        return LineKind::Namespace;
    }
    if trimmed.starts_with("xmlns:") {
        return LineKind::ForeignNamespace;
    }
    if let Some(count) = trimmed.strip_prefix("cpt:nfields=") {
        return LineKind::FieldCount(count.trim());
    }
    if let Some(count) = trimmed.strip_prefix("cpt:ncats=") {
        return LineKind::CategoryCount(count.trim());
    }
    if trimmed.starts_with(PREFIX) {
        return LineKind::Header(trimmed);
    }
    LineKind::Data(line)
}

#[cfg(test)]
mod tests {
    use super::{classify, HeaderError, HeaderTags, LineKind, RoleValue, NAMESPACE};
    use assert_matches::assert_matches;

    #[test]
    fn parses_a_full_header() {
        let tags = HeaderTags::parse(
            "cpt:field=prate, cpt:T=1990-03-01/1990-05-31, cpt:S=1990-02-01T00:00, \
             cpt:C=1, cpt:clim_prob=0.33333, cpt:nrow=3, cpt:ncol=4, cpt:row=Y, \
             cpt:col=X, cpt:units=mm, cpt:missing=-999",
        )
        .expect("header");

        assert_eq!(tags.field.as_deref(), Some("prate"));
        assert_eq!(
            tags.time,
            Some(RoleValue {
                dim: "T",
                value: "1990-03-01/1990-05-31".to_string()
            })
        );
        assert_eq!(tags.start.as_deref(), Some("1990-02-01T00:00"));
        assert_eq!(tags.category.as_ref().map(|c| c.dim), Some("C"));
        assert_eq!(tags.nrow, Some(3));
        assert_eq!(tags.ncol, Some(4));
        assert_eq!(tags.missing, Some(-999.0));
        assert_eq!(tags.clim_prob, Some(0.33333));
    }

    #[test]
    fn pair_order_does_not_matter() {
        let a = HeaderTags::parse("cpt:field=t, cpt:nrow=1, cpt:ncol=2, cpt:row=Y, cpt:col=X")
            .expect("header a");
        let b = HeaderTags::parse("cpt:col=X, cpt:row=Y, cpt:ncol=2, cpt:field=t, cpt:nrow=1")
            .expect("header b");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_unknown_duplicate_and_malformed_tags() {
        assert_matches!(
            HeaderTags::parse("cpt:field=a, cpt:colour=red"),
            Err(HeaderError::UnknownTag { key }) if key == "colour"
        );
        assert_matches!(
            HeaderTags::parse("cpt:field=a, cpt:field=b"),
            Err(HeaderError::DuplicateTag { .. })
        );
        assert_matches!(
            HeaderTags::parse("cpt:T=1990-01-01, cpt:Mode=1"),
            Err(HeaderError::DuplicateTag { key }) if key == "Mode"
        );
        assert_matches!(
            HeaderTags::parse("cpt:field"),
            Err(HeaderError::MalformedPair { .. })
        );
        assert_matches!(
            HeaderTags::parse("cpt:nrow=three"),
            Err(HeaderError::InvalidValue { .. })
        );
        assert_matches!(
            HeaderTags::parse("field=a"),
            Err(HeaderError::MissingPrefix { .. })
        );
    }

    #[test]
    fn sticky_keys_carry_over_but_roles_do_not() {
        let first = HeaderTags::parse(
            "cpt:field=a, cpt:T=1990-01-01, cpt:nrow=1, cpt:ncol=1, cpt:row=Y, cpt:col=X, cpt:units=K, cpt:missing=-1",
        )
        .expect("first");
        let mut second = HeaderTags::parse("cpt:T=1991-01-01").expect("second");
        second.inherit(&first);

        assert_eq!(second.field.as_deref(), Some("a"));
        assert_eq!(second.units.as_deref(), Some("K"));
        assert_eq!(second.missing, Some(-1.0));
        assert_eq!(second.time.map(|t| t.value).as_deref(), Some("1991-01-01"));

        let mut third = HeaderTags::default();
        third.inherit(&first);
        assert_eq!(third.time, None);
    }

    #[test]
    fn classifies_lines() {
        assert_eq!(classify(NAMESPACE), LineKind::Namespace);
        assert_eq!(
            classify("xmlns:cf=http://cf-pcmdi.llnl.gov/documents/cf-conventions/1.4/"),
            LineKind::ForeignNamespace
        );
        assert_eq!(classify("cpt:nfields=1"), LineKind::FieldCount("1"));
        assert_eq!(classify("cpt:ncats=3"), LineKind::CategoryCount("3"));
        assert_eq!(
            classify("cpt:field=a, cpt:nrow=1"),
            LineKind::Header("cpt:field=a, cpt:nrow=1")
        );
        assert_eq!(classify("\t1\t2"), LineKind::Data("\t1\t2"));
        assert_eq!(classify("   "), LineKind::Blank);
    }
}
