// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Typed model of header field declarations and record field values.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use rust_htslib::bcf;

use crate::utils::unquote;

/// Value cardinality of a field (the `Number` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Fixed number of values, `Fixed(0)` being a flag.
    Fixed(u32),
    /// One value per alternate allele (`A`).
    PerAltAllele,
    /// One value per allele including the reference (`R`).
    PerAllele,
    /// One value per genotype (`G`).
    PerGenotype,
    /// Unknown or varying number of values (`.`).
    Variable,
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "A" => Ok(Cardinality::PerAltAllele),
            "R" => Ok(Cardinality::PerAllele),
            "G" => Ok(Cardinality::PerGenotype),
            "." => Ok(Cardinality::Variable),
            n => n
                .parse()
                .map(Cardinality::Fixed)
                .map_err(|_| format!("invalid Number={}", n)),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cardinality::Fixed(n) => write!(f, "{}", n),
            Cardinality::PerAltAllele => write!(f, "A"),
            Cardinality::PerAllele => write!(f, "R"),
            Cardinality::PerGenotype => write!(f, "G"),
            Cardinality::Variable => write!(f, "."),
        }
    }
}

impl Cardinality {
    /// Two declarations of a canonical field agree if their cardinality is equal or
    /// one of them leaves it open.
    pub fn is_compatible(&self, other: &Cardinality) -> bool {
        self == other || *self == Cardinality::Variable || *other == Cardinality::Variable
    }
}

/// Value type of a field (the `Type` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
pub enum ValueType {
    Flag,
    Integer,
    Float,
    String,
    Character,
}

/// Header section a field is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FieldKind {
    #[strum(serialize = "INFO")]
    Info,
    #[strum(serialize = "FORMAT")]
    Format,
}

/// Declaration of an INFO or FORMAT field.
#[derive(Debug, Clone, PartialEq, new, Getters, CopyGetters)]
pub struct FieldDeclaration {
    #[getset(get = "pub")]
    id: String,
    #[getset(get_copy = "pub")]
    cardinality: Cardinality,
    #[getset(get_copy = "pub")]
    value_type: ValueType,
    #[getset(get = "pub")]
    description: String,
    #[getset(get = "pub")]
    source: Option<String>,
}

impl FieldDeclaration {
    /// Parse a declaration from the key/value pairs htslib provides for a header record.
    pub(crate) fn from_header_values<'a, F>(get: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<&'a String>,
    {
        let id = get("ID").ok_or_else(|| "missing ID".to_owned())?;
        let cardinality = get("Number")
            .ok_or_else(|| "missing Number".to_owned())?
            .parse()?;
        let value_type = get("Type").ok_or_else(|| "missing Type".to_owned())?;
        let value_type = ValueType::from_str(value_type)
            .map_err(|_| format!("invalid Type={}", value_type))?;
        let description = get("Description").map_or("", |d| unquote(d));
        let source = get("Source").map(|s| unquote(s).to_owned());

        Ok(FieldDeclaration::new(
            id.to_owned(),
            cardinality,
            value_type,
            description.to_owned(),
            source,
        ))
    }

    /// Copy of this declaration under a new id, attributed to the given source.
    pub fn renamed(&self, id: String, source: &str) -> Self {
        FieldDeclaration {
            id,
            source: Some(source.to_owned()),
            ..self.clone()
        }
    }

    /// `Number=...,Type=...` summary used in error messages.
    pub(crate) fn signature(&self) -> String {
        format!("Number={},Type={}", self.cardinality, self.value_type)
    }

    pub fn header_line(&self, kind: FieldKind) -> String {
        let mut line = format!(
            "##{kind}=<ID={id},Number={number},Type={_type},Description=\"{desc}\"",
            kind = kind,
            id = self.id,
            number = self.cardinality,
            _type = self.value_type,
            desc = self.description,
        );
        if let Some(source) = &self.source {
            line.push_str(&format!(",Source=\"{}\"", source));
        }
        line.push('>');
        line
    }
}

/// Declaration of a FILTER tag.
#[derive(Debug, Clone, PartialEq, new, Getters)]
#[getset(get = "pub")]
pub struct FilterDeclaration {
    id: String,
    description: String,
    source: Option<String>,
}

impl FilterDeclaration {
    pub fn header_line(&self) -> String {
        let mut line = format!(
            "##FILTER=<ID={},Description=\"{}\"",
            self.id, self.description
        );
        if let Some(source) = &self.source {
            line.push_str(&format!(",Source=\"{}\"", source));
        }
        line.push('>');
        line
    }
}

/// Declaration of a contig.
#[derive(Debug, Clone, PartialEq, new, Getters, CopyGetters)]
pub struct ContigDeclaration {
    #[getset(get = "pub")]
    id: String,
    #[getset(get_copy = "pub")]
    length: Option<u64>,
}

impl ContigDeclaration {
    pub fn header_line(&self) -> String {
        match self.length {
            Some(length) => format!("##contig=<ID={},length={}>", self.id, length),
            None => format!("##contig=<ID={}>", self.id),
        }
    }
}

/// Value of an INFO field or of a FORMAT field in one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Flag,
    Integer(Vec<Option<i32>>),
    Float(Vec<Option<f32>>),
    String(Vec<String>),
}

impl FieldValue {
    /// Reduce a read support count to a single integer, taking the alternate
    /// component of per-allele fields. Missing values count as zero.
    pub fn support_count(&self, cardinality: Cardinality) -> i32 {
        let values = match self {
            FieldValue::Integer(values) => values,
            _ => return 0,
        };
        let idx = match cardinality {
            Cardinality::PerAllele => 1,
            _ => 0,
        };
        values.get(idx).copied().flatten().unwrap_or(0)
    }

    /// Append the values of another value of the same type.
    pub(crate) fn extend(&mut self, other: &FieldValue) {
        match (self, other) {
            (FieldValue::Integer(values), FieldValue::Integer(other)) => {
                values.extend(other.iter().cloned())
            }
            (FieldValue::Float(values), FieldValue::Float(other)) => {
                values.extend(other.iter().cloned())
            }
            (FieldValue::String(values), FieldValue::String(other)) => {
                values.extend(other.iter().cloned())
            }
            _ => (),
        }
    }

    /// Push this value into the INFO column of a record.
    pub(crate) fn push_info(&self, record: &mut bcf::Record, id: &[u8]) -> Result<()> {
        use rust_htslib::bcf::record::Numeric;

        match self {
            FieldValue::Flag => record.push_info_flag(id)?,
            FieldValue::Integer(values) => {
                let values: Vec<i32> = values
                    .iter()
                    .map(|v| v.unwrap_or_else(i32::missing))
                    .collect();
                record.push_info_integer(id, &values)?
            }
            FieldValue::Float(values) => {
                let values: Vec<f32> = values
                    .iter()
                    .map(|v| v.unwrap_or_else(f32::missing))
                    .collect();
                record.push_info_float(id, &values)?
            }
            FieldValue::String(values) => {
                let values: Vec<&[u8]> = values.iter().map(|v| v.as_bytes()).collect();
                record.push_info_string(id, &values)?
            }
        }
        Ok(())
    }
}
