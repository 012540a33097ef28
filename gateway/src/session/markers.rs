//! Field extraction from scraped pages

use std::collections::HashMap;

use regex::Regex;

use crate::errors::GatewayError;

/// Numeric fields pulled out of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    values: HashMap<String, f64>,
}

impl ExtractedFields {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: f64) {
        self.values.insert(field.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A table of `field -> pattern`. Each pattern's first capture group is the
/// numeric value of its field.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    markers: Vec<(String, Regex)>,
}

impl MarkerSet {
    pub fn new<I, S>(markers: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|(field, pattern)| Ok((field.as_ref().to_string(), Regex::new(pattern.as_ref())?)))
            .collect::<Result<Vec<_>, GatewayError>>()?;
        Ok(Self { markers })
    }

    /// Markers of the form `Property.<name>, <number>`
    pub fn property_markers(names: &[&str]) -> Result<Self, GatewayError> {
        Self::new(names.iter().map(|name| {
            (
                name.to_string(),
                format!(r"Property\.{},\s*(-?[\d.]+)", regex::escape(name)),
            )
        }))
    }

    /// Apply every marker to `page`. Fields whose marker is absent or does
    /// not parse as a number are left out.
    pub fn extract(&self, page: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        for (field, pattern) in &self.markers {
            let value = pattern
                .captures(page)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok());
            if let Some(value) = value {
                fields.insert(field.clone(), value);
            }
        }
        fields
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(|(field, _)| field.as_str())
    }
}
