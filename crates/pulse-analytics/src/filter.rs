//! Equality filters over record dimensions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Classification, Record};

/// A set of equality constraints over website, product and classification.
///
/// Absent constraints match everything. Blank strings are treated as absent,
/// so two filters are equal exactly when their effective constraint sets are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    classification: Option<Classification>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn escape_value(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('&', "%26")
        .replace('=', "%3D")
}

impl Filter {
    /// The empty filter, matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(
        website: Option<String>,
        product: Option<String>,
        classification: Option<Classification>,
    ) -> Self {
        Self {
            website: non_blank(website),
            product: non_blank(product),
            classification,
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = non_blank(Some(website.into()));
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = non_blank(Some(product.into()));
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn classification(&self) -> Option<Classification> {
        self.classification
    }

    pub fn is_empty(&self) -> bool {
        self.website.is_none() && self.product.is_none() && self.classification.is_none()
    }

    /// Active constraints as `(key, value)` pairs, sorted by key.
    pub fn constraints(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(c) = self.classification {
            pairs.push(("classification", c.as_str()));
        }
        if let Some(p) = self.product.as_deref() {
            pairs.push(("product", p));
        }
        if let Some(w) = self.website.as_deref() {
            pairs.push(("website", w));
        }
        pairs.sort_by_key(|(k, _)| *k);
        pairs
    }

    /// Canonical string form: sorted `key=value` pairs joined by `&`.
    ///
    /// `%`, `&` and `=` inside values are percent-escaped, so distinct filters
    /// never share a signature. The empty filter has the empty signature.
    pub fn signature(&self) -> String {
        self.constraints()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, escape_value(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Whether a record satisfies every constraint.
    pub fn matches(&self, record: &Record) -> bool {
        self.website.as_deref().is_none_or(|w| record.website == w)
            && self.product.as_deref().is_none_or(|p| record.product == p)
            && self
                .classification
                .is_none_or(|c| record.classification == c)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs = self.constraints();
        if pairs.is_empty() {
            return f.write_str("none");
        }
        let parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_sorted_and_canonical() {
        let a = Filter::all()
            .with_website("beta-store")
            .with_classification(Classification::Sarcasm);
        let b = Filter::new(
            Some("beta-store".to_string()),
            None,
            Some(Classification::Sarcasm),
        );

        assert_eq!(a, b);
        assert_eq!(a.signature(), "classification=sarcasm&website=beta-store");
        assert_eq!(b.signature(), a.signature());
    }

    #[test]
    fn test_signature_escapes_separators() {
        let smuggled = Filter::all().with_product("x&website=y");
        let split = Filter::all().with_product("x").with_website("y");

        assert_ne!(smuggled, split);
        assert_eq!(smuggled.signature(), "product=x%26website%3Dy");
        assert_eq!(split.signature(), "product=x&website=y");
        assert_eq!(
            Filter::all().with_website("50%").signature(),
            "website=50%25"
        );
    }

    #[test]
    fn test_blank_values_are_absent() {
        let f = Filter::new(Some("".to_string()), Some("   ".to_string()), None);
        assert!(f.is_empty());
        assert_eq!(f, Filter::all());
        assert_eq!(f.signature(), "");
        assert_eq!(f.to_string(), "none");
    }

    #[test]
    fn test_display_lists_constraints() {
        let f = Filter::all().with_product("gamma-band").with_website("gamma-mart");
        assert_eq!(f.to_string(), "product=gamma-band, website=gamma-mart");
    }

    #[test]
    fn test_serializes_only_active_constraints() {
        let f = Filter::all().with_product("alpha-phone");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json, serde_json::json!({ "product": "alpha-phone" }));
        assert_eq!(serde_json::to_value(Filter::all()).unwrap(), serde_json::json!({}));
    }
}
