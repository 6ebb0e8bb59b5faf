//! Switch brand/model lookup.

use crate::inputs::SwitchRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vendor and model of a management switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchModel {
    /// Vendor, e.g. `Aruba`
    pub brand: String,
    /// Vendor model
    pub model: String,
}

impl SwitchModel {
    /// Create a switch model.
    #[must_use]
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
        }
    }
}

/// Switch brand/model table.
///
/// Classification consults this for every switch; a switch the catalog
/// cannot resolve is rejected.
#[cfg_attr(test, mockall::automock)]
pub trait SwitchCatalog {
    /// Brand and model of the switch at `xname`.
    fn lookup(&self, xname: &str) -> Option<SwitchModel>;
}

/// Catalog backed by the switch metadata rows.
#[derive(Debug, Clone, Default)]
pub struct StaticSwitchCatalog {
    models: BTreeMap<String, SwitchModel>,
}

impl StaticSwitchCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from metadata rows.
    ///
    /// Rows with a blank brand or model are left out so that classification
    /// reports them. Keys are canonical xnames when the row's xname parses.
    #[must_use]
    pub fn from_records(records: &[SwitchRecord]) -> Self {
        records
            .iter()
            .filter(|r| !r.brand.trim().is_empty() && !r.model.trim().is_empty())
            .fold(Self::new(), |catalog, r| {
                catalog.with_model(&r.xname, SwitchModel::new(r.brand.trim(), r.model.trim()))
            })
    }

    /// Add or replace one entry.
    #[must_use]
    pub fn with_model(mut self, xname: &str, model: SwitchModel) -> Self {
        self.models.insert(canonical(xname), model);
        self
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// True if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl SwitchCatalog for StaticSwitchCatalog {
    fn lookup(&self, xname: &str) -> Option<SwitchModel> {
        self.models.get(&canonical(xname)).cloned()
    }
}

fn canonical(xname: &str) -> String {
    csi_core::Xname::parse(xname).map_or_else(|_| xname.trim().to_lowercase(), |x| x.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_catalog_skips_blank_rows() {
        let catalog = StaticSwitchCatalog::from_records(&[
            SwitchRecord::new("x3000c0h33s1", "Spine", "Aruba", "8325"),
            SwitchRecord::new("x3000c0w22", "LeafBMC", "", "6300M"),
        ]);

        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.lookup("x3000c0h33s1"),
            Some(SwitchModel::new("Aruba", "8325"))
        );
        assert!(catalog.lookup("x3000c0w22").is_none());
    }

    #[test]
    fn static_catalog_canonicalizes_keys() {
        let catalog = StaticSwitchCatalog::new()
            .with_model("X3000C0W022", SwitchModel::new("Dell", "S3048-ON"));
        assert_eq!(
            catalog.lookup("x3000c0w22").map(|m| m.brand),
            Some("Dell".to_string())
        );
    }

    #[test]
    fn mock_catalog() {
        let mut mock = MockSwitchCatalog::new();
        mock.expect_lookup()
            .with(mockall::predicate::eq("d0w1"))
            .times(1)
            .returning(|_| Some(SwitchModel::new("Dell", "S3048-ON")));

        assert_eq!(mock.lookup("d0w1").unwrap().model, "S3048-ON");
    }
}
