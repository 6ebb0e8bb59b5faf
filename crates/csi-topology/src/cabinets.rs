//! Cabinet resolution.
//!
//! Turns the explicit cabinet list and the `{count, starting_id}` rules into
//! one sorted group per cabinet kind, and works out each cabinet's chassis
//! layout.

use crate::inputs::{CabinetInputs, CabinetRecord, ChassisCount};
use csi_core::types::{CabinetClass, CabinetKind, EX2500_MODEL};
use csi_core::{Error, Result, Xname};
use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Chassis numbers by cooling type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChassisLayout {
    /// Air-cooled chassis numbers
    pub air_cooled: Vec<u32>,
    /// Liquid-cooled chassis numbers
    pub liquid_cooled: Vec<u32>,
}

impl ChassisLayout {
    /// Standard layout of a cabinet kind.
    ///
    /// EX2500 cabinets have no standard layout; use
    /// [`ChassisLayout::ex2500`].
    #[must_use]
    pub fn standard(kind: CabinetKind) -> Self {
        match kind {
            CabinetKind::River => Self {
                air_cooled: vec![0],
                liquid_cooled: Vec::new(),
            },
            CabinetKind::Hill | CabinetKind::Ex2000 => Self {
                air_cooled: Vec::new(),
                liquid_cooled: vec![1, 3],
            },
            CabinetKind::Mountain | CabinetKind::Ex3000 | CabinetKind::Ex4000 => Self {
                air_cooled: Vec::new(),
                liquid_cooled: (0..=7).collect(),
            },
            CabinetKind::Ex2500 => Self::default(),
        }
    }

    /// EX2500 layout: liquid-cooled chassis from 0, air-cooled chassis
    /// numbered after them.
    #[must_use]
    pub fn ex2500(count: ChassisCount) -> Self {
        let liquid = count.liquid_cooled;
        Self {
            air_cooled: (liquid..liquid + count.air_cooled).collect(),
            liquid_cooled: (0..liquid).collect(),
        }
    }

    /// All chassis numbers in ascending order.
    #[must_use]
    pub fn all(&self) -> Vec<u32> {
        let mut all: Vec<u32> = self
            .air_cooled
            .iter()
            .chain(self.liquid_cooled.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all
    }

    /// True if chassis `number` is liquid cooled.
    #[must_use]
    pub fn is_liquid_cooled(&self, number: u32) -> bool {
        self.liquid_cooled.contains(&number)
    }
}

/// A resolved cabinet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CabinetDetail {
    /// Cabinet ID
    pub id: u32,
    /// Cabinet xname
    pub xname: Xname,
    /// Declared kind
    pub kind: CabinetKind,
    /// Class derived from the kind
    pub class: CabinetClass,
    /// Model, from the record or the kind
    pub model: Option<String>,
    /// Chassis population override, EX2500 only
    pub chassis_count: Option<ChassisCount>,
    /// Chassis numbers
    pub layout: ChassisLayout,
    /// Fixed hardware-management subnet
    pub hmn_subnet: Option<Ipv4Net>,
    /// Fixed hardware-management VLAN
    pub hmn_vlan: Option<u16>,
    /// Fixed node-management subnet
    pub nmn_subnet: Option<Ipv4Net>,
    /// Fixed node-management VLAN
    pub nmn_vlan: Option<u16>,
}

impl CabinetDetail {
    fn from_record(kind: CabinetKind, record: &CabinetRecord) -> Result<Self> {
        let xname = Xname::cabinet(record.id).map_err(|e| {
            Error::InvalidCabinet(format!("cabinet {} ({kind}): {e}", record.id))
        })?;

        let model = record
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(ToString::to_string)
            .or_else(|| kind.model().map(ToString::to_string));
        let is_ex2500 = kind == CabinetKind::Ex2500
            || model
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case(EX2500_MODEL));

        let layout = if is_ex2500 {
            if kind.class() != CabinetClass::Hill {
                return Err(Error::InvalidCabinet(format!(
                    "cabinet {}: model {EX2500_MODEL} is a Hill cabinet, not {}",
                    record.id,
                    kind.class()
                )));
            }
            ChassisLayout::ex2500(validate_ex2500(record.id, record.chassis_count)?)
        } else {
            if let Some(count) = record.chassis_count {
                return Err(Error::InvalidCabinet(format!(
                    "cabinet {} ({kind}) does not take a chassis count override \
                     (got air {}, liquid {})",
                    record.id, count.air_cooled, count.liquid_cooled
                )));
            }
            ChassisLayout::standard(kind)
        };

        Ok(Self {
            id: record.id,
            xname,
            kind,
            class: kind.class(),
            model,
            chassis_count: record.chassis_count,
            layout,
            hmn_subnet: record.hmn_subnet,
            hmn_vlan: record.hmn_vlan,
            nmn_subnet: record.nmn_subnet,
            nmn_vlan: record.nmn_vlan,
        })
    }
}

/// Cabinets of one kind, sorted by ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CabinetGroupDetail {
    /// Kind shared by every cabinet in the group
    pub kind: CabinetKind,
    /// Cabinets in ascending ID order
    pub cabinets: Vec<CabinetDetail>,
}

impl CabinetGroupDetail {
    /// Number of cabinets.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cabinets.len()
    }

    /// Cabinet IDs in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        self.cabinets.iter().map(|c| c.id).collect()
    }
}

/// Every resolved cabinet, one group per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedCabinets {
    groups: Vec<CabinetGroupDetail>,
}

impl ResolvedCabinets {
    /// Groups in [`CabinetKind::all`] order; kinds with no cabinets have an
    /// empty group.
    #[must_use]
    pub fn groups(&self) -> &[CabinetGroupDetail] {
        &self.groups
    }

    /// Group for one kind.
    #[must_use]
    pub fn group(&self, kind: CabinetKind) -> Option<&CabinetGroupDetail> {
        self.groups.iter().find(|g| g.kind == kind)
    }

    /// Number of cabinets of one kind.
    #[must_use]
    pub fn count(&self, kind: CabinetKind) -> usize {
        self.group(kind).map_or(0, CabinetGroupDetail::count)
    }

    /// Number of cabinets of one class, across kinds.
    #[must_use]
    pub fn count_by_class(&self, class: CabinetClass) -> usize {
        self.groups
            .iter()
            .filter(|g| g.kind.class() == class)
            .map(CabinetGroupDetail::count)
            .sum()
    }

    /// Total number of cabinets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.groups.iter().map(CabinetGroupDetail::count).sum()
    }

    /// All cabinets in ascending ID order.
    #[must_use]
    pub fn all(&self) -> Vec<&CabinetDetail> {
        let mut all: Vec<&CabinetDetail> = self.groups.iter().flat_map(|g| &g.cabinets).collect();
        all.sort_by_key(|c| c.id);
        all
    }

    /// Cabinets whose class is one of `classes`, in ascending ID order.
    #[must_use]
    pub fn of_classes(&self, classes: &[CabinetClass]) -> Vec<&CabinetDetail> {
        self.all()
            .into_iter()
            .filter(|c| classes.contains(&c.class))
            .collect()
    }

    /// Cabinet by ID.
    #[must_use]
    pub fn find(&self, id: u32) -> Option<&CabinetDetail> {
        self.groups
            .iter()
            .flat_map(|g| &g.cabinets)
            .find(|c| c.id == id)
    }
}

/// Resolves the cabinet population.
///
/// A kind with an explicit list takes exactly the listed cabinets and ignores
/// its rule. Other kinds generate `starting_id..starting_id + count`.
///
/// # Errors
///
/// Returns [`Error::InvalidCabinet`] for invalid chassis overrides, duplicate
/// IDs and IDs outside the cabinet xname range.
pub fn resolve_cabinets(inputs: &CabinetInputs) -> Result<ResolvedCabinets> {
    let mut groups = Vec::with_capacity(CabinetKind::all().len());
    let mut seen: BTreeMap<u32, CabinetKind> = BTreeMap::new();

    for &kind in CabinetKind::all() {
        let records = match (inputs.explicit.get(&kind), inputs.rules.get(&kind)) {
            (Some(explicit), rule) => {
                if let Some(rule) = rule.filter(|r| r.count as usize != explicit.len()) {
                    warn!(
                        kind = %kind,
                        declared = rule.count,
                        listed = explicit.len(),
                        "explicit cabinet list overrides the declared count"
                    );
                }
                explicit.clone()
            }
            (None, Some(rule)) => {
                let end = rule.starting_id.checked_add(rule.count).ok_or_else(|| {
                    Error::InvalidCabinet(format!(
                        "{kind} cabinets: {} cabinets from {} overflow the ID range",
                        rule.count, rule.starting_id
                    ))
                })?;
                (rule.starting_id..end).map(CabinetRecord::new).collect()
            }
            (None, None) => Vec::new(),
        };

        let mut cabinets = records
            .iter()
            .map(|record| CabinetDetail::from_record(kind, record))
            .collect::<Result<Vec<_>>>()?;
        cabinets.sort_by_key(|c| c.id);

        for cabinet in &cabinets {
            if let Some(other) = seen.insert(cabinet.id, kind) {
                return Err(Error::InvalidCabinet(format!(
                    "cabinet {} is declared as both {other} and {kind}",
                    cabinet.id
                )));
            }
        }

        debug!(kind = %kind, count = cabinets.len(), "resolved cabinet group");
        groups.push(CabinetGroupDetail { kind, cabinets });
    }

    let resolved = ResolvedCabinets { groups };
    info!(
        river = resolved.count_by_class(CabinetClass::River),
        hill = resolved.count_by_class(CabinetClass::Hill),
        mountain = resolved.count_by_class(CabinetClass::Mountain),
        "resolved cabinets"
    );
    Ok(resolved)
}

fn validate_ex2500(id: u32, count: Option<ChassisCount>) -> Result<ChassisCount> {
    let count = count.ok_or_else(|| {
        Error::InvalidCabinet(format!(
            "cabinet {id}: {EX2500_MODEL} cabinets require a chassis count override"
        ))
    })?;

    match (count.air_cooled, count.liquid_cooled) {
        (0, 1..=3) | (1, 1) => Ok(count),
        (1, 0) => Err(Error::InvalidCabinet(format!(
            "cabinet {id}: a single air-cooled chassis with no liquid-cooled chassis \
             is a River cabinet, not {EX2500_MODEL}"
        ))),
        (air, liquid) => Err(Error::InvalidCabinet(format!(
            "cabinet {id}: {EX2500_MODEL} supports air 0 with liquid 1-3, or air 1 with \
             liquid 1 (got air {air}, liquid {liquid})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ex2500(air: u32, liquid: u32) -> CabinetInputs {
        CabinetInputs::default().with_cabinet(
            CabinetKind::Hill,
            CabinetRecord::new(9000)
                .with_model("EX2500")
                .with_chassis_count(air, liquid),
        )
    }

    #[test]
    fn explicit_list_overrides_rule() {
        let inputs = CabinetInputs::default()
            .with_cabinet(CabinetKind::River, CabinetRecord::new(3000))
            .with_cabinet(
                CabinetKind::Hill,
                CabinetRecord::new(9000).with_hmn("10.104.0.0/22".parse().unwrap(), 3000),
            )
            .with_rule(CabinetKind::River, 20, 3000)
            .with_rule(CabinetKind::Hill, 20, 9000)
            .with_rule(CabinetKind::Mountain, 20, 1000);

        let resolved = resolve_cabinets(&inputs).unwrap();
        assert_eq!(resolved.count_by_class(CabinetClass::River), 1);
        assert_eq!(resolved.count_by_class(CabinetClass::Hill), 1);
        assert_eq!(resolved.count_by_class(CabinetClass::Mountain), 20);
        for kind in [
            CabinetKind::Ex2000,
            CabinetKind::Ex2500,
            CabinetKind::Ex3000,
            CabinetKind::Ex4000,
        ] {
            assert_eq!(resolved.count(kind), 0);
        }

        let mountain = resolved.group(CabinetKind::Mountain).unwrap();
        assert_eq!(mountain.ids(), (1000..1020).collect::<Vec<_>>());
        assert_eq!(resolved.find(9000).unwrap().hmn_vlan, Some(3000));
    }

    #[test]
    fn explicit_cabinets_sorted() {
        let inputs = CabinetInputs::default()
            .with_cabinet(CabinetKind::Mountain, CabinetRecord::new(1002))
            .with_cabinet(CabinetKind::Mountain, CabinetRecord::new(1000));
        let resolved = resolve_cabinets(&inputs).unwrap();
        assert_eq!(
            resolved.group(CabinetKind::Mountain).unwrap().ids(),
            vec![1000, 1002]
        );
    }

    #[test]
    fn standard_layouts() {
        let inputs = CabinetInputs::default()
            .with_rule(CabinetKind::River, 1, 3000)
            .with_rule(CabinetKind::Hill, 1, 9000)
            .with_rule(CabinetKind::Ex4000, 1, 1000);
        let resolved = resolve_cabinets(&inputs).unwrap();

        assert_eq!(resolved.find(3000).unwrap().layout.air_cooled, vec![0]);
        assert_eq!(resolved.find(9000).unwrap().layout.liquid_cooled, vec![1, 3]);
        let ex4000 = resolved.find(1000).unwrap();
        assert_eq!(ex4000.layout.all(), (0..=7).collect::<Vec<_>>());
        assert_eq!(ex4000.class, CabinetClass::Mountain);
        assert_eq!(ex4000.model.as_deref(), Some("EX4000"));
    }

    #[test]
    fn ex2500_requires_override() {
        let inputs = CabinetInputs::default()
            .with_cabinet(CabinetKind::Hill, CabinetRecord::new(9000).with_model("EX2500"));
        assert!(matches!(
            resolve_cabinets(&inputs),
            Err(Error::InvalidCabinet(_))
        ));

        let inputs = CabinetInputs::default().with_rule(CabinetKind::Ex2500, 1, 9000);
        assert!(resolve_cabinets(&inputs).is_err());
    }

    #[test]
    fn ex2500_accepted_layouts() {
        let resolved = resolve_cabinets(&ex2500(0, 2)).unwrap();
        let cabinet = resolved.find(9000).unwrap();
        assert_eq!(cabinet.class, CabinetClass::Hill);
        assert_eq!(cabinet.layout.liquid_cooled, vec![0, 1]);
        assert!(cabinet.layout.air_cooled.is_empty());

        let resolved = resolve_cabinets(&ex2500(1, 1)).unwrap();
        let layout = &resolved.find(9000).unwrap().layout;
        assert_eq!(layout.liquid_cooled, vec![0]);
        assert_eq!(layout.air_cooled, vec![1]);
    }

    #[test]
    fn ex2500_rejected_layouts() {
        for (air, liquid) in [(1, 0), (2, 0), (2, 1), (0, 0), (0, 4), (1, 2)] {
            assert!(
                matches!(resolve_cabinets(&ex2500(air, liquid)), Err(Error::InvalidCabinet(_))),
                "air {air} liquid {liquid} should be rejected"
            );
        }
    }

    #[test]
    fn chassis_override_rejected_on_standard_kinds() {
        for kind in [CabinetKind::River, CabinetKind::Mountain, CabinetKind::Ex3000] {
            let inputs = CabinetInputs::default()
                .with_cabinet(kind, CabinetRecord::new(1000).with_chassis_count(0, 2));
            assert!(matches!(
                resolve_cabinets(&inputs),
                Err(Error::InvalidCabinet(_))
            ));
        }
    }

    #[test]
    fn ex2500_model_outside_hill_rejected() {
        let inputs = CabinetInputs::default().with_cabinet(
            CabinetKind::River,
            CabinetRecord::new(3000)
                .with_model("EX2500")
                .with_chassis_count(0, 1),
        );
        assert!(resolve_cabinets(&inputs).is_err());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let inputs = CabinetInputs::default()
            .with_cabinet(CabinetKind::River, CabinetRecord::new(3000))
            .with_rule(CabinetKind::Mountain, 2, 2999);
        assert!(matches!(
            resolve_cabinets(&inputs),
            Err(Error::InvalidCabinet(_))
        ));
    }

    #[test]
    fn id_range_checked() {
        let inputs = CabinetInputs::default().with_rule(CabinetKind::Mountain, 2, 9999);
        assert!(matches!(
            resolve_cabinets(&inputs),
            Err(Error::InvalidCabinet(_))
        ));
    }
}
