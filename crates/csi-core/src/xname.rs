//! Hierarchical hardware addresses (xnames).
//!
//! An xname encodes a component's physical position as a sequence of
//! letter/number pairs, e.g. `x3000c0s7b0n0` is node 0 on BMC 0 in slot 7 of
//! chassis 0 in cabinet 3000. Parsing is strict: the letter sequence must be a
//! known layout and every number must be inside the range for its position.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::Error as CoreError;
use crate::types::HardwareType;

/// Parent string recorded for components attached directly to the system.
pub const SYSTEM_PARENT: &str = "s0";

/// Errors that can occur when parsing an xname.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XnameError {
    /// The xname was empty.
    #[error("xname cannot be empty")]
    Empty,
    /// The xname contained something other than letter/number pairs.
    #[error("malformed xname `{0}`")]
    Malformed(String),
    /// The letter sequence does not correspond to any component type.
    #[error("xname `{0}` does not match any known component layout")]
    UnknownLayout(String),
    /// A number was outside the range allowed for its position.
    #[error("xname `{xname}`: {component}{value} outside {min}..={max}")]
    OutOfRange {
        /// Full xname.
        xname: String,
        /// Component letter.
        component: char,
        /// Offending value.
        value: u32,
        /// Smallest allowed value.
        min: u32,
        /// Largest allowed value.
        max: u32,
    },
    /// The xname is well-formed but names a different component type.
    #[error("xname `{xname}` is a {actual}, expected {expected}")]
    TypeMismatch {
        /// Full xname.
        xname: String,
        /// Expected component type.
        expected: HardwareType,
        /// Parsed component type.
        actual: HardwareType,
    },
}

impl From<XnameError> for CoreError {
    fn from(err: XnameError) -> Self {
        CoreError::InvalidXname(err.to_string())
    }
}

/// Known layouts: letter sequence, component type, and the allowed range of
/// each number.
const LAYOUTS: &[(&str, HardwareType, &[(u32, u32)])] = &[
    ("x", HardwareType::Cabinet, &[(0, 9999)]),
    ("xm", HardwareType::CabinetPduController, &[(0, 9999), (0, 3)]),
    ("xmp", HardwareType::CabinetPdu, &[(0, 9999), (0, 3), (0, 7)]),
    ("d", HardwareType::Cdu, &[(0, 999)]),
    ("dw", HardwareType::CduMgmtSwitch, &[(0, 999), (0, 31)]),
    ("xc", HardwareType::Chassis, &[(0, 9999), (0, 7)]),
    ("xcb", HardwareType::ChassisBmc, &[(0, 9999), (0, 7), (0, 0)]),
    ("xcs", HardwareType::ComputeModule, &[(0, 9999), (0, 7), (0, 64)]),
    ("xcsb", HardwareType::NodeBmc, &[(0, 9999), (0, 7), (0, 64), (0, 1)]),
    (
        "xcsbn",
        HardwareType::Node,
        &[(0, 9999), (0, 7), (0, 64), (0, 1), (0, 7)],
    ),
    ("xcw", HardwareType::MgmtSwitch, &[(0, 9999), (0, 7), (1, 48)]),
    (
        "xcwj",
        HardwareType::MgmtSwitchConnector,
        &[(0, 9999), (0, 7), (1, 48), (1, 64)],
    ),
    (
        "xch",
        HardwareType::MgmtHlSwitchEnclosure,
        &[(0, 9999), (0, 7), (1, 64)],
    ),
    (
        "xchs",
        HardwareType::MgmtHlSwitch,
        &[(0, 9999), (0, 7), (1, 64), (1, 4)],
    ),
];

/// Strongly-typed, validated xname.
///
/// The canonical string is lowercase without leading zeros, so two spellings
/// of the same position compare equal once parsed. Ordering compares the
/// numbers, so `x3000c0s9` sorts before `x3000c0s10`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Xname {
    components: Vec<(char, u32)>,
    hardware_type: HardwareType,
    raw: String,
}

impl Xname {
    /// Parses an xname from a string.
    ///
    /// # Errors
    ///
    /// Returns [`XnameError`] if the string is not a well-formed xname of a
    /// known component type.
    pub fn parse(input: impl AsRef<str>) -> std::result::Result<Self, XnameError> {
        let input = input.as_ref().trim();
        if input.is_empty() {
            return Err(XnameError::Empty);
        }

        let components = tokenize(input)?;
        let layout: String = components.iter().map(|(letter, _)| *letter).collect();
        let (_, hardware_type, ranges) = LAYOUTS
            .iter()
            .find(|(letters, _, _)| *letters == layout)
            .ok_or_else(|| XnameError::UnknownLayout(input.to_string()))?;

        for ((letter, value), (min, max)) in components.iter().zip(ranges.iter()) {
            if value < min || value > max {
                return Err(XnameError::OutOfRange {
                    xname: input.to_string(),
                    component: *letter,
                    value: *value,
                    min: *min,
                    max: *max,
                });
            }
        }

        Ok(Self {
            raw: render(&components),
            hardware_type: *hardware_type,
            components,
        })
    }

    /// Parses an xname and checks that it names a component of `expected` type.
    ///
    /// # Errors
    ///
    /// Returns [`XnameError::TypeMismatch`] when the xname is valid but of a
    /// different type, or any parse error.
    pub fn parse_as(
        input: impl AsRef<str>,
        expected: HardwareType,
    ) -> std::result::Result<Self, XnameError> {
        let xname = Self::parse(input)?;
        if xname.hardware_type != expected {
            return Err(XnameError::TypeMismatch {
                xname: xname.raw,
                expected,
                actual: xname.hardware_type,
            });
        }
        Ok(xname)
    }

    /// Builds and validates an xname from letter/number pairs.
    ///
    /// # Errors
    ///
    /// Returns [`XnameError`] if the pairs do not form a valid xname.
    pub fn from_components(components: &[(char, u32)]) -> std::result::Result<Self, XnameError> {
        Self::parse(render(components))
    }

    /// Cabinet xname `xX`.
    ///
    /// # Errors
    ///
    /// Returns [`XnameError::OutOfRange`] for IDs above 9999.
    pub fn cabinet(id: u32) -> std::result::Result<Self, XnameError> {
        Self::from_components(&[('x', id)])
    }

    /// Extends this xname with one more letter/number pair.
    ///
    /// # Errors
    ///
    /// Returns [`XnameError`] if the result is not a valid xname.
    pub fn child(&self, letter: char, value: u32) -> std::result::Result<Self, XnameError> {
        let mut components = self.components.clone();
        components.push((letter, value));
        Self::from_components(&components)
    }

    /// Borrows the canonical xname string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Component type named by this xname.
    #[must_use]
    pub const fn hardware_type(&self) -> HardwareType {
        self.hardware_type
    }

    /// Letter/number pairs in order.
    #[must_use]
    pub fn components(&self) -> &[(char, u32)] {
        &self.components
    }

    /// Value of the first component with the given letter.
    #[must_use]
    pub fn get(&self, letter: char) -> Option<u32> {
        self.components
            .iter()
            .find(|(l, _)| *l == letter)
            .map(|(_, v)| *v)
    }

    /// Cabinet number, for xnames rooted at a cabinet.
    #[must_use]
    pub fn cabinet_id(&self) -> Option<u32> {
        match self.components.first() {
            Some(('x', id)) => Some(*id),
            _ => None,
        }
    }

    /// Parent component, or `None` for cabinets and CDUs.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.components.len() < 2 {
            return None;
        }
        let components = &self.components[..self.components.len() - 1];
        Self::from_components(components).ok()
    }

    /// Parent string as written in topology records.
    #[must_use]
    pub fn parent_string(&self) -> String {
        self.parent()
            .map_or_else(|| SYSTEM_PARENT.to_string(), |parent| parent.raw)
    }
}

impl fmt::Display for Xname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Xname {
    type Err = XnameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Xname> for String {
    fn from(value: Xname) -> Self {
        value.raw
    }
}

impl TryFrom<String> for Xname {
    type Error = XnameError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for Xname {
    type Error = XnameError;

    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn tokenize(input: &str) -> std::result::Result<Vec<(char, u32)>, XnameError> {
    let mut components = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        let letter = ch.to_ascii_lowercase();
        if !letter.is_ascii_lowercase() {
            return Err(XnameError::Malformed(input.to_string()));
        }

        let mut digits = String::new();
        while let Some(&d) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }
        if digits.is_empty() {
            return Err(XnameError::Malformed(input.to_string()));
        }

        let value = digits
            .parse::<u32>()
            .map_err(|_| XnameError::Malformed(input.to_string()))?;
        components.push((letter, value));
    }

    Ok(components)
}

fn render(components: &[(char, u32)]) -> String {
    components
        .iter()
        .map(|(letter, value)| format!("{letter}{value}"))
        .collect()
}
