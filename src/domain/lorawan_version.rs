use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A LoRaWAN MAC version as announced by a device profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MacVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl MacVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        MacVersion { major, minor, patch }
    }

    /// Decodes the network server's MAC version enumeration.
    pub fn from_code(code: i64) -> Option<MacVersion> {
        match code {
            0 => Some(MacVersion::new(1, 0, 0)),
            1 => Some(MacVersion::new(1, 0, 1)),
            2 => Some(MacVersion::new(1, 0, 2)),
            3 => Some(MacVersion::new(1, 0, 3)),
            4 => Some(MacVersion::new(1, 0, 4)),
            5 => Some(MacVersion::new(1, 1, 0)),
            _ => None,
        }
    }

    /// Decodes the symbolic name of the enumeration, e.g. `LORAWAN_1_0_3`.
    pub fn from_name(name: &str) -> Option<MacVersion> {
        let code = match name.trim().to_ascii_uppercase().as_str() {
            "LORAWAN_1_0_0" => 0,
            "LORAWAN_1_0_1" => 1,
            "LORAWAN_1_0_2" => 2,
            "LORAWAN_1_0_3" => 3,
            "LORAWAN_1_0_4" => 4,
            "LORAWAN_1_1_0" => 5,
            _ => return None,
        };
        MacVersion::from_code(code)
    }
}

impl fmt::Display for MacVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Wire representation of a MAC version, which is `None` when the value is not part of the known table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacVersionField(pub Option<MacVersion>);

impl<'de> Deserialize<'de> for MacVersionField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MacVersionVisitor;

        impl Visitor<'_> for MacVersionVisitor {
            type Value = MacVersionField;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a MAC version code or name")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(MacVersionField(MacVersion::from_code(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(MacVersionField(i64::try_from(v).ok().and_then(MacVersion::from_code)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(MacVersionField(MacVersion::from_name(v)))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(MacVersionField(None))
            }
        }

        deserializer.deserialize_any(MacVersionVisitor)
    }
}

/// The LoRaWAN version of the device profile a batch registers against.
///
/// `is_1_0_x` and `is_1_1_x` are never both true. Both are false when the profile announces a version outside of the
/// known table, in which case key mapping falls back to the join mode of each device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoRaWanVersionInfo {
    pub version: Option<MacVersion>,
    pub is_1_0_x: bool,
    pub is_1_1_x: bool,
    pub profile_name: String,
    pub supports_otaa: bool,
    pub supports_abp: bool,
}

impl LoRaWanVersionInfo {
    pub fn new(version: Option<MacVersion>, profile_name: impl Into<String>, supports_otaa: bool) -> Self {
        let is_1_0_x = matches!(version, Some(MacVersion { major: 1, minor: 0, .. }));
        let is_1_1_x = matches!(version, Some(MacVersion { major: 1, minor: 1, .. }));

        LoRaWanVersionInfo {
            version,
            is_1_0_x,
            is_1_1_x,
            profile_name: profile_name.into(),
            supports_otaa,
            supports_abp: !supports_otaa,
        }
    }

    pub fn is_known(&self) -> bool {
        self.is_1_0_x || self.is_1_1_x
    }
}

impl fmt::Display for LoRaWanVersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "LoRaWAN {} ({})", version, self.profile_name),
            None => write!(f, "LoRaWAN UNKNOWN ({})", self.profile_name),
        }
    }
}
