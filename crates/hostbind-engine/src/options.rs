//! Engine configuration and host item flags

use std::sync::Arc;

use hostbind_sdk::{HostType, ScriptAccess};
use serde::{Deserialize, Serialize};

/// How host `null` is exported to script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullExport {
    /// As the script `null` literal
    #[default]
    Null,
    /// As `undefined`
    Undefined,
}

/// Per-engine configuration switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Access applied to members with no member- or type-level annotation
    pub default_access: ScriptAccess,

    /// Type whose private members (and those of its bases) script may reach
    #[serde(skip)]
    pub access_context: Option<Arc<HostType>>,

    /// Represent typed null results as a sentinel that `isNull` recognizes
    pub enable_null_result_wrapping: bool,

    /// Pass by-ref/out arguments to script callbacks as host variable cells
    pub enable_auto_host_variables: bool,

    /// How untyped host null is exported
    pub null_export: NullExport,

    /// Copy host arrays into script arrays instead of exporting a proxy
    pub marshal_arrays_by_value: bool,

    /// Export host `DateTime` values as script dates
    pub enable_date_time_conversion: bool,

    /// Maximum number of nested frames per engine
    pub max_nested_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_access: ScriptAccess::Full,
            access_context: None,
            enable_null_result_wrapping: false,
            enable_auto_host_variables: false,
            null_export: NullExport::Null,
            marshal_arrays_by_value: false,
            enable_date_time_conversion: false,
            max_nested_depth: 256,
        }
    }
}

// ============================================================================
// Host item flags
// ============================================================================

/// Flags attached to a host object or type when it is exposed (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HostItemFlags(u8);

impl HostItemFlags {
    /// No flags
    pub const NONE: Self = Self(0x00);
    /// Script may reach private members
    pub const PRIVATE_ACCESS: Self = Self(0x01);
    /// Bypass the dynamic-dispatch protocol and bind the static type only
    pub const DIRECT_ACCESS: Self = Self(0x02);
    /// The item's members resolve as script globals
    pub const GLOBAL_MEMBERS: Self = Self(0x04);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if all flags in `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove flags
    pub const fn difference(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Flags that affect proxy identity. `GLOBAL_MEMBERS` only matters at registration.
    pub(crate) const fn identity_bits(&self) -> u8 {
        self.0 & !Self::GLOBAL_MEMBERS.0
    }

    /// Parse a pipe-separated list (e.g. `"PRIVATE_ACCESS|DIRECT_ACCESS"`)
    pub fn parse(s: &str) -> Option<Self> {
        let mut result = Self::NONE;
        for part in s.split('|') {
            let flag = match part.trim().to_uppercase().as_str() {
                "" | "NONE" => Self::NONE,
                "PRIVATE_ACCESS" => Self::PRIVATE_ACCESS,
                "DIRECT_ACCESS" => Self::DIRECT_ACCESS,
                "GLOBAL_MEMBERS" => Self::GLOBAL_MEMBERS,
                _ => return None,
            };
            result = result.union(flag);
        }
        Some(result)
    }
}

impl std::ops::BitOr for HostItemFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}
