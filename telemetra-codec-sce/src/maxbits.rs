// Telemetra
// Copyright (c) 2026 The Project Telemetra Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `maxbits` module provides the versioned max-used-bits tables and their process-wide
//! registry.
//!
//! A max-used-bits table records, for every decodable field of every data type, the bit width of
//! the largest legal sample value. Versions 0 and 1 are built-ins; versions from
//! [`MAX_USED_BITS_RESERVED_VERSIONS`] upward can be registered by the host.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use telemetra_core::errors::{invalid_parameter_error, Result};

/// First table version the host may register. Versions 2 to 31 are reserved.
pub const MAX_USED_BITS_RESERVED_VERSIONS: u8 = 32;

/// A versioned table of per-field sample bit widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxUsedBits {
    pub version: u8,

    // Short cadence.
    pub s_exp_flags: u32,
    pub s_fx: u32,
    pub s_efx: u32,
    pub s_ncob: u32,
    pub s_ecob: u32,

    // Fast cadence.
    pub f_fx: u32,
    pub f_efx: u32,
    pub f_ncob: u32,
    pub f_ecob: u32,

    // Long cadence.
    pub l_exp_flags: u32,
    pub l_fx: u32,
    pub l_fx_variance: u32,
    pub l_efx: u32,
    pub l_ncob: u32,
    pub l_ecob: u32,
    pub l_cob_variance: u32,

    // Normal camera imagettes and auxiliary science.
    pub nc_imagette: u32,
    pub saturated_imagette: u32,
    pub nc_offset_mean: u32,
    pub nc_offset_variance: u32,
    pub nc_background_mean: u32,
    pub nc_background_variance: u32,
    pub nc_background_outlier_pixels: u32,
    pub smearing_mean: u32,
    pub smearing_variance_mean: u32,
    pub smearing_outlier_pixels: u32,

    // Fast camera imagettes and auxiliary science.
    pub fc_imagette: u32,
    pub fc_offset_mean: u32,
    pub fc_offset_variance: u32,
    pub fc_background_mean: u32,
    pub fc_background_variance: u32,
    pub fc_background_outlier_pixels: u32,
}

/// Version 0: conservative upper bounds, the full width of every record field.
pub const MAX_USED_BITS_SAFE: MaxUsedBits = MaxUsedBits {
    version: 0,
    s_exp_flags: 8,
    s_fx: 32,
    s_efx: 32,
    s_ncob: 32,
    s_ecob: 32,
    f_fx: 32,
    f_efx: 32,
    f_ncob: 32,
    f_ecob: 32,
    l_exp_flags: 24,
    l_fx: 32,
    l_fx_variance: 32,
    l_efx: 32,
    l_ncob: 32,
    l_ecob: 32,
    l_cob_variance: 32,
    nc_imagette: 16,
    saturated_imagette: 16,
    nc_offset_mean: 32,
    nc_offset_variance: 32,
    nc_background_mean: 32,
    nc_background_variance: 32,
    nc_background_outlier_pixels: 16,
    smearing_mean: 32,
    smearing_variance_mean: 32,
    smearing_outlier_pixels: 16,
    fc_imagette: 16,
    fc_offset_mean: 32,
    fc_offset_variance: 32,
    fc_background_mean: 32,
    fc_background_variance: 32,
    fc_background_outlier_pixels: 16,
};

/// Version 1: the frozen widths of the first on-board software release.
pub const MAX_USED_BITS_V1: MaxUsedBits = MaxUsedBits {
    version: 1,
    s_exp_flags: 2,
    s_fx: 21,
    s_efx: 16,
    s_ncob: 20,
    s_ecob: 16,
    f_fx: 21,
    f_efx: 16,
    f_ncob: 20,
    f_ecob: 16,
    l_exp_flags: 24,
    l_fx: 21,
    l_fx_variance: 21,
    l_efx: 16,
    l_ncob: 20,
    l_ecob: 16,
    l_cob_variance: 18,
    nc_imagette: 16,
    saturated_imagette: 16,
    nc_offset_mean: 2,
    nc_offset_variance: 10,
    nc_background_mean: 16,
    nc_background_variance: 16,
    nc_background_outlier_pixels: 5,
    smearing_mean: 16,
    smearing_variance_mean: 16,
    smearing_outlier_pixels: 5,
    fc_imagette: 16,
    fc_offset_mean: 32,
    fc_offset_variance: 9,
    fc_background_mean: 13,
    fc_background_variance: 16,
    fc_background_outlier_pixels: 5,
};

/// Outcome of a table registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The version was not registered before.
    Registered,
    /// A previously registered table with the same version was replaced.
    Overwritten,
}

/// A registry of max-used-bits tables keyed by version.
///
/// The built-in versions 0 and 1 are always resolvable and cannot be replaced or cleared. A
/// decode reads a stable copy of a table out of the registry, so registering concurrently with a
/// decode never tears a table.
#[derive(Default)]
pub struct MaxUsedBitsRegistry {
    user: RwLock<HashMap<u8, MaxUsedBits>>,
}

impl MaxUsedBitsRegistry {
    /// Instantiate a new registry holding only the built-in tables.
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a table under `table.version`, replacing a previous registration of the same
    /// version. Versions below [`MAX_USED_BITS_RESERVED_VERSIONS`] are rejected.
    pub fn register(&self, table: MaxUsedBits) -> Result<RegisterOutcome> {
        if table.version < MAX_USED_BITS_RESERVED_VERSIONS {
            return invalid_parameter_error("max used bits version is reserved");
        }

        let mut user = self.user.write().unwrap_or_else(|e| e.into_inner());

        match user.insert(table.version, table) {
            Some(_) => Ok(RegisterOutcome::Overwritten),
            None => Ok(RegisterOutcome::Registered),
        }
    }

    /// Gets a copy of the table registered under `version`, or `None` when the version is
    /// unknown.
    pub fn get(&self, version: u8) -> Option<MaxUsedBits> {
        match version {
            0 => Some(MAX_USED_BITS_SAFE),
            1 => Some(MAX_USED_BITS_V1),
            _ => {
                let user = self.user.read().unwrap_or_else(|e| e.into_inner());
                user.get(&version).copied()
            }
        }
    }

    /// Removes every user-registered table. The built-ins remain.
    pub fn clear(&self) {
        let mut user = self.user.write().unwrap_or_else(|e| e.into_inner());
        user.clear();
    }
}

static REGISTRY: Lazy<MaxUsedBitsRegistry> = Lazy::new(MaxUsedBitsRegistry::new);

/// Gets the process-wide registry the decoder resolves header versions against.
pub fn registry() -> &'static MaxUsedBitsRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_built_in_versions() {
        let registry = MaxUsedBitsRegistry::new();

        assert_eq!(registry.get(0), Some(MAX_USED_BITS_SAFE));
        assert_eq!(registry.get(1), Some(MAX_USED_BITS_V1));
        assert_eq!(registry.get(2), None);
        assert_eq!(registry.get(MAX_USED_BITS_RESERVED_VERSIONS - 1), None);
    }

    #[test]
    fn verify_register_and_clear() {
        let registry = MaxUsedBitsRegistry::new();

        let mut table = MAX_USED_BITS_SAFE;
        table.version = 40;
        table.nc_imagette = 12;

        assert_eq!(registry.register(table), Ok(RegisterOutcome::Registered));
        assert_eq!(registry.register(table), Ok(RegisterOutcome::Overwritten));
        assert_eq!(registry.get(40), Some(table));

        registry.clear();
        assert_eq!(registry.get(40), None);
        assert_eq!(registry.get(0), Some(MAX_USED_BITS_SAFE));
    }

    #[test]
    fn verify_reserved_versions_are_rejected() {
        let registry = MaxUsedBitsRegistry::new();

        for version in [0, 1, 2, MAX_USED_BITS_RESERVED_VERSIONS - 1] {
            let mut table = MAX_USED_BITS_SAFE;
            table.version = version;
            assert!(registry.register(table).is_err());
        }
    }
}
