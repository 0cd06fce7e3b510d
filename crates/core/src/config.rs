// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Reuse compiled instruction handles. When off, every fetch decodes
    /// the opcode again.
    pub decode_cache_enabled: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            decode_cache_enabled: true,
        }
    }
}
