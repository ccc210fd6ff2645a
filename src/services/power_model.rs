/// ============================================================
///  Physical PV power model
///
///   1. Cell temperature  – NOCT model:
///                          Tcell = Ta + (NOCT − 20) / 800 · G
///   2. Efficiency        – linear temperature derating:
///                          η = η_stc · (1 + β · (Tcell − Tref)),  β < 0
///                          then clamped to the path's bounds
///   3. Power output      – P = η · G · A   (W)
/// ============================================================

use std::collections::BTreeMap;

use crate::models::estimate::{PanelSpec, PowerEstimate};

// ─── Physical constants ──────────────────────────────────────
/// Irradiance at Standard Test Conditions, W/m²
pub const STC_IRRADIANCE: f64 = 1000.0;
/// Irradiance and ambient temperature at which NOCT is rated
const NOCT_IRRADIANCE: f64 = 800.0;
const NOCT_AMBIENT_C: f64 = 20.0;

/// Temperature derating parameters for one estimation path.
///
/// Both paths share the law `η = η_stc · (1 + β · ΔT)`; only the bounds differ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeratingLaw {
    /// Temperature coefficient per °C; negative for silicon.
    pub beta_per_c: f64,
    pub ref_temp_c: f64,
    pub min_efficiency: f64,
    pub max_efficiency: Option<f64>,
}

pub fn cell_temperature(ambient_temp_c: f64, noct_c: f64, irradiance_w_m2: f64) -> f64 {
    ambient_temp_c + ((noct_c - NOCT_AMBIENT_C) / NOCT_IRRADIANCE) * irradiance_w_m2
}

/// Cell temperature, derated efficiency and output power.
///
/// Zero, negative or non-finite irradiance means no sunlight: the cell sits
/// at ambient, efficiency is the rated value and power is 0.
pub fn compute(irradiance_w_m2: f64, ambient_temp_c: f64, panel: &PanelSpec, law: &DeratingLaw) -> PowerEstimate {
    let mut diagnostics = BTreeMap::new();
    diagnostics.insert("ambient_temp_c".to_string(), ambient_temp_c);

    if !(irradiance_w_m2.is_finite() && irradiance_w_m2 > 0.0) {
        diagnostics.insert("irradiance_w_m2".to_string(), 0.0);
        diagnostics.insert("power_kw".to_string(), 0.0);
        return PowerEstimate {
            cell_temp_c: ambient_temp_c,
            efficiency_fraction: panel.stc_efficiency_fraction,
            power_watts: 0.0,
            estimated: false,
            diagnostics,
        };
    }

    let cell_temp_c = cell_temperature(ambient_temp_c, panel.noct_c, irradiance_w_m2);
    let temp_loss_factor = 1.0 + law.beta_per_c * (cell_temp_c - law.ref_temp_c);
    let raw_efficiency = panel.stc_efficiency_fraction * temp_loss_factor;

    let mut efficiency = raw_efficiency.max(law.min_efficiency).max(0.0);
    if let Some(cap) = law.max_efficiency {
        efficiency = efficiency.min(cap);
    }

    let power_watts = (efficiency * irradiance_w_m2 * panel.area_m2).max(0.0);

    diagnostics.insert("irradiance_w_m2".to_string(), irradiance_w_m2);
    diagnostics.insert("temp_loss_factor".to_string(), temp_loss_factor);
    diagnostics.insert("raw_efficiency".to_string(), raw_efficiency);
    // Same quantity in kW: η · (G / G_stc) · A
    diagnostics.insert(
        "power_kw".to_string(),
        efficiency * (irradiance_w_m2 / STC_IRRADIANCE) * panel.area_m2,
    );

    PowerEstimate {
        cell_temp_c,
        efficiency_fraction: efficiency,
        power_watts,
        estimated: false,
        diagnostics,
    }
}
