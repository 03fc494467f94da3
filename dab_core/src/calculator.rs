//! Duration calculator.
//!
//! Maps the chosen settings to heat and cool phase lengths using the
//! coefficient tables from [`DurationTables`]. Pure functions, no state.

use crate::{DurationTables, Error, Result, SessionSettings};

/// Heat phase length in seconds
///
/// `max(1, floor(material_time * style_modifier / intensity))`. The floor at
/// one second holds for any intensity, including zero or negative values.
pub fn compute_heat_seconds(
    tables: &DurationTables,
    material: &str,
    style: &str,
    intensity: f64,
) -> Result<u32> {
    let base = lookup_material(tables, material)?;
    let modifier = lookup_style(tables, style)?;

    let raw = (f64::from(base) * modifier / intensity).floor();
    // `as` saturates: NaN and negatives land on 0, which the guard lifts to 1
    Ok((raw as u32).max(1))
}

/// Cool phase length in seconds
///
/// `floor(wax_cool_time * style_modifier)`. No lower bound is applied.
pub fn compute_cool_seconds(tables: &DurationTables, wax: &str, style: &str) -> Result<u32> {
    let base = tables
        .wax_cool_times
        .get(wax)
        .copied()
        .ok_or_else(|| unknown("wax", wax))?;
    let modifier = lookup_style(tables, style)?;

    Ok((f64::from(base) * modifier).floor() as u32)
}

/// Both phase lengths for a set of settings, as `(heat, cool)`
pub fn compute_durations(tables: &DurationTables, settings: &SessionSettings) -> Result<(u32, u32)> {
    let heat = compute_heat_seconds(tables, &settings.material, &settings.style, settings.intensity)?;
    let cool = compute_cool_seconds(tables, &settings.wax, &settings.style)?;
    Ok((heat, cool))
}

fn lookup_material(tables: &DurationTables, material: &str) -> Result<u32> {
    tables
        .material_times
        .get(material)
        .copied()
        .ok_or_else(|| unknown("material", material))
}

fn lookup_style(tables: &DurationTables, style: &str) -> Result<f64> {
    tables
        .style_modifiers
        .get(style)
        .copied()
        .ok_or_else(|| unknown("style", style))
}

fn unknown(kind: &'static str, name: &str) -> Error {
    Error::UnknownCategory {
        kind,
        name: name.to_string(),
    }
}
