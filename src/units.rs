//! Volume conversion constants.
//!
//! Budget fluxes come out of the model in the model's length and time units.
//! Totals over a window are volumes in cubic model length units.

/// Multiplying by this leaves a value unchanged.
pub const IDENTITY_FACTOR: f64 = 1.0;

/// International foot, exact.
pub const METERS_PER_FOOT: f64 = 0.3048;

/// Cubic feet in one cubic meter (1 / 0.3048³).
pub const CUBIC_FEET_PER_CUBIC_METER: f64 = 1.0 / (METERS_PER_FOOT * METERS_PER_FOOT * METERS_PER_FOOT);

/// One acre-foot is 43,560 ft³.
pub const CUBIC_FEET_PER_ACRE_FOOT: f64 = 43_560.0;

/// Cubic meters in one acre-foot.
pub const CUBIC_METERS_PER_ACRE_FOOT: f64 =
    CUBIC_FEET_PER_ACRE_FOOT * METERS_PER_FOOT * METERS_PER_FOOT * METERS_PER_FOOT;

/// Factor taking a volume in m³ to acre-feet.
pub const ACRE_FEET_PER_CUBIC_METER: f64 = 1.0 / CUBIC_METERS_PER_ACRE_FOOT;

/// Factor taking a volume in ft³ to acre-feet.
pub const ACRE_FEET_PER_CUBIC_FOOT: f64 = 1.0 / CUBIC_FEET_PER_ACRE_FOOT;

/// Scale a value by a conversion factor.
pub fn convert_units(value: f64, factor: f64) -> f64 {
    value * factor
}

// Named presets exposed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UnitConversion {
    #[default]
    None,
    CubicMetersToAcreFeet,
    CubicFeetToAcreFeet,
}

impl UnitConversion {
    pub fn factor(&self) -> f64 {
        match self {
            UnitConversion::None => IDENTITY_FACTOR,
            UnitConversion::CubicMetersToAcreFeet => ACRE_FEET_PER_CUBIC_METER,
            UnitConversion::CubicFeetToAcreFeet => ACRE_FEET_PER_CUBIC_FOOT,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitConversion::None => "model units",
            UnitConversion::CubicMetersToAcreFeet | UnitConversion::CubicFeetToAcreFeet => "acre-ft",
        }
    }
}
