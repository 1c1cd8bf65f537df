//! Unit conversion table used by the normalizer.
//!
//! Every supported (provider unit, target unit) pair has exactly one entry;
//! anything else is a schema problem in the provider response.

use crate::types::Quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Celsius,
    Fahrenheit,
    Kelvin,
    Millimeter,
    Centimeter,
    Inch,
}

impl Unit {
    /// Parse a provider unit label such as `"°C"` or `"inch"`
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "°C" | "C" | "celsius" => Some(Self::Celsius),
            "°F" | "F" | "fahrenheit" => Some(Self::Fahrenheit),
            "K" | "kelvin" => Some(Self::Kelvin),
            "mm" => Some(Self::Millimeter),
            "cm" => Some(Self::Centimeter),
            "inch" | "in" => Some(Self::Inch),
            _ => None,
        }
    }

    pub fn quantity(&self) -> Quantity {
        match self {
            Self::Celsius | Self::Fahrenheit | Self::Kelvin => Quantity::Temperature,
            Self::Millimeter | Self::Centimeter | Self::Inch => Quantity::Precipitation,
        }
    }
}

/// Unit every value of a quantity is normalized to
pub fn target_unit(quantity: Quantity) -> Unit {
    match quantity {
        Quantity::Temperature => Unit::Celsius,
        Quantity::Precipitation => Unit::Millimeter,
    }
}

/// `target = value * scale + offset`
#[derive(Debug, Clone, Copy)]
struct Linear {
    scale: f64,
    offset: f64,
}

const CONVERSIONS: [(Unit, Unit, Linear); 6] = [
    (Unit::Celsius, Unit::Celsius, Linear { scale: 1.0, offset: 0.0 }),
    (Unit::Fahrenheit, Unit::Celsius, Linear { scale: 5.0 / 9.0, offset: -160.0 / 9.0 }),
    (Unit::Kelvin, Unit::Celsius, Linear { scale: 1.0, offset: -273.15 }),
    (Unit::Millimeter, Unit::Millimeter, Linear { scale: 1.0, offset: 0.0 }),
    (Unit::Centimeter, Unit::Millimeter, Linear { scale: 10.0, offset: 0.0 }),
    (Unit::Inch, Unit::Millimeter, Linear { scale: 25.4, offset: 0.0 }),
];

/// A conversion resolved once per series and applied to every value.
#[derive(Debug, Clone, Copy)]
pub struct Converter(Linear);

impl Converter {
    pub fn lookup(from: Unit, to: Unit) -> Option<Self> {
        CONVERSIONS
            .iter()
            .find(|(f, t, _)| *f == from && *t == to)
            .map(|(_, _, linear)| Converter(*linear))
    }

    pub fn apply(&self, value: f64) -> f64 {
        if self.0.scale == 1.0 && self.0.offset == 0.0 {
            value
        } else {
            value * self.0.scale + self.0.offset
        }
    }
}
