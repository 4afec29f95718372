use crate::data_model::{Format, Permissions, Value};

pub mod characteristics;
pub mod contact_sensor;
pub mod light_bulb;
pub mod programmable_switch;
pub mod switch;
pub mod temperature_sensor;
pub mod utility;

/// Initial value of a characteristic type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Initial {
    Number(f64),
    Text(&'static str),
}

/// A HAP characteristic type (HAP 9).
#[derive(Debug, PartialEq)]
pub struct CharacteristicType {
    /// Short form of the type UUID, upper-case hex without leading zeros.
    pub id: &'static str,
    pub name: &'static str,
    pub format: Format,
    pub perms: Permissions,
    pub initial: Initial,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// The range is fixed by the protocol and cannot be customised.
    pub static_range: bool,
}

impl CharacteristicType {
    pub const fn new(
        id: &'static str,
        name: &'static str,
        format: Format,
        perms: Permissions,
        initial: Initial,
    ) -> Self {
        Self {
            id,
            name,
            format,
            perms,
            initial,
            min: 0.0,
            max: 1.0,
            step: 0.0,
            static_range: false,
        }
    }

    pub const fn range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = min;
        self.max = max;
        self.step = step;
        self
    }

    pub const fn static_range(mut self) -> Self {
        self.static_range = true;
        self
    }

    pub fn initial_value(&self) -> Value {
        match self.initial {
            Initial::Text(text) => Value::String(text.to_string()),
            Initial::Number(n) => {
                Value::from_number(self.format, n).unwrap_or_else(|_| Value::zero(self.format))
            }
        }
    }

    /// Default bounds as values of this type's format; `None` for bool and string.
    pub fn default_bounds(&self) -> Option<(Value, Value, Value)> {
        if !self.format.is_numeric() {
            return None;
        }
        let convert =
            |n: f64| Value::from_number(self.format, n).unwrap_or_else(|_| Value::zero(self.format));
        Some((convert(self.min), convert(self.max), convert(self.step)))
    }
}

/// A HAP service type (HAP 8) and the characteristic types it accepts.
#[derive(Debug, PartialEq)]
pub struct ServiceType {
    pub id: &'static str,
    pub name: &'static str,
    pub required: &'static [&'static CharacteristicType],
    pub optional: &'static [&'static CharacteristicType],
}

impl ServiceType {
    pub fn supports(&self, kind: &CharacteristicType) -> bool {
        self.required
            .iter()
            .chain(self.optional.iter())
            .any(|c| c.id == kind.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        characteristics as chr, light_bulb, switch, temperature_sensor,
        utility::accessory_information,
    };

    #[test]
    fn catalog_membership() {
        assert!(light_bulb::SERVICE.required.contains(&&chr::ON));
        assert!(light_bulb::SERVICE.supports(&chr::BRIGHTNESS));
        assert!(!light_bulb::SERVICE.supports(&chr::MANUFACTURER));
        assert!(accessory_information::SERVICE.required.contains(&&chr::IDENTIFY));
        assert!(switch::SERVICE.required.contains(&&chr::ON));
        assert!(!switch::SERVICE.supports(&chr::BRIGHTNESS));
        assert!(temperature_sensor::SERVICE.supports(&chr::STATUS_FAULT));
        assert!(!temperature_sensor::SERVICE.required.contains(&&chr::NAME));
    }

    #[test]
    fn initial_values_follow_format() {
        assert_eq!(chr::ON.initial_value(), Value::Bool(false));
        assert_eq!(chr::BRIGHTNESS.initial_value(), Value::Int(0));
        assert_eq!(chr::NAME.initial_value(), Value::String("unnamed".into()));
        assert_eq!(
            chr::BRIGHTNESS.default_bounds(),
            Some((Value::Int(0), Value::Int(100), Value::Int(1)))
        );
        assert_eq!(chr::NAME.default_bounds(), None);
    }
}
