//! Typed, unit-tagged measurement values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::definition::MetricDefinition;
use crate::error::MetricError;
use crate::units::MeasureUnit;

/// Declared runtime kind of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Long,
    Double,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Long(i64),
    Double(f64),
    Float(f32),
    String(String),
}

impl Value {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Value::Long(_) => PropertyType::Long,
            Value::Double(_) => PropertyType::Double,
            Value::Float(_) => PropertyType::Float,
            Value::String(_) => PropertyType::String,
        }
    }

    /// Numeric view of the value, `None` for strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Float(v) => Some(f64::from(*v)),
            Value::String(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

/// One measurement: a named, typed value in a unit. A `None` value means the
/// metric could not be collected; name, type and unit are still populated.
///
/// Deserialising goes through the same type check as [`Property::set_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PropertyRecord")]
pub struct Property {
    name: String,
    #[serde(rename = "type")]
    property_type: PropertyType,
    unit: Option<MeasureUnit>,
    value: Option<Value>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn unit(&self) -> Option<MeasureUnit> {
        self.unit
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Sets the value, rejecting one whose kind differs from the declared type.
    pub fn set_value(&mut self, value: Value) -> Result<(), MetricError> {
        if value.property_type() != self.property_type {
            return Err(MetricError::invalid_argument(format!(
                "{} is declared {:?} but got a {:?} value",
                self.name,
                self.property_type,
                value.property_type()
            )));
        }
        self.value = Some(value);
        Ok(())
    }

    pub fn with_value(mut self, value: Value) -> Result<Self, MetricError> {
        self.set_value(value)?;
        Ok(self)
    }
}

/// Wire shape of a [`Property`] before its value is checked.
#[derive(Deserialize)]
struct PropertyRecord {
    name: String,
    #[serde(rename = "type")]
    property_type: PropertyType,
    unit: Option<MeasureUnit>,
    value: Option<Value>,
}

impl TryFrom<PropertyRecord> for Property {
    type Error = MetricError;

    fn try_from(record: PropertyRecord) -> Result<Self, Self::Error> {
        let property_type = record.property_type;
        let property = PropertyFactory::create(record.name, property_type, record.unit);
        match record.value {
            None => Ok(property),
            // JSON numbers carry no width; widen or narrow to the declared kind
            Some(value) => property.with_value(match (value, property_type) {
                (Value::Double(v), PropertyType::Float) => Value::Float(v as f32),
                (Value::Long(v), PropertyType::Float) => Value::Float(v as f32),
                (Value::Long(v), PropertyType::Double) => Value::Double(v as f64),
                (value, _) => value,
            }),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.unit) {
            (None, _) => write!(f, "{}=null", self.name),
            (Some(v), Some(unit)) => write!(f, "{}={} {}", self.name, v, unit),
            (Some(v), None) => write!(f, "{}={}", self.name, v),
        }
    }
}

/// Builds null-valued properties shaped after a definition.
pub struct PropertyFactory;

impl PropertyFactory {
    pub fn create(
        name: impl Into<String>,
        property_type: PropertyType,
        unit: Option<MeasureUnit>,
    ) -> Property {
        Property {
            name: name.into(),
            property_type,
            unit,
            value: None,
        }
    }

    pub fn for_definition(definition: &dyn MetricDefinition) -> Property {
        Self::create(
            definition.id(),
            definition.property_type(),
            definition.base_unit(),
        )
    }
}
