use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const LABEL_KEY: &str = "label";
pub const ID_KEY: &str = "id";
pub const SYSTEM_VERSION_KEY: &str = "SystemVersion";
pub const DEVICE_TYPE_KEY: &str = "DeviceType";
pub const IP_ADDRESS_KEY: &str = "IpAddress";
pub const IS_ONLINE_KEY: &str = "IsOnline";
pub const TRAFFIC_RATE_KEY: &str = "TrafficRateMbps";
pub const BANDWIDTH_KEY: &str = "BandwidthMbps";
pub const LATENCY_KEY: &str = "LatencyMs";
pub const ASSET_ID_KEY: &str = "AssetId";

pub const X_POSITION_KEY: &str = "Xposition";
pub const Y_POSITION_KEY: &str = "Yposition";
pub const DEVICE_BLOB_KEY: &str = "AdditionalAsJson";
pub const SOURCE_KEY: &str = "Source";
pub const TARGET_KEY: &str = "Target";
pub const CONNECTION_TYPE_KEY: &str = "ConnectionType";
pub const CONNECTION_BLOB_KEY: &str = "ConnectionDetails";

/// Keys whose value is fixed once loaded: the backend identifier and the version lock.
const LOCKED_KEYS: [&str; 2] = [ID_KEY, SYSTEM_VERSION_KEY];

/// Keys that may be edited but never removed.
const REQUIRED_KEYS: [&str; 1] = [LABEL_KEY];

/// Column names of the backend device and connection records. A property with one of these
/// names would be written twice into the same record.
const RESERVED_KEYS: [&str; 7] = [
    X_POSITION_KEY,
    Y_POSITION_KEY,
    DEVICE_BLOB_KEY,
    SOURCE_KEY,
    TARGET_KEY,
    CONNECTION_TYPE_KEY,
    CONNECTION_BLOB_KEY,
];

pub fn is_reserved_key(name: &str) -> bool {
    RESERVED_KEYS.contains(&name)
}

pub fn is_locked_key(name: &str) -> bool {
    LOCKED_KEYS.contains(&name)
}

pub fn is_required_key(name: &str) -> bool {
    REQUIRED_KEYS.contains(&name)
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("property `{0}` already exists")]
    Duplicate(String),
    #[error("property name cannot be empty")]
    EmptyName,
    #[error("property `{0}` is read-only")]
    Protected(String),
    #[error("`{0}` is a reserved record field")]
    Reserved(String),
    #[error("property `{0}` does not exist")]
    Missing(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttrValue {
    /// Converts a backend JSON value. Nulls carry no information and are dropped;
    /// nested arrays and objects are kept as their JSON text.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Array(_) | Value::Object(_) => Some(Self::Text(value.to_string())),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                Value::from(*number as i64)
            }
            Self::Number(number) => serde_json::Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    /// Parses text typed into the property editor, keeping the kind of the value it replaces
    /// when the text still fits that kind.
    pub fn coerce_input(previous: Option<&AttrValue>, input: &str) -> Self {
        match previous {
            Some(Self::Number(_)) => input
                .trim()
                .parse::<f64>()
                .map(Self::Number)
                .unwrap_or_else(|_| Self::Text(input.to_owned())),
            Some(Self::Bool(_)) => match input.trim().to_ascii_lowercase().as_str() {
                "true" => Self::Bool(true),
                "false" => Self::Bool(false),
                _ => Self::Text(input.to_owned()),
            },
            _ => Self::Text(input.to_owned()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            Self::Number(number) => Some(*number != 0.0),
            Self::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Insertion-ordered property bag of a node or edge.
///
/// The checked mutators (`add`, `update`, `remove`) are the editing boundary: they refuse
/// locked and required keys. `insert` is for loaders and internal bookkeeping only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(IndexMap<String, AttrValue>);

impl Attributes {
    pub fn with_label(label: impl Into<String>) -> Self {
        let mut attributes = Self::default();
        attributes.insert(LABEL_KEY, AttrValue::Text(label.into()));
        attributes
    }

    pub fn label(&self) -> &str {
        self.0
            .get(LABEL_KEY)
            .and_then(AttrValue::as_text)
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    /// Looks up a key and ignores blank text values.
    pub fn get_present(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name).filter(|value| !value.is_blank())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttrValue) {
        self.0.insert(name.into(), value);
    }

    pub fn add(&mut self, name: &str, value: AttrValue) -> Result<(), AttributeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AttributeError::EmptyName);
        }
        if self.0.contains_key(name) {
            return Err(AttributeError::Duplicate(name.to_owned()));
        }
        if is_locked_key(name) {
            return Err(AttributeError::Protected(name.to_owned()));
        }
        if is_reserved_key(name) {
            return Err(AttributeError::Reserved(name.to_owned()));
        }

        self.0.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn update(&mut self, name: &str, value: AttrValue) -> Result<(), AttributeError> {
        if is_locked_key(name) {
            return Err(AttributeError::Protected(name.to_owned()));
        }
        let Some(slot) = self.0.get_mut(name) else {
            return Err(AttributeError::Missing(name.to_owned()));
        };

        *slot = value;
        Ok(())
    }

    /// Removing an absent key is a no-op and returns `Ok(None)`.
    pub fn remove(&mut self, name: &str) -> Result<Option<AttrValue>, AttributeError> {
        if is_locked_key(name) || is_required_key(name) {
            return Err(AttributeError::Protected(name.to_owned()));
        }

        Ok(self.0.shift_remove(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attributes {
        let mut attributes = Attributes::with_label("core-switch");
        attributes.insert(ID_KEY, AttrValue::Number(7.0));
        attributes.insert(SYSTEM_VERSION_KEY, AttrValue::Number(2.0));
        attributes.insert(DEVICE_TYPE_KEY, AttrValue::from("switch"));
        attributes
    }

    #[test]
    fn add_appends_in_insertion_order() {
        let mut attributes = sample();
        attributes.add("Rack", AttrValue::from("B2")).unwrap();
        attributes.add("Floor", AttrValue::from("3")).unwrap();

        let keys = attributes.iter().map(|(key, _)| key).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec!["label", "id", "SystemVersion", "DeviceType", "Rack", "Floor"]
        );
    }

    #[test]
    fn add_rejects_blank_and_duplicate_names() {
        let mut attributes = sample();
        let before = attributes.clone();

        assert_eq!(
            attributes.add("   ", AttrValue::from("")),
            Err(AttributeError::EmptyName)
        );
        assert_eq!(
            attributes.add("DeviceType", AttrValue::from("host")),
            Err(AttributeError::Duplicate("DeviceType".to_owned()))
        );
        assert_eq!(attributes, before);
    }

    #[test]
    fn record_column_names_cannot_be_added() {
        let mut attributes = sample();
        let before = attributes.clone();

        for key in [X_POSITION_KEY, DEVICE_BLOB_KEY, SOURCE_KEY, CONNECTION_TYPE_KEY] {
            assert_eq!(
                attributes.add(key, AttrValue::from("rack-left")),
                Err(AttributeError::Reserved(key.to_owned()))
            );
        }
        assert_eq!(attributes, before);
        assert!(attributes.add(BANDWIDTH_KEY, AttrValue::Number(100.0)).is_ok());
    }

    #[test]
    fn add_then_remove_restores_the_mapping() {
        let mut attributes = sample();
        let before = attributes.clone();

        attributes.add("Owner", AttrValue::from("netops")).unwrap();
        let removed = attributes.remove("Owner").unwrap();

        assert_eq!(removed, Some(AttrValue::from("netops")));
        assert_eq!(attributes, before);
    }

    #[test]
    fn locked_keys_cannot_be_updated_or_removed() {
        let mut attributes = sample();
        let before = attributes.clone();

        assert_eq!(
            attributes.update(ID_KEY, AttrValue::Number(9.0)),
            Err(AttributeError::Protected(ID_KEY.to_owned()))
        );
        assert_eq!(
            attributes.remove(SYSTEM_VERSION_KEY),
            Err(AttributeError::Protected(SYSTEM_VERSION_KEY.to_owned()))
        );
        assert_eq!(
            attributes.remove(LABEL_KEY),
            Err(AttributeError::Protected(LABEL_KEY.to_owned()))
        );
        assert_eq!(attributes, before);
    }

    #[test]
    fn update_keeps_position() {
        let mut attributes = sample();
        attributes
            .update(DEVICE_TYPE_KEY, AttrValue::from("host"))
            .unwrap();

        assert_eq!(attributes.iter().nth(3).map(|(key, _)| key), Some(DEVICE_TYPE_KEY));
        assert_eq!(
            attributes.get(DEVICE_TYPE_KEY),
            Some(&AttrValue::from("host"))
        );
        assert_eq!(
            attributes.update("Missing", AttrValue::from("x")),
            Err(AttributeError::Missing("Missing".to_owned()))
        );
    }

    #[test]
    fn removing_absent_key_is_noop() {
        let mut attributes = sample();
        assert_eq!(attributes.remove("Nope"), Ok(None));
        assert_eq!(attributes, sample());
    }

    #[test]
    fn coerce_input_follows_previous_kind() {
        let number = AttrValue::Number(1.0);
        let flag = AttrValue::Bool(true);

        assert_eq!(
            AttrValue::coerce_input(Some(&number), " 250 "),
            AttrValue::Number(250.0)
        );
        assert_eq!(
            AttrValue::coerce_input(Some(&number), "fast"),
            AttrValue::from("fast")
        );
        assert_eq!(
            AttrValue::coerce_input(Some(&flag), "FALSE"),
            AttrValue::Bool(false)
        );
        assert_eq!(AttrValue::coerce_input(None, "10"), AttrValue::from("10"));
    }
}
