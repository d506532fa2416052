//! Typed payloads that flow along edges

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named values keyed by port name
pub type Bundle = BTreeMap<String, Value>;

/// Values collected for a node's input ports
pub type InputBundle = Bundle;

/// Values produced on a node's output ports
pub type OutputBundle = Bundle;

/// An opaque payload. Media variants carry a URL or storage reference;
/// the engine never looks inside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Image(String),
    Video(String),
    Audio(String),
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Text(_) => PortType::Text,
            Self::Image(_) => PortType::Image,
            Self::Video(_) => PortType::Video,
            Self::Audio(_) => PortType::Audio,
            Self::Number(_) => PortType::Number,
            Self::Boolean(_) => PortType::Boolean,
        }
    }

    /// Convert a raw node parameter into a value of the given port type.
    ///
    /// Returns `None` when the JSON shape does not fit the type. `Any`
    /// infers the variant from the JSON (strings become text).
    pub fn from_param(port_type: PortType, raw: &serde_json::Value) -> Option<Self> {
        use serde_json::Value as Json;

        match (port_type, raw) {
            (PortType::Text, Json::String(s)) => Some(Self::Text(s.clone())),
            (PortType::Image, Json::String(s)) => Some(Self::Image(s.clone())),
            (PortType::Video, Json::String(s)) => Some(Self::Video(s.clone())),
            (PortType::Audio, Json::String(s)) => Some(Self::Audio(s.clone())),
            (PortType::Number, Json::Number(n)) => n.as_f64().map(Self::Number),
            (PortType::Boolean, Json::Bool(b)) => Some(Self::Boolean(*b)),
            (PortType::Any, Json::String(s)) => Some(Self::Text(s.clone())),
            (PortType::Any, Json::Number(n)) => n.as_f64().map(Self::Number),
            (PortType::Any, Json::Bool(b)) => Some(Self::Boolean(*b)),
            // Already-tagged values, e.g. {"type": "image", "value": "..."}
            (_, Json::Object(_)) => serde_json::from_value::<Value>(raw.clone())
                .ok()
                .filter(|v| port_type.accepts(v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Image(s) | Self::Video(s) | Self::Audio(s) => Some(s),
            Self::Number(_) | Self::Boolean(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Image(s) | Self::Video(s) | Self::Audio(s) => {
                write!(f, "{}({})", self.port_type(), s)
            }
            Self::Number(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Declared type of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    Text,
    Image,
    Video,
    Audio,
    Number,
    Boolean,
    Any,
}

impl PortType {
    pub fn accepts(&self, value: &Value) -> bool {
        *self == PortType::Any || *self == value.port_type()
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Any => "any",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_param_matches_port_type() {
        assert_eq!(
            Value::from_param(PortType::Text, &json!("a cat")),
            Some(Value::Text("a cat".to_string()))
        );
        assert_eq!(
            Value::from_param(PortType::Image, &json!("https://cdn/cat.png")),
            Some(Value::Image("https://cdn/cat.png".to_string()))
        );
        assert_eq!(
            Value::from_param(PortType::Number, &json!(2)),
            Some(Value::Number(2.0))
        );
        assert_eq!(Value::from_param(PortType::Number, &json!("2")), None);
        assert_eq!(Value::from_param(PortType::Boolean, &json!(1)), None);
    }

    #[test]
    fn test_from_param_tagged_object() {
        let raw = json!({"type": "video", "value": "s3://clip.mp4"});
        assert_eq!(
            Value::from_param(PortType::Video, &raw),
            Some(Value::Video("s3://clip.mp4".to_string()))
        );
        assert_eq!(Value::from_param(PortType::Audio, &raw), None);
    }

    #[test]
    fn test_any_accepts_everything() {
        assert!(PortType::Any.accepts(&Value::Boolean(true)));
        assert!(PortType::Any.accepts(&Value::Audio("a.wav".to_string())));
        assert!(!PortType::Image.accepts(&Value::Video("v.mp4".to_string())));
    }

    #[test]
    fn test_value_serialization() {
        let json = serde_json::to_string(&Value::Image("cat.png".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"image","value":"cat.png"}"#);
    }
}
