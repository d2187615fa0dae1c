use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One marker copied back from an external timeline during sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeMarker {
    pub name: String,
    pub color: String,
    pub start_sec: f64,
}

/// One scene record of the cue sheet. Reserved fields are typed; anything
/// an outside editor adds lands in `extra` and round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    #[serde(default)]
    pub scene: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voiceover: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otio_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otio_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otio_markers: Option<Vec<KeyframeMarker>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Keyframe {
    pub fn with_scene(scene: impl Into<String>) -> Self {
        Keyframe {
            scene: scene.into(),
            ..Default::default()
        }
    }

    pub fn matches_scene(&self, keyword: &str) -> bool {
        self.scene.to_lowercase().contains(&keyword.to_lowercase())
    }

    /// Write a field by name, routing reserved names to their typed slots
    /// so a later serialization cannot emit the same key twice.
    pub fn set_field(&mut self, field: &str, value: Value) {
        match field {
            "scene" => self.scene = value_to_string(value),
            "voiceover" => self.voiceover = Some(value_to_string(value)),
            "fx" => self.fx = Some(value_to_string(value)),
            "edit_pattern" => self.edit_pattern = Some(value_to_string(value)),
            "otio_start" => self.otio_start = value.as_f64(),
            "otio_duration" => self.otio_duration = value.as_f64(),
            "otio_markers" => self.otio_markers = serde_json::from_value(value).ok(),
            _ => {
                self.extra.insert(field.to_string(), value);
            }
        }
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// The root document: keyframe order is the scene sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueSheet {
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extra_fields_round_trip() {
        let raw = r#"{"keyframes":[{"scene":"A hallway","mood":"blue","takes":3}]}"#;
        let cue: CueSheet = serde_json::from_str(raw).unwrap();
        assert_eq!(cue.keyframes[0].extra.get("mood"), Some(&json!("blue")));

        let out = serde_json::to_string(&cue).unwrap();
        assert!(out.contains("\"mood\""));
        assert!(out.contains("\"takes\""));
    }

    #[test]
    fn set_field_routes_reserved_names() {
        let mut kf = Keyframe::with_scene("City at night");
        kf.set_field("edit_pattern", json!("jumpcut storm"));
        kf.set_field("note", json!("draft"));

        assert_eq!(kf.edit_pattern.as_deref(), Some("jumpcut storm"));
        assert_eq!(kf.extra.get("note"), Some(&json!("draft")));
        assert!(!kf.extra.contains_key("edit_pattern"));
    }

    #[test]
    fn scene_match_is_case_insensitive() {
        let kf = Keyframe::with_scene("The Neon Corridor");
        assert!(kf.matches_scene("neon"));
        assert!(kf.matches_scene("CORRIDOR"));
        assert!(!kf.matches_scene("desert"));
    }
}
