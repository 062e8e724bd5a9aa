use serde::{Deserialize, Serialize};

use crate::{
    error::{ChalklineError, ChalklineResult},
    script::Script,
    style::StyleProfile,
};

/// A [`Script`] annotated with a per-scene visual plan. Derived
/// deterministically; carries the style profile it was built with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub topic: String,
    pub style_profile: StyleProfile,
    pub scenes: Vec<BlueprintScene>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlueprintScene {
    pub scene_id: u32,
    pub text: String,
    pub elements: Vec<Element>,
}

/// One drawable primitive. List order within a scene is rendering order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Title,
    Circle { label: String, pos: Side },
    Arrow { from: Side, to: Side },
    Rectangle { label: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Classify every scene of `script` into drawable elements.
///
/// Pure and closed: scene 1 is always a title card; any later sentence
/// containing "connection" or "request" (case-insensitive substring match)
/// becomes a client/server diagram; everything else becomes a labeled
/// concept box. Note that "connected" does not contain "connection", so the
/// stock fallback's third sentence classifies as a concept box.
pub fn generate_blueprint(script: &Script, style: &StyleProfile) -> Blueprint {
    let scenes = script
        .scenes
        .iter()
        .map(|scene| BlueprintScene {
            scene_id: scene.scene_id,
            text: scene.text.clone(),
            elements: classify(scene.scene_id, &scene.text),
        })
        .collect();

    Blueprint {
        topic: script.topic.clone(),
        style_profile: style.clone(),
        scenes,
    }
}

fn classify(scene_id: u32, text: &str) -> Vec<Element> {
    let lowered = text.to_lowercase();
    if scene_id == 1 {
        vec![Element::Title]
    } else if lowered.contains("connection") || lowered.contains("request") {
        vec![
            Element::Circle {
                label: "Client".to_string(),
                pos: Side::Left,
            },
            Element::Circle {
                label: "Server".to_string(),
                pos: Side::Right,
            },
            Element::Arrow {
                from: Side::Left,
                to: Side::Right,
            },
        ]
    } else {
        vec![Element::Rectangle {
            label: "Concept".to_string(),
        }]
    }
}

impl Blueprint {
    pub fn validate(&self) -> ChalklineResult<()> {
        if self.scenes.is_empty() {
            return Err(ChalklineError::validation(
                "blueprint must contain at least one scene",
            ));
        }
        for (i, scene) in self.scenes.iter().enumerate() {
            if scene.scene_id != i as u32 + 1 {
                return Err(ChalklineError::validation(format!(
                    "blueprint scene ids must be 1-based and contiguous (index {i} has id {})",
                    scene.scene_id
                )));
            }
            if scene.elements.is_empty() {
                return Err(ChalklineError::validation(format!(
                    "blueprint scene {} has no elements",
                    scene.scene_id
                )));
            }
        }
        if self.scenes[0].elements != vec![Element::Title] {
            return Err(ChalklineError::validation(
                "blueprint scene 1 must contain exactly one title element",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::fallback_script;

    fn script_of(lines: &[&str]) -> Script {
        Script::from_lines("topic", lines.iter().map(|s| s.to_string()))
    }

    #[test]
    fn scene_one_is_always_a_title_regardless_of_text() {
        let script = script_of(&["A request arrives at the server."]);
        let bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        assert_eq!(bp.scenes[0].elements, vec![Element::Title]);
    }

    #[test]
    fn connection_keyword_yields_client_server_diagram() {
        let script = script_of(&["Intro.", "The Connection stays open."]);
        let bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        assert_eq!(
            bp.scenes[1].elements,
            vec![
                Element::Circle {
                    label: "Client".to_string(),
                    pos: Side::Left,
                },
                Element::Circle {
                    label: "Server".to_string(),
                    pos: Side::Right,
                },
                Element::Arrow {
                    from: Side::Left,
                    to: Side::Right,
                },
            ]
        );
    }

    #[test]
    fn request_keyword_yields_client_server_diagram() {
        let script = script_of(&["Intro.", "Each REQUEST gets a response."]);
        let bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        assert_eq!(bp.scenes[1].elements.len(), 3);
        assert!(matches!(bp.scenes[1].elements[2], Element::Arrow { .. }));
    }

    #[test]
    fn other_text_yields_concept_rectangle() {
        let script = script_of(&["Intro.", "It is fast and reliable."]);
        let bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        assert_eq!(
            bp.scenes[1].elements,
            vec![Element::Rectangle {
                label: "Concept".to_string(),
            }]
        );
    }

    #[test]
    fn connected_does_not_match_the_connection_rule() {
        // Known quirk: the stock fallback's third sentence says "connected",
        // which the substring rule does not treat as a diagram scene.
        let bp = generate_blueprint(
            &fallback_script("How websockets work"),
            &StyleProfile::explainer_2d(),
        );
        assert_eq!(
            bp.scenes[2].elements,
            vec![Element::Rectangle {
                label: "Concept".to_string(),
            }]
        );
    }

    #[test]
    fn blueprint_preserves_scene_ids_and_text() {
        let script = fallback_script("t");
        let bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        assert_eq!(bp.scenes.len(), script.scenes.len());
        for (b, s) in bp.scenes.iter().zip(&script.scenes) {
            assert_eq!(b.scene_id, s.scene_id);
            assert_eq!(b.text, s.text);
        }
        bp.validate().unwrap();
    }

    #[test]
    fn element_json_uses_lowercase_type_tags() {
        let el = Element::Circle {
            label: "Client".to_string(),
            pos: Side::Left,
        };
        let v = serde_json::to_value(&el).unwrap();
        assert_eq!(v["type"], "circle");
        assert_eq!(v["pos"], "left");

        let arrow = serde_json::to_value(Element::Arrow {
            from: Side::Left,
            to: Side::Right,
        })
        .unwrap();
        assert_eq!(arrow["type"], "arrow");
        assert_eq!(arrow["from"], "left");
        assert_eq!(arrow["to"], "right");
    }

    #[test]
    fn validate_rejects_non_title_first_scene() {
        let script = script_of(&["Intro.", "Body."]);
        let mut bp = generate_blueprint(&script, &StyleProfile::explainer_2d());
        bp.scenes[0].elements = vec![Element::Rectangle {
            label: "Concept".to_string(),
        }];
        assert!(bp.validate().is_err());
    }
}
