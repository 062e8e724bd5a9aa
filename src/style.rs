use crate::core::Rgba8;

/// Fixed visual configuration applied uniformly across a video.
///
/// The profile is an explicit value handed to the blueprint and compile
/// stages; nothing reads it through globals. `colors` holds logical color
/// *names* so the persisted blueprint JSON stays engine-neutral; concrete
/// values come from [`resolve_color`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StyleProfile {
    pub style: String,
    pub line_width: f64,
    pub font_size_title: f32,
    pub font_size_body: f32,
    pub colors: ColorRoles,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorRoles {
    pub primary: String,
    pub neutral: String,
}

impl StyleProfile {
    /// The stock "2D explainer" look: thin strokes, large title, readable
    /// body captions, blue shapes and white text on a dark canvas.
    pub fn explainer_2d() -> Self {
        Self {
            style: "2D explainer".to_string(),
            line_width: 4.0,
            font_size_title: 48.0,
            font_size_body: 28.0,
            colors: ColorRoles {
                primary: "blue".to_string(),
                neutral: "white".to_string(),
            },
        }
    }
}

/// Map a logical color name to a concrete value.
pub fn resolve_color(name: &str) -> Option<Rgba8> {
    match name {
        "blue" => Some(Rgba8::opaque(0x58, 0xC4, 0xDD)),
        "white" => Some(Rgba8::opaque(0xFF, 0xFF, 0xFF)),
        _ => None,
    }
}

/// Concrete value for a role name, falling back to white for unknown names so
/// a hand-edited blueprint still renders something visible.
pub fn resolve_color_or_neutral(name: &str) -> Rgba8 {
    resolve_color(name).unwrap_or(Rgba8::opaque(0xFF, 0xFF, 0xFF))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explainer_profile_matches_stock_values() {
        let p = StyleProfile::explainer_2d();
        assert_eq!(p.style, "2D explainer");
        assert_eq!(p.line_width, 4.0);
        assert_eq!(p.font_size_title, 48.0);
        assert_eq!(p.font_size_body, 28.0);
        assert_eq!(p.colors.primary, "blue");
        assert_eq!(p.colors.neutral, "white");
    }

    #[test]
    fn profile_json_shape_is_stable() {
        let p = StyleProfile::explainer_2d();
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["style"], "2D explainer");
        assert_eq!(v["colors"]["primary"], "blue");
        assert_eq!(v["colors"]["neutral"], "white");
    }

    #[test]
    fn color_resolution() {
        assert_eq!(resolve_color("blue"), Some(Rgba8::opaque(0x58, 0xC4, 0xDD)));
        assert_eq!(resolve_color("white"), Some(Rgba8::opaque(255, 255, 255)));
        assert_eq!(resolve_color("magenta"), None);
        assert_eq!(
            resolve_color_or_neutral("magenta"),
            Rgba8::opaque(255, 255, 255)
        );
    }
}
