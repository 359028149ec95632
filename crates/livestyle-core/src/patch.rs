//! Patch and Diff types exchanged with the diff engine and the editor
//!
//! A [`Patch`] is one atomic, independently applicable change to a style rule.
//! The core never looks inside a patch beyond carrying it around in arrival
//! order; the only interpretation it performs is the textual rendering used in
//! logs ([`fmt::Display`]).

use std::fmt;

use serde::{Deserialize, Serialize};

/// One `(selectorName, occurrenceIndex)` step of a rule path
pub type PathSegment = (String, usize);

/// A CSS declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What the patch does to the node at `path`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchAction {
    Add,
    #[default]
    Update,
    Remove,
}

/// Reordering context: the siblings the patched node sits between
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatchHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Vec<PathSegment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Vec<PathSegment>>,
}

/// A single rule-level change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub path: Vec<PathSegment>,
    #[serde(default)]
    pub update: Vec<Property>,
    #[serde(default)]
    pub remove: Vec<Property>,
    #[serde(default)]
    pub action: PatchAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<PatchHint>,
}

impl Patch {
    /// An `update` patch for the given rule path
    pub fn update<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(|name| (name.into(), 1)).collect(),
            update: Vec::new(),
            remove: Vec::new(),
            action: PatchAction::Update,
            hints: Vec::new(),
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.update.push(Property::new(name, value));
        self
    }

    pub fn unset(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.remove.push(Property::new(name, value));
        self
    }

    /// Selector path rendered as `a / b|2 / c`
    pub fn path_string(&self) -> String {
        render_path(&self.path)
    }
}

fn render_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|(name, index)| {
            if *index > 1 {
                format!("{}|{}", name, index)
            } else {
                name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {{", self.path_string())?;

        if let Some(hint) = self.hints.last() {
            if let Some(before) = &hint.before {
                writeln!(f, "  /** before: {} */", render_path(before))?;
            }
            if let Some(after) = &hint.after {
                writeln!(f, "  /** after: {} */", render_path(after))?;
            }
        }

        for prop in &self.update {
            writeln!(f, "  {}: {};", prop.name, prop.value)?;
        }
        for prop in &self.remove {
            writeln!(f, "  /* {}: {}; */", prop.name, prop.value)?;
        }
        write!(f, "}}")
    }
}

/// Render a patch list for diagnostics, one block per patch
pub fn render_patches(patches: &[Patch]) -> String {
    patches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A stylesheet change: ordered patches for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub uri: String,
    #[serde(default)]
    pub patches: Vec<Patch>,
}

impl Diff {
    pub fn new(uri: impl Into<String>, patches: Vec<Patch>) -> Self {
        Self {
            uri: uri.into(),
            patches,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_display_update_and_remove() {
        let patch = Patch::update(["body"])
            .set("color", "red")
            .unset("padding", "0");
        assert_eq!(
            patch.to_string(),
            "body {\n  color: red;\n  /* padding: 0; */\n}"
        );
    }

    #[test]
    fn test_patch_display_occurrence_index() {
        let mut patch = Patch::update(["@media print", "a"]).set("color", "blue");
        patch.path[1].1 = 3;
        assert!(patch.to_string().starts_with("@media print / a|3 {"));
    }

    #[test]
    fn test_patch_display_hints() {
        let mut patch = Patch::update(["ul"]).set("margin", "0");
        patch.hints.push(PatchHint {
            before: Some(vec![("ol".to_string(), 1)]),
            after: Some(vec![("p".to_string(), 2)]),
        });
        let text = patch.to_string();
        assert!(text.contains("/** before: ol */"));
        assert!(text.contains("/** after: p|2 */"));
    }

    #[test]
    fn test_patch_json_shape() {
        let json = r#"{
            "path": [["div", 1], ["span", 2]],
            "update": [{"name": "color", "value": "red"}],
            "remove": [],
            "action": "update"
        }"#;
        let patch: Patch = serde_json::from_str(json).unwrap();
        assert_eq!(patch.path[1], ("span".to_string(), 2));
        assert_eq!(patch.update[0], Property::new("color", "red"));
        assert!(patch.hints.is_empty());

        let back = serde_json::to_value(&patch).unwrap();
        assert_eq!(back["path"][0][0], "div");
        assert!(back.get("hints").is_none());
    }

    #[test]
    fn test_diff_defaults_missing_patches() {
        let diff: Diff = serde_json::from_str(r#"{"uri": "/style.css"}"#).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_render_patches_joins_blocks() {
        let text = render_patches(&[
            Patch::update(["a"]).set("x", "1"),
            Patch::update(["b"]).set("y", "2"),
        ]);
        assert_eq!(text.matches('{').count(), 2);
    }
}
