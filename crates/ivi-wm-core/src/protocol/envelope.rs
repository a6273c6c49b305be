//! Command envelope and entry types.
//!
//! The envelope itself is decoded with typed serde, but the `target`,
//! `screens`, `layers` and `surfaces` arrays are kept as raw
//! [`serde_json::Value`]s: entries are decoded one at a time with
//! [`decode_item`], so a malformed element aborts only the command that
//! consumes it while everything applied before it stays applied.
//!
//! Entry fields are all optional at parse time. Whether a missing field is
//! an error depends on the command: "add" commands demand a complete
//! property set ([`LayoutFields::complete`]), "modify" commands merge the
//! fields that are present ([`LayoutFields::merge_into`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::domain::props::{LayerProps, LayoutProps};
use crate::domain::tree::InsertPolicy;

/// Protocol revision this build speaks. A mismatch in an incoming envelope
/// is logged and tolerated.
pub const VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("body is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("body is not a valid command document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing mandatory field `{0}`")]
    MissingField(&'static str),
}

/// Decodes one array element into a typed entry. Callers iterate the raw
/// arrays and decode per item so one bad element cannot poison the rest of
/// the envelope.
pub fn decode_item<T: DeserializeOwned>(value: &Value) -> Result<T, ProtocolError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn require<T>(field: Option<T>, name: &'static str) -> Result<T, ProtocolError> {
    field.ok_or(ProtocolError::MissingField(name))
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Top-level command document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandEnvelope {
    pub version: Option<String>,
    pub command: Option<String>,
    pub target: Vec<Value>,
    pub screens: Vec<Value>,
    pub layers: Vec<Value>,
    pub surfaces: Vec<Value>,
}

impl CommandEnvelope {
    /// Parses an envelope from the JSON body, logging (but tolerating) a
    /// missing or mismatched version string.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let envelope: CommandEnvelope = serde_json::from_str(text)?;
        match envelope.version.as_deref() {
            None => warn!("command document carries no version field"),
            Some(v) if v != VERSION => {
                warn!(got = v, expected = VERSION, "command document version mismatch");
            }
            Some(_) => {}
        }
        Ok(envelope)
    }
}

// ── Insert directive ──────────────────────────────────────────────────────────

/// Raw `insert_order` / `referenceID` pair, flattened into the entry that
/// carries it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InsertSpec {
    pub insert_order: Option<String>,
    #[serde(rename = "referenceID")]
    pub reference_id: Option<u32>,
}

impl InsertSpec {
    /// Resolves the directive into a policy. Anything malformed (unknown
    /// keyword, `before`/`after` without a reference id) degrades to
    /// `Append` with a warning rather than failing the command.
    pub fn policy(&self) -> InsertPolicy {
        match self.insert_order.as_deref() {
            None | Some("append") => InsertPolicy::Append,
            Some("prepend") => InsertPolicy::Prepend,
            Some(order @ ("before" | "after")) => match self.reference_id {
                Some(ref_id) if order == "before" => InsertPolicy::Before(ref_id),
                Some(ref_id) => InsertPolicy::After(ref_id),
                None => {
                    warn!(order, "insert directive lacks referenceID, appending");
                    InsertPolicy::Append
                }
            },
            Some(other) => {
                warn!(order = other, "unknown insert_order keyword, appending");
                InsertPolicy::Append
            }
        }
    }
}

// ── Layout fields ─────────────────────────────────────────────────────────────

/// The optional geometry/visual fields shared by layer and surface entries.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct LayoutFields {
    pub src_x: Option<u32>,
    pub src_y: Option<u32>,
    pub src_w: Option<u32>,
    pub src_h: Option<u32>,
    pub dst_x: Option<u32>,
    pub dst_y: Option<u32>,
    pub dst_w: Option<u32>,
    pub dst_h: Option<u32>,
    pub opacity: Option<f64>,
    #[serde(deserialize_with = "de_visibility")]
    pub visibility: Option<bool>,
}

/// Senders encode visibility as either a JSON bool or an integer flag.
fn de_visibility<'de, D>(de: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }
    let raw = Option::<Raw>::deserialize(de)?;
    Ok(raw.map(|r| match r {
        Raw::Bool(b) => b,
        Raw::Int(i) => i != 0,
    }))
}

impl LayoutFields {
    /// "Add" rules: every field is mandatory.
    pub fn complete(&self) -> Result<LayoutProps, ProtocolError> {
        Ok(LayoutProps {
            src_x: require(self.src_x, "src_x")?,
            src_y: require(self.src_y, "src_y")?,
            src_w: require(self.src_w, "src_w")?,
            src_h: require(self.src_h, "src_h")?,
            dst_x: require(self.dst_x, "dst_x")?,
            dst_y: require(self.dst_y, "dst_y")?,
            dst_w: require(self.dst_w, "dst_w")?,
            dst_h: require(self.dst_h, "dst_h")?,
            opacity: require(self.opacity, "opacity")?,
            visible: require(self.visibility, "visibility")?,
        })
    }

    /// "Modify" rules: overwrite only the fields that are present.
    pub fn merge_into(&self, props: &mut LayoutProps) {
        if let Some(v) = self.src_x {
            props.src_x = v;
        }
        if let Some(v) = self.src_y {
            props.src_y = v;
        }
        if let Some(v) = self.src_w {
            props.src_w = v;
        }
        if let Some(v) = self.src_h {
            props.src_h = v;
        }
        if let Some(v) = self.dst_x {
            props.dst_x = v;
        }
        if let Some(v) = self.dst_y {
            props.dst_y = v;
        }
        if let Some(v) = self.dst_w {
            props.dst_w = v;
        }
        if let Some(v) = self.dst_h {
            props.dst_h = v;
        }
        if let Some(v) = self.opacity {
            props.opacity = v;
        }
        if let Some(v) = self.visibility {
            props.visible = v;
        }
    }
}

// ── Entries ───────────────────────────────────────────────────────────────────

/// One `target` element of a layout document: a host filter plus the
/// screens to apply on that host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetEntry {
    pub hostname: Option<String>,
    pub screens: Vec<Value>,
}

/// One `screens` element. For `add_layer` / `add_surface` the insert
/// directive lives here, at the screen level, and governs where the nested
/// children are placed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenEntry {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(flatten)]
    pub insert: InsertSpec,
    #[serde(default)]
    pub layers: Vec<Value>,
}

/// One `layers` element.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerEntry {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(flatten)]
    pub insert: InsertSpec,
    #[serde(flatten)]
    pub layout: LayoutFields,
    #[serde(default)]
    pub surfaces: Vec<Value>,
}

impl LayerEntry {
    /// "Add" rules for a layer: dimensions and the full layout set.
    pub fn complete_props(&self) -> Result<LayerProps, ProtocolError> {
        Ok(LayerProps {
            width: require(self.width, "width")?,
            height: require(self.height, "height")?,
            layout: self.layout.complete()?,
        })
    }

    /// "Modify" rules for a layer.
    pub fn merge_into(&self, props: &mut LayerProps) {
        if let Some(v) = self.width {
            props.width = v;
        }
        if let Some(v) = self.height {
            props.height = v;
        }
        self.layout.merge_into(&mut props.layout);
    }
}

/// One `surfaces` element.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurfaceEntry {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(flatten)]
    pub insert: InsertSpec,
    #[serde(flatten)]
    pub layout: LayoutFields,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_add_layer_envelope() {
        let text = r#"{
            "version": "1.0.0",
            "command": "add_layer",
            "screens": [
                {
                    "id": 0,
                    "insert_order": "before",
                    "referenceID": 20,
                    "layers": [
                        {
                            "id": 10, "width": 800, "height": 480,
                            "src_x": 0, "src_y": 0, "src_w": 800, "src_h": 480,
                            "dst_x": 0, "dst_y": 0, "dst_w": 800, "dst_h": 480,
                            "opacity": 1.0, "visibility": 1,
                            "surfaces": []
                        }
                    ]
                }
            ]
        }"#;
        let env = CommandEnvelope::parse(text).unwrap();
        assert_eq!(env.command.as_deref(), Some("add_layer"));
        assert_eq!(env.screens.len(), 1);

        let screen: ScreenEntry = decode_item(&env.screens[0]).unwrap();
        assert_eq!(screen.id, Some(0));
        assert_eq!(screen.insert.policy(), InsertPolicy::Before(20));

        let layer: LayerEntry = decode_item(&screen.layers[0]).unwrap();
        let props = layer.complete_props().unwrap();
        assert_eq!(props.width, 800);
        assert!(props.layout.visible);
    }

    #[test]
    fn test_parse_rejects_non_json_body() {
        assert!(matches!(
            CommandEnvelope::parse("not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_version_mismatch_is_tolerated() {
        let env = CommandEnvelope::parse(r#"{"version": "9.9.9", "command": "remove_layer"}"#)
            .unwrap();
        assert_eq!(env.command.as_deref(), Some("remove_layer"));
    }

    #[test]
    fn test_missing_arrays_default_to_empty() {
        let env = CommandEnvelope::parse(r#"{"command": "remove_layer"}"#).unwrap();
        assert!(env.screens.is_empty());
        assert!(env.target.is_empty());
    }

    #[test]
    fn test_insert_spec_keywords() {
        let spec = |order: Option<&str>, ref_id: Option<u32>| InsertSpec {
            insert_order: order.map(str::to_owned),
            reference_id: ref_id,
        };
        assert_eq!(spec(None, None).policy(), InsertPolicy::Append);
        assert_eq!(spec(Some("append"), None).policy(), InsertPolicy::Append);
        assert_eq!(spec(Some("prepend"), None).policy(), InsertPolicy::Prepend);
        assert_eq!(spec(Some("before"), Some(7)).policy(), InsertPolicy::Before(7));
        assert_eq!(spec(Some("after"), Some(7)).policy(), InsertPolicy::After(7));
    }

    #[test]
    fn test_malformed_insert_spec_degrades_to_append() {
        let spec = |order: Option<&str>, ref_id: Option<u32>| InsertSpec {
            insert_order: order.map(str::to_owned),
            reference_id: ref_id,
        };
        assert_eq!(spec(Some("sideways"), None).policy(), InsertPolicy::Append);
        assert_eq!(spec(Some("before"), None).policy(), InsertPolicy::Append);
        assert_eq!(spec(Some("after"), None).policy(), InsertPolicy::Append);
    }

    #[test]
    fn test_visibility_accepts_bool_and_integer() {
        let from_int: LayoutFields =
            serde_json::from_value(json!({"visibility": 0})).unwrap();
        assert_eq!(from_int.visibility, Some(false));

        let from_bool: LayoutFields =
            serde_json::from_value(json!({"visibility": true})).unwrap();
        assert_eq!(from_bool.visibility, Some(true));
    }

    #[test]
    fn test_opacity_accepts_integer_literal() {
        let fields: LayoutFields = serde_json::from_value(json!({"opacity": 1})).unwrap();
        assert_eq!(fields.opacity, Some(1.0));
    }

    #[test]
    fn test_complete_reports_first_missing_field() {
        let fields: LayoutFields =
            serde_json::from_value(json!({"src_x": 0, "src_y": 0})).unwrap();
        assert!(matches!(
            fields.complete(),
            Err(ProtocolError::MissingField("src_w"))
        ));
    }

    #[test]
    fn test_merge_into_touches_only_present_fields() {
        let mut props = LayoutProps {
            src_w: 800,
            opacity: 1.0,
            visible: true,
            ..Default::default()
        };
        let fields: LayoutFields =
            serde_json::from_value(json!({"opacity": 0.5, "dst_x": 10})).unwrap();
        fields.merge_into(&mut props);
        assert_eq!(props.opacity, 0.5);
        assert_eq!(props.dst_x, 10);
        assert_eq!(props.src_w, 800);
        assert!(props.visible);
    }

    #[test]
    fn test_decode_item_fails_on_wrong_shape() {
        let value = json!({"id": "not-a-number"});
        assert!(decode_item::<ScreenEntry>(&value).is_err());
    }

    #[test]
    fn test_layer_entry_merge_updates_dimensions() {
        let entry: LayerEntry =
            serde_json::from_value(json!({"id": 10, "width": 1024})).unwrap();
        let mut props = LayerProps {
            width: 800,
            height: 480,
            ..Default::default()
        };
        entry.merge_into(&mut props);
        assert_eq!(props.width, 1024);
        assert_eq!(props.height, 480);
    }
}
