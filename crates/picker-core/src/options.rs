//! Picker initialization options.
//!
//! Serialized as JSON into the `filePicker` query parameter of the launch
//! address. Sections the host never inspects are carried as opaque JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// SDK version the host speaks.
pub const DEFAULT_SDK: &str = "8.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerOptions {
    pub sdk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<Entry>,
    #[serde(default)]
    pub authentication: Value,
    #[serde(default)]
    pub messaging: Messaging,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Search>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types_and_sources: Option<TypesAndSources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localization: Option<Localization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Value>,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            sdk: DEFAULT_SDK.to_string(),
            entry: None,
            authentication: Value::Object(Default::default()),
            messaging: Messaging::default(),
            selection: None,
            search: None,
            types_and_sources: None,
            accessibility: None,
            commands: None,
            localization: None,
            navigation: None,
            telemetry: None,
            theme: None,
        }
    }
}

impl PickerOptions {
    /// Options for a SharePoint web, mirroring what a typical host embeds:
    /// multi-select, search on, all pivots enabled.
    pub fn for_sharepoint_web(web_url: &str, channel_id: &str) -> Self {
        Self {
            entry: Some(Entry {
                share_point: Some(SharePointEntry {
                    by_path: Some(ByPath {
                        web: Some(web_url.to_string()),
                        folder: None,
                        list: None,
                    }),
                }),
                one_drive: None,
            }),
            messaging: Messaging {
                origin: Some(web_url.to_string()),
                channel_id: Some(channel_id.to_string()),
            },
            selection: Some(Selection {
                mode: SelectionMode::Multiple,
            }),
            search: Some(Search { enabled: true }),
            types_and_sources: Some(TypesAndSources {
                mode: FoldersOrFiles::All,
                filters: Vec::new(),
                pivots: Some(Pivots {
                    shared: true,
                    one_drive: true,
                    recent: true,
                    shared_libraries: true,
                }),
            }),
            ..Self::default()
        }
    }

    /// Serialize to the compact JSON string carried in the query string.
    pub fn to_query_value(&self) -> crate::PickerResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_point: Option<SharePointEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_drive: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePointEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_path: Option<ByPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByPath {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<String>,
}

/// Identifies the host to the frame. `channel_id` must match the
/// `initialize` message the frame posts back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Messaging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub mode: SelectionMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Single,
    Multiple,
    Pick,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Search {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypesAndSources {
    pub mode: FoldersOrFiles,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivots: Option<Pivots>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldersOrFiles {
    Files,
    Folders,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pivots {
    pub shared: bool,
    pub one_drive: bool,
    pub recent: bool,
    pub shared_libraries: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localization {
    pub language: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sharepoint_web_options_shape() {
        let opts = PickerOptions::for_sharepoint_web("https://contoso.sharepoint.com/sites/a", "c1");
        let v = serde_json::to_value(&opts).unwrap();
        assert_eq!(v["sdk"], "8.0");
        assert_eq!(
            v["entry"]["sharePoint"]["byPath"]["web"],
            "https://contoso.sharepoint.com/sites/a"
        );
        assert_eq!(v["messaging"]["channelId"], "c1");
        assert_eq!(v["selection"]["mode"], "multiple");
        assert_eq!(v["typesAndSources"]["mode"], "all");
        assert_eq!(v["typesAndSources"]["pivots"]["sharedLibraries"], true);
        assert!(v.get("theme").is_none());
    }

    #[test]
    fn minimal_options_parse() {
        let opts: PickerOptions = serde_json::from_value(json!({"sdk": "8.0"})).unwrap();
        assert_eq!(opts.messaging, Messaging::default());
        assert!(opts.entry.is_none());
    }

    #[test]
    fn query_value_is_compact_json() {
        let opts = PickerOptions::default();
        let s = opts.to_query_value().unwrap();
        assert!(s.starts_with("{\"sdk\":\"8.0\""));
        assert!(!s.contains('\n'));
    }
}
