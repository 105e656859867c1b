//! Launch address and form synthesis.
//!
//! The picker is loaded by POSTing a form into the target frame so that the
//! access token travels in the request body instead of the URL.
//!
//! Address: `<base>/<picker-path>?filePicker=<url-encoded JSON options>`

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PickerError, PickerResult};
use crate::options::PickerOptions;
use crate::token::AuthToken;

/// Fixed base for the consumer deployment.
pub const CONSUMER_BASE_URL: &str = "https://onedrive.live.com";
/// Picker page relative to a SharePoint web.
pub const ODSP_PICKER_PATH: &str = "_layouts/15/FilePicker.aspx";
/// Picker page relative to the consumer base.
pub const CONSUMER_PICKER_PATH: &str = "picker";
/// Query parameter carrying the serialized options.
pub const OPTIONS_PARAM: &str = "filePicker";
/// Hidden form field carrying the bearer token.
pub const ACCESS_TOKEN_FIELD: &str = "access_token";

/// What to launch, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LaunchConfig {
    /// SharePoint / OneDrive for Business under a tenant web.
    #[serde(rename = "ODSP")]
    Odsp {
        #[serde(rename = "baseUrl")]
        base_url: String,
        options: PickerOptions,
    },
    /// OneDrive consumer service.
    Consumer { options: PickerOptions },
}

impl LaunchConfig {
    /// Base URL, also used as the resource audience for the launch token.
    pub fn base_url(&self) -> &str {
        match self {
            LaunchConfig::Odsp { base_url, .. } => base_url,
            LaunchConfig::Consumer { .. } => CONSUMER_BASE_URL,
        }
    }

    fn picker_path(&self) -> &'static str {
        match self {
            LaunchConfig::Odsp { .. } => ODSP_PICKER_PATH,
            LaunchConfig::Consumer { .. } => CONSUMER_PICKER_PATH,
        }
    }

    pub fn options(&self) -> &PickerOptions {
        match self {
            LaunchConfig::Odsp { options, .. } | LaunchConfig::Consumer { options } => options,
        }
    }

    pub fn options_mut(&mut self) -> &mut PickerOptions {
        match self {
            LaunchConfig::Odsp { options, .. } | LaunchConfig::Consumer { options } => options,
        }
    }

    /// Full picker address including the serialized options.
    pub fn picker_address(&self) -> PickerResult<Url> {
        let mut url = combine(self.base_url(), self.picker_path())?;
        let options = self.options().to_query_value()?;
        url.query_pairs_mut().append_pair(OPTIONS_PARAM, &options);
        Ok(url)
    }
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn combine(base: &str, path: &str) -> PickerResult<Url> {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return Err(PickerError::Url("empty base url".into()));
    }
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormMethod {
    Post,
}

/// A form to be appended to the target frame's document and submitted.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LaunchForm {
    pub action: Url,
    pub method: FormMethod,
    /// Hidden input fields, in document order.
    pub fields: Vec<(String, String)>,
}

impl LaunchForm {
    /// Build the launch form; the token field is only added when a token exists.
    pub fn new(action: Url, token: Option<&AuthToken>) -> Self {
        let fields = token
            .filter(|t| !t.is_empty())
            .map(|t| vec![(ACCESS_TOKEN_FIELD.to_string(), t.secret().to_string())])
            .unwrap_or_default();
        Self {
            action,
            method: FormMethod::Post,
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_token(&self) -> bool {
        self.field(ACCESS_TOKEN_FIELD).is_some()
    }
}

impl std::fmt::Debug for LaunchForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("LaunchForm")
            .field("action", &self.action.as_str())
            .field("method", &self.method)
            .field("fields", &names)
            .finish()
    }
}
