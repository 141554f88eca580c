use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON field that carries the release tag for a given backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagField {
    /// GitHub Releases API.
    #[serde(rename = "tag_name")]
    TagName,
    /// Custom release backend.
    #[serde(rename = "versionName")]
    VersionName,
}

impl TagField {
    pub fn key(self) -> &'static str {
        match self {
            TagField::TagName => "tag_name",
            TagField::VersionName => "versionName",
        }
    }

    /// Pull a non-empty tag out of a parsed release document.
    pub fn extract(self, doc: &Value) -> Option<String> {
        let tag = match doc.get(self.key())? {
            Value::String(tag) => tag.clone(),
            Value::Number(num) => num.to_string(),
            _ => return None,
        };
        (!tag.is_empty()).then_some(tag)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "browser_download_url", alias = "downloadUrl")]
    pub download_url: String,
    /// `sha256:<hex>` when the backend publishes one.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseAsset {
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.name.ends_with(extension) || self.download_url.ends_with(extension)
    }

    /// File name of the asset, falling back to the last URL segment.
    pub fn file_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.download_url
            .rsplit('/')
            .next()
            .unwrap_or(&self.download_url)
    }

    pub fn sha256(&self) -> Option<&str> {
        self.digest
            .as_deref()
            .and_then(|digest| digest.strip_prefix("sha256:"))
            .map(str::trim)
            .filter(|hex| !hex.is_empty())
    }
}

/// A release as published by the remote endpoint.
///
/// `raw` keeps the response body verbatim: it is what gets written to the
/// local version file, so a later read re-extracts the same tag.
#[derive(Clone, Debug)]
pub struct Release {
    pub tag: String,
    pub assets: Vec<ReleaseAsset>,
    pub raw: String,
}

impl Release {
    pub fn parse(raw: String, field: TagField) -> Result<Self, String> {
        let doc: Value =
            serde_json::from_str(&raw).map_err(|e| format!("release parse error: {e}"))?;
        let tag = field
            .extract(&doc)
            .ok_or_else(|| format!("release document has no `{}`", field.key()))?;
        let assets = parse_assets(&doc);
        Ok(Self { tag, assets, raw })
    }

    /// First asset, in server order, whose name or URL ends with `extension`.
    pub fn asset_for(&self, extension: &str) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|asset| asset.matches_extension(extension))
    }
}

/// Assets are only needed once a download starts, so a broken list never
/// hides the tag. Entries that do not parse are skipped.
fn parse_assets(doc: &Value) -> Vec<ReleaseAsset> {
    let Some(list) = doc.get("assets").and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .filter_map(|entry| match ReleaseAsset::deserialize(entry) {
            Ok(asset) => Some(asset),
            Err(err) => {
                warn!("release: skipping unusable asset entry: {err}");
                None
            }
        })
        .collect()
}
