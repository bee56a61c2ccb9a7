//! Option resolution, popout URL construction and window feature strings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::config::WindowDefaults;
use crate::host::ScreenSize;
use crate::WindowId;

const FIXED_FEATURES: &str =
    "toolbar=no,location=no,directories=no,status=no,menubar=no,scrollbars=yes,resizable=yes,copyhistory=no";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    #[default]
    Create,
    Edit,
}

impl WindowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowMode::Create => "create",
            WindowMode::Edit => "edit",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "create" => Some(WindowMode::Create),
            "edit" => Some(WindowMode::Edit),
            _ => None,
        }
    }
}

impl fmt::Display for WindowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied open options. Anything left `None` is resolved against
/// [`WindowDefaults`] and the current screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub mode: Option<WindowMode>,
    pub record_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub left: Option<i32>,
    pub top: Option<i32>,
    pub hide_header: Option<bool>,
    pub hide_aside: Option<bool>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: WindowMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn position(mut self, left: i32, top: i32) -> Self {
        self.left = Some(left);
        self.top = Some(top);
        self
    }

    pub fn hide_header(mut self, hide: bool) -> Self {
        self.hide_header = Some(hide);
        self
    }

    pub fn hide_aside(mut self, hide: bool) -> Self {
        self.hide_aside = Some(hide);
        self
    }

    pub fn resolve(&self, defaults: &WindowDefaults, screen: ScreenSize) -> ResolvedOptions {
        let width = self.width.unwrap_or(defaults.width);
        let height = self.height.unwrap_or(defaults.height);
        ResolvedOptions {
            mode: self.mode.unwrap_or(defaults.mode),
            record_id: self.record_id.clone(),
            width,
            height,
            left: self.left.unwrap_or_else(|| centered(screen.width, width)),
            top: self.top.unwrap_or_else(|| centered(screen.height, height)),
            hide_header: self.hide_header.unwrap_or(defaults.hide_header),
            hide_aside: self.hide_aside.unwrap_or(defaults.hide_aside),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    pub mode: WindowMode,
    pub record_id: Option<String>,
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
    pub hide_header: bool,
    pub hide_aside: bool,
}

impl ResolvedOptions {
    /// Manager-owned query parameters. These override caller params of the
    /// same name.
    pub fn query_params(&self, id: &WindowId) -> [(&'static str, String); 9] {
        [
            ("mode", self.mode.to_string()),
            ("recordId", self.record_id.clone().unwrap_or_default()),
            ("popoutId", id.to_string()),
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
            ("left", self.left.to_string()),
            ("top", self.top.to_string()),
            ("hideHeader", self.hide_header.to_string()),
            ("hideAside", self.hide_aside.to_string()),
        ]
    }

    pub fn features(&self) -> String {
        format!(
            "{FIXED_FEATURES},width={},height={},top={},left={}",
            self.width, self.height, self.top, self.left
        )
    }
}

fn centered(screen: u32, size: u32) -> i32 {
    (i64::from(screen) / 2 - i64::from(size) / 2) as i32
}

/// Caller params first, manager params on top.
pub fn merge_params<I, K, V>(
    incoming: I,
    options: &ResolvedOptions,
    id: &WindowId,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut merged: BTreeMap<String, String> = incoming
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();
    for (key, value) in options.query_params(id) {
        merged.insert(key.to_string(), value);
    }
    merged
}

/// Splits `path` into its base and any query pairs it already carries, so
/// they can take part in the merge instead of shadowing manager params.
pub fn split_path(path: &str) -> (&str, Vec<(String, String)>) {
    match path.split_once('?') {
        Some((base, query)) => (
            base,
            form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (path, Vec::new()),
    }
}

/// `base` must not carry a query; see [`split_path`].
pub fn build_url(
    base: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, serde_urlencoded::ser::Error> {
    let query = serde_urlencoded::to_string(params)?;
    if query.is_empty() {
        return Ok(base.to_string());
    }
    Ok(format!("{base}?{query}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: ScreenSize = ScreenSize {
        width: 1600,
        height: 1200,
    };

    #[test]
    fn resolves_defaults_and_centers() {
        let resolved = OpenOptions::new().resolve(&WindowDefaults::default(), SCREEN);
        assert_eq!(resolved.mode, WindowMode::Create);
        assert_eq!((resolved.width, resolved.height), (1280, 720));
        assert_eq!((resolved.left, resolved.top), (160, 240));
        assert!(resolved.hide_header);
        assert!(!resolved.hide_aside);
    }

    #[test]
    fn centers_requested_size() {
        let resolved = OpenOptions::new()
            .size(800, 600)
            .resolve(&WindowDefaults::default(), SCREEN);
        assert_eq!((resolved.left, resolved.top), (400, 300));
    }

    #[test]
    fn explicit_position_is_kept() {
        let resolved = OpenOptions::new()
            .position(10, 20)
            .resolve(&WindowDefaults::default(), SCREEN);
        assert_eq!((resolved.left, resolved.top), (10, 20));
    }

    #[test]
    fn oversized_window_gets_negative_offset() {
        let resolved = OpenOptions::new()
            .size(2000, 1200)
            .resolve(&WindowDefaults::default(), SCREEN);
        assert_eq!((resolved.left, resolved.top), (-200, 0));
    }

    #[test]
    fn manager_params_override_caller_params() {
        let id = WindowId::new();
        let resolved = OpenOptions::new()
            .mode(WindowMode::Edit)
            .record_id("shp_1")
            .resolve(&WindowDefaults::default(), SCREEN);
        let merged = merge_params(
            [("mode", "evil"), ("popoutId", "spoofed"), ("tab", "stops")],
            &resolved,
            &id,
        );
        assert_eq!(merged["mode"], "edit");
        assert_eq!(merged["popoutId"], id.to_string());
        assert_eq!(merged["recordId"], "shp_1");
        assert_eq!(merged["tab"], "stops");
        assert_eq!(merged["hideHeader"], "true");
        assert_eq!(merged.len(), 10);
    }

    #[test]
    fn builds_url_with_encoded_query() {
        let mut params = BTreeMap::new();
        params.insert("a b".to_string(), "c&d".to_string());
        assert_eq!(build_url("/x", &params).unwrap(), "/x?a+b=c%26d");
        assert_eq!(build_url("/x", &BTreeMap::new()).unwrap(), "/x");
    }

    #[test]
    fn path_query_is_merged_under_manager_params() {
        let (base, existing) = split_path("/x?mode=evil&y=1&a+b=c%26d");
        assert_eq!(base, "/x");
        assert_eq!(
            existing,
            vec![
                ("mode".to_string(), "evil".to_string()),
                ("y".to_string(), "1".to_string()),
                ("a b".to_string(), "c&d".to_string()),
            ]
        );

        let id = WindowId::new();
        let resolved = OpenOptions::new()
            .mode(WindowMode::Edit)
            .resolve(&WindowDefaults::default(), SCREEN);
        let url = build_url(base, &merge_params(existing, &resolved, &id)).unwrap();
        assert_eq!(url.matches("mode=").count(), 1);
        assert!(url.contains("mode=edit"));
        assert!(url.contains("y=1"));
        assert_eq!(split_path("/plain"), ("/plain", Vec::new()));
    }

    #[test]
    fn feature_string_has_fixed_and_dynamic_flags() {
        let resolved = OpenOptions::new()
            .size(800, 600)
            .position(5, 7)
            .resolve(&WindowDefaults::default(), SCREEN);
        assert_eq!(
            resolved.features(),
            "toolbar=no,location=no,directories=no,status=no,menubar=no,scrollbars=yes,resizable=yes,copyhistory=no,width=800,height=600,top=7,left=5"
        );
    }
}
