// assets.rs

use std::collections::HashMap;

use askama::Template;

use crate::*;

#[derive(Template)]
#[template(path = "index.html")]
pub struct Dashboard<'a> {
    pub fw_version: &'a str,
    pub refresh_interval_secs: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Immutable page payloads keyed by request path.
#[derive(Clone, Debug, Default)]
pub struct StaticAssets {
    assets: HashMap<String, Asset>,
}

impl StaticAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// The asset set served by the firmware: the rendered dashboard at `/`.
    pub fn build(config: &MyConfig) -> anyhow::Result<Self> {
        let dashboard = Dashboard {
            fw_version: FW_VERSION,
            refresh_interval_secs: config.refresh_interval_secs.max(1),
        }
        .render()?;

        let mut assets = Self::new();
        assets.insert("/", CT_HTML, dashboard);
        Ok(assets)
    }

    pub fn insert(&mut self, path: &str, content_type: &'static str, body: impl Into<Vec<u8>>) {
        self.assets.insert(
            path.into(),
            Asset {
                content_type,
                body: body.into(),
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&Asset> {
        self.assets.get(path)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.assets.len()
    }
}


// EOF
