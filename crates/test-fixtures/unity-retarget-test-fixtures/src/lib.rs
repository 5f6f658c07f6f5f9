//! Shared JSON fixtures (clips and skeletons) for tests and benches.
//!
//! Paths are resolved through `fixtures/manifest.json` at the workspace root.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    clips: HashMap<String, String>,
    skeletons: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a>(map: &'a HashMap<String, String>, kind: &str, name: &str) -> Result<&'a str> {
    map.get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

fn sorted_keys(map: &HashMap<String, String>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

pub mod clips {
    use super::*;

    pub fn keys() -> Vec<String> {
        sorted_keys(&MANIFEST.clips)
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.clips, "clip", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        super::load_json(lookup(&MANIFEST.clips, "clip", name)?)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(&MANIFEST.clips, "clip", name)?))
    }
}

pub mod skeletons {
    use super::*;

    pub fn keys() -> Vec<String> {
        sorted_keys(&MANIFEST.skeletons)
    }

    pub fn json(name: &str) -> Result<String> {
        read_to_string(lookup(&MANIFEST.skeletons, "skeleton", name)?)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        super::load_json(lookup(&MANIFEST.skeletons, "skeleton", name)?)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(resolve_path(lookup(&MANIFEST.skeletons, "skeleton", name)?))
    }
}
