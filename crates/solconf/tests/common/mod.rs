//! shared helpers for integration tests
#![allow(dead_code)]

use solconf::{ConfigOptions, LoaderContext, OverrideSpec, Value};
use std::path::PathBuf;

/// A package directory with configuration files, removed when dropped
pub struct Package {
    dir: tempfile::TempDir,
}

impl Package {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("temporary directory");
        for (name, text) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, text).unwrap();
        }
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Load and resolve `main.solconf` with a fresh context
    pub fn load(&self, overrides: &[&str]) -> solconf::Result<Value> {
        self.load_with(&LoaderContext::default(), overrides)
    }

    pub fn load_with(&self, context: &LoaderContext, overrides: &[&str]) -> solconf::Result<Value> {
        context.load_config(
            &self.path("main.solconf"),
            ConfigOptions {
                overrides: overrides.iter().map(|o| OverrideSpec::from(*o)).collect(),
                ..Default::default()
            },
        )
    }

    /// Load `main.solconf` and convert the result for comparison with `serde_json::json!`
    pub fn json(&self, overrides: &[&str]) -> serde_json::Value {
        let value = self.load(overrides).expect("configuration loads");
        serde_json::to_value(&value).expect("resolved value serializes")
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("SOLCONF_LOG"))
        .with_test_writer()
        .try_init();
}
