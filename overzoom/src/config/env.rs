//! Environment variable access for config file substitution.
//!
//! - [`OsEnv`]: reads the process environment
//! - [`FauxEnv`]: fixed variables for tests

use std::collections::HashMap;

use subst::VariableMap;

/// Process environment, as seen by `${VAR}` substitution in config files.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEnv;

impl<'a> VariableMap<'a> for OsEnv {
    type Value = String;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        std::env::var(key).ok()
    }
}

/// Test implementation with configurable environment variables.
#[derive(Debug, Default, Clone)]
pub struct FauxEnv(pub HashMap<&'static str, String>);

impl<'a> VariableMap<'a> for FauxEnv {
    type Value = &'a str;

    fn get(&'a self, key: &str) -> Option<Self::Value> {
        self.0.get(key).map(String::as_str)
    }
}

impl<const N: usize> From<[(&'static str, &str); N]> for FauxEnv {
    fn from(vars: [(&'static str, &str); N]) -> Self {
        Self(vars.into_iter().map(|(k, v)| (k, v.to_string())).collect())
    }
}
