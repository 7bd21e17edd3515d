//! Assertions run against state after each step

use super::state::State;
use async_trait::async_trait;

/// A synchronous assertion over the state left by a step
pub trait StateCheck: Send + Sync {
    fn check(&self, state: &State) -> Result<(), String>;
}

impl<F> StateCheck for F
where
    F: Fn(&State) -> Result<(), String> + Send + Sync,
{
    fn check(&self, state: &State) -> Result<(), String> {
        self(state)
    }
}

/// Verifies the remote objects are gone once teardown has run
#[async_trait]
pub trait DestroyCheck: Send + Sync {
    async fn check_destroy(&self, state: &State) -> Result<(), String>;
}

/// Attribute `key` of `address` equals `value` in flattened form
pub fn check_resource_attr(
    address: &str,
    key: &str,
    value: impl Into<String>,
) -> Box<dyn StateCheck> {
    let address = address.to_string();
    let key = key.to_string();
    let value = value.into();
    Box::new(move |state: &State| -> Result<(), String> {
        let flat = flat_attributes(state, &address)?;
        match flat.get(&key) {
            Some(actual) if *actual == value => Ok(()),
            Some(actual) => Err(format!(
                "{}: Attribute '{}' expected \"{}\", got \"{}\"",
                address, key, value, actual
            )),
            None if value.is_empty() => Ok(()),
            None => Err(format!(
                "{}: Attribute '{}' expected \"{}\", got no value",
                address, key, value
            )),
        }
    })
}

/// Attribute `key` of `address` has any non-empty value
pub fn check_resource_attr_set(address: &str, key: &str) -> Box<dyn StateCheck> {
    let address = address.to_string();
    let key = key.to_string();
    Box::new(move |state: &State| -> Result<(), String> {
        let flat = flat_attributes(state, &address)?;
        match flat.get(&key) {
            Some(v) if !v.is_empty() => Ok(()),
            _ => Err(format!("{}: Attribute '{}' expected to be set", address, key)),
        }
    })
}

/// Attribute `key` of `address` is absent or null
pub fn check_no_resource_attr(address: &str, key: &str) -> Box<dyn StateCheck> {
    let address = address.to_string();
    let key = key.to_string();
    Box::new(move |state: &State| -> Result<(), String> {
        let flat = flat_attributes(state, &address)?;
        match flat.get(&key) {
            Some(v) if !v.is_empty() => Err(format!(
                "{}: Attribute '{}' found when not expected (\"{}\")",
                address, key, v
            )),
            _ => Ok(()),
        }
    })
}

/// Runs every check in order, stopping at the first failure
pub fn compose_check(checks: Vec<Box<dyn StateCheck>>) -> Box<dyn StateCheck> {
    Box::new(move |state: &State| -> Result<(), String> {
        for (idx, check) in checks.iter().enumerate() {
            check
                .check(state)
                .map_err(|e| format!("Check {}/{} error: {}", idx + 1, checks.len(), e))?;
        }
        Ok(())
    })
}

fn flat_attributes(
    state: &State,
    address: &str,
) -> Result<std::collections::BTreeMap<String, String>, String> {
    state
        .resource(address)
        .map(|r| r.flatten())
        .ok_or_else(|| format!("Not found: {} in state", address))
}
