#![allow(clippy::new_without_default)]

use anyhow::Context;

pub mod builds;
pub mod config;
pub mod github;
pub mod handlers;
pub mod identity;
pub mod jenkins;
pub mod slack;
pub mod state;
pub mod subscriptions;
mod tables;

#[cfg(test)]
mod tests;

/// Decodes a JSON payload, naming the path of the field that failed.
pub fn deserialize_payload<T: serde::de::DeserializeOwned>(v: &[u8]) -> anyhow::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(v);
    let res: Result<T, _> = serde_path_to_error::deserialize(&mut deserializer);
    match res {
        Ok(r) => Ok(r),
        Err(e) => {
            let ctx = format!("at {:?}", e.path());
            Err(e.into_inner()).context(ctx)
        }
    }
}
