//! Store configuration.

use serde::{Deserialize, Serialize};

/// Options for an [`EntityStore`](crate::store::EntityStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Distinguishes several stores of the same name in log output.
    pub tag: Option<String>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let options: StoreOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, StoreOptions::default());

        let options: StoreOptions = serde_json::from_str(r#"{ "tag": "users" }"#).unwrap();
        assert_eq!(options, StoreOptions::new().tag("users"));
    }
}
