use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    pub id: String,
    pub text_content: String,
}

impl Script {
    pub fn new(id: impl Into<String>, text_content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text_content: text_content.into(),
        }
    }
}

/// Read side of script storage. CRUD lives elsewhere.
pub trait ScriptProvider: Send + Sync {
    fn script_by_id(&self, id: &str) -> Option<Script>;
}

#[derive(Debug, Default)]
pub struct InMemoryScripts {
    scripts: RwLock<HashMap<String, Script>>,
}

impl InMemoryScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, script: Script) {
        self.scripts.write().insert(script.id.clone(), script);
    }

    pub fn with(self, script: Script) -> Self {
        self.insert(script);
        self
    }
}

impl ScriptProvider for InMemoryScripts {
    fn script_by_id(&self, id: &str) -> Option<Script> {
        self.scripts.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_inserted_scripts() {
        let scripts = InMemoryScripts::new().with(Script::new("pilot", "INT. STUDIO - DAY"));
        assert_eq!(
            scripts.script_by_id("pilot").map(|s| s.text_content),
            Some("INT. STUDIO - DAY".to_string())
        );
        assert!(scripts.script_by_id("missing").is_none());
    }
}
