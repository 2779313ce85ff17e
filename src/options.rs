//! Compile options, loadable from a JSON file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Superclass name that marks a class as a component.
    pub marker_base: String,
    /// Superclass written into the output.
    pub element_base: String,
    /// Reported alongside error locations.
    pub file_id: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            marker_base: "HeneElement".to_string(),
            element_base: "HTMLElement".to_string(),
            file_id: None,
        }
    }
}

impl CompileOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn with_file_id(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }
}
