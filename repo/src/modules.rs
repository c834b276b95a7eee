use crate::prelude::*;

/// Identity of a module stream, `module:stream`.
///
/// One identity covers many stream builds over time; the snapshot assigns each build its
/// own stream id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleStream {
    #[serde(rename = "module_name")]
    pub module: String,
    #[serde(rename = "module_stream")]
    pub stream: String,
}

impl ModuleStream {
    pub fn new(module: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            stream: stream.into(),
        }
    }
}

impl fmt::Display for ModuleStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.stream)
    }
}

/// A concrete module build shipped by an advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    #[serde(rename = "module_name")]
    pub name: String,
    #[serde(rename = "module_stream")]
    pub stream: String,
    #[serde(rename = "module_version")]
    pub version: String,
    #[serde(rename = "module_context")]
    pub context: String,
}

#[test]
fn test_module_stream_wire_names() {
    let ms: ModuleStream =
        serde_json::from_str(r#"{"module_name": "postgresql", "module_stream": "10"}"#).unwrap();
    assert_eq!(ms, ModuleStream::new("postgresql", "10"));
    assert_eq!(ms.to_string(), "postgresql:10");
    assert_eq!(
        serde_json::to_value(&ms).unwrap(),
        serde_json::json!({"module_name": "postgresql", "module_stream": "10"})
    );
}
