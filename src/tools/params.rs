use schemars::JsonSchema;
use serde::Deserialize;

pub const UNIVERSAL_MODE: &str = "universal";

#[derive(Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Question to answer
    pub query: String,
    /// Answer mode: "universal" (default) runs the full cited, self-evaluated pipeline;
    /// any other value answers from a single web search without citations
    pub mode: Option<String>,
}

impl SearchParams {
    pub fn is_universal(&self) -> bool {
        self.mode
            .as_deref()
            .is_none_or(|mode| mode.trim().eq_ignore_ascii_case(UNIVERSAL_MODE))
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct QuickSearchParams {
    /// Question to answer from a single web search
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: Option<&str>) -> SearchParams {
        SearchParams {
            query: "q".into(),
            mode: mode.map(str::to_string),
        }
    }

    #[test]
    fn mode_defaults_to_universal() {
        assert!(params(None).is_universal());
        assert!(params(Some("universal")).is_universal());
        assert!(params(Some(" Universal ")).is_universal());
    }

    #[test]
    fn any_other_mode_is_quick() {
        assert!(!params(Some("quick")).is_universal());
        assert!(!params(Some("")).is_universal());
    }

    #[test]
    fn deserializes_without_mode() {
        let p: SearchParams = serde_json::from_str(r#"{"query": "rust"}"#).unwrap();
        assert_eq!(p.query, "rust");
        assert!(p.mode.is_none());
    }
}
