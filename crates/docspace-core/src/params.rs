use std::collections::HashMap;

use serde::de::value::{Error as ValueError, MapDeserializer};
use serde::de::DeserializeOwned;

/// Segments captured from the matched route, e.g. `number` in `/company/{number}`.
#[derive(Clone, Debug, Default)]
pub struct PathParams {
    captured: HashMap<String, String>,
}

impl PathParams {
    pub fn new(captured: HashMap<String, String>) -> Self {
        Self { captured }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.captured.get(key).map(String::as_str)
    }

    /// Deserialize the captured segments as a struct keyed by segment name.
    pub fn deserialize<T>(&self) -> Result<T, ValueError>
    where
        T: DeserializeOwned,
    {
        let entries = self
            .captured
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()));
        T::deserialize(MapDeserializer::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct CompanyPath {
        number: String,
    }

    fn captured(number: &str) -> PathParams {
        PathParams::new(HashMap::from([("number".to_string(), number.to_string())]))
    }

    #[test]
    fn looks_up_segments_by_name() {
        let params = captured("RC000123");
        assert_eq!(params.get("number"), Some("RC000123"));
        assert!(params.get("provider").is_none());
    }

    #[test]
    fn deserializes_into_named_struct() {
        let parsed: CompanyPath = captured("00000006").deserialize().expect("params");
        assert_eq!(parsed.number, "00000006");
    }

    #[test]
    fn missing_segments_fail_to_deserialize() {
        let result = PathParams::default().deserialize::<CompanyPath>();
        assert!(result.unwrap_err().to_string().contains("number"));
    }
}
