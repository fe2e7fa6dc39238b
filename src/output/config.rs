use std::env;

const ENV_OUTPUT_FORMAT: &str = "DIGEST_OUTPUT_FORMAT";
const ENV_OUTPUT_PRETTY: &str = "DIGEST_OUTPUT_PRETTY";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl OutputConfig {
    /// `--json` selects JSON unless DIGEST_OUTPUT_FORMAT names a format explicitly.
    pub fn resolve(json_flag: bool) -> Self {
        Self::from_lookup(json_flag, |k| env::var(k).ok())
    }

    pub fn from_lookup<F>(json_flag: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let format = match lookup(ENV_OUTPUT_FORMAT).as_deref() {
            Some("json") => OutputFormat::Json,
            Some("text") => OutputFormat::Text,
            _ if json_flag => OutputFormat::Json,
            _ => OutputFormat::Text,
        };
        let pretty = match lookup(ENV_OUTPUT_PRETTY).as_deref() {
            Some(v) => v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"),
            None => false,
        };
        OutputConfig { format, pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_and_env_override() {
        let none = |_: &str| None;
        assert_eq!(OutputConfig::from_lookup(true, none).format, OutputFormat::Json);
        assert_eq!(OutputConfig::from_lookup(false, none).format, OutputFormat::Text);

        let text = |k: &str| (k == ENV_OUTPUT_FORMAT).then(|| "text".to_string());
        assert_eq!(OutputConfig::from_lookup(true, text).format, OutputFormat::Text);

        let pretty = |k: &str| (k == ENV_OUTPUT_PRETTY).then(|| "YES".to_string());
        assert!(OutputConfig::from_lookup(true, pretty).pretty);
    }
}
