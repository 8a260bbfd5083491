use regex::Regex;

/// A compiled regex bound to a platform and the capture group holding the
/// track ID, with examples used for self-validation at registration time.
#[derive(Debug, Clone)]
pub struct URLPattern {
    pub platform: String,
    pub regex: Regex,
    pub capture_group: usize,
    pub description: Option<String>,
    pub examples: Vec<String>,
}

impl URLPattern {
    pub fn new(platform: impl Into<String>, regex: Regex, capture_group: usize) -> Self {
        Self {
            platform: platform.into(),
            regex,
            capture_group,
            description: None,
            examples: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_examples(mut self, examples: impl IntoIterator<Item = &'static str>) -> Self {
        self.examples = examples.into_iter().map(String::from).collect();
        self
    }

    /// Asserts the regex yields a non-empty capture at `capture_group` for
    /// every declared example.
    pub fn validate(&self) -> Result<(), String> {
        if self.platform.is_empty() {
            return Err("platform name is required".to_string());
        }
        if self.capture_group < 1 {
            return Err("capture group index must be >= 1".to_string());
        }
        for example in &self.examples {
            let caps = self
                .regex
                .captures(example)
                .ok_or_else(|| format!("pattern for {} does not match example {}", self.platform, example))?;
            let group = caps
                .get(self.capture_group)
                .ok_or_else(|| format!("pattern for {} has no group {} in example {}", self.platform, self.capture_group, example))?;
            if group.as_str().is_empty() {
                return Err(format!("pattern for {} yields an empty capture on example {}", self.platform, example));
            }
        }
        Ok(())
    }

    pub fn extract(&self, url: &str) -> Option<String> {
        self.regex
            .captures(url)
            .and_then(|caps| caps.get(self.capture_group))
            .map(|m| m.as_str().to_string())
    }
}
