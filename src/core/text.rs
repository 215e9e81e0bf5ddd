//! Text pre-processing applied before a request reaches the orchestrator.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
// tag name plus optional attributes, closing slash included in the capture
static NAMED_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?[a-zA-Z0-9_]+(?: [^>]+)?)>").unwrap());

/// A transformation of the input text.
pub trait TextPreprocessor: Send + Sync {
    fn process(&self, text: &str) -> String;
}

/// Leaves the text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl TextPreprocessor for Passthrough {
    fn process(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Removes markup tags whose name is not in the allow-list.
///
/// Closing tags are matched by name without the slash. An empty allow-list
/// strips every tag.
#[derive(Debug, Clone, Default)]
pub struct TagWhitelist {
    allowed: HashSet<String>,
}

impl TagWhitelist {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl TextPreprocessor for TagWhitelist {
    fn process(&self, text: &str) -> String {
        if self.allowed.is_empty() {
            return ANY_TAG.replace_all(text, "").into_owned();
        }

        NAMED_TAG
            .replace_all(text, |caps: &Captures<'_>| {
                let name = caps[1]
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches('/');
                if self.allowed.contains(name) {
                    caps[0].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned()
    }
}

/// Runs preprocessors in order.
#[derive(Default)]
pub struct TextPipeline {
    stages: Vec<Box<dyn TextPreprocessor>>,
}

impl TextPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl TextPreprocessor + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Pipeline for an optional tag allow-list: passthrough when `None`.
    pub fn from_allowed_tags(allowed_tags: Option<&[String]>) -> Self {
        match allowed_tags {
            Some(tags) => Self::new().with_stage(TagWhitelist::new(tags.iter().cloned())),
            None => Self::new().with_stage(Passthrough),
        }
    }
}

impl TextPreprocessor for TextPipeline {
    fn process(&self, text: &str) -> String {
        self.stages
            .iter()
            .fold(text.to_string(), |acc, stage| stage.process(&acc))
    }
}
