//! Core data types for action primitives

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::errors::ActionError;

/// Placeholder substituted with a 1-based row/option index in indexed anchors.
pub const INDEX_PLACEHOLDER: &str = "{n}";

/// Execution context for action primitives
///
/// Contains the runtime context needed to execute one call:
/// - Deadline for timeout enforcement
/// - Cancellation token for cooperative cancellation
/// - Unique action ID for tracing and correlation
#[derive(Clone, Debug)]
pub struct ExecCtx {
    /// Deadline for this operation
    pub deadline: Instant,

    /// Cancellation token for cooperative cancellation
    pub cancel_token: CancellationToken,

    /// Unique identifier for this action
    pub action_id: String,
}

impl ExecCtx {
    /// Create a new execution context
    pub fn new(deadline: Instant, cancel_token: CancellationToken) -> Self {
        Self {
            deadline,
            cancel_token,
            action_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Context whose deadline is `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    /// Check if this context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Check if this context has exceeded its deadline
    pub fn is_timeout(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get remaining time until deadline
    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Action execution report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    /// Whether the action succeeded
    pub ok: bool,

    /// When the action started
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// When the action finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub finished_at: DateTime<Utc>,

    /// Total latency in milliseconds
    pub latency_ms: u64,

    /// URL the document landed on (navigate only)
    pub url_after: Option<String>,

    /// Title after the action (navigate only)
    pub title_after: Option<String>,

    /// Error details (if failed)
    pub error: Option<String>,
}

impl ActionReport {
    /// Create a successful action report
    pub fn success(started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            ok: true,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            url_after: None,
            title_after: None,
            error: None,
        }
    }

    /// Create a failed action report
    pub fn failure(started_at: DateTime<Utc>, latency_ms: u64, error: &ActionError) -> Self {
        Self {
            ok: false,
            started_at,
            finished_at: Utc::now(),
            latency_ms,
            url_after: None,
            title_after: None,
            error: Some(error.to_string()),
        }
    }

    /// Attach the landed location
    pub fn with_location(mut self, url: String, title: Option<String>) -> Self {
        self.url_after = Some(url);
        self.title_after = title;
        self
    }
}

/// Anchor descriptor for element targeting
///
/// Represents different strategies for locating elements:
/// - CSS selector
/// - ARIA/AX attributes (role + name)
/// - Text content matching
///
/// Serialized as a single-key map (`css: "#id"`, `aria: { role, name }`,
/// `text: { content, exact }`) so locator tables read the same in YAML and JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AnchorRepr", into = "AnchorRepr")]
pub enum AnchorDescriptor {
    /// CSS selector
    Css(String),

    /// ARIA/AX role and accessible name
    Aria { role: String, name: String },

    /// Text content (exact or partial match)
    Text {
        content: String,
        #[serde(default)]
        exact: bool,
    },
}

impl AnchorDescriptor {
    pub fn css(selector: impl Into<String>) -> Self {
        AnchorDescriptor::Css(selector.into())
    }

    /// Selector string understood by the automation collaborator
    pub fn to_selector(&self) -> String {
        match self {
            AnchorDescriptor::Css(selector) => selector.clone(),
            AnchorDescriptor::Aria { role, name } => {
                format!("role={}[name=\"{}\"]", role, escape_quotes(name))
            }
            AnchorDescriptor::Text { content, exact } => {
                if *exact {
                    format!("text=\"{}\"", escape_quotes(content))
                } else {
                    format!("text={}", content)
                }
            }
        }
    }

    /// Whether the anchor carries an index placeholder
    pub fn is_indexed(&self) -> bool {
        match self {
            AnchorDescriptor::Css(selector) => selector.contains(INDEX_PLACEHOLDER),
            AnchorDescriptor::Aria { name, .. } => name.contains(INDEX_PLACEHOLDER),
            AnchorDescriptor::Text { content, .. } => content.contains(INDEX_PLACEHOLDER),
        }
    }

    /// Substitute the 1-based index into the placeholder
    pub fn with_index(&self, index: usize) -> Self {
        let fill = |value: &str| value.replace(INDEX_PLACEHOLDER, &index.to_string());
        match self {
            AnchorDescriptor::Css(selector) => AnchorDescriptor::Css(fill(selector)),
            AnchorDescriptor::Aria { role, name } => AnchorDescriptor::Aria {
                role: role.clone(),
                name: fill(name),
            },
            AnchorDescriptor::Text { content, exact } => AnchorDescriptor::Text {
                content: fill(content),
                exact: *exact,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AriaRepr {
    role: String,
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextRepr {
    content: String,
    #[serde(default)]
    exact: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnchorRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aria: Option<AriaRepr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<TextRepr>,
}

impl TryFrom<AnchorRepr> for AnchorDescriptor {
    type Error = String;

    fn try_from(repr: AnchorRepr) -> Result<Self, Self::Error> {
        match (repr.css, repr.aria, repr.text) {
            (Some(selector), None, None) => Ok(AnchorDescriptor::Css(selector)),
            (None, Some(AriaRepr { role, name }), None) => Ok(AnchorDescriptor::Aria { role, name }),
            (None, None, Some(TextRepr { content, exact })) => {
                Ok(AnchorDescriptor::Text { content, exact })
            }
            _ => Err("anchor needs exactly one of `css`, `aria` or `text`".to_string()),
        }
    }
}

impl From<AnchorDescriptor> for AnchorRepr {
    fn from(anchor: AnchorDescriptor) -> Self {
        match anchor {
            AnchorDescriptor::Css(selector) => AnchorRepr {
                css: Some(selector),
                ..AnchorRepr::default()
            },
            AnchorDescriptor::Aria { role, name } => AnchorRepr {
                aria: Some(AriaRepr { role, name }),
                ..AnchorRepr::default()
            },
            AnchorDescriptor::Text { content, exact } => AnchorRepr {
                text: Some(TextRepr { content, exact }),
                ..AnchorRepr::default()
            },
        }
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

impl fmt::Display for AnchorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorDescriptor::Css(s) => write!(f, "css:{}", s),
            AnchorDescriptor::Aria { role, name } => write!(f, "aria:{}[name='{}']", role, name),
            AnchorDescriptor::Text { content, exact } => {
                if *exact {
                    write!(f, "text:exact:'{}'", content)
                } else {
                    write!(f, "text:partial:'{}'", content)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_rendering() {
        assert_eq!(AnchorDescriptor::css("#add").to_selector(), "#add");
        let aria = AnchorDescriptor::Aria {
            role: "button".into(),
            name: "Add to Cart".into(),
        };
        assert_eq!(aria.to_selector(), "role=button[name=\"Add to Cart\"]");
        let text = AnchorDescriptor::Text {
            content: "No Thanks".into(),
            exact: true,
        };
        assert_eq!(text.to_selector(), "text=\"No Thanks\"");
    }

    #[test]
    fn index_substitution() {
        let anchor = AnchorDescriptor::css("#list li:nth-child({n})");
        assert!(anchor.is_indexed());
        assert_eq!(
            anchor.with_index(3),
            AnchorDescriptor::css("#list li:nth-child(3)")
        );
        assert!(!AnchorDescriptor::css("#add").is_indexed());
    }

    #[test]
    fn exec_ctx_deadline() {
        let ctx = ExecCtx::with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_timeout());
        assert!(!ctx.is_cancelled());
        assert!(ctx.remaining_time() <= Duration::from_secs(5));
        ctx.cancel_token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn anchor_yaml_shape() {
        let anchors: Vec<AnchorDescriptor> = serde_yaml::from_str(
            r##"
- css: "#add"
- aria: { role: button, name: "Add to Cart" }
- text: { content: "No Thanks", exact: true }
- text: { content: "Apply" }
"##,
        )
        .unwrap();
        assert_eq!(anchors[0], AnchorDescriptor::css("#add"));
        assert!(matches!(&anchors[1], AnchorDescriptor::Aria { role, .. } if role == "button"));
        assert_eq!(anchors[2].to_selector(), "text=\"No Thanks\"");
        assert_eq!(anchors[3].to_selector(), "text=Apply");

        let yaml = serde_yaml::to_string(&anchors[1]).unwrap();
        assert!(yaml.contains("aria:"));
        let json = serde_json::to_string(&anchors[0]).unwrap();
        assert_eq!(json, r##"{"css":"#add"}"##);
    }

    #[test]
    fn anchor_with_two_strategies_is_rejected() {
        let err = serde_yaml::from_str::<AnchorDescriptor>(r##"{ css: "#a", text: { content: "A" } }"##)
            .unwrap_err();
        assert!(err.to_string().contains("exactly one"));
        assert!(serde_yaml::from_str::<AnchorDescriptor>("{ xpath: //a }").is_err());
    }
}
