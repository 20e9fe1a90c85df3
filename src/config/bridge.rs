//! Bridge Configuration
//!
//! Configuration structures for external system bridges.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::external::ConnectParams;

/// External system a bridge connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BridgeKind {
    /// Notification fan-out service
    #[default]
    #[serde(rename = "notification")]
    Notification,
    /// Queue-manager based message-oriented middleware
    #[serde(rename = "queue_manager")]
    QueueManager,
    /// Pub/sub log
    #[serde(rename = "pubsub")]
    PubSub,
}

impl BridgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeKind::Notification => "notification",
            BridgeKind::QueueManager => "queue_manager",
            BridgeKind::PubSub => "pubsub",
        }
    }

    /// Get default port for this kind of system
    pub fn default_port(&self) -> u16 {
        match self {
            BridgeKind::Notification => crate::external::notification::DEFAULT_PORT,
            BridgeKind::QueueManager => crate::external::queue_manager::DEFAULT_PORT,
            BridgeKind::PubSub => crate::external::pubsub::DEFAULT_PORT,
        }
    }

    /// Whether inbound traffic is polled rather than pushed
    pub fn polls(&self) -> bool {
        matches!(self, BridgeKind::QueueManager)
    }
}

impl fmt::Display for BridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a link relative to the local broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// Local destination forwarded to a remote destination
    #[default]
    Out,
    /// Remote destination delivered into a local destination
    In,
}

impl LinkDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkDirection::Out => "out",
            LinkDirection::In => "in",
        }
    }
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link registered once the bridge is active
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinkRule {
    /// Destination name on the local broker (may be a filter for outbound links)
    pub local: String,

    /// Destination name on the external system; defaults to the local name
    #[serde(default)]
    pub remote: Option<String>,

    #[serde(default)]
    pub direction: LinkDirection,

    /// Selector for inbound links; only honored by bridges that filter remotely
    #[serde(default)]
    pub filter: Option<String>,
}

impl LinkRule {
    pub fn remote_name(&self) -> &str {
        self.remote.as_deref().unwrap_or(&self.local)
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == LinkDirection::Out
    }

    pub fn is_inbound(&self) -> bool {
        self.direction == LinkDirection::In
    }
}

/// A system-specific option value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(v) => write!(f, "{}", v),
            OptionValue::Integer(v) => write!(f, "{}", v),
            OptionValue::Float(v) => write!(f, "{}", v),
            OptionValue::String(v) => f.write_str(v),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::String(value.to_string())
    }
}

/// Configuration for a single bridge
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Unique name for this bridge
    pub name: String,

    /// External system kind
    #[serde(default)]
    pub kind: BridgeKind,

    /// External endpoint, `scheme://host[:port]` or `host[:port]`
    pub url: String,

    /// Username for authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for authentication
    #[serde(default)]
    pub password: Option<String>,

    /// Whether this bridge is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bound on the external connect
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Poll period for poll-driven bridges
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Bound on a single receive within a poll tick
    #[serde(default = "default_receive_timeout", with = "humantime_serde")]
    pub receive_timeout: Duration,

    /// System-specific options (`topic_arn`, `queue_manager`, `subscription_name`, ...)
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,

    /// Links registered after the bridge initialises
    #[serde(default, alias = "link")]
    pub links: Vec<LinkRule>,
}

fn default_true() -> bool {
    true
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_receive_timeout() -> Duration {
    Duration::from_millis(500)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            kind: BridgeKind::default(),
            url: "localhost".to_string(),
            username: None,
            password: None,
            enabled: true,
            connect_timeout: default_connect_timeout(),
            poll_interval: default_poll_interval(),
            receive_timeout: default_receive_timeout(),
            options: BTreeMap::new(),
            links: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Parse the url into host and port, using the kind's default port
    pub fn parse_url(&self) -> (String, u16) {
        let rest = self
            .url
            .split_once("://")
            .map_or(self.url.as_str(), |(_, rest)| rest);
        let authority = rest.split('/').next().unwrap_or(rest);
        let authority = authority
            .rsplit_once('@')
            .map_or(authority, |(_, host)| host);

        if let Some((host, port_str)) = authority.rsplit_once(':') {
            if let Ok(port) = port_str.parse::<u16>() {
                return (host.to_string(), port);
            }
        }
        (authority.to_string(), self.kind.default_port())
    }

    /// Look up an option as a string
    pub fn option(&self, name: &str) -> Option<String> {
        self.options.get(name).map(|v| v.to_string())
    }

    /// Connection parameters handed to the external connector
    pub fn connect_params(&self) -> ConnectParams {
        let (host, port) = self.parse_url();
        ConnectParams {
            host,
            port,
            username: self.username.clone(),
            password: self.password.clone(),
            options: self
                .options
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        }
    }

    /// Get outbound links (local → remote)
    pub fn outbound_links(&self) -> impl Iterator<Item = &LinkRule> {
        self.links.iter().filter(|l| l.is_outbound())
    }

    /// Get inbound links (remote → local)
    pub fn inbound_links(&self) -> impl Iterator<Item = &LinkRule> {
        self.links.iter().filter(|l| l.is_inbound())
    }
}
