/// Availability payload published while the bridge is running.
pub const ONLINE: &str = "online";

/// Availability payload published (or set by the last will) when the bridge stops.
pub const OFFLINE: &str = "offline";

/// Builder for the bridge topic namespace.
///
/// Data topics live under a configurable base topic, discovery descriptors
/// under a configurable discovery prefix:
///
/// - availability: `{base}/status`
/// - platform status: `{prefix}/status`
/// - discovery: `{prefix}/{component}/{device_id}/{entity_id}/config`
/// - data: `{base}/{subtopic}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    base: String,
    discovery_prefix: String,
}

impl TopicBuilder {
    /// Create a new topic builder.
    pub fn new(base: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            discovery_prefix: discovery_prefix.into(),
        }
    }

    /// Get the base topic.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Get the discovery prefix.
    pub fn discovery_prefix(&self) -> &str {
        &self.discovery_prefix
    }

    /// Availability topic, also used as the last-will topic.
    ///
    /// # Example
    /// ```
    /// use printsight_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("creality/k1", "homeassistant");
    /// assert_eq!(topics.availability(), "creality/k1/status");
    /// ```
    pub fn availability(&self) -> String {
        format!("{}/status", self.base)
    }

    /// Status topic of the automation platform (announces its restarts).
    ///
    /// # Example
    /// ```
    /// use printsight_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("creality/k1", "homeassistant");
    /// assert_eq!(topics.platform_status(), "homeassistant/status");
    /// ```
    pub fn platform_status(&self) -> String {
        format!("{}/status", self.discovery_prefix)
    }

    /// Light state topic.
    pub fn light_state(&self) -> String {
        format!("{}/light_sw", self.base)
    }

    /// Light command topic.
    pub fn light_command(&self) -> String {
        format!("{}/light_sw/set", self.base)
    }

    /// Camera stream URL topic.
    pub fn camera_stream_url(&self) -> String {
        format!("{}/camera_stream_url", self.base)
    }

    /// Discovery config topic for a component and entity.
    ///
    /// # Example
    /// ```
    /// use printsight_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("creality/k1", "homeassistant");
    /// assert_eq!(
    ///     topics.discovery("sensor", "k1_se", "printer_status"),
    ///     "homeassistant/sensor/k1_se/printer_status/config"
    /// );
    /// ```
    pub fn discovery(&self, component: &str, device_id: &str, entity_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.discovery_prefix, component, device_id, entity_id
        )
    }

    /// Data topic under the base topic.
    ///
    /// # Example
    /// ```
    /// use printsight_common::topics::TopicBuilder;
    ///
    /// let topics = TopicBuilder::new("creality/k1", "homeassistant");
    /// assert_eq!(topics.data("job/progress"), "creality/k1/job/progress");
    /// ```
    pub fn data(&self, subtopic: &str) -> String {
        format!("{}/{}", self.base, subtopic)
    }
}

/// Whether a topic contains MQTT subscription wildcards.
pub fn has_wildcards(topic: &str) -> bool {
    topic.contains('+') || topic.contains('#')
}
