#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
/// Config values for [`Runner`](crate::Runner).
pub struct RunnerConfig {
    /// Name used when logging about this runner
    pub name: String,
    /// Whether [`Runner::defer`](crate::Runner::defer) replaces a waiting request
    /// (restarting its delay) instead of coalescing into it
    pub reset_if_idle: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "runner".to_string(),
            reset_if_idle: true,
        }
    }
}

impl RunnerConfig {
    /// Config with a custom name and default behaviour
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
