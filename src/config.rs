use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5001";

/// Server settings.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the listener binds to.
    pub listen_addr: String,
    /// Maximum number of distinct keys, unlimited when `None`.
    pub max_keys: Option<usize>,
    /// How many events connection handlers may queue for the coordinator before they wait.
    pub channel_capacity: usize,
    /// Largest amount of buffered, not yet parsed, bytes accepted from a single client.
    pub max_frame_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_keys: None,
            channel_capacity: 64,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
