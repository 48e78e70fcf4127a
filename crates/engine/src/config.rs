/// Engine configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development and
/// tests. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Buffered events per room channel (default: `256`).
    pub room_capacity: usize,
    /// Attempts to draw an unused pin before giving up (default: `25`).
    pub pin_attempts: u32,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default |
    /// |----------------------|---------|
    /// | `QUIZ_ROOM_CAPACITY` | `256`   |
    /// | `QUIZ_PIN_ATTEMPTS`  | `25`    |
    pub fn from_env() -> Self {
        let room_capacity: usize = std::env::var("QUIZ_ROOM_CAPACITY")
            .unwrap_or_else(|_| "256".into())
            .parse()
            .expect("QUIZ_ROOM_CAPACITY must be a valid usize");

        let pin_attempts: u32 = std::env::var("QUIZ_PIN_ATTEMPTS")
            .unwrap_or_else(|_| "25".into())
            .parse()
            .expect("QUIZ_PIN_ATTEMPTS must be a valid u32");

        Self {
            room_capacity,
            pin_attempts,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            room_capacity: 256,
            pin_attempts: 25,
        }
    }
}
