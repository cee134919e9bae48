/// Session flags and interval timestamps, owned by the control loop and threaded
/// through every component call.
///
/// `config_displayed` and `engineering_mode` record "has ever succeeded": they can only
/// go from `false` to `true`, so they are private with one-way setters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Mirror of the link status, refreshed at the start of every cycle.
    pub connected: bool,
    config_displayed: bool,
    engineering_mode: bool,
    /// Last detection line or disconnection notice.
    pub last_report_ms: u32,
    pub last_config_retry_ms: u32,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config_displayed(&self) -> bool {
        self.config_displayed
    }

    pub fn engineering_mode(&self) -> bool {
        self.engineering_mode
    }

    pub fn mark_config_displayed(&mut self) {
        self.config_displayed = true;
    }

    pub fn mark_engineering_mode(&mut self) {
        self.engineering_mode = true;
    }
}
