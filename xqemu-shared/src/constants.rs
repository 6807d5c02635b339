//! Defaults shared by the library and the binary.

/// QMP control endpoint.
pub mod qmp {
    use std::time::Duration;

    /// Host used both in the `-qmp` directive and by the client.
    pub const HOST: &str = "localhost";

    pub const PORT: u16 = 4444;

    pub const CONNECT_ATTEMPTS: u32 = 5;

    /// Pause between connect attempts (none before the first).
    pub const CONNECT_DELAY: Duration = Duration::from_secs(1);

    pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Emulator process handling.
pub mod process {
    use std::time::Duration;

    /// Time allowed between SIGTERM and a hard kill.
    pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);
}

/// Files used by the command-line front end.
pub mod files {
    pub const SETTINGS: &str = "./settings.json";

    pub const SCREENSHOT: &str = "screenshot.ppm";
}
