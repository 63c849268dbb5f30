pub mod time {
    use std::time::Duration;

    /// Returns the current timestamp as a `Duration` since the UNIX epoch.
    #[must_use]
    pub fn get_current_timestamp() -> Duration {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time went backwards")
    }
}
