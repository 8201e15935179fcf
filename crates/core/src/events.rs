//! Event vocabulary shared by the schema set and the session derivation.

/// Event name values for the `name` column.
pub mod names {
    pub const SCREEN_VIEW: &str = "screen_view";
    pub const SESSION_START: &str = "session_start";
    pub const SESSION_END: &str = "session_end";
    pub const REVENUE: &str = "revenue";

    /// Lifecycle events emitted by the SDK, excluded from `event_count`.
    pub const HOUSEKEEPING: &[&str] = &[SESSION_START, SESSION_END];

    /// Events whose page becomes the session's exit page.
    pub const EXIT_CANDIDATES: &[&str] = &[SESSION_END, SCREEN_VIEW];
}

/// Keys inside the `properties` map that carry meaning for derivation.
pub mod properties {
    /// Explicit bounce flag attached to `session_end` (`"true"`/`"false"`).
    pub const BOUNCE: &str = "__bounce";

    /// Values of [`BOUNCE`] that mean the session bounced.
    pub const BOUNCE_TRUE_VALUES: &[&str] = &["true", "1"];

    pub const UTM_MEDIUM: &str = "__query.utm_medium";
    pub const UTM_SOURCE: &str = "__query.utm_source";
    pub const UTM_CAMPAIGN: &str = "__query.utm_campaign";
    pub const UTM_CONTENT: &str = "__query.utm_content";
    pub const UTM_TERM: &str = "__query.utm_term";

    /// `(session column, property key)` pairs pinned from the start event.
    pub const UTM: &[(&str, &str)] = &[
        ("utm_medium", UTM_MEDIUM),
        ("utm_source", UTM_SOURCE),
        ("utm_campaign", UTM_CAMPAIGN),
        ("utm_content", UTM_CONTENT),
        ("utm_term", UTM_TERM),
    ];
}

/// Whether an explicit bounce property value means "bounced".
pub fn bounce_flag(value: &str) -> bool {
    properties::BOUNCE_TRUE_VALUES.contains(&value)
}
