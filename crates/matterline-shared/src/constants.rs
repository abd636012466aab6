//! Protocol constants shared across the workspace.

use std::time::Duration;

/// REST API prefix, appended to the login domain.
pub const API_PREFIX: &str = "/api/v4";

/// Page size for the bulk user fetch.
pub const USERS_PER_PAGE: u32 = 200;

/// Page size for channel post history fetches.
pub const POSTS_PER_PAGE: u32 = 200;

/// `device_id` reported in the login request.
pub const DEVICE_ID: &str = "matterline";

/// Resend interval for an outgoing post that has not seen its echo yet.
pub const SEND_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Delay before re-login after the server reports an expired session.
pub const RELOGIN_BACKOFF: Duration = Duration::from_secs(1);

/// Action name of the event-socket authentication challenge.
pub const SOCKET_AUTH_ACTION: &str = "authentication_challenge";

/// Number of pages needed to hold `total` items, `capacity` items each.
pub fn page_count(total: u32, capacity: u32) -> u32 {
    if total == 0 {
        0
    } else {
        (total - 1) / capacity + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 200), 0);
        assert_eq!(page_count(1, 200), 1);
        assert_eq!(page_count(200, 200), 1);
        assert_eq!(page_count(201, 200), 2);
        assert_eq!(page_count(999, 200), 5);
    }
}
