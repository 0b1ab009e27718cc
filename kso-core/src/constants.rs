//! Client-wide constants.

/// Signature scheme identifier used in the handshake authorization header.
pub const SIGNATURE_SCHEME: &str = "KSO-1";

/// Handshake date header.
pub const HEADER_DATE: &str = "X-Kso-Date";

/// Handshake authorization header.
pub const HEADER_AUTHORIZATION: &str = "X-Kso-Authorization";

/// Header requesting per-event acknowledgement delivery.
pub const HEADER_ACK_MODE: &str = "X-Ack-Mode";

/// Value of [`HEADER_ACK_MODE`] when ACK mode is on.
pub const ACK_MODE_REQUIRED: &str = "required";

/// Default push service endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://openapi.wps.cn/v7/event/ws";

/// Default handshake/send deadline in milliseconds.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Default pong-liveness deadline in milliseconds.
pub const DEFAULT_PONG_TIMEOUT_MS: u64 = 90_000;

/// Default reconnect backoff base in milliseconds.
pub const DEFAULT_RECONNECT_BASE_INTERVAL_MS: u64 = 1_000;

/// Default reconnect backoff cap in milliseconds.
pub const DEFAULT_RECONNECT_MAX_INTERVAL_MS: u64 = 60_000;

/// Default reconnect backoff growth factor.
pub const DEFAULT_RECONNECT_MULTIPLIER: f64 = 2.0;

/// Default maximum reconnect attempts (-1 = unlimited).
pub const DEFAULT_RECONNECT_MAX_RETRY: i32 = -1;

/// Default reconnect jitter fraction.
pub const DEFAULT_RECONNECT_JITTER: f64 = 0.2;

/// ACK status for an event whose handler returned normally.
pub const ACK_CODE_OK: u16 = 200;

/// ACK status for an event whose handler failed.
pub const ACK_CODE_HANDLER_ERROR: u16 = 500;

/// Maximum length in bytes of the ACK error message before truncation.
pub const ACK_MSG_MAX_BYTES: usize = 256;

/// Frame type tag of a server teardown notification.
pub const FRAME_TYPE_GOAWAY: &str = "goaway";

/// Frame type tag of an outbound acknowledgement.
pub const FRAME_TYPE_ACK: &str = "ack";

/// Canonical event codes delivered by the push service.
pub mod event_codes {
    /// A chat message was sent to the application.
    pub const CHAT_MESSAGE_CREATE: &str = "kso.app_chat.message.create";
    /// A chat with the application was created.
    pub const CHAT_CREATE: &str = "kso.app_chat.create";
    /// A group chat was deleted.
    pub const GROUP_CHAT_DELETE: &str = "kso.xz.app.group_chat.delete";
    /// A user joined a group chat.
    pub const GROUP_CHAT_MEMBER_USER_CREATE: &str = "kso.xz.app.group_chat.member.user.create";
    /// A user left or was removed from a group chat.
    pub const GROUP_CHAT_MEMBER_USER_DELETE: &str = "kso.xz.app.group_chat.member.user.delete";
    /// A robot was added to a group chat.
    pub const GROUP_CHAT_MEMBER_ROBOT_CREATE: &str = "kso.xz.app.group_chat.member.robot.create";
    /// A robot was removed from a group chat.
    pub const GROUP_CHAT_MEMBER_ROBOT_DELETE: &str = "kso.xz.app.group_chat.member.robot.delete";

    /// All canonical event codes.
    pub const ALL: &[&str] = &[
        CHAT_MESSAGE_CREATE,
        CHAT_CREATE,
        GROUP_CHAT_DELETE,
        GROUP_CHAT_MEMBER_USER_CREATE,
        GROUP_CHAT_MEMBER_USER_DELETE,
        GROUP_CHAT_MEMBER_ROBOT_CREATE,
        GROUP_CHAT_MEMBER_ROBOT_DELETE,
    ];
}
