/// Application name
pub const APP_NAME: &str = "murmur";

/// Delay between sending a message and issuing the reply request (ms)
pub const REPLY_DELAY_MS: u64 = 1_000;

/// Time a call stays ringing before it is considered answered (ms)
pub const RING_DELAY_MS: u64 = 3_000;

/// Time an ended call stays on screen before the surface closes (ms)
pub const END_HOLD_MS: u64 = 1_000;

/// Divisor used to estimate voice-note duration from its byte size
pub const VOICE_BYTES_PER_SECOND: usize = 16_000;

/// MIME type of finalized voice notes
pub const VOICE_MIME_TYPE: &str = "audio/wav";

/// Display text of a voice message
pub const VOICE_MESSAGE_LABEL: &str = "Voice message";

/// Notice appended in place of a reply when the reply backend fails
pub const FALLBACK_NOTICE: &str =
    "I'm having trouble connecting to Mistral AI. Please check your API key and try again.";
