use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use murmur_shared::{CallKind, ContactId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Already in a call")]
    AlreadyInCall,

    #[error("Not in a call")]
    NotInCall,

    #[error("Video is not available on an audio call")]
    VideoUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Ringing,
    Connected,
    Ended,
}

/// One opening of the call overlay.
///
/// Every session starts ringing with fresh flags; nothing carries over
/// from a previous call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    pub id: Uuid,
    pub contact: ContactId,
    pub kind: CallKind,
    pub state: CallState,
    pub is_muted: bool,
    pub is_speaker_on: bool,
    pub is_video_enabled: bool,
}

impl CallSession {
    pub fn open(contact: ContactId, kind: CallKind) -> Self {
        debug!(contact = %contact.short(), kind = %kind, "Call ringing");
        Self {
            id: Uuid::new_v4(),
            contact,
            kind,
            state: CallState::Ringing,
            is_muted: false,
            is_speaker_on: true,
            is_video_enabled: kind == CallKind::Video,
        }
    }

    /// Ringing -> Connected. Returns whether the state changed.
    pub fn answer(&mut self) -> bool {
        if self.state != CallState::Ringing {
            return false;
        }
        self.state = CallState::Connected;
        debug!(call_id = %self.id, "Call connected");
        true
    }

    /// Ringing or Connected -> Ended. Returns whether the state changed.
    pub fn end(&mut self) -> bool {
        if self.state == CallState::Ended {
            return false;
        }
        self.state = CallState::Ended;
        debug!(call_id = %self.id, "Call ended");
        true
    }

    pub fn is_ended(&self) -> bool {
        self.state == CallState::Ended
    }

    /// Flip the microphone mute. Accepted before the call connects; only
    /// ignored once it has ended.
    pub fn toggle_mute(&mut self) -> bool {
        if !self.is_ended() {
            self.is_muted = !self.is_muted;
            debug!(muted = self.is_muted, "Mute toggled");
        }
        self.is_muted
    }

    pub fn toggle_speaker(&mut self) -> bool {
        if !self.is_ended() {
            self.is_speaker_on = !self.is_speaker_on;
            debug!(speaker = self.is_speaker_on, "Speaker toggled");
        }
        self.is_speaker_on
    }

    pub fn toggle_video(&mut self) -> Result<bool, CallError> {
        if self.kind != CallKind::Video {
            return Err(CallError::VideoUnavailable);
        }
        if !self.is_ended() {
            self.is_video_enabled = !self.is_video_enabled;
            debug!(video = self.is_video_enabled, "Video toggled");
        }
        Ok(self.is_video_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_ringing_with_defaults() {
        let audio = CallSession::open(ContactId::new(), CallKind::Audio);
        assert_eq!(audio.state, CallState::Ringing);
        assert!(!audio.is_muted);
        assert!(audio.is_speaker_on);
        assert!(!audio.is_video_enabled);

        let video = CallSession::open(ContactId::new(), CallKind::Video);
        assert_eq!(video.state, CallState::Ringing);
        assert!(video.is_video_enabled);
    }

    #[test]
    fn test_lifecycle() {
        let mut call = CallSession::open(ContactId::new(), CallKind::Audio);
        assert!(call.answer());
        assert_eq!(call.state, CallState::Connected);
        assert!(!call.answer());

        assert!(call.end());
        assert!(call.is_ended());
        assert!(!call.end());
        assert!(!call.answer());
    }

    #[test]
    fn test_hang_up_while_ringing() {
        let mut call = CallSession::open(ContactId::new(), CallKind::Video);
        assert!(call.end());
        assert_eq!(call.state, CallState::Ended);
    }

    #[test]
    fn test_toggles_accepted_before_connect() {
        let mut call = CallSession::open(ContactId::new(), CallKind::Video);
        assert!(call.toggle_mute());
        assert!(!call.toggle_speaker());
        assert_eq!(call.toggle_video(), Ok(false));

        call.answer();
        assert!(call.is_muted);
        assert!(!call.is_speaker_on);
        assert!(!call.is_video_enabled);
    }

    #[test]
    fn test_video_toggle_rejected_on_audio_call() {
        let mut call = CallSession::open(ContactId::new(), CallKind::Audio);
        assert_eq!(call.toggle_video(), Err(CallError::VideoUnavailable));
        assert!(!call.is_video_enabled);
    }

    #[test]
    fn test_toggles_frozen_after_end() {
        let mut call = CallSession::open(ContactId::new(), CallKind::Audio);
        call.answer();
        call.end();
        assert!(!call.toggle_mute());
        assert!(call.toggle_speaker());
    }

    #[test]
    fn test_new_session_resets_flags() {
        let contact = ContactId::new();
        let mut first = CallSession::open(contact, CallKind::Video);
        first.answer();
        first.toggle_mute();
        first.toggle_video().unwrap();
        first.end();

        let second = CallSession::open(contact, CallKind::Video);
        assert_ne!(first.id, second.id);
        assert!(!second.is_muted);
        assert!(second.is_video_enabled);
        assert!(second.is_speaker_on);
    }

    #[test]
    fn test_serializes_for_presentation() {
        let call = CallSession::open(ContactId::new(), CallKind::Video);
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["state"], "ringing");
        assert_eq!(json["kind"], "video");
        assert_eq!(json["isSpeakerOn"], true);
        assert_eq!(json["isMuted"], false);
    }
}
