//! Conversation session event loop.
//!
//! All session state lives in one tokio task. The presentation layer drives
//! it through a [`SessionHandle`] (typed commands with oneshot replies) and
//! observes it through a `watch` channel of [`SessionView`] snapshots.
//! Replies, microphone acquisition and call timers run as spawned tasks that
//! report back over an internal completion channel, so a slow backend never
//! blocks input.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use murmur_media::{
    attach, AudioCaptureDevice, CallError, CallSession, CaptureConfig, CaptureError, CaptureState,
    CapturePipeline, CpalMicrophone, MicrophoneStream,
};
use murmur_shared::{Author, CallKind, Contact, ContactId, FileResource, Message, MessageId};
use murmur_store::MessageStore;

use crate::config::{ClientConfig, SessionTimings};
use crate::error::SessionError;
use crate::reply::{ChatCompletionsBackend, ReplyBackend, ReplyError, ReplyOutcome, ReplySimulator};
use crate::view::SessionView;

// ---------------------------------------------------------------------------
// Command / completion types
// ---------------------------------------------------------------------------

pub type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Intents sent *into* the session task.
pub enum SessionCommand {
    SelectContact { contact: Contact, reply: Reply<()> },
    Send { text: String, reply: Reply<Option<MessageId>> },
    ToggleRecording { reply: Reply<RecordingToggle> },
    Attach { file: Option<Arc<dyn FileResource>>, reply: Reply<Option<MessageId>> },
    StartCall { kind: CallKind, reply: Reply<CallSession> },
    EndCall { reply: Reply<()> },
    ToggleMute { reply: Reply<bool> },
    ToggleSpeaker { reply: Reply<bool> },
    ToggleVideo { reply: Reply<bool> },
    SelectMessage { id: MessageId, reply: Reply<bool> },
    ClearSelection { reply: Reply<()> },
    DeleteSelected { reply: Reply<usize> },
    EditMessage { id: MessageId, reply: Reply<Option<String>> },
    SaveEdit { text: String, reply: Reply<bool> },
    CancelEdit { reply: Reply<()> },
    PlayVoice { id: MessageId, reply: Reply<bool> },
    StopPlayback { reply: Reply<()> },
    Snapshot(oneshot::Sender<SessionView>),
    Shutdown,
}

/// What a record-button press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingToggle {
    Started,
    /// Recording stopped and the voice note was appended under this id.
    Stopped(MessageId),
    /// The microphone is still being acquired; the press was ignored.
    Busy,
}

/// Background work reporting back to the loop.
enum Completion {
    ReplyResolved {
        contact: ContactId,
        outcome: ReplyOutcome,
    },
    MicAcquired {
        owner: ContactId,
        result: Result<MicrophoneStream, CaptureError>,
        reply: Reply<RecordingToggle>,
    },
    CallAnswered(Uuid),
    CallClosed(Uuid),
}

/// Settings for spawning a session.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub timings: SessionTimings,
    pub fallback_notice: String,
    pub capture: CaptureConfig,
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            timings: config.timings.clone(),
            fallback_notice: config.fallback_notice.clone(),
            capture: CaptureConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable front end to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    view_rx: watch::Receiver<SessionView>,
}

impl SessionHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Make `contact` the active conversation. Its log is created empty on
    /// first selection and kept intact afterwards.
    pub async fn select_contact(&self, contact: Contact) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::SelectContact { contact, reply })
            .await
    }

    /// Append an own text message and schedule the contact's reply.
    ///
    /// Empty or whitespace-only text is rejected with `Ok(None)`.
    pub async fn send(&self, text: impl Into<String>) -> Result<Option<MessageId>, SessionError> {
        let text = text.into();
        self.request(|reply| SessionCommand::Send { text, reply }).await
    }

    pub async fn toggle_recording(&self) -> Result<RecordingToggle, SessionError> {
        self.request(|reply| SessionCommand::ToggleRecording { reply })
            .await
    }

    /// Append a file message. `None` (dismissed picker) is a no-op.
    pub async fn attach(&self, file: Option<Arc<dyn FileResource>>) -> Result<Option<MessageId>, SessionError> {
        self.request(|reply| SessionCommand::Attach { file, reply }).await
    }

    pub async fn start_call(&self, kind: CallKind) -> Result<CallSession, SessionError> {
        self.request(|reply| SessionCommand::StartCall { kind, reply })
            .await
    }

    pub async fn end_call(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::EndCall { reply }).await
    }

    pub async fn toggle_mute(&self) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::ToggleMute { reply }).await
    }

    pub async fn toggle_speaker(&self) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::ToggleSpeaker { reply })
            .await
    }

    pub async fn toggle_video(&self) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::ToggleVideo { reply }).await
    }

    /// Toggle `id` in the selection set. Returns whether it is now selected.
    pub async fn select_message(&self, id: MessageId) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::SelectMessage { id, reply })
            .await
    }

    pub async fn clear_selection(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::ClearSelection { reply })
            .await
    }

    pub async fn delete_selected(&self) -> Result<usize, SessionError> {
        self.request(|reply| SessionCommand::DeleteSelected { reply })
            .await
    }

    /// Enter edit mode for an own message; returns the draft text.
    pub async fn edit_message(&self, id: MessageId) -> Result<Option<String>, SessionError> {
        self.request(|reply| SessionCommand::EditMessage { id, reply })
            .await
    }

    pub async fn save_edit(&self, text: impl Into<String>) -> Result<bool, SessionError> {
        let text = text.into();
        self.request(|reply| SessionCommand::SaveEdit { text, reply })
            .await
    }

    pub async fn cancel_edit(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::CancelEdit { reply }).await
    }

    /// Mark a voice note as playing. Returns `false` for ids that are not
    /// voice messages in the active conversation.
    pub async fn play_voice(&self, id: MessageId) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::PlayVoice { id, reply })
            .await
    }

    /// Playback was paused, reached the end or failed.
    pub async fn stop_playback(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::StopPlayback { reply })
            .await
    }

    /// Current snapshot, taken after every command queued before it.
    pub async fn view(&self) -> Result<SessionView, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(SessionCommand::Snapshot(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Receiver that is notified whenever the session publishes a new view.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Spawn the session event loop in a background tokio task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(
    options: SessionOptions,
    backend: Arc<dyn ReplyBackend>,
    microphone: Arc<dyn AudioCaptureDevice>,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(256);
    let (done_tx, done_rx) = mpsc::unbounded_channel::<Completion>();
    let (view_tx, view_rx) = watch::channel(SessionView::default());

    let fallback_notice = if options.fallback_notice.trim().is_empty() {
        murmur_shared::constants::FALLBACK_NOTICE.to_string()
    } else {
        options.fallback_notice.clone()
    };

    let runtime = SessionRuntime {
        replies: ReplySimulator::new(backend, options.timings.reply_delay, fallback_notice),
        capture: CapturePipeline::new(microphone, options.capture.clone()),
        timings: options.timings,
        store: MessageStore::new(),
        contacts: HashMap::new(),
        active: None,
        pending_replies: HashMap::new(),
        recording_owner: None,
        call: None,
        done_tx,
        view_tx,
    };

    tokio::spawn(runtime.run(cmd_rx, done_rx));

    SessionHandle { cmd_tx, view_rx }
}

/// Spawn a session wired to the chat-completions backend and the default
/// input device.
pub fn spawn_default_session(config: &ClientConfig) -> Result<SessionHandle, ReplyError> {
    let backend = ChatCompletionsBackend::new(config)?;
    let microphone = CpalMicrophone::new(CaptureConfig::default());
    info!(model = %config.model, has_api_key = config.api_key.is_some(), "Starting session");
    Ok(spawn_session(
        SessionOptions::from(config),
        Arc::new(backend),
        Arc::new(microphone),
    ))
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

struct SessionRuntime {
    timings: SessionTimings,
    replies: ReplySimulator,
    store: MessageStore,
    contacts: HashMap<ContactId, Contact>,
    active: Option<ContactId>,
    /// Outstanding replies per contact; the typing flag is derived from it.
    pending_replies: HashMap<ContactId, usize>,
    capture: CapturePipeline,
    /// Contact whose conversation receives the voice note being recorded.
    recording_owner: Option<ContactId>,
    call: Option<CallSession>,
    done_tx: mpsc::UnboundedSender<Completion>,
    view_tx: watch::Sender<SessionView>,
}

impl SessionRuntime {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<SessionCommand>,
        mut done_rx: mpsc::UnboundedReceiver<Completion>,
    ) {
        info!("Session event loop started");

        loop {
            tokio::select! {
                // --- Intents ---
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) => {
                            info!("Session shutdown requested");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            info!("Command channel closed, shutting down session");
                            break;
                        }
                    }
                }

                // --- Background completions ---
                Some(done) = done_rx.recv() => self.handle_completion(done),

                // --- Microphone ---
                chunk = self.capture.next_chunk(), if self.capture.is_recording() => {
                    match chunk {
                        Some(chunk) => {
                            self.capture.push_chunk(chunk);
                            continue;
                        }
                        None => self.handle_device_lost(),
                    }
                }
            }

            self.publish();
        }

        if let Some(clip) = self.capture.stop_recording() {
            debug!(duration_secs = clip.duration_secs, "Discarding unfinished recording");
        }
        info!("Session event loop terminated");
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.render());
    }

    fn render(&self) -> SessionView {
        let mut view = SessionView {
            is_recording: self.capture.is_recording(),
            call: self.call.clone(),
            ..SessionView::default()
        };
        let Some(id) = self.active else {
            return view;
        };

        view.contact = self.contacts.get(&id).cloned();
        view.messages = self.store.messages(id).to_vec();
        view.is_typing = self.pending_replies.get(&id).is_some_and(|n| *n > 0);
        if let Some(log) = self.store.log(id) {
            view.selected = log.selected().iter().copied().collect();
            view.editing = log.editing();
            view.playing = log.playing();
        }
        view
    }

    fn active_contact(&self) -> Result<ContactId, SessionError> {
        self.active.ok_or(SessionError::NoActiveContact)
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::SelectContact { contact, reply } => {
                self.select_contact(contact);
                let _ = reply.send(Ok(()));
            }
            SessionCommand::Send { text, reply } => {
                let _ = reply.send(self.send(text));
            }
            SessionCommand::ToggleRecording { reply } => self.toggle_recording(reply),
            SessionCommand::Attach { file, reply } => {
                let _ = reply.send(self.attach(file));
            }
            SessionCommand::StartCall { kind, reply } => {
                let _ = reply.send(self.start_call(kind));
            }
            SessionCommand::EndCall { reply } => {
                let _ = reply.send(self.end_call());
            }
            SessionCommand::ToggleMute { reply } => {
                let result = self.open_call().map(|call| call.toggle_mute());
                let _ = reply.send(result);
            }
            SessionCommand::ToggleSpeaker { reply } => {
                let result = self.open_call().map(|call| call.toggle_speaker());
                let _ = reply.send(result);
            }
            SessionCommand::ToggleVideo { reply } => {
                let result = self
                    .open_call()
                    .and_then(|call| call.toggle_video().map_err(SessionError::from));
                let _ = reply.send(result);
            }
            SessionCommand::SelectMessage { id, reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.toggle_select(contact, id));
                let _ = reply.send(result);
            }
            SessionCommand::ClearSelection { reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.clear_selection(contact));
                let _ = reply.send(result);
            }
            SessionCommand::DeleteSelected { reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.delete_selected(contact));
                let _ = reply.send(result);
            }
            SessionCommand::EditMessage { id, reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.begin_edit(contact, id));
                let _ = reply.send(result);
            }
            SessionCommand::SaveEdit { text, reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.save_edit(contact, text));
                let _ = reply.send(result);
            }
            SessionCommand::CancelEdit { reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.cancel_edit(contact));
                let _ = reply.send(result);
            }
            SessionCommand::PlayVoice { id, reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.play_voice(contact, id));
                let _ = reply.send(result);
            }
            SessionCommand::StopPlayback { reply } => {
                let result = self
                    .active_contact()
                    .map(|contact| self.store.stop_playback(contact));
                let _ = reply.send(result);
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.render());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::ReplyResolved { contact, outcome } => {
                if let ReplyOutcome::Failed { reason, .. } = &outcome {
                    debug!(contact = %contact.short(), reason = %reason, "Appending fallback notice");
                }
                self.store
                    .append(contact, Message::text(Author::Contact(contact), outcome.text()));
                if let Some(pending) = self.pending_replies.get_mut(&contact) {
                    *pending = pending.saturating_sub(1);
                    if *pending == 0 {
                        self.pending_replies.remove(&contact);
                    }
                }
            }
            Completion::MicAcquired { owner, result, reply } => {
                let result = match self.capture.finish_acquire(result) {
                    Ok(()) => {
                        self.recording_owner = Some(owner);
                        Ok(RecordingToggle::Started)
                    }
                    Err(e) => Err(SessionError::Capture(e)),
                };
                let _ = reply.send(result);
            }
            Completion::CallAnswered(call_id) => match self.call.as_mut() {
                Some(call) if call.id == call_id => {
                    call.answer();
                }
                _ => debug!(call_id = %call_id, "Stale ring timer ignored"),
            },
            Completion::CallClosed(call_id) => match &self.call {
                Some(call) if call.id == call_id && call.is_ended() => {
                    info!(call_id = %call_id, "Call overlay closed");
                    self.call = None;
                }
                _ => debug!(call_id = %call_id, "Stale close timer ignored"),
            },
        }
    }

    // -- Contacts and messages --

    fn select_contact(&mut self, contact: Contact) {
        let id = contact.id;
        if let Some(previous) = self.active.replace(id) {
            self.store.reset_transient(previous);
        }
        self.store.ensure_log(id);
        self.store.reset_transient(id);
        info!(contact = %id.short(), name = %contact.name, "Contact selected");
        self.contacts.insert(id, contact);
    }

    fn send(&mut self, text: String) -> Result<Option<MessageId>, SessionError> {
        let contact = self.active_contact()?;
        if text.trim().is_empty() {
            debug!("Ignoring empty message");
            return Ok(None);
        }

        let id = self.store.append(contact, Message::text(Author::Me, text.clone()));
        *self.pending_replies.entry(contact).or_default() += 1;

        let persona = self
            .contacts
            .get(&contact)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let replies = self.replies.clone();
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = replies.reply(&persona, &text).await;
            let _ = done_tx.send(Completion::ReplyResolved { contact, outcome });
        });

        Ok(Some(id))
    }

    fn attach(&mut self, file: Option<Arc<dyn FileResource>>) -> Result<Option<MessageId>, SessionError> {
        let Some(file) = file else {
            return Ok(None);
        };
        let contact = self.active_contact()?;
        Ok(attach(Some(file)).map(|message| self.store.append(contact, message)))
    }

    // -- Voice notes --

    fn toggle_recording(&mut self, reply: Reply<RecordingToggle>) {
        match self.capture.state() {
            CaptureState::Recording => {
                let result = match self.finish_recording() {
                    Some(id) => Ok(RecordingToggle::Stopped(id)),
                    None => Ok(RecordingToggle::Busy),
                };
                let _ = reply.send(result);
            }
            CaptureState::Acquiring => {
                let _ = reply.send(Ok(RecordingToggle::Busy));
            }
            CaptureState::Idle => {
                let owner = match self.active_contact() {
                    Ok(owner) => owner,
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        return;
                    }
                };
                let Some(acquire) = self.capture.begin() else {
                    let _ = reply.send(Ok(RecordingToggle::Busy));
                    return;
                };
                let done_tx = self.done_tx.clone();
                tokio::spawn(async move {
                    let result = acquire.await;
                    // If the loop is gone the stream is dropped here, which
                    // releases the device.
                    let _ = done_tx.send(Completion::MicAcquired { owner, result, reply });
                });
            }
        }
    }

    /// Stop recording and append the note to the conversation it was
    /// started in.
    fn finish_recording(&mut self) -> Option<MessageId> {
        let clip = self.capture.stop_recording()?;
        let owner = self.recording_owner.take()?;
        Some(self.store.append(owner, clip.into_message()))
    }

    fn handle_device_lost(&mut self) {
        let Some(clip) = self.capture.on_device_lost() else {
            return;
        };
        if let Some(owner) = self.recording_owner.take() {
            warn!(contact = %owner.short(), "Microphone lost, keeping partial voice note");
            self.store.append(owner, clip.into_message());
        }
    }

    // -- Calls --

    fn open_call(&mut self) -> Result<&mut CallSession, SessionError> {
        self.call.as_mut().ok_or(SessionError::Call(CallError::NotInCall))
    }

    fn start_call(&mut self, kind: CallKind) -> Result<CallSession, SessionError> {
        let contact = self.active_contact()?;
        if self.call.is_some() {
            return Err(CallError::AlreadyInCall.into());
        }

        let call = CallSession::open(contact, kind);
        info!(call_id = %call.id, contact = %contact.short(), kind = %kind, "Starting call");
        self.schedule(self.timings.ring_delay, Completion::CallAnswered(call.id));
        self.call = Some(call.clone());
        Ok(call)
    }

    fn end_call(&mut self) -> Result<(), SessionError> {
        let end_hold = self.timings.end_hold;
        let call = self.open_call()?;
        if !call.end() {
            return Ok(());
        }
        let call_id = call.id;
        info!(call_id = %call_id, "Call ended");
        self.schedule(end_hold, Completion::CallClosed(call_id));
        Ok(())
    }

    /// Deliver `completion` after `delay`. Timers are never cancelled;
    /// handlers drop completions that no longer match the current call.
    fn schedule(&self, delay: std::time::Duration, completion: Completion) {
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = done_tx.send(completion);
        });
    }
}
