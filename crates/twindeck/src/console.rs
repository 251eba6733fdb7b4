//! The console's control layer and handler set
//!
//! Text commands and MIDI both resolve to a [`ControlEvent`] and end up in
//! [`MixConsole::apply`], so every surface drives the same handlers. Handlers
//! only touch control state (decks, effects, gains) and then hand the result
//! to the realization layer: the per-deck [`DeckAudioGraph`] and the engine
//! commands sent through the injected [`RenderContext`].
//!
//! Without a render context (no audio device) every handler still updates
//! control state; anything that needs the engine becomes a no-op.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use twindeck_core::control::{ControlAction, ControlEvent};
use twindeck_core::deck::DeckState;
use twindeck_core::engine::{crossfader_gains, EngineCommand, RenderContext};
use twindeck_core::fx::{EffectKind, EqBand, EqGains, FxState};
use twindeck_core::graph::DeckAudioGraph;
use twindeck_core::metering::{DeckMeterInput, MeterFrame, MeteringService};
use twindeck_core::recording::{RecordingController, RecordingState};
use twindeck_core::source::{load_wav, PcmBuffer, SourceError};
use twindeck_core::tempo::{BeatDetector, TempoController};
use twindeck_core::{DeckId, NUM_DECKS};

use crate::settings::Settings;

/// How often the tick logs a meter line at debug level
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Directory name for one take, local time
fn take_dir_name() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

pub struct MixConsole {
    ctx: Option<RenderContext>,
    decks: [DeckState; NUM_DECKS],
    fx: [FxState; NUM_DECKS],
    eq: [EqGains; NUM_DECKS],
    graphs: [DeckAudioGraph; NUM_DECKS],
    tempo: TempoController,
    metering: MeteringService,
    recorder: RecordingController,
    crossfader: u8,
    master: u8,
    beat_snap: bool,
    recordings_dir: PathBuf,
    last_recording: Option<PathBuf>,
    last_status: Option<Instant>,
    // Updates the engine queue refused; retried every tick
    gains_dirty: bool,
    rate_dirty: [bool; NUM_DECKS],
    chain_dirty: [bool; NUM_DECKS],
}

impl MixConsole {
    /// Build the console from saved settings
    ///
    /// `ctx` is the render context created at startup, or `None` when no
    /// audio output is available.
    pub fn new(ctx: Option<RenderContext>, settings: &Settings, recordings_dir: PathBuf) -> Self {
        let mut console = Self {
            ctx,
            decks: [DeckState::new(DeckId::A), DeckState::new(DeckId::B)],
            fx: [
                FxState::from_parts(settings.fx_a, settings.wet_a),
                FxState::from_parts(settings.fx_b, settings.wet_b),
            ],
            eq: [settings.eq_a.clamped(), settings.eq_b.clamped()],
            graphs: [DeckAudioGraph::new(DeckId::A), DeckAudioGraph::new(DeckId::B)],
            tempo: TempoController::new(),
            metering: MeteringService::new(),
            recorder: RecordingController::new(),
            crossfader: settings.crossfader.min(100),
            master: settings.master.min(100),
            beat_snap: settings.beat_snap,
            recordings_dir,
            last_recording: None,
            last_status: None,
            gains_dirty: false,
            rate_dirty: [false; NUM_DECKS],
            chain_dirty: [false; NUM_DECKS],
        };
        console.push_gains();
        console
    }

    /// Write the persisted part of the control state back into `settings`
    pub fn store_into(&self, settings: &mut Settings) {
        settings.fx_a = self.fx[0].flags();
        settings.fx_b = self.fx[1].flags();
        settings.wet_a = self.fx[0].wets();
        settings.wet_b = self.fx[1].wets();
        settings.eq_a = self.eq[0];
        settings.eq_b = self.eq[1];
        settings.crossfader = self.crossfader;
        settings.master = self.master;
        settings.beat_snap = self.beat_snap;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn has_audio(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn deck(&self, deck: DeckId) -> &DeckState {
        &self.decks[deck.index()]
    }

    pub fn fx(&self, deck: DeckId) -> &FxState {
        &self.fx[deck.index()]
    }

    pub fn eq(&self, deck: DeckId) -> &EqGains {
        &self.eq[deck.index()]
    }

    pub fn graph(&self, deck: DeckId) -> &DeckAudioGraph {
        &self.graphs[deck.index()]
    }

    pub fn crossfader(&self) -> u8 {
        self.crossfader
    }

    pub fn master(&self) -> u8 {
        self.master
    }

    pub fn beat_snap(&self) -> bool {
        self.beat_snap
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    /// Where the most recent take was saved
    pub fn last_recording(&self) -> Option<&Path> {
        self.last_recording.as_deref()
    }

    // ------------------------------------------------------------------
    // Control actions
    // ------------------------------------------------------------------

    /// Route an event from any surface to its handler
    pub fn apply(&mut self, event: ControlEvent) {
        log::debug!("Control: {:?} from {:?}", event.action, event.source);
        match event.action {
            ControlAction::PlayPauseDeck(deck) => {
                self.play_pause_deck(deck);
            }
            ControlAction::ToggleEffect { deck, kind } => {
                self.toggle_effect(deck, kind);
            }
            ControlAction::SetWet { deck, kind } => {
                self.set_wet(deck, kind, event.value);
            }
            ControlAction::SetCrossfader => {
                self.set_crossfader(event.value);
            }
            ControlAction::SetMaster => {
                self.set_master(event.value);
            }
            ControlAction::ToggleRecording => {
                self.toggle_recording();
            }
            ControlAction::TapTempo(deck) => {
                self.tap_tempo(deck, Instant::now());
            }
            ControlAction::SyncTempo(deck) => {
                self.sync_tempo(deck);
            }
            ControlAction::SetPlaybackRate(deck) => {
                self.set_playback_rate(deck, event.value);
            }
        }
    }

    /// Start or pause a deck
    ///
    /// Starting snaps the position to the nearest beat when beat-snap is on
    /// and the BPM is known, and connects the deck's chain. Pausing
    /// disconnects it. Returns whether the transport changed.
    pub fn play_pause_deck(&mut self, deck: DeckId) -> bool {
        let i = deck.index();
        if !self.decks[i].armed {
            log::info!("Deck {}: nothing loaded", deck);
            return false;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return false;
        };

        if self.decks[i].playing {
            if ctx.send(EngineCommand::Pause { deck }).is_err() {
                return false;
            }
            self.decks[i].playing = false;
            self.realize_chain(deck, false);
            log::info!("Deck {}: paused at {:.2}s", deck, self.decks[i].position);
            return true;
        }

        if let Some(seconds) = self.tempo.snap_position(&self.decks[i], self.beat_snap) {
            if ctx.send(EngineCommand::Seek { deck, seconds }).is_ok() {
                log::debug!(
                    "Deck {}: snapped {:.3}s -> {:.3}s",
                    deck,
                    self.decks[i].position,
                    seconds
                );
                self.decks[i].position = seconds;
            }
        }

        self.realize_chain(deck, true);
        let Some(ctx) = self.ctx.as_mut() else {
            return false;
        };
        if ctx.send(EngineCommand::Play { deck }).is_err() {
            self.realize_chain(deck, false);
            return false;
        }
        self.decks[i].playing = true;
        log::info!("Deck {}: playing from {:.2}s", deck, self.decks[i].position);
        true
    }

    /// Flip an effect toggle, returning its new state
    pub fn toggle_effect(&mut self, deck: DeckId, kind: EffectKind) -> bool {
        let enabled = self.fx[deck.index()].toggle(kind);
        log::info!(
            "Deck {}: {} {}",
            deck,
            kind.name(),
            if enabled { "on" } else { "off" }
        );
        self.realize(deck);
        enabled
    }

    /// Set an effect's wet amount (clamped to 0-1), returning the stored value
    pub fn set_wet(&mut self, deck: DeckId, kind: EffectKind, value: f32) -> f32 {
        let fx = &mut self.fx[deck.index()];
        fx.set_wet(kind, value);
        let wet = fx.wet(kind);
        self.realize(deck);
        wet
    }

    /// Set an EQ band gain in dB (clamped to +/-12), returning the stored value
    pub fn set_eq_gain(&mut self, deck: DeckId, band: EqBand, db: f32) -> f32 {
        let eq = &mut self.eq[deck.index()];
        eq.set(band, db);
        let gain = eq.get(band);
        self.realize(deck);
        gain
    }

    /// Crossfader position, 0 (deck A) to 100 (deck B)
    pub fn set_crossfader(&mut self, value: f32) -> u8 {
        self.crossfader = to_percent(value, self.crossfader);
        self.push_gains();
        self.crossfader
    }

    /// Master level, 0-100
    pub fn set_master(&mut self, value: f32) -> u8 {
        self.master = to_percent(value, self.master);
        self.push_gains();
        self.master
    }

    /// Start a take, or stop and save the current one
    pub fn toggle_recording(&mut self) -> RecordingState {
        if self.recorder.is_recording() {
            self.finish_recording();
        } else {
            self.recorder.start(self.ctx.as_mut());
        }
        self.recorder.state()
    }

    /// Register a tap, returning the new BPM when the interval was usable
    pub fn tap_tempo(&mut self, deck: DeckId, now: Instant) -> Option<u32> {
        let bpm = self.tempo.tap(&mut self.decks[deck.index()], now)?;
        log::info!("Deck {}: tapped {} BPM", deck, bpm);
        Some(bpm)
    }

    /// Match `deck`'s tempo to the other deck
    ///
    /// No-op when either BPM is unknown.
    pub fn sync_tempo(&mut self, deck: DeckId) -> Option<f32> {
        let target = self.decks[deck.other().index()].clone();
        let rate = self.tempo.sync(&mut self.decks[deck.index()], &target)?;
        log::info!("Deck {}: synced to deck {} at rate {:.3}", deck, target.id, rate);
        self.push_rate(deck);
        Some(rate)
    }

    /// Set a deck's playback rate (clamped, pitch preserved)
    pub fn set_playback_rate(&mut self, deck: DeckId, rate: f32) -> f32 {
        if rate.is_nan() {
            return self.decks[deck.index()].rate;
        }
        let rate = self.tempo.set_rate(&mut self.decks[deck.index()], rate);
        self.push_rate(deck);
        rate
    }

    pub fn set_beat_snap(&mut self, enabled: bool) {
        self.beat_snap = enabled;
        log::info!("Beat snap {}", if enabled { "on" } else { "off" });
    }

    // ------------------------------------------------------------------
    // Deck lifecycle
    // ------------------------------------------------------------------

    /// Load a decoded source onto a deck
    ///
    /// The source is analyzed for tempo and duration, then handed to the
    /// engine. Returns whether the deck is armed (false without audio).
    pub fn load_track(&mut self, deck: DeckId, pcm: PcmBuffer, detector: &dyn BeatDetector) -> bool {
        self.close_deck(deck);

        let i = deck.index();
        self.tempo.analyze(&mut self.decks[i], &pcm, detector);

        let Some(ctx) = self.ctx.as_mut() else {
            log::info!("Deck {}: analyzed only, no audio output", deck);
            return false;
        };

        let pcm = match pcm.resampled(ctx.sample_rate()) {
            Ok(pcm) => pcm,
            Err(e) => {
                log::warn!("Deck {}: cannot prepare source: {}", deck, e);
                return false;
            }
        };
        let source = ctx.share(pcm);
        if ctx.send(EngineCommand::LoadSource { deck, source }).is_err() {
            log::warn!("Deck {}: load deferred, engine queue full", deck);
            return false;
        }
        self.decks[i].armed = true;
        self.push_rate(deck);

        log::info!(
            "Deck {}: loaded {:.1}s, {}",
            deck,
            self.decks[i].duration,
            self.decks[i]
                .bpm
                .map(|bpm| format!("{} BPM", bpm))
                .unwrap_or_else(|| "tempo unknown".to_string())
        );
        true
    }

    /// Decode a WAV file and load it
    ///
    /// On failure the deck is left empty with BPM and duration cleared.
    pub fn load_file(
        &mut self,
        deck: DeckId,
        path: &Path,
        detector: &dyn BeatDetector,
    ) -> Result<bool, SourceError> {
        match load_wav(path) {
            Ok(pcm) => Ok(self.load_track(deck, pcm, detector)),
            Err(e) => {
                log::warn!("Deck {}: cannot load {:?}: {}", deck, path, e);
                self.close_deck(deck);
                Err(e)
            }
        }
    }

    /// Stop and unload a deck, disconnecting its chain
    pub fn close_deck(&mut self, deck: DeckId) {
        let i = deck.index();
        if let Some(ctx) = self.ctx.as_mut() {
            if self.decks[i].armed && ctx.send(EngineCommand::UnloadSource { deck }).is_err() {
                log::warn!("Deck {}: unload deferred, engine queue full", deck);
            }
        }
        self.realize_chain(deck, false);
        self.decks[i].reset();
        self.tempo.reset_taps(deck);
    }

    /// Stop recording, disconnect every deck
    ///
    /// Returns where the final take was saved, if one was running.
    pub fn shutdown(&mut self) -> Option<PathBuf> {
        let saved = if self.recorder.is_recording() {
            self.finish_recording()
        } else {
            None
        };

        for deck in DeckId::ALL {
            let i = deck.index();
            if let Some(ctx) = self.ctx.as_mut() {
                if self.decks[i].playing && ctx.send(EngineCommand::Pause { deck }).is_ok() {
                    self.decks[i].playing = false;
                }
            }
            self.realize_chain(deck, false);
        }
        log::info!("Console shut down");
        saved
    }

    // ------------------------------------------------------------------
    // Visual clock
    // ------------------------------------------------------------------

    /// One control tick: mirror the transport, drain the recorder and
    /// analysis taps, advance the meters
    pub fn tick(&mut self, now: Instant) -> MeterFrame {
        self.sync_transport();
        self.retry_deferred();
        self.recorder.poll(self.ctx.as_mut());
        for graph in &mut self.graphs {
            if let Some(tap) = graph.analysis_mut() {
                tap.poll();
            }
        }

        let inputs: [DeckMeterInput<'_>; NUM_DECKS] = std::array::from_fn(|i| DeckMeterInput {
            playing: self.decks[i].playing,
            spectrum: self.graphs[i].analysis().map(|tap| tap.byte_frequency_data()),
        });
        let frame = self.metering.tick(inputs);

        if self
            .last_status
            .map_or(true, |last| now.duration_since(last) >= STATUS_INTERVAL)
        {
            self.last_status = Some(now);
            log::debug!(
                "Meters: A {:.2} B {:.2} pulse {:.2}",
                frame.levels[0],
                frame.levels[1],
                frame.pulse
            );
        }
        frame
    }

    // ------------------------------------------------------------------
    // Realization
    // ------------------------------------------------------------------

    /// Re-realize a deck's chain if it is playing
    ///
    /// A stopped deck keeps its chain disconnected; the current state is
    /// applied when it starts.
    fn realize(&mut self, deck: DeckId) {
        if self.decks[deck.index()].playing {
            self.realize_chain(deck, true);
        }
    }

    /// Connect the deck's chain to the current control state, or
    /// disconnect it
    ///
    /// When the engine queue refuses a command the chain is marked dirty
    /// and [`Self::tick`] tries again.
    fn realize_chain(&mut self, deck: DeckId, connected: bool) {
        let i = deck.index();
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let done = if connected {
            self.graphs[i].apply_filters(Some(ctx), &self.fx[i], &self.eq[i])
        } else {
            self.graphs[i].disconnect(Some(ctx))
        };
        if !done && !self.chain_dirty[i] {
            log::warn!("Deck {}: chain update deferred, engine queue full", deck);
        }
        self.chain_dirty[i] = !done;
    }

    fn push_gains(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let gains = crossfader_gains(self.crossfader as f32, self.master as f32);
        let sent = ctx.send(EngineCommand::SetDeckGains { gains }).is_ok();
        if !sent && !self.gains_dirty {
            log::warn!("Mixer: gain update deferred, engine queue full");
        }
        self.gains_dirty = !sent;
    }

    fn push_rate(&mut self, deck: DeckId) {
        let i = deck.index();
        let rate = self.decks[i].rate;
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let sent = ctx.send(EngineCommand::SetPlaybackRate { deck, rate }).is_ok();
        if !sent && !self.rate_dirty[i] {
            log::warn!("Deck {}: rate update deferred, engine queue full", deck);
        }
        self.rate_dirty[i] = !sent;
    }

    /// Resend whatever the engine queue refused earlier
    fn retry_deferred(&mut self) {
        if self.gains_dirty {
            self.push_gains();
        }
        for deck in DeckId::ALL {
            let i = deck.index();
            if self.rate_dirty[i] {
                self.push_rate(deck);
            }
            if self.chain_dirty[i] {
                let playing = self.decks[i].playing;
                self.realize_chain(deck, playing);
            }
        }
    }

    /// Pull position and play state from the engine
    ///
    /// A deck that stopped on its own (end of source) is disconnected. The
    /// transition is only trusted once the engine has drained the queue, so
    /// a play command still in flight is not mistaken for a stop.
    fn sync_transport(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let settled = ctx.pending_commands() == 0;
        for deck in DeckId::ALL {
            let i = deck.index();
            let state = &mut self.decks[i];
            if !state.armed {
                continue;
            }
            let atomics = ctx.deck_atomics(deck);
            if !atomics.is_loaded() {
                continue;
            }
            state.position = atomics.position_secs();
            if settled && state.playing && !atomics.is_playing() {
                state.playing = false;
                log::info!("Deck {}: reached end", deck);
                self.chain_dirty[i] = !self.graphs[i].disconnect(Some(&mut *ctx));
            }
        }
    }

    fn finish_recording(&mut self) -> Option<PathBuf> {
        let artifact = match self.recorder.stop(self.ctx.as_mut()) {
            Ok(Some(artifact)) => artifact,
            Ok(None) => return None,
            Err(e) => {
                log::error!("Recorder: {}", e);
                return None;
            }
        };
        match artifact.save_into(&self.recordings_dir.join(take_dir_name())) {
            Ok(path) => {
                self.last_recording = Some(path.clone());
                Some(path)
            }
            Err(e) => {
                log::error!("Recorder: {}", e);
                None
            }
        }
    }
}

/// Round a 0-100 control value; NaN keeps `current`
fn to_percent(value: f32, current: u8) -> u8 {
    if value.is_nan() {
        return current;
    }
    value.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use twindeck_core::control::ControlSource;
    use twindeck_core::engine::{MixEngine, COMMAND_QUEUE_CAPACITY};
    use twindeck_core::fx::chain::StageSlot;
    use twindeck_core::tempo::BeatDetectError;
    use twindeck_core::{StereoBuffer, StereoSample};

    const SR: u32 = 8000;

    struct FixedBpm(Option<f64>);

    impl BeatDetector for FixedBpm {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&self, source: &PcmBuffer) -> Result<f64, BeatDetectError> {
            self.0.ok_or(BeatDetectError::TooShort(source.duration_secs()))
        }
    }

    fn offline() -> MixConsole {
        MixConsole::new(None, &Settings::default(), PathBuf::from("."))
    }

    fn live(dir: &Path) -> (MixConsole, MixEngine) {
        let (ctx, engine) = RenderContext::new(SR);
        (
            MixConsole::new(Some(ctx), &Settings::default(), dir.to_path_buf()),
            engine,
        )
    }

    fn tone(seconds: f64) -> PcmBuffer {
        let frames = (seconds * SR as f64) as usize;
        let samples = (0..frames)
            .map(|n| StereoSample::mono((n as f32 * 0.05).sin() * 0.5))
            .collect();
        PcmBuffer::new(StereoBuffer::from_vec(samples), SR)
    }

    fn render(engine: &mut MixEngine, frames: usize) {
        let mut master = StereoBuffer::silence(frames);
        engine.process(&mut master);
    }

    /// Occupy every free slot of the engine queue
    fn fill_queue(console: &mut MixConsole) {
        let ctx = console.ctx.as_mut().unwrap();
        while ctx.pending_commands() < COMMAND_QUEUE_CAPACITY {
            ctx.send(EngineCommand::DetachCapture).unwrap();
        }
    }

    #[test]
    fn test_offline_console_tracks_control_state() {
        let mut console = offline();
        assert!(!console.has_audio());
        assert!(console.toggle_effect(DeckId::A, EffectKind::Delay));
        assert_eq!(console.set_wet(DeckId::A, EffectKind::Delay, 1.7), 1.0);
        assert_eq!(console.set_crossfader(29.6), 30);
        assert_eq!(console.set_master(-5.0), 0);
        assert_eq!(console.set_eq_gain(DeckId::B, EqBand::Low, -20.0), -12.0);
        assert!(!console.play_pause_deck(DeckId::A));
        assert_eq!(console.toggle_recording(), RecordingState::Idle);
    }

    #[test]
    fn test_load_without_audio_still_analyzes() {
        let mut console = offline();
        assert!(!console.load_track(DeckId::A, tone(2.0), &FixedBpm(Some(127.6))));
        let deck = console.deck(DeckId::A);
        assert_eq!(deck.bpm, Some(128));
        assert!((deck.duration - 2.0).abs() < 1e-9);
        assert!(!deck.armed);
    }

    #[test]
    fn test_failed_detection_clears_bpm() {
        let mut console = offline();
        console.load_track(DeckId::B, tone(1.0), &FixedBpm(Some(120.0)));
        console.load_track(DeckId::B, tone(1.0), &FixedBpm(None));
        assert_eq!(console.deck(DeckId::B).bpm, None);
    }

    #[test]
    fn test_failed_file_load_resets_deck() {
        let dir = tempfile::tempdir().unwrap();
        let mut console = offline();
        console.load_track(DeckId::A, tone(1.0), &FixedBpm(Some(120.0)));

        let missing = dir.path().join("missing.wav");
        assert!(console.load_file(DeckId::A, &missing, &FixedBpm(Some(90.0))).is_err());
        let deck = console.deck(DeckId::A);
        assert_eq!(deck.bpm, None);
        assert_eq!(deck.duration, 0.0);
    }

    #[test]
    fn test_play_connects_and_pause_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        assert!(console.load_track(DeckId::A, tone(2.0), &FixedBpm(Some(120.0))));

        assert!(console.play_pause_deck(DeckId::A));
        assert!(console.deck(DeckId::A).playing);
        assert!(console.graph(DeckId::A).layout().unwrap().is_connected());
        render(&mut engine, 256);

        assert!(console.play_pause_deck(DeckId::A));
        assert!(!console.deck(DeckId::A).playing);
        assert!(!console.graph(DeckId::A).layout().unwrap().is_connected());
    }

    #[test]
    fn test_effect_toggles_follow_fixed_order() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, _engine) = live(dir.path());
        console.load_track(DeckId::B, tone(2.0), &FixedBpm(None));
        console.play_pause_deck(DeckId::B);

        console.toggle_effect(DeckId::B, EffectKind::Delay);
        console.toggle_effect(DeckId::B, EffectKind::Filter);
        console.toggle_effect(DeckId::B, EffectKind::Gate);

        let layout = console.graph(DeckId::B).layout().unwrap();
        let order: Vec<_> = layout
            .iter()
            .filter(|slot| !matches!(slot, StageSlot::Eq(_)))
            .collect();
        assert_eq!(order, vec![StageSlot::Gate, StageSlot::Filter, StageSlot::Delay]);

        console.toggle_effect(DeckId::B, EffectKind::Filter);
        assert!(!console.graph(DeckId::B).layout().unwrap().contains(StageSlot::Filter));
    }

    #[test]
    fn test_stopped_deck_defers_realization() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, _engine) = live(dir.path());
        console.load_track(DeckId::A, tone(1.0), &FixedBpm(None));
        console.toggle_effect(DeckId::A, EffectKind::Filter);
        assert!(!console.graph(DeckId::A).has_nodes());

        console.play_pause_deck(DeckId::A);
        assert!(console.graph(DeckId::A).layout().unwrap().contains(StageSlot::Filter));
    }

    #[test]
    fn test_beat_snap_on_play() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::A, tone(4.0), &FixedBpm(Some(120.0)));
        console.set_beat_snap(true);

        // Play to 1.23s, pause, then start again
        console.play_pause_deck(DeckId::A);
        render(&mut engine, (1.23 * SR as f64) as usize);
        console.tick(Instant::now());
        console.play_pause_deck(DeckId::A);
        engine.process_commands();
        console.tick(Instant::now());
        assert!((console.deck(DeckId::A).position - 1.23).abs() < 1e-3);

        console.play_pause_deck(DeckId::A);
        assert!((console.deck(DeckId::A).position - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sync_sets_rate_from_other_deck() {
        let mut console = offline();
        console.load_track(DeckId::A, tone(1.0), &FixedBpm(Some(120.0)));
        console.load_track(DeckId::B, tone(1.0), &FixedBpm(Some(150.0)));
        let rate = console.sync_tempo(DeckId::B).unwrap();
        assert!((rate - 0.8).abs() < 1e-6);
        assert!((console.deck(DeckId::B).rate - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_sync_without_bpm_is_noop() {
        let mut console = offline();
        console.load_track(DeckId::A, tone(1.0), &FixedBpm(None));
        console.load_track(DeckId::B, tone(1.0), &FixedBpm(Some(150.0)));
        assert_eq!(console.sync_tempo(DeckId::B), None);
        assert_eq!(console.deck(DeckId::B).rate, 1.0);
    }

    #[test]
    fn test_gains_and_rate_reach_engine() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::A, tone(1.0), &FixedBpm(Some(120.0)));
        console.load_track(DeckId::B, tone(1.0), &FixedBpm(Some(150.0)));
        console.set_master(80.0);
        console.set_crossfader(0.0);
        console.sync_tempo(DeckId::B);
        engine.process_commands();

        assert_eq!(engine.deck_gains(), [0.8, 0.0]);
        assert!((engine.deck_rate(DeckId::B) - 0.8).abs() < 1e-6);
        assert_eq!(engine.deck_rate(DeckId::A), 1.0);
    }

    #[test]
    fn test_tap_tempo_via_console() {
        let mut console = offline();
        let start = Instant::now();
        assert_eq!(console.tap_tempo(DeckId::A, start), None);
        assert_eq!(
            console.tap_tempo(DeckId::A, start + Duration::from_millis(500)),
            Some(120)
        );
        assert_eq!(console.deck(DeckId::A).bpm, Some(120));
    }

    #[test]
    fn test_playback_rate_clamped() {
        let mut console = offline();
        assert_eq!(console.set_playback_rate(DeckId::A, 2.0), 1.5);
        assert_eq!(console.set_playback_rate(DeckId::A, 0.1), 0.6);
        assert_eq!(console.set_playback_rate(DeckId::A, f32::NAN), 0.6);
    }

    #[test]
    fn test_apply_routes_events() {
        let mut console = offline();
        console.apply(ControlEvent::new(ControlSource::Midi, ControlAction::SetCrossfader, 100.0));
        assert_eq!(console.crossfader(), 100);
        console.apply(ControlEvent::trigger(
            ControlSource::Ui,
            ControlAction::ToggleEffect {
                deck: DeckId::B,
                kind: EffectKind::Reverb,
            },
        ));
        assert!(console.fx(DeckId::B).is_enabled(EffectKind::Reverb));
        console.apply(ControlEvent::new(
            ControlSource::Ui,
            ControlAction::SetWet {
                deck: DeckId::A,
                kind: EffectKind::Gate,
            },
            0.25,
        ));
        assert_eq!(console.fx(DeckId::A).wet(EffectKind::Gate), 0.25);
        console.apply(ControlEvent::new(
            ControlSource::Ui,
            ControlAction::SetPlaybackRate(DeckId::A),
            1.1,
        ));
        assert!((console.deck(DeckId::A).rate - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_recording_take_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::A, tone(1.0), &FixedBpm(None));
        console.play_pause_deck(DeckId::A);

        assert_eq!(console.toggle_recording(), RecordingState::Recording);
        render(&mut engine, 400);
        console.tick(Instant::now());
        render(&mut engine, 400);
        assert_eq!(console.toggle_recording(), RecordingState::Idle);

        let path = console.last_recording().unwrap();
        assert!(path.ends_with("mix.wav"));
        assert!(path.starts_with(dir.path()));
        let reader = hound::WavReader::open(path).unwrap();
        assert_eq!(reader.duration(), 800);
    }

    #[test]
    fn test_shutdown_saves_running_take_and_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::A, tone(1.0), &FixedBpm(None));
        console.play_pause_deck(DeckId::A);
        console.toggle_recording();
        render(&mut engine, 100);

        let saved = console.shutdown();
        assert!(saved.is_some());
        assert!(!console.deck(DeckId::A).playing);
        assert!(!console.graph(DeckId::A).layout().unwrap().is_connected());
        assert_eq!(console.recording_state(), RecordingState::Idle);
    }

    #[test]
    fn test_end_of_track_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::A, tone(0.05), &FixedBpm(None));
        console.play_pause_deck(DeckId::A);
        render(&mut engine, SR as usize);

        console.tick(Instant::now());
        assert!(!console.deck(DeckId::A).playing);
        assert!(!console.graph(DeckId::A).layout().unwrap().is_connected());
    }

    #[test]
    fn test_paused_deck_bars_fall_silent() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::A, tone(2.0), &FixedBpm(None));
        console.play_pause_deck(DeckId::A);
        render(&mut engine, 1024);
        let frame = console.tick(Instant::now());
        assert!(frame.bars.iter().any(|&bar| bar > 0.0));

        console.play_pause_deck(DeckId::A);
        engine.process_commands();
        let mut frame = console.tick(Instant::now());
        for _ in 0..300 {
            render(&mut engine, 256);
            frame = console.tick(Instant::now());
        }
        assert!(frame.bars.iter().all(|&bar| bar < 0.01));
    }

    #[test]
    fn test_refused_chain_update_retried_on_tick() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::A, tone(2.0), &FixedBpm(None));
        console.play_pause_deck(DeckId::A);
        engine.process_commands();

        fill_queue(&mut console);
        console.toggle_effect(DeckId::A, EffectKind::Filter);
        assert!(!console.graph(DeckId::A).layout().unwrap().contains(StageSlot::Filter));

        engine.process_commands();
        console.tick(Instant::now());
        assert!(console.graph(DeckId::A).layout().unwrap().contains(StageSlot::Filter));
        engine.process_commands();
        assert!(engine.chain_layout(DeckId::A).unwrap().contains(StageSlot::Filter));
    }

    #[test]
    fn test_refused_gains_and_rate_retried_on_tick() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut engine) = live(dir.path());
        console.load_track(DeckId::B, tone(1.0), &FixedBpm(None));
        engine.process_commands();

        fill_queue(&mut console);
        console.set_crossfader(100.0);
        console.set_playback_rate(DeckId::B, 1.1);
        engine.process_commands();
        assert_ne!(engine.deck_gains()[0], 0.0);
        assert_eq!(engine.deck_rate(DeckId::B), 1.0);

        console.tick(Instant::now());
        engine.process_commands();
        assert_eq!(engine.deck_gains()[0], 0.0);
        assert!((engine.deck_rate(DeckId::B) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_idle_meters_decay_to_floor() {
        let mut console = offline();
        let now = Instant::now();
        let mut frame = console.tick(now);
        for _ in 0..100 {
            frame = console.tick(now);
        }
        assert!((frame.levels[0] - 0.02).abs() < 1e-6);
        assert!((frame.pulse - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_store_into_settings() {
        let mut console = offline();
        console.toggle_effect(DeckId::B, EffectKind::Gate);
        console.set_crossfader(10.0);
        console.set_beat_snap(true);

        let mut settings = Settings::default();
        console.store_into(&mut settings);
        assert!(settings.fx_b.gate);
        assert_eq!(settings.crossfader, 10);
        assert!(settings.beat_snap);
    }
}
