//! Tick-driven pipeline coordinator.
//!
//! receive → texts → synthesize → audio → play
//!
//! Every tick visits the three stages in order. A stage whose slot is idle
//! gets the oldest item from its input queue; a stage whose operation has
//! finished hands its result to the next queue. Only this struct touches the
//! queues and slots, so there is no locking.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::stage::{AudioBuffer, PendingText, Play, Receive, StageSlot, Synthesize};

const RECEIVE: &str = "receive";
const SYNTHESIS: &str = "synthesis";
const PLAYBACK: &str = "playback";

/// Running totals since the scheduler was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub synthesized: u64,
    pub played: u64,
    pub transport_errors: u64,
    pub synthesis_errors: u64,
    pub playback_errors: u64,
    pub overflow_drops: u64,
}

pub struct Scheduler {
    receiver: Box<dyn Receive>,
    synthesizer: Box<dyn Synthesize>,
    player: Box<dyn Play>,

    texts: VecDeque<PendingText>,
    audio: VecDeque<AudioBuffer>,

    receive_slot: StageSlot<PendingText>,
    synthesis_slot: StageSlot<AudioBuffer>,
    playback_slot: StageSlot<()>,

    period: Duration,
    max_pending: Option<usize>,
    stats: PipelineStats,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        receiver: Box<dyn Receive>,
        synthesizer: Box<dyn Synthesize>,
        player: Box<dyn Play>,
    ) -> Self {
        Self {
            receiver,
            synthesizer,
            player,
            texts: VecDeque::new(),
            audio: VecDeque::new(),
            receive_slot: StageSlot::Idle,
            synthesis_slot: StageSlot::Idle,
            playback_slot: StageSlot::Idle,
            period: config.tick(),
            max_pending: config.max_pending,
            stats: PipelineStats::default(),
        }
    }

    /// Tick forever.
    pub async fn run(&mut self) {
        info!(
            "Scheduler running (tick {}ms, queue bound {})",
            self.period.as_millis(),
            self.max_pending
                .map_or_else(|| "none".to_string(), |n| n.to_string())
        );

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.tick();
        }
    }

    /// One coordination pass over all three stages. Never blocks.
    ///
    /// Must be called from within a tokio runtime, since dispatch spawns tasks.
    pub fn tick(&mut self) {
        self.step_receive();
        self.step_synthesis();
        self.step_playback();
    }

    fn step_receive(&mut self) {
        self.receive_slot.poll(RECEIVE);
        if self.receive_slot.is_idle() {
            self.receive_slot.dispatch(self.receiver.receive());
            debug!("start receive ({})", self.queue_summary());
            return;
        }
        match self.receive_slot.take_finished() {
            Some(Ok(text)) => {
                self.stats.received += 1;
                if Self::push_bounded(&mut self.texts, text, self.max_pending) {
                    debug!("stop receive ({})", self.queue_summary());
                } else {
                    self.stats.overflow_drops += 1;
                    warn!("Text queue full, dropping incoming message");
                }
            }
            Some(Err(e)) => {
                self.stats.transport_errors += 1;
                warn!("Discarding inbound datagram: {e}");
            }
            None => {}
        }
    }

    fn step_synthesis(&mut self) {
        self.synthesis_slot.poll(SYNTHESIS);
        if self.synthesis_slot.is_idle() {
            if let Some(text) = self.texts.pop_front() {
                self.synthesis_slot.dispatch(self.synthesizer.synthesize(text));
                debug!("start synthesis ({})", self.queue_summary());
            }
            return;
        }
        match self.synthesis_slot.take_finished() {
            Some(Ok(audio)) => {
                self.stats.synthesized += 1;
                if Self::push_bounded(&mut self.audio, audio, self.max_pending) {
                    debug!("stop synthesis ({})", self.queue_summary());
                } else {
                    self.stats.overflow_drops += 1;
                    warn!("Audio queue full, dropping synthesized audio");
                }
            }
            Some(Err(e)) => {
                self.stats.synthesis_errors += 1;
                warn!("Dropping message: {e}");
            }
            None => {}
        }
    }

    fn step_playback(&mut self) {
        self.playback_slot.poll(PLAYBACK);
        if self.playback_slot.is_idle() {
            if let Some(audio) = self.audio.pop_front() {
                self.playback_slot.dispatch(self.player.play(audio));
                debug!("start playback ({})", self.queue_summary());
            }
            return;
        }
        match self.playback_slot.take_finished() {
            Some(Ok(())) => {
                self.stats.played += 1;
                debug!("stop playback ({})", self.queue_summary());
            }
            Some(Err(e)) => {
                self.stats.playback_errors += 1;
                warn!("Dropping audio: {e}");
            }
            None => {}
        }
    }

    fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, bound: Option<usize>) -> bool {
        if bound.is_some_and(|max| queue.len() >= max) {
            return false;
        }
        queue.push_back(item);
        true
    }

    fn queue_summary(&self) -> String {
        format!("texts={} audio={}", self.texts.len(), self.audio.len())
    }

    pub fn pending_texts(&self) -> usize {
        self.texts.len()
    }

    pub fn pending_audio(&self) -> usize {
        self.audio.len()
    }

    pub fn is_synthesizing(&self) -> bool {
        self.synthesis_slot.is_running()
    }

    pub fn is_playing(&self) -> bool {
        self.playback_slot.is_running()
    }

    /// True when nothing is queued and neither synthesis nor playback is in
    /// flight. The receive slot is always busy waiting for input.
    pub fn is_drained(&self) -> bool {
        self.texts.is_empty()
            && self.audio.is_empty()
            && self.synthesis_slot.is_idle()
            && self.playback_slot.is_idle()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("texts", &self.texts.len())
            .field("audio", &self.audio.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
