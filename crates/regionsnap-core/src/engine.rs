//! The overlay engine: one cooperative task wiring input, the authority and
//! the surface together.

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, sleep_until};

use crate::authority::{Authority, AuthorityResult, BoxFuture, Intent, Notification};
use crate::capture::CaptureSequencer;
use crate::config::EngineConfig;
use crate::input::{InputCoalescer, InputEvent};
use crate::state::{ScreenSize, SelectionState};
use crate::surface::OverlaySurface;
use crate::sync::{RefreshTicket, StateSync};

/// An in-flight state pull tagged with its ticket.
type Pull<'a> = BoxFuture<'a, (RefreshTicket, AuthorityResult<SelectionState>)>;

/// Wait for the surface to present the clean frame.
type Presentation = BoxFuture<'static, ()>;

/// Why [`OverlayEngine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// The host dropped its input sender; the overlay is gone.
    InputClosed,
    /// The authority dismissed the overlay.
    Dismissed,
    /// The authority's notification stream ended; nothing can drive the
    /// selection any more.
    AuthorityLost,
}

/// Client-side overlay engine.
///
/// Owns the coalescer, the state sync client and the capture sequencer.
/// Nothing in here is shared; every handler runs on the task that drives
/// [`run`](Self::run).
pub struct OverlayEngine<A: Authority, S: OverlaySurface> {
    authority: A,
    sync: StateSync<S>,
    input: InputCoalescer,
    capture: CaptureSequencer,
    viewport: ScreenSize,
}

impl<A: Authority, S: OverlaySurface> OverlayEngine<A, S> {
    pub fn new(config: EngineConfig, authority: A, surface: S, viewport: ScreenSize) -> Self {
        Self {
            authority,
            sync: StateSync::new(surface),
            input: InputCoalescer::new(config.frame_interval()),
            capture: CaptureSequencer::new(config.settle_delay()),
            viewport,
        }
    }

    /// Run until the overlay is destroyed or dismissed, or the authority
    /// goes away.
    pub async fn run(
        self,
        mut inputs: UnboundedReceiver<InputEvent>,
        mut notifications: UnboundedReceiver<Notification>,
    ) -> EngineExit {
        let OverlayEngine {
            authority,
            mut sync,
            mut input,
            mut capture,
            viewport,
        } = self;
        let mut pulls: FuturesUnordered<Pull<'_>> = FuturesUnordered::new();
        let mut presentation: Option<Presentation> = None;

        forward(&authority, Intent::Ready);
        forward(&authority, Intent::WindowSize(viewport));
        sync.show_initial_frame(viewport);
        let (_, pull) = start_pull(&authority, &mut sync);
        pulls.push(pull);

        loop {
            let settle_at = capture.deadline();

            tokio::select! {
                event = inputs.recv() => match event {
                    Some(event) => {
                        if let Some(intent) = input.handle(event) {
                            forward(&authority, intent);
                        }
                    }
                    None => {
                        log::info!("Overlay input closed, stopping engine");
                        return EngineExit::InputClosed;
                    }
                },

                Some(intent) = input.next_frame() => {
                    forward(&authority, intent);
                }

                notification = notifications.recv() => match notification {
                    Some(Notification::StateChanged) => {
                        if capture.is_locked() {
                            log::debug!("State change ignored while capture lock is held");
                        } else {
                            let (_, pull) = start_pull(&authority, &mut sync);
                            pulls.push(pull);
                        }
                    }
                    Some(Notification::BeginCapture) => {
                        let (ticket, pull) = start_pull(&authority, &mut sync);
                        sync.discard_before(ticket);
                        capture.begin(ticket);
                        presentation = None;
                        pulls.push(pull);
                        log::info!("Capture started, waiting for clean frame #{}", ticket.get());
                    }
                    Some(Notification::CaptureFinished) => {
                        if capture.release() {
                            presentation = None;
                            log::info!("Capture finished, resuming");
                            let (_, pull) = start_pull(&authority, &mut sync);
                            pulls.push(pull);
                        } else {
                            log::debug!("Capture finished without a capture in progress");
                        }
                    }
                    Some(Notification::Dismiss) => {
                        log::info!("Overlay dismissed by authority");
                        return EngineExit::Dismissed;
                    }
                    None => {
                        log::warn!("Authority notifications closed, stopping engine");
                        return EngineExit::AuthorityLost;
                    }
                },

                Some((ticket, result)) = pulls.next(), if !pulls.is_empty() => {
                    sync.complete_refresh(ticket, result);
                    if capture.pull_settled(ticket) {
                        log::debug!(
                            "Clean frame #{} settled, waiting for presentation",
                            ticket.get()
                        );
                        presentation = Some(sync.presented());
                    }
                }

                () = until_presented(&mut presentation), if presentation.is_some() => {
                    presentation = None;
                    if capture.presented(Instant::now()) {
                        log::debug!("Clean frame presented, arming settle timer");
                    }
                }

                _ = sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => {
                    if let Some(intent) = capture.fire(Instant::now()) {
                        if forward(&authority, intent) {
                            log::info!("Capture requested");
                        } else {
                            capture.release();
                            let (_, pull) = start_pull(&authority, &mut sync);
                            pulls.push(pull);
                        }
                    }
                }
            }
        }
    }
}

/// Issue a ticketed pull.
fn start_pull<'a, A: Authority, S: OverlaySurface>(
    authority: &'a A,
    sync: &mut StateSync<S>,
) -> (RefreshTicket, Pull<'a>) {
    let ticket = sync.begin_refresh();
    let call = authority.get_selection_state();
    (ticket, Box::pin(async move { (ticket, call.await) }))
}

/// Resolve with the pending presentation, or never if there is none.
async fn until_presented(presentation: &mut Option<Presentation>) {
    match presentation {
        Some(frame) => frame.await,
        None => std::future::pending().await,
    }
}

/// Send an intent, logging failures. Returns whether it was enqueued.
fn forward<A: Authority>(authority: &A, intent: Intent) -> bool {
    match authority.send(intent) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to send {:?}: {}", intent, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kurbo::Point;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    use super::*;
    use crate::authority::MemoryAuthority;
    use crate::geometry::{RenderModel, project};
    use crate::input::{ButtonEdge, OverlayKey, PointerButton};
    use crate::state::{Phase, Region};
    use crate::surface::RecordingSurface;

    const SCREEN: ScreenSize = ScreenSize::new(1920.0, 1080.0);

    fn selection(phase: Phase) -> SelectionState {
        SelectionState::new(phase, Some(Region::new(100.0, 50.0, 200.0, 150.0)), SCREEN)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    struct Harness {
        authority: MemoryAuthority,
        surface: RecordingSurface,
        engine: OverlayEngine<MemoryAuthority, RecordingSurface>,
        input_tx: mpsc::UnboundedSender<InputEvent>,
        input_rx: mpsc::UnboundedReceiver<InputEvent>,
        notify_tx: mpsc::UnboundedSender<Notification>,
        notify_rx: mpsc::UnboundedReceiver<Notification>,
    }

    fn harness(state: SelectionState) -> Harness {
        let authority = MemoryAuthority::new(state);
        let surface = RecordingSurface::new();
        let engine =
            OverlayEngine::new(EngineConfig::default(), authority.clone(), surface.clone(), SCREEN);
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx }
    }

    fn count(intents: &[Intent], wanted: Intent) -> usize {
        intents.iter().filter(|i| **i == wanted).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_sequence() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx: _n, notify_rx } =
            harness(selection(Phase::Drawing));

        let driver = async {
            sleep(ms(1)).await;
            assert_eq!(
                authority.intents(),
                vec![Intent::Ready, Intent::WindowSize(SCREEN)]
            );
            assert_eq!(
                surface.frames(),
                vec![RenderModel::dim_all(SCREEN), project(&selection(Phase::Drawing))]
            );
            assert_eq!(authority.pull_count(), 1);
            drop(input_tx);
        };

        let (exit, ()) = tokio::join!(engine.run(input_rx, notify_rx), driver);
        assert_eq!(exit, EngineExit::InputClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_samples_coalesced_per_frame() {
        let Harness { authority, engine, input_tx, input_rx, notify_tx: _n, notify_rx, .. } =
            harness(SelectionState::idle(SCREEN));

        let driver = async {
            sleep(ms(1)).await;
            authority.take_intents();

            for i in 1..=10 {
                let position = Point::new(i as f64, 2.0 * i as f64);
                input_tx.send(InputEvent::PointerMoved { position }).unwrap();
            }
            input_tx
                .send(InputEvent::Button { button: PointerButton::Left, edge: ButtonEdge::Down })
                .unwrap();
            input_tx
                .send(InputEvent::Button { button: PointerButton::Right, edge: ButtonEdge::Down })
                .unwrap();
            input_tx.send(InputEvent::KeyPressed("a".into())).unwrap();
            input_tx.send(InputEvent::KeyPressed("Escape".into())).unwrap();

            sleep(ms(40)).await;
            assert_eq!(
                authority.take_intents(),
                vec![
                    Intent::Button { button: PointerButton::Left, edge: ButtonEdge::Down },
                    Intent::Key(OverlayKey::Escape),
                    Intent::PointerMove { x: 10.0, y: 20.0 },
                ]
            );

            sleep(ms(40)).await;
            assert!(authority.intents().is_empty());
            drop(input_tx);
        };

        let (exit, ()) = tokio::join!(engine.run(input_rx, notify_rx), driver);
        assert_eq!(exit, EngineExit::InputClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pull_discarded() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx } =
            harness(SelectionState::idle(SCREEN));

        let driver = async {
            sleep(ms(1)).await;

            authority.set_state(selection(Phase::Drawing));
            authority.delay_next_pull(ms(30));
            notify_tx.send(Notification::StateChanged).unwrap();
            sleep(ms(1)).await;

            authority.set_state(selection(Phase::Confirmed));
            notify_tx.send(Notification::StateChanged).unwrap();
            sleep(ms(1)).await;
            assert_eq!(surface.last(), Some(project(&selection(Phase::Confirmed))));
            let frames = surface.len();

            sleep(ms(40)).await;
            assert_eq!(surface.len(), frames);
            assert_eq!(surface.last(), Some(project(&selection(Phase::Confirmed))));
            drop(input_tx);
        };

        tokio::join!(engine.run(input_rx, notify_rx), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_during_refresh_keeps_clean_frame() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx } =
            harness(selection(Phase::Confirmed));

        let driver = async {
            sleep(ms(1)).await;

            // Slow ordinary refresh that would paint the moving box.
            authority.set_state(selection(Phase::Moving));
            authority.delay_next_pull(ms(50));
            notify_tx.send(Notification::StateChanged).unwrap();
            sleep(ms(1)).await;

            authority.set_state(selection(Phase::Capturing));
            notify_tx.send(Notification::BeginCapture).unwrap();
            sleep(ms(1)).await;
            assert_eq!(surface.last(), Some(RenderModel::suppressed()));
            assert_eq!(count(&authority.intents(), Intent::RequestCapture), 0);

            sleep(ms(10)).await;
            assert_eq!(count(&authority.intents(), Intent::RequestCapture), 1);
            assert_eq!(surface.last(), Some(RenderModel::suppressed()));
            let frames = surface.len();

            // The slow refresh lands after the capture and is dropped.
            sleep(ms(60)).await;
            assert_eq!(surface.len(), frames);
            assert_eq!(surface.last(), Some(RenderModel::suppressed()));

            authority.set_state(SelectionState::idle(SCREEN));
            notify_tx.send(Notification::CaptureFinished).unwrap();
            sleep(ms(1)).await;
            assert_eq!(surface.last(), Some(RenderModel::dim_all(SCREEN)));
            drop(input_tx);
        };

        tokio::join!(engine.run(input_rx, notify_rx), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_ignores_state_changes_until_finished() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx } =
            harness(selection(Phase::Confirmed));

        let driver = async {
            sleep(ms(1)).await;
            authority.set_state(selection(Phase::Capturing));
            notify_tx.send(Notification::BeginCapture).unwrap();
            sleep(ms(10)).await;
            assert_eq!(authority.pull_count(), 2);

            notify_tx.send(Notification::StateChanged).unwrap();
            notify_tx.send(Notification::StateChanged).unwrap();
            sleep(ms(5)).await;
            assert_eq!(authority.pull_count(), 2);
            assert_eq!(surface.last(), Some(RenderModel::suppressed()));

            authority.set_state(selection(Phase::Confirmed));
            notify_tx.send(Notification::CaptureFinished).unwrap();
            sleep(ms(1)).await;
            assert_eq!(authority.pull_count(), 3);
            assert_eq!(surface.last(), Some(project(&selection(Phase::Confirmed))));

            notify_tx.send(Notification::StateChanged).unwrap();
            sleep(ms(1)).await;
            assert_eq!(authority.pull_count(), 4);

            // A stray finish with no capture in progress pulls nothing.
            notify_tx.send(Notification::CaptureFinished).unwrap();
            sleep(ms(1)).await;
            assert_eq!(authority.pull_count(), 4);
            drop(input_tx);
        };

        tokio::join!(engine.run(input_rx, notify_rx), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_capture_pull_still_requests_capture() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx } =
            harness(selection(Phase::Confirmed));

        let driver = async {
            sleep(ms(1)).await;
            let frames = surface.len();

            authority.fail_next_pulls(1);
            notify_tx.send(Notification::BeginCapture).unwrap();
            sleep(ms(10)).await;

            assert_eq!(count(&authority.intents(), Intent::RequestCapture), 1);
            assert_eq!(surface.len(), frames);
            drop(input_tx);
        };

        tokio::join!(engine.run(input_rx, notify_rx), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_capture_request_releases_lock() {
        let Harness { authority, engine, input_tx, input_rx, notify_tx, notify_rx, .. } =
            harness(selection(Phase::Confirmed));

        let driver = async {
            sleep(ms(1)).await;
            authority.close();
            notify_tx.send(Notification::BeginCapture).unwrap();
            sleep(ms(10)).await;

            // Capture pull plus the recovery refresh.
            assert_eq!(authority.pull_count(), 3);

            notify_tx.send(Notification::StateChanged).unwrap();
            sleep(ms(1)).await;
            assert_eq!(authority.pull_count(), 4);
            drop(input_tx);
        };

        tokio::join!(engine.run(input_rx, notify_rx), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_stops_engine() {
        let Harness { engine, input_tx: _input_tx, input_rx, notify_tx, notify_rx, .. } =
            harness(SelectionState::idle(SCREEN));

        let driver = async {
            sleep(ms(1)).await;
            notify_tx.send(Notification::Dismiss).unwrap();
        };

        let (exit, ()) = tokio::join!(engine.run(input_rx, notify_rx), driver);
        assert_eq!(exit, EngineExit::Dismissed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_waits_for_presentation() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx } =
            harness(selection(Phase::Confirmed));

        let driver = async {
            sleep(ms(1)).await;
            surface.set_present_delay(ms(30));

            authority.set_state(selection(Phase::Capturing));
            notify_tx.send(Notification::BeginCapture).unwrap();
            sleep(ms(1)).await;
            assert_eq!(surface.last(), Some(RenderModel::suppressed()));

            // Applied but not yet on screen: no capture past the settle delay.
            sleep(ms(20)).await;
            assert_eq!(count(&authority.intents(), Intent::RequestCapture), 0);

            // Presented at +30 ms, requested one settle delay later.
            sleep(ms(20)).await;
            assert_eq!(count(&authority.intents(), Intent::RequestCapture), 1);
            drop(input_tx);
        };

        tokio::join!(engine.run(input_rx, notify_rx), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarted_capture_ignores_earlier_presentation() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx } =
            harness(selection(Phase::Confirmed));

        let driver = async {
            sleep(ms(1)).await;
            surface.set_present_delay(ms(30));
            authority.set_state(selection(Phase::Capturing));
            notify_tx.send(Notification::BeginCapture).unwrap();
            sleep(ms(20)).await;

            // Second handshake: its own clean frame takes another 30 ms.
            notify_tx.send(Notification::BeginCapture).unwrap();
            sleep(ms(20)).await;
            assert_eq!(count(&authority.intents(), Intent::RequestCapture), 0);

            sleep(ms(20)).await;
            assert_eq!(count(&authority.intents(), Intent::RequestCapture), 1);
            drop(input_tx);
        };

        tokio::join!(engine.run(input_rx, notify_rx), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authority_loss_stops_engine() {
        let Harness { authority, surface, engine, input_tx, input_rx, notify_tx, notify_rx } =
            harness(selection(Phase::Confirmed));

        let driver = async {
            sleep(ms(1)).await;
            assert!(surface.last().unwrap().has_visible_chrome());

            authority.close();
            drop(notify_tx);
        };

        let (exit, ()) = tokio::join!(engine.run(input_rx, notify_rx), driver);
        assert_eq!(exit, EngineExit::AuthorityLost);
        // Stopped with the host's input sender still open.
        drop(input_tx);
    }
}
