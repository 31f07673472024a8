//! Integration tests for Prefill Core

use prefill_core::{
    Binder, BufferEvent, BufferForcer, ChannelSink, ControllerStatus, EventRecord, EventStatus,
    ForcerConfig, MediaSource, SimulatedSource, StepPlanner, StopReason, StrategyAdapter,
    StrategyMode,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn drain(rx: &mut mpsc::Receiver<EventRecord>) -> Vec<BufferEvent> {
    let mut events = Vec::new();
    while let Ok(record) = rx.try_recv() {
        events.push(record.event);
    }
    events
}

fn forcer(source: Arc<SimulatedSource>, config: ForcerConfig) -> (BufferForcer, mpsc::Receiver<EventRecord>) {
    let (sink, rx) = ChannelSink::new(8192);
    let forcer = BufferForcer::new(config, source, Arc::new(sink)).unwrap();
    (forcer, rx)
}

// =============================================================================
// Planner Tests
// =============================================================================

#[test]
fn test_scenario_a_medium_asset_first_step() {
    let planner = StepPlanner::new(&ForcerConfig::default());
    assert_eq!(planner.step(200.0, false, 0.0, 1.0), 10.0);
}

#[test]
fn test_scenario_b_long_asset_capped() {
    let planner = StepPlanner::new(&ForcerConfig::default());
    assert_eq!(planner.step(2000.0, false, 6.0, 2.0), 60.0);
}

#[test]
fn test_planner_respects_custom_bounds() {
    let config = ForcerConfig {
        min_step_seconds: 8.0,
        max_step_seconds: 20.0,
        ..Default::default()
    };
    let planner = StepPlanner::new(&config);
    assert_eq!(planner.step(30.0, false, 0.0, 1.0), 8.0);
    assert_eq!(planner.step(5000.0, false, 10.0, 2.0), 20.0);
}

// =============================================================================
// Strategy Tests
// =============================================================================

#[test]
fn test_monotonic_escalation() {
    let mut strategy = StrategyAdapter::new();
    for _ in 0..10 {
        strategy.record(false);
    }
    assert_eq!(strategy.mode(), StrategyMode::Aggressive);
    assert_eq!(strategy.multiplier(), 2.0);
}

#[test]
fn test_decay_back_to_normal() {
    let mut strategy = StrategyAdapter::new();
    for _ in 0..5 {
        strategy.record(false);
    }
    assert_eq!(strategy.multiplier(), 1.5);
    for _ in 0..5 {
        strategy.record(true);
    }
    assert_eq!(strategy.mode(), StrategyMode::Normal);
    assert_eq!(strategy.multiplier(), 1.0);
}

// =============================================================================
// Controller Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_buffers_whole_asset() {
    let source = Arc::new(SimulatedSource::new(300.0).with_fetch_rate(30.0).with_quality("720p"));
    let (mut forcer, mut rx) = forcer(source.clone(), ForcerConfig::default());

    for _ in 0..100 {
        forcer.tick().await;
        if forcer.status() == ControllerStatus::Idle && forcer.state().generation > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    assert_eq!(forcer.status(), ControllerStatus::Idle);
    assert!(source.buffered_end() >= 299.5);
    assert_eq!(source.current_position(), 0.0);

    let events = drain(&mut rx);
    assert_eq!(events.first().map(|e| e.status), Some(EventStatus::Started));
    let last = events.last().unwrap();
    assert_eq!(last.status, EventStatus::Complete);
    assert_eq!(last.reason, Some(StopReason::FullyBuffered));
    assert!(last.progress > 99.0);
    assert_eq!(last.quality.as_deref(), Some("720p"));

    // Fully buffered: the next tick does not start a new session
    forcer.tick().await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_remaining_below_epsilon() {
    let source = Arc::new(SimulatedSource::new(500.0).with_fetch_rate(0.0));
    let (mut forcer, mut rx) = forcer(source.clone(), ForcerConfig::default());

    forcer.tick().await;
    assert_eq!(forcer.status(), ControllerStatus::Buffering);

    source.set_buffered(100.0, 499.7);
    forcer.tick().await;

    assert_eq!(forcer.status(), ControllerStatus::Idle);
    let last = drain(&mut rx).pop().unwrap();
    assert_eq!(last.status, EventStatus::Complete);
    assert_eq!(last.reason, Some(StopReason::FullyBuffered));
    assert_eq!(last.attempts, 1);

    // The tail reaches the end, so later ticks leave the cursor alone
    let seeks = source.seeks().len();
    for _ in 0..6 {
        forcer.tick().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    assert_eq!(forcer.status(), ControllerStatus::Idle);
    assert_eq!(source.seeks().len(), seeks);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fragmented_buffer_completes_once() {
    let source = Arc::new(SimulatedSource::new(500.0).with_fetch_rate(0.0));
    let (mut forcer, mut rx) = forcer(source.clone(), ForcerConfig::default());

    forcer.tick().await;
    assert_eq!(forcer.status(), ControllerStatus::Buffering);

    // Gap between the cursor and a tail range that reaches the end
    source.add_fragment(30.0, 80.0);
    source.add_fragment(420.0, 499.8);
    forcer.tick().await;
    assert_eq!(forcer.status(), ControllerStatus::Idle);

    let seeks = source.seeks().len();
    for _ in 0..6 {
        forcer.tick().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let events = drain(&mut rx);
    let started = events.iter().filter(|e| e.status == EventStatus::Started).count();
    let completes: Vec<_> = events
        .iter()
        .filter(|e| e.status == EventStatus::Complete)
        .collect();
    assert_eq!(started, 1);
    assert_eq!(completes.len(), 1);
    assert_eq!(completes[0].reason, Some(StopReason::FullyBuffered));
    assert_eq!(source.seeks().len(), seeks);
}

#[tokio::test(start_paused = true)]
async fn test_fragmented_buffer_never_starts() {
    let source = Arc::new(SimulatedSource::new(500.0).with_fetch_rate(0.0));
    source.add_fragment(100.0, 499.7);
    let (mut forcer, mut rx) = forcer(source.clone(), ForcerConfig::default());

    forcer.tick().await;
    assert_eq!(forcer.status(), ControllerStatus::Idle);
    assert!(source.seeks().is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_quality_change_restarts() {
    let source = Arc::new(
        SimulatedSource::new(1200.0)
            .with_fetch_rate(2.0)
            .with_quality("720p"),
    );
    let (mut forcer, mut rx) = forcer(source.clone(), ForcerConfig::default());

    forcer.tick().await;
    forcer.tick().await;
    let generation = forcer.state().generation;
    drain(&mut rx);

    source.switch_quality("1080p");
    forcer.tick().await;

    let events = drain(&mut rx);
    let statuses: Vec<_> = events.iter().map(|e| e.status).collect();
    assert_eq!(
        &statuses[..3],
        &[EventStatus::QualityChange, EventStatus::Complete, EventStatus::Started]
    );

    assert_eq!(events[0].previous_quality.as_deref(), Some("720p"));
    assert_eq!(events[0].quality.as_deref(), Some("1080p"));
    assert_eq!(events[1].reason, Some(StopReason::QualityRestart));
    assert_eq!(events[2].quality.as_deref(), Some("1080p"));
    assert_eq!(events[2].attempts, 0);

    assert_eq!(forcer.status(), ControllerStatus::Buffering);
    assert_eq!(forcer.state().generation, generation + 1);
    assert_eq!(forcer.strategy().multiplier(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_e_attempt_budget() {
    let source = Arc::new(SimulatedSource::new(3000.0).with_fetch_rate(0.0));
    let (mut forcer, mut rx) = forcer(source.clone(), ForcerConfig::default());

    for _ in 0..501 {
        forcer.tick().await;
    }

    assert_eq!(forcer.status(), ControllerStatus::Idle);
    let events = drain(&mut rx);
    let last = events.last().unwrap();
    assert_eq!(last.status, EventStatus::Complete);
    assert_eq!(last.attempts, 500);
    assert_eq!(last.reason, Some(StopReason::AttemptsExhausted));

    // No further ticks act until the next start trigger
    let seeks = source.seeks().len();
    for _ in 0..5 {
        forcer.tick().await;
    }
    assert_eq!(forcer.status(), ControllerStatus::Idle);
    assert_eq!(source.seeks().len(), seeks);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_quality_change_clears_halt_latch() {
    let config = ForcerConfig {
        max_attempts: 3,
        ..Default::default()
    };
    let source = Arc::new(
        SimulatedSource::new(3000.0)
            .with_fetch_rate(0.0)
            .with_quality("480p"),
    );
    let (mut forcer, _rx) = forcer(source.clone(), config);

    for _ in 0..4 {
        forcer.tick().await;
    }
    assert_eq!(forcer.state().halted, Some(StopReason::AttemptsExhausted));

    source.switch_quality("720p");
    forcer.tick().await;
    assert_eq!(forcer.status(), ControllerStatus::Buffering);
    assert_eq!(forcer.state().halted, None);
}

#[tokio::test(start_paused = true)]
async fn test_restoration_after_every_stop() {
    let source = Arc::new(
        SimulatedSource::new(900.0)
            .with_fetch_rate(3.0)
            .with_position(77.0)
            .with_playback_rate(0.75)
            .with_paused(true)
            .with_quality("360p"),
    );
    let (mut forcer, _rx) = forcer(source.clone(), ForcerConfig::default());

    forcer.tick().await;
    source.switch_quality("480p");
    forcer.tick().await;

    // Restarted session captured the same playback state again
    forcer.unbind().await;
    assert_eq!(source.current_position(), 77.0);
    assert_eq!(source.playback_rate().await.unwrap(), 0.75);
    assert!(source.is_paused().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_strategy_invariant_holds_every_tick() {
    let source = Arc::new(SimulatedSource::new(2400.0).with_fetch_rate(0.5));
    let (mut forcer, _rx) = forcer(source, ForcerConfig::default());

    for _ in 0..60 {
        forcer.tick().await;
        let snapshot = forcer.snapshot();
        match snapshot.strategy {
            StrategyMode::Normal => assert_eq!(snapshot.step_multiplier, 1.0),
            StrategyMode::Aggressive => {
                assert!((1.0..=2.0).contains(&snapshot.step_multiplier))
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_short_form_hint_uses_fixed_step() {
    let source = Arc::new(
        SimulatedSource::new(900.0)
            .with_fetch_rate(10.0)
            .with_short_form(true),
    );
    let (mut forcer, mut rx) = forcer(source.clone(), ForcerConfig::default());

    forcer.tick().await;
    assert_eq!(source.seeks().first().copied(), Some(5.0));
    assert!(drain(&mut rx)[0].is_short);
}

#[tokio::test(start_paused = true)]
async fn test_closed_sink_does_not_affect_controller() {
    let source = Arc::new(SimulatedSource::new(200.0).with_fetch_rate(20.0));
    let (mut forcer, rx) = forcer(source, ForcerConfig::default());
    drop(rx);

    forcer.tick().await;
    assert_eq!(forcer.status(), ControllerStatus::Buffering);
    assert_eq!(forcer.state().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_detached_source_never_starts() {
    let source = Arc::new(SimulatedSource::new(200.0));
    source.detach();
    let (mut forcer, mut rx) = forcer(source, ForcerConfig::default());

    forcer.tick().await;
    assert_eq!(forcer.status(), ControllerStatus::Idle);
    assert!(drain(&mut rx).is_empty());
}

// =============================================================================
// Binding Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_resize_signal_restarts_without_waiting_for_tick() {
    let config = ForcerConfig {
        tick_interval_ms: 60_000,
        ..Default::default()
    };
    let (sink, mut rx) = ChannelSink::new(1024);
    let mut binder = Binder::new(config, Arc::new(sink)).unwrap();

    let source = Arc::new(
        SimulatedSource::new(1800.0)
            .with_fetch_rate(5.0)
            .with_quality("720p"),
    );
    binder.on_source_available(source.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    source.switch_quality("1080p");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let statuses: Vec<_> = drain(&mut rx).iter().map(|e| e.status).collect();
    let started = statuses.iter().filter(|s| **s == EventStatus::Started).count();
    assert!(statuses.contains(&EventStatus::QualityChange));
    assert_eq!(started, 2);

    binder.on_source_removed().await;
}

#[test]
fn test_invalid_config_rejected_at_bind() {
    let config = ForcerConfig {
        max_attempts: 0,
        ..Default::default()
    };
    let (sink, _rx) = ChannelSink::new(1);
    assert!(Binder::new(config, Arc::new(sink)).is_err());
}
