use std::sync::atomic::Ordering;
use std::sync::Arc;
use teleflood::core::{Packet, StreamConfig};
use teleflood::engine::{RunSummary, Scheduler, SchedulerState, StopReason};
use teleflood::signals::{PlanLimits, SignalPlan, SignalPlanBuilder};
use teleflood::transport::{MockTransport, SentDatagram};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration, Instant};

const SMALL_GROUPS: usize = 3;

fn config(rate_hz: f64, max_frames: Option<u64>) -> StreamConfig {
    StreamConfig {
        rate_hz,
        log_interval_secs: 0.25,
        max_frames,
        ..Default::default()
    }
}

fn small_plan(seed: u64) -> Arc<SignalPlan> {
    let plan = SignalPlanBuilder::new(seed)
        .groups(SMALL_GROUPS)
        .signals_per_group(4)
        .limits(PlanLimits {
            min_groups: 1,
            min_total_signals: 1,
        })
        .build();
    Arc::new(plan)
}

fn decode_all(sent: &[SentDatagram]) -> Vec<Packet> {
    sent.iter().map(|d| d.decode().unwrap()).collect()
}

async fn run_for(
    config: &StreamConfig,
    plan: Arc<SignalPlan>,
    transport: MockTransport,
    duration: Duration,
) -> RunSummary {
    let mut scheduler = Scheduler::new(config, plan).unwrap();
    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { scheduler.run(transport, rx).await });

    sleep(duration).await;
    let _ = tx.send(());
    handle.await.unwrap().unwrap()
}

async fn run_to_limit(config: &StreamConfig, plan: Arc<SignalPlan>, transport: MockTransport) -> RunSummary {
    let mut scheduler = Scheduler::new(config, plan).unwrap();
    let (_tx, rx) = broadcast::channel(1);
    let summary = scheduler.run(transport, rx).await.unwrap();
    assert_eq!(
        scheduler.state(),
        SchedulerState::Stopped {
            reason: StopReason::FrameLimit
        }
    );
    summary
}

#[tokio::test(start_paused = true)]
async fn test_one_second_at_50hz() {
    let plan = Arc::new(SignalPlanBuilder::new(1337).build());
    let transport = MockTransport::new();
    let sent = transport.sent();

    let summary = run_for(&config(50.0, None), plan, transport, Duration::from_secs(1)).await;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert!((48..=52).contains(&summary.frames), "frames = {}", summary.frames);
    assert_eq!(summary.datagrams, summary.frames * 20);
    assert_eq!(summary.resyncs, 0);
    assert_eq!(sent.lock().unwrap().len() as u64, summary.datagrams);
}

#[tokio::test]
async fn test_one_second_at_50hz_real_clock() {
    let transport = MockTransport::new();
    let summary = run_for(
        &config(50.0, None),
        small_plan(1),
        transport,
        Duration::from_secs(1),
    )
    .await;

    assert!((47..=53).contains(&summary.frames), "frames = {}", summary.frames);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_evenly_spaced() {
    let transport = MockTransport::new();
    let sent = transport.sent();
    run_to_limit(&config(50.0, Some(20)), small_plan(1), transport).await;

    let sent = sent.lock().unwrap();
    let tick_starts: Vec<Instant> = sent.iter().step_by(SMALL_GROUPS).map(|d| d.sent_at).collect();
    assert_eq!(tick_starts.len(), 20);
    for pair in tick_starts.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_millis(19) && gap <= Duration::from_millis(21),
            "gap = {:?}",
            gap
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_frames_are_sequential_and_shared_per_tick() {
    let plan = small_plan(7);
    let transport = MockTransport::new();
    let sent = transport.sent();

    let summary = run_to_limit(&config(100.0, Some(10)), plan.clone(), transport).await;
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.datagrams, 10 * SMALL_GROUPS as u64);

    let packets = decode_all(&sent.lock().unwrap());
    assert_eq!(packets.len(), 10 * SMALL_GROUPS);

    for (tick, chunk) in packets.chunks(SMALL_GROUPS).enumerate() {
        for (group, packet) in plan.iter().zip(chunk) {
            assert_eq!(packet.frame, tick as u64);
            assert_eq!(packet.group_name, group.name);
            assert_eq!(packet.timestamp, chunk[0].timestamp);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_same_stream() {
    let first = MockTransport::new();
    let first_sent = first.sent();
    run_to_limit(&config(50.0, Some(10)), small_plan(1337), first).await;

    let second = MockTransport::new();
    let second_sent = second.sent();
    run_to_limit(&config(50.0, Some(10)), small_plan(1337), second).await;

    let a = decode_all(&first_sent.lock().unwrap());
    let b = decode_all(&second_sent.lock().unwrap());
    assert_eq!(a.len(), b.len());
    for (pa, pb) in a.iter().zip(&b) {
        assert_eq!(pa.group_name, pb.group_name);
        assert_eq!(pa.frame, pb.frame);
        assert_eq!(pa.values, pb.values);
    }
}

#[tokio::test(start_paused = true)]
async fn test_stall_resynchronizes_without_burst() {
    // Stall for 500ms right after the last datagram of tick 5
    let stall_after = 6 * SMALL_GROUPS;
    let transport = MockTransport::new().with_stall(stall_after, Duration::from_millis(500));
    let sent = transport.sent();

    let summary = run_to_limit(&config(50.0, Some(10)), small_plan(1), transport).await;
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.resyncs, 1);

    let sent = sent.lock().unwrap();
    let tick_starts: Vec<Instant> = sent.iter().step_by(SMALL_GROUPS).map(|d| d.sent_at).collect();

    let stall_gap = tick_starts[6] - tick_starts[5];
    assert!(stall_gap >= Duration::from_millis(500), "gap = {:?}", stall_gap);

    // After the stall the next tick runs alone, then normal spacing resumes
    let resumed = tick_starts[6];
    let burst = sent.iter().filter(|d| d.sent_at == resumed).count();
    assert_eq!(burst, SMALL_GROUPS);
    for pair in tick_starts[6..].windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(19));
    }
}

#[tokio::test(start_paused = true)]
async fn test_stall_does_not_change_values() {
    let steady = MockTransport::new();
    let steady_sent = steady.sent();
    run_to_limit(&config(50.0, Some(10)), small_plan(3), steady).await;

    let stalled = MockTransport::new().with_stall(4, Duration::from_millis(300));
    let stalled_sent = stalled.sent();
    run_to_limit(&config(50.0, Some(10)), small_plan(3), stalled).await;

    let a = decode_all(&steady_sent.lock().unwrap());
    let b = decode_all(&stalled_sent.lock().unwrap());
    for (pa, pb) in a.iter().zip(&b) {
        assert_eq!(pa.frame, pb.frame);
        assert_eq!(pa.values, pb.values);
    }
}

#[tokio::test(start_paused = true)]
async fn test_send_errors_do_not_stop_the_loop() {
    let transport = MockTransport::new().with_failures_every(3);
    let sent = transport.sent();

    let summary = run_to_limit(&config(50.0, Some(5)), small_plan(1), transport).await;

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.send_errors, 5);
    assert_eq!(summary.datagrams, 10);
    assert_eq!(sent.lock().unwrap().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_is_prompt() {
    let mut scheduler = Scheduler::new(&config(1.0, None), small_plan(1)).unwrap();
    let metrics = scheduler.metrics();
    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move {
        let summary = scheduler.run(MockTransport::new(), rx).await;
        (summary, scheduler.state())
    });

    sleep(Duration::from_millis(10)).await;
    let cancelled_at = Instant::now();
    tx.send(()).unwrap();
    let (summary, state) = handle.await.unwrap();
    let summary = summary.unwrap();

    assert!(Instant::now() - cancelled_at <= Duration::from_millis(1));
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(metrics.frames_emitted(), 1);
    assert_eq!(
        state,
        SchedulerState::Stopped {
            reason: StopReason::Cancelled
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_dropped_shutdown_sender_stops_run() {
    let mut scheduler = Scheduler::new(&config(50.0, None), small_plan(1)).unwrap();
    let (tx, rx) = broadcast::channel::<()>(1);
    drop(tx);

    let summary = scheduler.run(MockTransport::new(), rx).await.unwrap();
    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.frames, 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_released_on_every_exit() {
    let transport = MockTransport::new();
    let released = transport.released_flag();
    run_to_limit(&config(50.0, Some(2)), small_plan(1), transport).await;
    assert!(released.load(Ordering::SeqCst));

    let transport = MockTransport::new();
    let released = transport.released_flag();
    run_for(&config(50.0, None), small_plan(1), transport, Duration::from_millis(50)).await;
    assert!(released.load(Ordering::SeqCst));

    // Rejected run on a stopped scheduler still drops the transport
    let mut scheduler = Scheduler::new(&config(50.0, Some(1)), small_plan(1)).unwrap();
    let (tx, rx) = broadcast::channel(1);
    scheduler.run(MockTransport::new(), rx).await.unwrap();

    let transport = MockTransport::new();
    let released = transport.released_flag();
    assert!(scheduler.run(transport, tx.subscribe()).await.is_err());
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_invalid_config_is_fatal() {
    let bad_rate = StreamConfig {
        rate_hz: 0.0,
        ..Default::default()
    };
    let bad_interval = StreamConfig {
        log_interval_secs: -1.0,
        ..Default::default()
    };
    let glacial_rate = StreamConfig {
        rate_hz: 1e-19,
        max_frames: Some(2),
        ..Default::default()
    };
    assert!(Scheduler::new(&bad_rate, small_plan(1)).is_err());
    assert!(Scheduler::new(&bad_interval, small_plan(1)).is_err());
    assert!(Scheduler::new(&glacial_rate, small_plan(1)).is_err());
}

#[test]
fn test_new_scheduler_is_idle() {
    let scheduler = Scheduler::new(&config(50.0, None), small_plan(1)).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(scheduler.plan().group_count(), SMALL_GROUPS);
}
