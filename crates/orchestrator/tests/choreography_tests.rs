use cubewright_core::{Command, Entity, Phase, SessionParams, SessionStatus, DEFAULT_SENTINEL};
use events::{Event, EventBus};
use orchestrator::{
    pulse, Batch, Config, DelayConfig, Engine, EntityRegistry, FailurePolicy, Operation,
    PulseTiming, RecordingSleeper, Record, Sequencer, Strategy, Structure,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use wire::ReadMode;

const NECK_JOINTS: [&str; 2] = [
    "joint_hinge_head2_BASE_neck_BASE",
    "joint_hinge_neck_BASE_body2_BASE",
];

#[derive(Default)]
struct Recorded {
    passwords: Mutex<Vec<String>>,
    /// (connection index, command)
    frames: Mutex<Vec<(usize, Value)>>,
    connections: AtomicUsize,
}

/// In-process stand-in for the simulation server. Acknowledges the
/// handshake, answers joint queries and records every command it sees.
struct FakeServer {
    address: String,
    recorded: Arc<Recorded>,
}

impl FakeServer {
    async fn start(joints: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let recorded = Arc::new(Recorded::default());
        let joints: Vec<String> = joints.iter().map(|j| j.to_string()).collect();

        let state = Arc::clone(&recorded);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = state.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, index, Arc::clone(&state), joints.clone()));
            }
        });

        Self { address, recorded }
    }

    fn connections(&self) -> usize {
        self.recorded.connections.load(Ordering::SeqCst)
    }

    fn passwords(&self) -> Vec<String> {
        self.recorded.passwords.lock().unwrap().clone()
    }

    fn frames(&self) -> Vec<Value> {
        self.recorded
            .frames
            .lock()
            .unwrap()
            .iter()
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    fn frames_by_connection(&self) -> BTreeMap<usize, Vec<Value>> {
        let mut grouped: BTreeMap<usize, Vec<Value>> = BTreeMap::new();
        for (index, frame) in self.recorded.frames.lock().unwrap().iter() {
            grouped.entry(*index).or_default().push(frame.clone());
        }
        grouped
    }

    /// Commands are written before the client's barrier releases, but the
    /// server may still be reading them.
    async fn wait_for_frames(&self, count: usize) -> Vec<Value> {
        for _ in 0..200 {
            if self.recorded.frames.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.frames()
    }
}

async fn serve(mut stream: TcpStream, index: usize, state: Arc<Recorded>, joints: Vec<String>) {
    let mut buffer = Vec::new();
    let Some(password) = next_frame(&mut stream, &mut buffer).await else {
        return;
    };
    state.passwords.lock().unwrap().push(password);
    if reply(&mut stream, &json!({"status": "authenticated"})).await.is_err() {
        return;
    }

    while let Some(frame) = next_frame(&mut stream, &mut buffer).await {
        let Ok(command) = serde_json::from_str::<Value>(&frame) else {
            continue;
        };
        let is_query = command["type"] == "get_joints_for_cube";
        state.frames.lock().unwrap().push((index, command));
        if is_query && reply(&mut stream, &json!({ "joints": joints })).await.is_err() {
            return;
        }
    }
}

async fn reply(stream: &mut TcpStream, body: &Value) -> std::io::Result<()> {
    let mut frame = serde_json::to_vec(body).unwrap();
    frame.extend_from_slice(DEFAULT_SENTINEL.as_bytes());
    stream.write_all(&frame).await
}

/// Split the byte stream on the sentinel, one frame at a time.
async fn next_frame(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> Option<String> {
    let needle = DEFAULT_SENTINEL.as_bytes();
    loop {
        if let Some(pos) = buffer.windows(needle.len()).position(|w| w == needle) {
            let frame = String::from_utf8_lossy(&buffer[..pos]).trim().to_string();
            buffer.drain(..pos + needle.len());
            return Some(frame);
        }
        let mut chunk = [0u8; 1024];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Accepts connections and drains them without ever answering.
async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut sink = [0u8; 1024];
                while let Ok(n) = stream.read(&mut sink).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    address
}

async fn unreachable_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

fn engine(address: &str, read_mode: ReadMode) -> Engine {
    let params = SessionParams::new(address)
        .with_read_timeout(Duration::from_millis(200))
        .with_connect_timeout(Duration::from_secs(1));
    let connector = wire::Connector::new(params)
        .unwrap()
        .with_read_mode(read_mode);
    Engine::new(connector, Arc::new(EntityRegistry::new()))
}

fn spawn_ops(n: usize) -> Vec<Operation> {
    (0..n)
        .map(|i| {
            let entity = Entity::new(format!("cube{}", i), [i as f64, 0.0, 0.0]);
            Operation::new(Command::spawn(&entity)).recording(Record::Entity(entity))
        })
        .collect()
}

fn quiet_config() -> Config {
    Config {
        delays: DelayConfig::none(),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_barrier_returns_after_every_failure() {
    let address = unreachable_address().await;
    let engine = engine(&address, ReadMode::Lenient);

    let report = engine.run(Batch::new("spawn", spawn_ops(20)), Strategy::FanOut).await;

    assert_eq!(report.attempted, 20);
    assert_eq!(report.failed(), 20);
    assert_eq!(report.succeeded, 0);
    assert!(report.is_settled());
    assert!(report.failures.iter().all(|f| f.kind == "connect_failure"));
    assert_eq!(engine.registry().entity_count(), 0);
}

#[tokio::test]
async fn test_limited_in_flight_still_settles() {
    let server = FakeServer::start(&[]).await;
    let engine = engine(&server.address, ReadMode::Lenient).with_max_in_flight(2);

    let report = engine.run(Batch::new("spawn", spawn_ops(10)), Strategy::FanOut).await;

    assert_eq!(report.succeeded, 10);
    assert!(report.is_clean());
    assert_eq!(engine.registry().entity_count(), 10);
    assert_eq!(server.connections(), 10);
}

#[tokio::test]
async fn test_silent_server_lenient_proceeds() {
    let address = silent_server().await;
    let engine = engine(&address, ReadMode::Lenient);

    let report = engine.run(Batch::new("spawn", spawn_ops(3)), Strategy::FanOut).await;

    assert_eq!(report.succeeded, 3);
    assert_eq!(engine.registry().entity_count(), 3);
}

#[tokio::test]
async fn test_silent_server_strict_fails_every_operation() {
    let address = silent_server().await;
    let engine = engine(&address, ReadMode::Strict);

    let report = engine
        .run(Batch::new("spawn", spawn_ops(3)), Strategy::Sequential)
        .await;

    assert_eq!(report.units, 1);
    assert_eq!(report.failed(), 3);
    assert!(report.is_settled());
    assert!(report.failures.iter().all(|f| f.kind == "read_timeout"));
    assert_eq!(engine.registry().entity_count(), 0);
}

#[tokio::test]
async fn test_unencodable_command_fails_alone() {
    let server = FakeServer::start(&[]).await;
    let engine = engine(&server.address, ReadMode::Lenient);
    let ops = vec![
        Operation::new(Command::despawn("a")),
        Operation::new(Command::set_color("b", format!("#ff{}", DEFAULT_SENTINEL))),
        Operation::new(Command::despawn("c")),
        Operation::new(Command::despawn("d")),
    ];

    let report = engine.run(Batch::new("mixed", ops), Strategy::Sequential).await;

    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].label, "set_color:b");
    assert_eq!(report.failures[0].kind, "write_failure");

    let names: Vec<String> = server
        .wait_for_frames(3)
        .await
        .iter()
        .map(|frame| frame["cube_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a", "c", "d"]);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_lenient_reply_reads_tolerate_silence() {
    let address = silent_server().await;
    let engine = engine(&address, ReadMode::Lenient);
    let ops: Vec<Operation> = spawn_ops(3)
        .into_iter()
        .map(Operation::awaiting_reply)
        .collect();

    let report = engine.run(Batch::grouped("spawn", vec![ops]), Strategy::Grouped).await;

    assert!(report.is_clean());
    assert_eq!(report.succeeded, 3);
    assert_eq!(engine.registry().entity_count(), 3);
}

#[tokio::test]
async fn test_strict_reply_timeout_gives_up_rest_of_group() {
    let server = FakeServer::start(&NECK_JOINTS).await;
    let engine = engine(&server.address, ReadMode::Strict);
    let first = vec![
        Operation::new(Command::joints_for("neck_BASE")).awaiting_reply(),
        Operation::new(Command::despawn("x")).awaiting_reply(),
        Operation::new(Command::despawn("y")),
    ];
    let second = vec![Operation::new(Command::despawn("z"))];

    let report = engine
        .run(Batch::grouped("replies", vec![first, second]), Strategy::Grouped)
        .await;

    assert_eq!(report.succeeded, 2);
    let kinds: Vec<(&str, &str)> = report
        .failures
        .iter()
        .map(|f| (f.label.as_str(), f.kind.as_str()))
        .collect();
    assert_eq!(
        kinds,
        vec![("despawn_cube:x", "read_timeout"), ("despawn_cube:y", "abandoned")]
    );

    let frames = server.wait_for_frames(3).await;
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f["cube_name"] != "y"));
}

#[tokio::test]
async fn test_connections_per_strategy() {
    let groups = || {
        let ops = spawn_ops(6);
        vec![ops[..3].to_vec(), ops[3..].to_vec()]
    };

    for (strategy, expected) in [
        (Strategy::FanOut, 6),
        (Strategy::Sequential, 1),
        (Strategy::Grouped, 2),
    ] {
        let server = FakeServer::start(&[]).await;
        let engine = engine(&server.address, ReadMode::Lenient);

        let report = engine.run(Batch::grouped("spawn", groups()), strategy).await;

        assert!(report.is_clean(), "{}", strategy);
        assert_eq!(report.units, expected, "{}", strategy);
        assert_eq!(server.connections(), expected, "{}", strategy);
        assert_eq!(server.wait_for_frames(6).await.len(), 6, "{}", strategy);
        assert!(server.passwords().iter().all(|p| p == "my_secure_password"));
    }
}

#[tokio::test]
async fn test_reused_connection_keeps_submission_order() {
    let server = FakeServer::start(&[]).await;
    let engine = engine(&server.address, ReadMode::Lenient);

    let report = engine
        .run(Batch::new("spawn", spawn_ops(5)), Strategy::Sequential)
        .await;
    assert!(report.is_clean());

    let names: Vec<String> = server
        .wait_for_frames(5)
        .await
        .iter()
        .map(|frame| frame["cube_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["cube0", "cube1", "cube2", "cube3", "cube4"]);
    // Registry appends follow the same order on one connection.
    let recorded: Vec<String> = engine
        .registry()
        .all_entities()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(recorded, vec!["cube0", "cube1", "cube2", "cube3", "cube4"]);
}

#[tokio::test]
async fn test_full_choreography() {
    let server = FakeServer::start(&NECK_JOINTS).await;
    let sleeper = Arc::new(RecordingSleeper::new());
    let bus = EventBus::new();
    let mut events = bus.subscribe();
    let engine = engine(&server.address, ReadMode::Lenient)
        .with_sleeper(sleeper.clone())
        .with_event_bus(bus.clone());
    let structure = Structure::demo();

    let mut sequencer = Sequencer::new(engine, &quiet_config());
    let report = sequencer.run(&structure).await.unwrap();

    assert_eq!(report.session.status, SessionStatus::Completed);
    assert_eq!(report.total_failed(), 0);
    assert_eq!(report.entities_recorded, 9);
    assert_eq!(report.links_recorded, 8);

    // 9 spawn, 2 colour, 8 joints, 8 stiffen, 9 release,
    // 1 query + 2 joints x 4 actuation steps, 9 despawn
    let frames = server.wait_for_frames(54).await;
    let count = |kind: &str| frames.iter().filter(|f| f["type"] == kind).count();
    assert_eq!(count("spawn_cube"), 9);
    assert_eq!(count("set_color"), 2);
    assert_eq!(count("create_joint"), 8);
    assert_eq!(count("set_joint_params"), 8);
    assert_eq!(count("freeze_cube"), 9);
    assert_eq!(count("get_joints_for_cube"), 1);
    assert_eq!(count("set_joint_param"), 8);
    assert_eq!(count("despawn_cube"), 9);

    let joints: Vec<&str> = frames
        .iter()
        .filter(|f| f["type"] == "create_joint")
        .map(|f| f["joint_name"].as_str().unwrap())
        .collect();
    let planned: Vec<String> = structure
        .planned_links()
        .into_iter()
        .map(|l| l.joint_name)
        .collect();
    assert_eq!(joints, planned);

    // Only the actuation holds paused: two per joint.
    assert_eq!(sleeper.calls(), vec![Duration::from_millis(1500); 4]);

    let started: Vec<Phase> = events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            Event::PhaseStarted { phase, .. } => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(started, Phase::ALL.to_vec());
}

#[tokio::test]
async fn test_actuation_cycle_per_joint_connection() {
    let server = FakeServer::start(&NECK_JOINTS).await;
    let engine = engine(&server.address, ReadMode::Lenient)
        .with_sleeper(Arc::new(RecordingSleeper::new()));
    let structure = Structure::demo();
    let mut sequencer = Sequencer::new(engine, &quiet_config());

    sequencer.advance(Phase::Spawn, &structure).await.unwrap();
    assert!(sequencer.advance(Phase::Release, &structure).await.is_err());
    assert!(sequencer.advance(Phase::Actuate, &structure).await.is_err());

    for phase in [Phase::Link, Phase::Stiffen, Phase::Release, Phase::Actuate] {
        sequencer.advance(phase, &structure).await.unwrap();
    }

    // 9 spawn + 8 create_joint + 8 stiffen + 9 release + 1 query + 8 actuation
    server.wait_for_frames(43).await;
    let cycles: Vec<Vec<(String, f64)>> = server
        .frames_by_connection()
        .into_values()
        .filter(|frames| frames.iter().all(|f| f["type"] == "set_joint_param"))
        .map(|frames| {
            frames
                .iter()
                .map(|f| {
                    (
                        f["param_name"].as_str().unwrap().to_string(),
                        f["value"].as_f64().unwrap(),
                    )
                })
                .collect()
        })
        .collect();

    assert_eq!(cycles.len(), 2);
    for cycle in cycles {
        assert_eq!(
            cycle,
            vec![
                ("enable_motor".to_string(), 1.0),
                ("motor_target_velocity".to_string(), 2.0),
                ("motor_target_velocity".to_string(), -2.0),
                ("motor_target_velocity".to_string(), 0.0),
            ]
        );
    }
}

#[tokio::test]
async fn test_teardown_despawns_every_recorded_entity() {
    let server = FakeServer::start(&[]).await;
    let engine = engine(&server.address, ReadMode::Lenient);
    engine
        .registry()
        .record_entity(Entity::new("leftover", [0.0, 0.0, 0.0]));

    let structure = Structure {
        entities: Structure::demo().entities[..2].to_vec(),
        ..Structure::default()
    };
    let mut sequencer = Sequencer::new(engine, &quiet_config());
    let report = sequencer.run(&structure).await.unwrap();

    assert_eq!(report.phase(Phase::Teardown).unwrap().batch.attempted, 3);
    let frames = server.wait_for_frames(2 + 3 + 3).await;
    let mut despawned: Vec<&str> = frames
        .iter()
        .filter(|f| f["type"] == "despawn_cube")
        .map(|f| f["cube_name"].as_str().unwrap())
        .collect();
    despawned.sort();
    assert_eq!(despawned, vec!["leftear_BASE", "leftover_BASE", "rightear_BASE"]);
    // Despawning never shrinks the creation log.
    assert_eq!(sequencer.engine().registry().entity_count(), 3);
}

#[tokio::test]
async fn test_strict_policy_skips_to_teardown() {
    let address = unreachable_address().await;
    let config = Config {
        engine: orchestrator::EngineConfig {
            failure_policy: FailurePolicy::Strict,
            ..Default::default()
        },
        ..quiet_config()
    };
    let mut sequencer = Sequencer::new(engine(&address, ReadMode::Lenient), &config);

    let report = sequencer.run(&Structure::demo()).await.unwrap();

    assert_eq!(report.aborted_after, Some(Phase::Spawn));
    assert_eq!(report.phases.len(), 2);
    assert_eq!(report.session.status, SessionStatus::Aborted);
    assert!(report.ensure_not_aborted().is_err());
}

#[tokio::test]
async fn test_pulse_runs_lifecycle_per_connection() {
    let server = FakeServer::start(&[]).await;
    let engine = engine(&server.address, ReadMode::Lenient);
    let entities = vec![
        Entity::new("a", [0.0, 0.0, 0.0]),
        Entity::new("b", [1.0, 0.0, 0.0]),
        Entity::new("c", [2.0, 0.0, 0.0]),
    ];

    let report = pulse(&engine, entities, &PulseTiming::none()).await;
    assert!(report.is_clean());
    assert_eq!(report.attempted, 12);

    server.wait_for_frames(12).await;
    let by_connection = server.frames_by_connection();
    assert_eq!(by_connection.len(), 3);
    for frames in by_connection.values() {
        let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec!["spawn_cube", "freeze_cube", "freeze_cube", "despawn_cube"]
        );
        assert_eq!(frames[1]["freeze"], false);
        assert_eq!(frames[2]["freeze"], true);
    }
}
