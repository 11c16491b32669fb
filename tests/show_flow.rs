use cuelight::fixtures::FixtureLibrary;
use cuelight::interpreter::Operation;
use cuelight::models::effects::{EffectKind, ScheduledEffect};
use cuelight::models::events::ShowEvent;
use cuelight::models::fixtures::FixtureConfig;
use cuelight::models::song::{Section, SongContext};
use cuelight::settings::EngineSettings;
use cuelight::ShowController;
use serde_json::json;

fn roster() -> FixtureLibrary {
    let configs: Vec<FixtureConfig> = serde_json::from_value(json!([
        {"id": "parcan_l", "name": "Par Left", "type": "rgb",
         "channels": {"red": 1, "green": 2, "blue": 3, "dim": 4}},
        {"id": "head_1", "name": "Mover", "type": "moving_head",
         "channels": {"pan": 10, "tilt": 11, "dim": 12, "strobe": 13}}
    ]))
    .expect("configs");
    FixtureLibrary::from_configs(configs)
}

fn song() -> SongContext {
    SongContext {
        bpm: 120.0,
        duration: 60.0,
        arrangement: vec![
            Section { name: "Intro".into(), start: 0.0, end: 20.0 },
            Section { name: "Drop".into(), start: 20.0, end: 40.0 },
        ],
        ..Default::default()
    }
}

fn controller(dir: &std::path::Path) -> ShowController {
    let settings = EngineSettings {
        data_dir: dir.to_path_buf(),
        ..EngineSettings::default()
    };
    ShowController::new(settings, roster())
}

#[tokio::test]
async fn flash_command_paints_red_and_dim() {
    let dir = tempfile::tempdir().expect("tempdir");
    let controller = controller(dir.path());
    let session = controller.load_song("demo", song()).expect("load");
    let (_, mut events) = controller.subscribe();

    let text = "flash red on parcan_l at 10s for 2s";
    let cmd = session.interpret(text);
    assert_eq!(cmd.operation, Operation::Add);
    assert_eq!(cmd.time, 10.0);
    assert_eq!(cmd.fixtures, vec!["parcan_l".to_string()]);
    assert!(cmd.confidence >= 0.8, "confidence {}", cmd.confidence);

    let response = controller.dispatch(text).await;
    assert!(response.success, "{}", response.message);
    assert_eq!(session.effect_count(), 1);

    let canvas = session.canvas();
    for t in [10.0, 10.5, 11.0, 11.9] {
        assert_eq!(canvas.channel_value(t, 1), 255, "red at {}", t);
        assert_eq!(canvas.channel_value(t, 4), 255, "dim at {}", t);
        assert_eq!(canvas.channel_value(t, 2), 0);
        assert_eq!(canvas.channel_value(t, 12), 0);
    }
    assert_eq!(canvas.channel_value(9.9, 1), 0);
    assert_eq!(canvas.channel_value(12.5, 1), 0);

    let mut saw_effects = false;
    let mut saw_canvas = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ShowEvent::EffectsChanged { delta, .. } => saw_effects = delta.added.len() == 1,
            ShowEvent::CanvasUpdated { rendered, .. } => saw_canvas = rendered == 1,
            _ => {}
        }
    }
    assert!(saw_effects && saw_canvas);
}

#[tokio::test]
async fn clear_all_requires_confirmation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let controller = controller(dir.path());
    let session = controller.load_song("demo", song()).expect("load");
    assert!(controller.dispatch("add flash to all at 4s 1s").await.success);
    assert_eq!(session.effect_count(), 2);

    let rejected = controller.dispatch("clear all").await;
    assert!(!rejected.success);
    assert!(rejected.message.contains("confirm"));
    assert_eq!(session.effect_count(), 2);

    let cleared = controller.dispatch("!clear all confirm").await;
    assert!(cleared.success, "{}", cleared.message);
    assert_eq!(session.effect_count(), 0);
    assert!(session.canvas().is_blank());
}

#[tokio::test]
async fn render_reports_failed_effects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let controller = controller(dir.path());
    let session = controller.load_song("demo", song()).expect("load");

    let effects = vec![
        ScheduledEffect::new("parcan_l", EffectKind::preset("flash"), 1.0, 1.0),
        ScheduledEffect::new("head_1", EffectKind::preset("sweep"), 2.0, 2.0),
        ScheduledEffect::new("ghost", EffectKind::preset("flash"), 3.0, 1.0),
    ];
    session.mutate_effects(|store| store.add_many(effects)).expect("add");

    let response = controller.dispatch("render").await;
    assert!(response.success);
    assert!(response.message.contains("1 invalid"), "{}", response.message);
    let data = response.data.expect("data");
    assert_eq!(data["render"]["rendered"], 2);
    assert_eq!(data["render"]["total"], 3);
    assert_eq!(data["validation"]["invalid"], 1);

    let ghosts = vec![ScheduledEffect::new("ghost", EffectKind::preset("flash"), 5.0, 1.0)];
    session
        .mutate_effects(|store| {
            store.remove_all()?;
            store.add_many(ghosts)
        })
        .expect("replace");
    assert!(!controller.dispatch("render").await.success);

    session
        .mutate_effects(|store| {
            store.remove_all()?;
            store.add_many(vec![ScheduledEffect::new("parcan_l", EffectKind::preset("flash"), 5.0, 1.0)])
        })
        .expect("replace");
    let clean = controller.dispatch("render").await;
    assert_eq!(clean.message, "Rendered 1/1 effects");
}

#[tokio::test]
async fn plans_and_agents_through_the_dispatcher() {
    let dir = tempfile::tempdir().expect("tempdir");
    let controller = controller(dir.path());
    let session = controller.load_song("demo", song()).expect("load");

    assert!(controller.dispatch("create plan Big Drop at 0:20 to 40s").await.success);
    assert!(!controller.dispatch("create plan big drop at 25s").await.success);
    let listed = controller.dispatch("list plans").await;
    assert_eq!(listed.data.expect("plans").as_array().map(Vec::len), Some(1));
    assert_eq!(session.effect_count(), 0);

    let called = controller.dispatch("call planner").await;
    assert!(called.success, "{}", called.message);
    assert!(session.effect_count() > 0);

    let unknown = controller.dispatch("call nobody").await;
    assert!(!unknown.success);
    assert!(unknown.message.contains("planner"));
}

#[tokio::test]
async fn commands_without_a_song_fail_cleanly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let controller = controller(dir.path());
    let response = controller.dispatch("render").await;
    assert!(!response.success);
    assert!(controller.dispatch("help").await.success);
}
