//! End-to-end tests for the phrase sentry engine
//!
//! Drive the whole pipeline (session → capture → transcription → matching →
//! escalation) through the in-memory port doubles; no Discord and no real
//! recognizer involved.

use std::sync::Arc;
use std::time::Duration;

use sentry_core::{
    ActionRecorder, ClipPlayer, Enforcer, Notifier, PhraseCatalog, RecordedAction, ScriptedTranscriber,
    SentryConfig, SessionController, Speaker, SpeakerId, TallyBoard, Transcriber, VoiceControl,
    VoiceLink, VoiceTarget, WindowReset,
};

struct Rig {
    controller: SessionController,
    recorder: Arc<ActionRecorder>,
    tally: Arc<TallyBoard>,
}

fn rig(config: SentryConfig, transcriber: Arc<dyn Transcriber>) -> Rig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let recorder = Arc::new(ActionRecorder::new());
    let tally = Arc::new(TallyBoard::new());
    let enforcer = Arc::new(Enforcer::new(
        config.clone(),
        Arc::clone(&tally),
        Arc::clone(&recorder) as Arc<dyn VoiceControl>,
        Arc::clone(&recorder) as Arc<dyn ClipPlayer>,
        Arc::clone(&recorder) as Arc<dyn Notifier>,
    ));
    let controller = SessionController::new(
        &config,
        PhraseCatalog::standard(),
        transcriber,
        enforcer,
        Arc::clone(&recorder) as Arc<dyn VoiceLink>,
    );
    Rig {
        controller,
        recorder,
        tally,
    }
}

fn voice() -> VoiceTarget {
    VoiceTarget {
        guild_id: 100,
        channel_id: 200,
    }
}

async fn speak(controller: &SessionController, speaker: &Speaker) {
    controller.speaking_started(speaker.clone()).await;
    controller.push_audio(speaker.id, &[0i16; 1920]).await;
    controller.speaking_stopped(speaker.id).await;
}

async fn settle(controller: &SessionController) {
    for _ in 0..400 {
        if controller.capture_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("captures did not settle");
}

#[tokio::test]
async fn three_offenses_mute_thrice_and_kick_once() {
    let config = SentryConfig {
        kick_threshold: 3,
        warn_clip_url: "http://warn-clip".to_string(),
        ..Default::default()
    };
    let rig = rig(config, Arc::new(ScriptedTranscriber::always("League of legends again")));
    rig.controller.start(voice(), None).await.unwrap();

    let speaker = Speaker::new(42, "repeat-offender");
    for _ in 0..3 {
        speak(&rig.controller, &speaker).await;
        settle(&rig.controller).await;
    }

    assert_eq!(rig.tally.speaker_count("league", speaker.id), 3);
    assert_eq!(rig.recorder.count(|a| matches!(a, RecordedAction::Muted(_))), 3);
    assert_eq!(
        rig.recorder
            .count(|a| matches!(a, RecordedAction::Played(u) if u == "http://warn-clip")),
        3
    );
    assert_eq!(
        rig.recorder.count(|a| {
            matches!(a, RecordedAction::Announced(t) if t == "league is a bad word repeat-offender")
        }),
        3
    );
    assert_eq!(rig.recorder.count(|a| matches!(a, RecordedAction::Kicked(_))), 1);
    assert_eq!(
        rig.recorder
            .count(|a| matches!(a, RecordedAction::Announced(t) if t == "bye bye repeat-offender")),
        1
    );

    // The kick happens on the third offense, not before
    let actions = rig.recorder.actions();
    let kick_pos = actions
        .iter()
        .position(|a| matches!(a, RecordedAction::Kicked(_)))
        .unwrap();
    let third_mute_pos = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| matches!(a, RecordedAction::Muted(_)))
        .map(|(i, _)| i)
        .nth(2)
        .unwrap();
    assert!(kick_pos > third_mute_pos);
}

#[tokio::test]
async fn one_transcript_with_repeated_literals_is_one_offense() {
    let rig = rig(
        SentryConfig::default(),
        Arc::new(ScriptedTranscriber::always("league league LEAGUE rift")),
    );
    rig.controller.start(voice(), None).await.unwrap();

    let speaker = Speaker::new(7, "echo");
    speak(&rig.controller, &speaker).await;
    settle(&rig.controller).await;

    assert_eq!(rig.tally.speaker_count("league", speaker.id), 1);
    assert_eq!(rig.recorder.count(|a| matches!(a, RecordedAction::Muted(_))), 1);
}

#[tokio::test]
async fn room_chant_fires_celebration_on_fifth_and_sixth() {
    let config = SentryConfig {
        celebration_threshold: 5,
        celebration_clip_url: "http://funky".to_string(),
        ..Default::default()
    };
    let rig = rig(config, Arc::new(ScriptedTranscriber::always("brass monkey!")));
    rig.controller.start(voice(), None).await.unwrap();

    // Chants come from different speakers; the windowed count is room-wide
    for id in 1..=6u64 {
        let speaker = Speaker::new(id, format!("chanter-{id}"));
        speak(&rig.controller, &speaker).await;
        settle(&rig.controller).await;
        let played = rig
            .recorder
            .count(|a| matches!(a, RecordedAction::Played(u) if u == "http://funky"));
        assert_eq!(played, if id < 5 { 0 } else { (id - 4) as usize });
    }

    assert_eq!(rig.tally.window_count("brass_monkey"), 6);
    // Celebrations never notify
    assert_eq!(
        rig.recorder.count(|a| matches!(a, RecordedAction::Announced(_))),
        0
    );
}

#[tokio::test(start_paused = true)]
async fn window_reset_restarts_the_chant_count() {
    let config = SentryConfig {
        celebration_threshold: 5,
        celebration_clip_url: "http://funky".to_string(),
        window_period: Duration::from_secs(10),
        ..Default::default()
    };
    let rig = rig(
        config.clone(),
        Arc::new(ScriptedTranscriber::always("brass monkey")),
    );
    let _reset = WindowReset::spawn(Arc::clone(&rig.tally), config.window_period);
    rig.controller.start(voice(), None).await.unwrap();

    let speaker = Speaker::new(1, "chanter");
    for _ in 0..4 {
        speak(&rig.controller, &speaker).await;
        settle(&rig.controller).await;
    }
    assert_eq!(rig.tally.window_count("brass_monkey"), 4);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(rig.tally.window_count("brass_monkey"), 0);

    // The 5th chant lands in a fresh window, so nothing plays
    speak(&rig.controller, &speaker).await;
    settle(&rig.controller).await;
    assert_eq!(rig.tally.window_count("brass_monkey"), 1);
    assert_eq!(rig.recorder.count(|a| matches!(a, RecordedAction::Played(_))), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_speakers_are_all_counted() {
    let rig = rig(
        SentryConfig {
            kick_threshold: 1_000_000,
            ..Default::default()
        },
        Arc::new(ScriptedTranscriber::always("brass monkey on the rift")),
    );
    rig.controller.start(voice(), None).await.unwrap();

    let mut handles = Vec::new();
    for id in [1u64, 2u64] {
        let controller = rig.controller.clone();
        handles.push(tokio::spawn(async move {
            let speaker = Speaker::new(id, format!("speaker-{id}"));
            for _ in 0..50 {
                speak_inner(&controller, &speaker).await;
                // wait for this speaker's capture to retire before re-opening
                while controller.has_capture(speaker.id).await {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    settle(&rig.controller).await;

    // Every utterance carries one forbidden and one celebration phrase;
    // nothing is lost across the two concurrent speakers
    let total: u64 =
        rig.tally.speaker_count("league", SpeakerId(1)) + rig.tally.speaker_count("league", SpeakerId(2));
    assert_eq!(total, 100);
    assert_eq!(rig.tally.window_count("brass_monkey"), 100);
}

async fn speak_inner(controller: &SessionController, speaker: &Speaker) {
    controller.speaking_started(speaker.clone()).await;
    controller.push_audio(speaker.id, &[0i16; 96]).await;
    controller.speaking_stopped(speaker.id).await;
}

#[tokio::test]
async fn ending_the_session_abandons_in_flight_captures() {
    struct SlowTranscriber;

    #[async_trait::async_trait]
    impl Transcriber for SlowTranscriber {
        async fn transcribe(
            &self,
            _segment: &sentry_core::AudioSegment,
        ) -> sentry_core::SentryResult<String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok("league".to_string())
        }
    }

    let rig = rig(SentryConfig::default(), Arc::new(SlowTranscriber));
    rig.controller.start(voice(), None).await.unwrap();

    let speaker = Speaker::new(11, "cutoff");
    speak(&rig.controller, &speaker).await;
    rig.controller.end().await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(rig.tally.speaker_count("league", speaker.id), 0);
    assert_eq!(rig.recorder.count(|a| matches!(a, RecordedAction::Muted(_))), 0);

    // The engine is reusable after the abandoned session
    rig.controller.start(voice(), None).await.unwrap();
    assert!(rig.controller.is_active().await);
}

#[tokio::test]
async fn transcription_gibberish_is_no_match() {
    let rig = rig(
        SentryConfig::default(),
        Arc::new(ScriptedTranscriber::sequence(["", "   ", "uhh what was that"])),
    );
    rig.controller.start(voice(), None).await.unwrap();

    let speaker = Speaker::new(4, "mumbler");
    for _ in 0..3 {
        speak(&rig.controller, &speaker).await;
        settle(&rig.controller).await;
    }

    assert!(rig.recorder.count(|a| matches!(a, RecordedAction::Muted(_))) == 0);
    assert_eq!(rig.tally.speaker_count("league", speaker.id), 0);
}
