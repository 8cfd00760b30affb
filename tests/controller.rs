//! Conversation loop integration tests
//!
//! Drives the controller with scripted utterances and a fake model process

use murmur::bridge::{TROUBLE_REPLY, UNSURE_REPLY};
use murmur::config::{DEFAULT_ACKNOWLEDGEMENT, DEFAULT_FAREWELL};
use murmur::controller::NOT_UNDERSTOOD_REPLY;
use murmur::voice::{CaptureFailure, Utterance};
use murmur::{CommandAction, Phase, StopSignal, TurnOutcome};

mod common;

use common::{Harness, ModelBehavior, ScriptedListener, ScriptedRunner};

#[tokio::test]
async fn test_wake_phrase_activates_once() {
    let mut h = Harness::scripted(
        Some("hey assistant"),
        &["hey assistant"],
        ScriptedRunner::replying("unused"),
    );
    assert_eq!(h.controller.phase(), Phase::AwaitingWakeWord);

    let outcome = h.controller.turn().await.unwrap();

    assert_eq!(outcome, TurnOutcome::Woke);
    assert_eq!(h.controller.phase(), Phase::Active);
    assert_eq!(h.spoken_texts(), [DEFAULT_ACKNOWLEDGEMENT]);
    assert!(h.runner.prompts().is_empty());
}

#[tokio::test]
async fn test_wake_phrase_any_case_inside_sentence() {
    let mut h = Harness::scripted(
        Some("hey assistant"),
        &["well HEY Assistant are you there"],
        ScriptedRunner::replying("unused"),
    );

    assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Woke);
    assert_eq!(h.spoken_texts().len(), 1);
}

#[tokio::test]
async fn test_other_speech_ignored_while_waiting() {
    let mut h = Harness::scripted(
        Some("hey assistant"),
        &["what is the capital of France", "speak faster"],
        ScriptedRunner::replying("Paris."),
    );

    assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Ignored);
    assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Ignored);

    assert_eq!(h.controller.phase(), Phase::AwaitingWakeWord);
    assert!(h.spoken_texts().is_empty());
    assert_eq!(h.controller.output().profile().rate(), 150);
    assert!(h.records().is_empty());
}

#[tokio::test]
async fn test_question_is_answered_spoken_and_logged() {
    let runner = ScriptedRunner::replying("Paris.");
    let mut h = Harness::scripted(None, &["what is the capital of France"], runner);
    assert_eq!(h.controller.phase(), Phase::Active);

    let outcome = h.controller.turn().await.unwrap();

    assert_eq!(outcome, TurnOutcome::Answered("Paris.".to_string()));
    assert_eq!(h.spoken_texts(), ["Paris."]);
    assert_eq!(
        h.runner.prompts(),
        ["Respond briefly in 1-2 sentences only.\nUser query: what is the capital of France"]
    );

    let records = h.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_text, "what is the capital of France");
    assert_eq!(records[0].assistant_text, "Paris.");
}

#[tokio::test]
async fn test_speak_faster_saturates() {
    let lines = ["speak faster"; 4];
    let mut h = Harness::scripted(None, &lines, ScriptedRunner::replying("unused"));

    let mut rates = Vec::new();
    for _ in 0..4 {
        let outcome = h.controller.turn().await.unwrap();
        assert_eq!(outcome, TurnOutcome::Dispatched(CommandAction::FasterRate));
        rates.push(h.controller.output().profile().rate());
    }

    assert_eq!(rates, [200, 250, 300, 300]);
    assert!(h.runner.prompts().is_empty());
    assert!(h.records().is_empty());

    // Each confirmation is spoken at the new rate
    let spoken = h.spoken.lock().unwrap();
    assert_eq!(spoken.len(), 4);
    assert_eq!(spoken[0].text, CommandAction::FasterRate.confirmation());
    assert_eq!(spoken[3].rate, 300);
}

#[tokio::test]
async fn test_volume_and_voice_commands() {
    let mut h = Harness::scripted(
        None,
        &["volume down please", "next voice", "previous voice", "previous voice", "reset voice"],
        ScriptedRunner::replying("unused"),
    );

    h.controller.turn().await.unwrap();
    assert!((h.controller.output().profile().volume() - 0.9).abs() < 1e-6);

    h.controller.turn().await.unwrap();
    assert_eq!(h.controller.output().profile().active_voice_id(), "beta");

    h.controller.turn().await.unwrap();
    h.controller.turn().await.unwrap();
    assert_eq!(h.controller.output().profile().active_voice_id(), "gamma");

    let outcome = h.controller.turn().await.unwrap();
    assert_eq!(outcome, TurnOutcome::Dispatched(CommandAction::ResetVoice));
    assert_eq!(h.controller.output().profile().active_voice_id(), "alpha");
    assert!((h.controller.output().profile().volume() - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_backend_timeout_falls_back() {
    let mut h = Harness::scripted(
        None,
        &["tell me a story"],
        ScriptedRunner::new(ModelBehavior::Timeout),
    );

    let outcome = h.controller.turn().await.unwrap();

    assert_eq!(outcome, TurnOutcome::Answered(TROUBLE_REPLY.to_string()));
    assert_eq!(h.spoken_texts(), [TROUBLE_REPLY]);
    assert_eq!(h.records()[0].assistant_text, TROUBLE_REPLY);
}

#[tokio::test]
async fn test_missing_and_failing_backend_still_reply() {
    let missing_runner = ScriptedRunner::new(ModelBehavior::Missing);
    let mut missing = Harness::scripted(None, &["hello"], missing_runner);
    assert_eq!(
        missing.controller.turn().await.unwrap(),
        TurnOutcome::Answered(TROUBLE_REPLY.to_string())
    );

    let failing_runner = ScriptedRunner::new(ModelBehavior::Fail(1));
    let mut failing = Harness::scripted(None, &["hello"], failing_runner);
    assert_eq!(
        failing.controller.turn().await.unwrap(),
        TurnOutcome::Answered(UNSURE_REPLY.to_string())
    );
}

#[tokio::test]
async fn test_quit_terminates_from_any_phase() {
    let cases = [
        (Some("hey assistant"), "quit"),
        (None, "Close bot."),
        (None, " EXIT! "),
    ];
    for (wake, phrase) in cases {
        let mut h = Harness::scripted(wake, &[phrase], ScriptedRunner::replying("unused"));

        let outcome = h.controller.turn().await.unwrap();

        assert_eq!(outcome, TurnOutcome::Terminated, "{phrase}");
        assert_eq!(h.controller.phase(), Phase::Terminated);
        assert!(h.stop.is_requested());
        assert_eq!(h.spoken_texts(), [DEFAULT_FAREWELL]);
        assert!(h.records().is_empty());
    }
}

#[tokio::test]
async fn test_stop_inside_sentence_is_a_question() {
    let mut h = Harness::scripted(
        None,
        &["how do I stop a bus"],
        ScriptedRunner::replying("Press the bell."),
    );

    let outcome = h.controller.turn().await.unwrap();
    assert_eq!(outcome, TurnOutcome::Answered("Press the bell.".to_string()));
    assert!(!h.stop.is_requested());
}

#[tokio::test]
async fn test_capture_failures_keep_listening() {
    let stop = StopSignal::new();
    let listener = ScriptedListener::from_results(vec![
        Err(CaptureFailure::Timeout),
        Err(CaptureFailure::BackendUnavailable("offline".to_string())),
        Err(CaptureFailure::Unintelligible),
        Ok(Utterance::new("hey assistant")),
        Err(CaptureFailure::Unintelligible),
    ]);
    let mut h = Harness::new(
        Some("hey assistant"),
        listener,
        ScriptedRunner::replying("unused"),
        stop,
    );

    for _ in 0..3 {
        assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Idle);
        assert_eq!(h.controller.phase(), Phase::AwaitingWakeWord);
    }
    // Nothing is said while asleep
    assert!(h.spoken_texts().is_empty());

    assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Woke);
    assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Idle);
    assert_eq!(
        h.spoken_texts(),
        [DEFAULT_ACKNOWLEDGEMENT, NOT_UNDERSTOOD_REPLY]
    );
}

#[tokio::test]
async fn test_stop_requested_before_turn_skips_capture() {
    let mut h = Harness::scripted(None, &["what time is it"], ScriptedRunner::replying("Noon."));
    h.stop.request();

    assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Interrupted);
    assert!(h.runner.prompts().is_empty());
}

#[tokio::test]
async fn test_run_logs_every_answered_turn() {
    let lines = [
        "hey assistant",
        "first question",
        "speak slower",
        "second question",
        "third question",
        "quit",
        "never heard",
    ];
    let runner = ScriptedRunner::replying("An answer.");
    let mut h = Harness::scripted(Some("hey assistant"), &lines, runner);

    h.controller.run().await;

    assert_eq!(h.controller.phase(), Phase::Terminated);
    assert!(h.stop.is_requested());

    let records = h.records();
    let questions: Vec<_> = records.iter().map(|r| r.user_text.as_str()).collect();
    assert_eq!(questions, ["first question", "second question", "third question"]);
    assert!(records.iter().all(|r| r.assistant_text == "An answer."));

    let content = std::fs::read_to_string(&h.log_path).unwrap();
    assert_eq!(content.matches(&"-".repeat(50)).count(), 3);
    assert!(!content.contains("never heard"));

    assert_eq!(h.spoken_texts().last().map(String::as_str), Some(DEFAULT_FAREWELL));
}

#[tokio::test]
async fn test_run_ends_when_stop_requested_externally() {
    let mut h = Harness::scripted(None, &["one question"], ScriptedRunner::replying("Sure."));

    h.controller.run().await;

    // The script ran out, which requested a stop without a farewell
    assert_eq!(h.controller.phase(), Phase::Terminated);
    assert_eq!(h.spoken_texts(), ["Sure."]);
    assert_eq!(h.records().len(), 1);
}

#[tokio::test]
async fn test_log_write_failure_does_not_end_conversation() {
    let stop = StopSignal::new();
    let listener = ScriptedListener::new(&["a question", "quit"]).stopping(stop.clone());
    let mut h = Harness::new(None, listener, ScriptedRunner::replying("Reply."), stop);

    // A directory where the log file should be makes every append fail
    std::fs::create_dir_all(&h.log_path).unwrap();

    assert!(h.controller.turn().await.is_err());
    assert_eq!(h.spoken_texts(), ["Reply."]);

    assert_eq!(h.controller.turn().await.unwrap(), TurnOutcome::Terminated);
}
