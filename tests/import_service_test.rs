use std::path::PathBuf;
use std::sync::Arc;

use wortschatz::application::ports::{TranscriptRepository, VideoRepository};
use wortschatz::application::services::{ImportError, TranscriptionImporter};
use wortschatz::domain::{
    Language, ProcessingStep, StepStatus, VideoId,
};
use wortschatz::infrastructure::persistence::{MockTranscriptRepository, MockVideoRepository};

struct Fixture {
    _dir: tempfile::TempDir,
    output_path: PathBuf,
    transcripts: Arc<MockTranscriptRepository>,
    ledger: Arc<MockVideoRepository>,
    importer: TranscriptionImporter,
}

fn fixture(document: &str) -> Fixture {
    let dir = tempfile::TempDir::new().unwrap();
    let output_path = dir.path().join("lesson.json");
    std::fs::write(&output_path, document).unwrap();

    let transcripts = Arc::new(MockTranscriptRepository::new());
    let ledger = Arc::new(MockVideoRepository::new());
    let importer = TranscriptionImporter::new(transcripts.clone(), ledger.clone());

    Fixture {
        _dir: dir,
        output_path,
        transcripts,
        ledger,
        importer,
    }
}

#[tokio::test]
async fn given_minimal_document_when_loading_then_reports_counts_and_language() {
    let fx = fixture(
        r#"{"language":"de",
            "segments":[{"start":0,"end":2.5,"text":"Hallo"}],
            "vocabulary":[{"word":"Hallo","translations":["Bonjour"],"examples":[],"level":"beginner"}]}"#,
    );

    let summary = fx.importer.load(VideoId::from_i64(1), &fx.output_path).await.unwrap();

    assert_eq!(summary.segments, 1);
    assert_eq!(summary.vocabulary, 1);
    assert_eq!(summary.language, Language::German);

    let segments = fx
        .transcripts
        .segments_for_video(VideoId::from_i64(1))
        .await
        .unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].start_ms, 0);
    assert_eq!(segments[0].end_ms, 2500);
    assert_eq!(segments[0].text, "Hallo");

    let entries = fx.transcripts.word_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].word, "Hallo");
    assert_eq!(entries[0].translations, vec!["Bonjour".to_string()]);
}

#[tokio::test]
async fn given_nested_words_when_loading_then_positions_and_confidence_are_fixed_point() {
    let fx = fixture(
        r#"{"language":"de",
            "segments":[{"start":1.0,"end":3.0,"text":"Guten Tag","words":[
                {"word":"Guten","start":1.0,"end":1.8,"score":0.9876},
                {"word":"Tag","start":1.8,"end":2.9,"score":0.5}
            ]}],
            "vocabulary":[]}"#,
    );

    fx.importer.load(VideoId::from_i64(7), &fx.output_path).await.unwrap();

    let segments = fx
        .transcripts
        .segments_for_video(VideoId::from_i64(7))
        .await
        .unwrap();
    let words = fx
        .transcripts
        .words_for_segment(segments[0].id)
        .await
        .unwrap();

    assert_eq!(words.len(), 2);
    assert_eq!(words[0].position_in_segment, 1);
    assert_eq!(words[1].position_in_segment, 2);
    assert_eq!(words[0].start_ms, 1000);
    assert_eq!(words[0].end_ms, 1800);
    assert_eq!(words[0].confidence_milli, 987);
    assert_eq!(words[1].confidence_milli, 500);
}

#[tokio::test]
async fn given_overlapping_segments_when_loading_then_nothing_is_persisted() {
    let fx = fixture(
        r#"{"language":"de",
            "segments":[
                {"start":1.0,"end":2.0,"text":"eins"},
                {"start":1.5,"end":2.5,"text":"zwei"}
            ],
            "vocabulary":[]}"#,
    );

    let result = fx.importer.load(VideoId::from_i64(2), &fx.output_path).await;

    assert!(matches!(result, Err(ImportError::Segment(_))));
    let segments = fx
        .transcripts
        .segments_for_video(VideoId::from_i64(2))
        .await
        .unwrap();
    assert!(segments.is_empty());

    let logs = fx.ledger.list_logs(VideoId::from_i64(2)).await.unwrap();
    assert!(logs
        .iter()
        .any(|l| l.step == ProcessingStep::DatabaseImport && l.status == StepStatus::Failed));
}

#[tokio::test]
async fn given_touching_segments_when_loading_then_boundary_touch_is_not_overlap() {
    let fx = fixture(
        r#"{"language":"de",
            "segments":[
                {"start":0.0,"end":1.0,"text":"eins"},
                {"start":1.0,"end":2.0,"text":"zwei"}
            ],
            "vocabulary":[]}"#,
    );

    let summary = fx.importer.load(VideoId::from_i64(3), &fx.output_path).await.unwrap();
    assert_eq!(summary.segments, 2);
}

#[tokio::test]
async fn given_word_outside_parent_when_loading_then_fails_and_aborts() {
    let fx = fixture(
        r#"{"language":"de",
            "segments":[{"start":1.0,"end":2.0,"text":"kurz","words":[
                {"word":"kurz","start":0.5,"end":1.5,"score":0.9}
            ]}],
            "vocabulary":[]}"#,
    );

    let result = fx.importer.load(VideoId::from_i64(4), &fx.output_path).await;

    assert!(matches!(result, Err(ImportError::Segment(_))));
    assert!(fx
        .transcripts
        .segments_for_video(VideoId::from_i64(4))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn given_invalid_json_when_loading_then_fails_malformed() {
    let fx = fixture("{ not json");

    let result = fx.importer.load(VideoId::from_i64(5), &fx.output_path).await;

    assert!(matches!(result, Err(ImportError::MalformedOutput(_))));
}

#[tokio::test]
async fn given_unsupported_language_tag_when_loading_then_fails_malformed() {
    let fx = fixture(r#"{"language":"es","segments":[],"vocabulary":[]}"#);

    let result = fx.importer.load(VideoId::from_i64(6), &fx.output_path).await;

    assert!(matches!(result, Err(ImportError::MalformedOutput(_))));
}

#[tokio::test]
async fn given_no_language_field_when_loading_then_defaults_to_german() {
    let fx = fixture(r#"{"segments":[],"vocabulary":[]}"#);

    let summary = fx.importer.load(VideoId::from_i64(8), &fx.output_path).await.unwrap();

    assert_eq!(summary.language, Language::German);
    assert_eq!(summary.segments, 0);
    assert_eq!(summary.vocabulary, 0);
}

#[tokio::test]
async fn given_multiple_choice_pair_when_loading_then_questions_and_options_decompose() {
    let fx = fixture(
        r#"{"language":"de","segments":[],
            "vocabulary":[{"word":"Haus","translations":["maison"],"examples":[],"level":"beginner",
                "exercises":{"type":"multiple_choice_pair","level":"beginner",
                    "de_to_fr":{"question":"Haus?","options":["maison","voiture","arbre"],"correct_answer":"maison"},
                    "fr_to_de":{"question":"maison?","options":["Haus","Auto"],"correct_answer":"Haus"}}}]}"#,
    );

    let summary = fx.importer.load(VideoId::from_i64(9), &fx.output_path).await.unwrap();
    assert_eq!(summary.vocabulary, 1);

    let exercises = fx.transcripts.exercises();
    assert_eq!(exercises.len(), 1);
    assert_eq!(exercises[0].kind, "multiple_choice_pair");

    let questions = fx.transcripts.questions();
    assert_eq!(questions.len(), 2);

    let options = fx.transcripts.options();
    assert_eq!(options.len(), 5);
    let correct: Vec<_> = options.iter().filter(|o| o.is_correct).collect();
    assert_eq!(correct.len(), 2);
    assert!(correct.iter().any(|o| o.text == "maison"));
    assert!(correct.iter().any(|o| o.text == "Haus"));
}

#[tokio::test]
async fn given_correct_answer_missing_from_options_when_loading_then_fails_malformed() {
    let fx = fixture(
        r#"{"language":"de","segments":[],
            "vocabulary":[{"word":"Haus","translations":[],"examples":[],
                "exercises":{"type":"multiple_choice_pair",
                    "de_to_fr":{"question":"Haus?","options":["voiture","arbre"],"correct_answer":"maison"}}}]}"#,
    );

    let result = fx.importer.load(VideoId::from_i64(10), &fx.output_path).await;

    assert!(matches!(result, Err(ImportError::MalformedOutput(_))));
    assert!(fx.transcripts.word_entries().is_empty());
}

#[tokio::test]
async fn given_unknown_exercise_type_when_loading_then_kept_as_opaque_metadata() {
    let fx = fixture(
        r#"{"language":"de","segments":[],
            "vocabulary":[{"word":"Baum","translations":["arbre"],"examples":[],
                "exercises":{"type":"fill_in_the_blank","sentence":"Der ___ ist gross"}}]}"#,
    );

    fx.importer.load(VideoId::from_i64(11), &fx.output_path).await.unwrap();

    let exercises = fx.transcripts.exercises();
    assert_eq!(exercises.len(), 1);
    assert_eq!(exercises[0].kind, "fill_in_the_blank");
    assert_eq!(
        exercises[0].metadata.get("sentence").and_then(|v| v.as_str()),
        Some("Der ___ ist gross")
    );
    assert!(fx.transcripts.questions().is_empty());
}

#[tokio::test]
async fn given_pronunciations_when_loading_then_rows_are_created() {
    let fx = fixture(
        r#"{"language":"de","segments":[],
            "vocabulary":[{"word":"Hallo","translations":[],"examples":[],
                "pronunciations":[{"file_path":"pron/hallo.mp3","type":"standard","language":"de"}]}]}"#,
    );

    fx.importer.load(VideoId::from_i64(12), &fx.output_path).await.unwrap();

    let pronunciations = fx.transcripts.pronunciations();
    assert_eq!(pronunciations.len(), 1);
    assert_eq!(pronunciations[0].file_path, "pron/hallo.mp3");
    assert_eq!(pronunciations[0].kind, "standard");
}

#[tokio::test]
async fn given_empty_pronunciation_path_when_loading_then_fails_malformed() {
    let fx = fixture(
        r#"{"language":"de","segments":[],
            "vocabulary":[{"word":"Hallo","translations":[],"examples":[],
                "pronunciations":[{"file_path":"","type":"standard"}]}]}"#,
    );

    let result = fx.importer.load(VideoId::from_i64(13), &fx.output_path).await;

    assert!(matches!(result, Err(ImportError::MalformedOutput(_))));
}

#[tokio::test]
async fn given_same_document_twice_when_loading_fresh_videos_then_counts_match() {
    let document = r#"{"language":"de",
        "segments":[{"start":0,"end":1.5,"text":"Hallo"},{"start":1.5,"end":3.0,"text":"Welt"}],
        "vocabulary":[{"word":"Hallo","translations":["Bonjour"],"examples":[]},
                      {"word":"Welt","translations":["monde"],"examples":[]}]}"#;
    let fx = fixture(document);

    let first = fx.importer.load(VideoId::from_i64(20), &fx.output_path).await.unwrap();
    let second = fx.importer.load(VideoId::from_i64(21), &fx.output_path).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.segments, 2);
    assert_eq!(first.vocabulary, 2);

    // Vocabulary lookup is by literal word text and duplicates are kept;
    // two runs leave two rows per word.
    assert_eq!(fx.transcripts.word_entries().len(), 4);
}

#[tokio::test]
async fn given_successful_import_when_loading_then_stage_trail_is_complete() {
    let fx = fixture(
        r#"{"language":"de",
            "segments":[{"start":0,"end":2.5,"text":"Hallo"}],
            "vocabulary":[{"word":"Hallo","translations":["Bonjour"],"examples":[]}]}"#,
    );

    fx.importer.load(VideoId::from_i64(30), &fx.output_path).await.unwrap();

    let logs = fx.ledger.list_logs(VideoId::from_i64(30)).await.unwrap();
    let trail: Vec<(ProcessingStep, StepStatus)> =
        logs.iter().map(|l| (l.step, l.status)).collect();
    assert_eq!(
        trail,
        vec![
            (ProcessingStep::DatabaseImport, StepStatus::Started),
            (ProcessingStep::DatabaseImport, StepStatus::Completed),
            (ProcessingStep::Exercises, StepStatus::Started),
            (ProcessingStep::Exercises, StepStatus::Completed),
            (ProcessingStep::Pronunciations, StepStatus::Started),
            (ProcessingStep::Pronunciations, StepStatus::Completed),
        ]
    );
}
