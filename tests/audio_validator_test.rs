use std::sync::Arc;

use wortschatz::application::services::{AudioValidationError, AudioValidator};
use wortschatz::infrastructure::storage::LocalMediaStore;

fn create_validator() -> (tempfile::TempDir, AudioValidator) {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("audios")).unwrap();
    std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
    let store = Arc::new(LocalMediaStore::new(dir.path().to_path_buf()).unwrap());
    let validator = AudioValidator::new(store, dir.path().to_path_buf());
    (dir, validator)
}

#[tokio::test]
async fn given_file_in_audios_when_validating_then_returns_absolute_path() {
    let (dir, validator) = create_validator();
    std::fs::write(dir.path().join("audios/lesson.wav"), b"riff").unwrap();

    let validated = validator.validate("audios/lesson.wav").await.unwrap();

    assert_eq!(validated.relative.as_str(), "audios/lesson.wav");
    assert_eq!(validated.absolute, dir.path().join("audios/lesson.wav"));
    assert_eq!(validated.size_bytes, 4);
}

#[tokio::test]
async fn given_staged_upload_when_validating_then_file_is_moved_into_audios() {
    let (dir, validator) = create_validator();
    std::fs::write(dir.path().join("uploads/lesson.wav"), b"riff").unwrap();

    let validated = validator.validate("uploads/lesson.wav").await.unwrap();

    assert_eq!(validated.relative.as_str(), "audios/lesson.wav");
    assert!(dir.path().join("audios/lesson.wav").is_file());
    assert!(!dir.path().join("uploads/lesson.wav").exists());
}

#[tokio::test]
async fn given_bare_filename_when_validating_then_resolves_into_audios() {
    let (dir, validator) = create_validator();
    std::fs::write(dir.path().join("audios/lesson.mp3"), b"data").unwrap();

    let validated = validator.validate("lesson.mp3").await.unwrap();

    assert_eq!(validated.relative.as_str(), "audios/lesson.mp3");
    assert_eq!(validated.absolute, dir.path().join("audios/lesson.mp3"));
}

#[tokio::test]
async fn given_absolute_path_inside_root_when_validating_then_accepted() {
    let (dir, validator) = create_validator();
    std::fs::write(dir.path().join("audios/lesson.wav"), b"riff").unwrap();

    let raw = dir.path().join("audios/lesson.wav");
    let validated = validator.validate(raw.to_str().unwrap()).await.unwrap();

    assert_eq!(validated.relative.as_str(), "audios/lesson.wav");
}

#[tokio::test]
async fn given_missing_file_when_validating_then_fails_not_found() {
    let (_dir, validator) = create_validator();

    let result = validator.validate("audios/ghost.wav").await;

    assert!(matches!(result, Err(AudioValidationError::FileNotFound(_))));
}

#[tokio::test]
async fn given_parent_traversal_when_validating_then_fails_invalid_location() {
    let (_dir, validator) = create_validator();

    let result = validator.validate("audios/../../etc/passwd").await;

    assert!(matches!(
        result,
        Err(AudioValidationError::InvalidLocation(_))
    ));
}

#[tokio::test]
async fn given_absolute_path_outside_root_when_validating_then_fails_invalid_location() {
    let (_dir, validator) = create_validator();

    let result = validator.validate("/etc/passwd").await;

    assert!(matches!(
        result,
        Err(AudioValidationError::InvalidLocation(_))
    ));
}

#[tokio::test]
async fn given_path_outside_audios_when_validating_then_fails_invalid_location() {
    let (dir, validator) = create_validator();
    std::fs::create_dir_all(dir.path().join("other")).unwrap();
    std::fs::write(dir.path().join("other/lesson.wav"), b"riff").unwrap();

    let result = validator.validate("other/lesson.wav").await;

    assert!(matches!(
        result,
        Err(AudioValidationError::InvalidLocation(_))
    ));
}

#[tokio::test]
async fn given_unrecognized_extension_when_validating_then_still_accepted() {
    let (dir, validator) = create_validator();
    std::fs::write(dir.path().join("audios/lesson.opus"), b"data").unwrap();

    let validated = validator.validate("audios/lesson.opus").await.unwrap();

    assert_eq!(validated.relative.as_str(), "audios/lesson.opus");
}
