use wortschatz::infrastructure::engine::ProgressMapper;

#[test]
fn given_milestone_lines_when_observing_then_progress_advances_in_steps() {
    let mut mapper = ProgressMapper::new();
    assert_eq!(mapper.observe("Processing audio file a.wav"), Some(25));
    assert_eq!(mapper.observe("Transcribing with model large-v3"), Some(50));
    assert_eq!(mapper.observe("Translating de -> fr"), Some(75));
    assert_eq!(mapper.current(), 75);
}

#[test]
fn given_repeated_milestone_when_observing_then_no_second_advance() {
    let mut mapper = ProgressMapper::new();
    assert_eq!(mapper.observe("Processing chunk 1"), Some(25));
    assert_eq!(mapper.observe("Processing chunk 2"), None);
    assert_eq!(mapper.current(), 25);
}

#[test]
fn given_out_of_order_milestones_when_observing_then_progress_is_monotone() {
    let mut mapper = ProgressMapper::new();
    assert_eq!(mapper.observe("Translating segment tail"), Some(75));
    assert_eq!(mapper.observe("Processing leftovers"), None);
    assert_eq!(mapper.observe("Transcribing leftovers"), None);
    assert_eq!(mapper.current(), 75);
}

#[test]
fn given_unrelated_output_when_observing_then_progress_stays_put() {
    let mut mapper = ProgressMapper::new();
    assert_eq!(mapper.observe("loading model weights"), None);
    assert_eq!(mapper.observe(""), None);
    assert_eq!(mapper.current(), 0);
}
