use std::sync::Mutex;

use stance_classifier::error::{Result, StanceError};
use stance_classifier::{
    CommentRecord, CommentTable, CompletionSource, LabelExtractor, Message, PromptSpec, Role,
    StanceLabel, StancePipeline,
};

/// Replays a fixed list of replies, one per call, recording every
/// conversation it was given.
struct ScriptedEngine {
    replies: Vec<Result<String>>,
    calls: Mutex<usize>,
    conversations: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedEngine {
    fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies,
            calls: Mutex::new(0),
            conversations: Mutex::new(Vec::new()),
        }
    }

    fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }
}

impl CompletionSource for ScriptedEngine {
    fn complete(&self, messages: &[Message]) -> Result<String> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        let mut calls = self.calls.lock().unwrap();
        let index = *calls;
        *calls += 1;
        match self.replies.get(index) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(_)) => Err(StanceError::Generation("device failure".to_string())),
            None => panic!("engine called more times than scripted"),
        }
    }
}

fn pipeline(engine: ScriptedEngine) -> StancePipeline<ScriptedEngine> {
    StancePipeline::new(engine, PromptSpec::default(), LabelExtractor::default())
}

fn record(id: usize, text: &str) -> CommentRecord {
    CommentRecord {
        id,
        text: text.to_string(),
    }
}

#[test]
fn end_to_end_single_comment() {
    let table =
        CommentTable::from_reader("comment\nCutting federal jobs is wrong #SemST\n".as_bytes())
            .unwrap();
    let records: Vec<_> = table.records().collect();
    assert_eq!(records[0].text, "Cutting federal jobs is wrong ");

    let pipeline = pipeline(ScriptedEngine::from_texts(&["Answer: Oppose"]));
    let outcome = pipeline.classify_all(records);

    assert_eq!(outcome.labels, vec![StanceLabel::Oppose]);
    assert_eq!(outcome.label_strings(), vec!["oppose".to_string()]);
    assert!(outcome.failures.is_empty());
}

#[test]
fn conversation_sent_to_engine_has_two_turns() {
    let engine = ScriptedEngine::from_texts(&["oppose"]);
    let pipeline = StancePipeline::new(&engine, PromptSpec::default(), LabelExtractor::default());

    pipeline
        .classify(&record(0, "Cutting federal jobs is wrong "))
        .unwrap();

    let conversations = engine.conversations.lock().unwrap();
    let conversation = &conversations[0];
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[0].role(), &Role::System);
    assert_eq!(conversation[1].role(), &Role::User);
    assert!(conversation[1]
        .content()
        .contains("Cutting federal jobs is wrong "));
}

#[test]
fn output_matches_input_order_and_count() {
    let pipeline = pipeline(ScriptedEngine::from_texts(&["favor", "neutral", "oppose"]));
    let records = vec![record(0, "a"), record(1, "b"), record(2, "c")];

    let outcome = pipeline.classify_all(records);

    assert_eq!(
        outcome.label_strings(),
        vec!["favor", "neutral", "oppose"]
    );
    assert!(outcome.failures.is_empty());
}

#[test]
fn empty_input_yields_empty_outcome() {
    let pipeline = pipeline(ScriptedEngine::from_texts(&[]));
    let outcome = pipeline.classify_all(Vec::new());
    assert!(outcome.labels.is_empty());
    assert!(outcome.failures.is_empty());
}

#[test]
fn rerun_produces_identical_output() {
    let records = vec![record(0, "a"), record(1, "b")];

    let first = pipeline(ScriptedEngine::from_texts(&["favor", "oppose"]))
        .classify_all(records.clone());
    let second = pipeline(ScriptedEngine::from_texts(&["favor", "oppose"]))
        .classify_all(records);

    assert_eq!(first.label_strings(), second.label_strings());
}

#[test]
fn item_failure_records_sentinel_and_continues() {
    let engine = ScriptedEngine::new(vec![
        Ok("favor".to_string()),
        Err(StanceError::Generation("device failure".to_string())),
        Ok("oppose".to_string()),
    ]);
    let pipeline = pipeline(engine);
    let records = vec![record(0, "a"), record(1, "b"), record(2, "c")];

    let outcome = pipeline.classify_all(records);

    assert_eq!(
        outcome.labels,
        vec![
            StanceLabel::Favor,
            StanceLabel::unknown(),
            StanceLabel::Oppose
        ]
    );
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].row, 1);
}

#[test]
fn whitespace_reply_records_sentinel() {
    let pipeline = pipeline(ScriptedEngine::from_texts(&["   "]));
    let outcome = pipeline.classify_all(vec![record(0, "a")]);

    assert_eq!(outcome.labels, vec![StanceLabel::unknown()]);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].message.contains("no tokens"));
}

#[test]
fn file_level_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("comments.csv");
    let output = dir.path().join("comments_with_stance.csv");
    std::fs::write(
        &input,
        "id,comment\n1,Cutting federal jobs is wrong #SemST\n2,Sounds fine to me\n",
    )
    .unwrap();

    let table = CommentTable::from_path(&input).unwrap();
    let pipeline = pipeline(ScriptedEngine::from_texts(&["Oppose.", "favor"]));
    let outcome = pipeline.classify_all(table.records());
    table
        .write_with_labels(&output, &outcome.label_strings())
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        written,
        "id,comment,LLM_stance\n1,Cutting federal jobs is wrong ,oppose\n2,Sounds fine to me,favor\n"
    );
}
