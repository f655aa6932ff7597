//! Persistence of the filtered conversations and the statistics report.

use crate::models::{Conversation, StatsReport};
use crate::report::generate_json_report;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, error};

/// Write the conversations as a pretty-printed JSON array, exactly as fetched.
pub fn write_conversations(path: &Path, conversations: &[Conversation]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, conversations)
        .with_context(|| format!("Failed to serialize conversations to {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    debug!(
        "Wrote {} conversations to {}",
        conversations.len(),
        path.display()
    );
    Ok(())
}

/// Read back a file produced by [`write_conversations`].
#[allow(dead_code)] // Loader for saved datasets
pub fn read_conversations(path: &Path) -> Result<Vec<Conversation>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse conversations in {}", path.display()))
}

/// Write the JSON statistics report.
pub fn write_stats_report(path: &Path, report: &StatsReport) -> Result<()> {
    let content = generate_json_report(report)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write statistics to {}", path.display()))
}

/// Persist a run: the conversations file first, then the optional
/// statistics report.
///
/// Only a failure to write the conversations is returned as an error. A
/// failed statistics write is logged and reported as `Ok(false)`.
pub fn persist(
    conversations_path: &Path,
    conversations: &[Conversation],
    stats: Option<(&Path, &StatsReport)>,
) -> Result<bool> {
    write_conversations(conversations_path, conversations)?;

    let Some((stats_path, report)) = stats else {
        return Ok(false);
    };
    match write_stats_report(stats_path, report) {
        Ok(()) => Ok(true),
        Err(e) => {
            error!("{:#}", e);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AggregationSettings};
    use crate::models::{ReportMetadata, TimeWindow};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn stats_report(conversations: &[Conversation]) -> StatsReport {
        let metadata = ReportMetadata {
            generated_at: Utc::now(),
            account_slug: "acme".to_string(),
            display_name: None,
            window: TimeWindow::trailing(Utc::now(), 90),
            partial: true,
        };
        StatsReport::new(
            metadata,
            analyze(conversations, &AggregationSettings::default()),
        )
    }

    fn sample() -> Vec<Conversation> {
        vec![
            json!({
                "id": "c-1",
                "created_at": "2024-06-01T10:00:00Z",
                "message_count": 4,
                "context": {"tags": ["sou_eu"], "live_instructions": {"ERV": "R$ 1.234,56"}},
                "extra": {"nested": [1, 2.5, null, true]}
            }),
            json!({"id": "c-2", "título": "olá"}),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect()
    }

    #[test]
    fn test_round_trip_is_lossless() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversations.json");
        let conversations = sample();

        write_conversations(&path, &conversations).unwrap();
        let read_back = read_conversations(&path).unwrap();

        assert_eq!(read_back, conversations);
    }

    #[test]
    fn test_field_order_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversations.json");
        let conversations: Vec<Conversation> = serde_json::from_str(
            r#"[{"zeta": 1, "id": "c-1", "alpha": {"y": 2, "b": 3}}]"#,
        )
        .unwrap();

        write_conversations(&path, &conversations).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        let zeta = text.find("\"zeta\"").unwrap();
        let id = text.find("\"id\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        assert!(zeta < id && id < alpha, "field order changed:\n{}", text);
        assert!(text.find("\"y\"").unwrap() < text.find("\"b\"").unwrap());

        let keys: Vec<String> = read_conversations(&path).unwrap()[0]
            .keys()
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(keys, vec!["zeta", "id", "alpha"]);
    }

    #[test]
    fn test_written_text_matches_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversations.json");
        let input = r#"[{"message_count": 3, "created_at": "2024-06-01T10:00:00Z", "context": {"tags": ["b", "a"]}}]"#;
        let conversations: Vec<Conversation> = serde_json::from_str(input).unwrap();

        write_conversations(&path, &conversations).unwrap();

        let expected =
            serde_json::to_string_pretty(&serde_json::from_str::<Value>(input).unwrap()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_persist_writes_conversations_when_stats_fail() {
        let dir = TempDir::new().unwrap();
        let conversations_path = dir.path().join("convs.json");
        let stats_path = dir.path().join("missing_dir").join("stats.json");
        let conversations = sample();
        let report = stats_report(&conversations);

        let stats_written = persist(
            &conversations_path,
            &conversations,
            Some((stats_path.as_path(), &report)),
        )
        .unwrap();

        assert!(!stats_written);
        assert!(!stats_path.exists());
        assert_eq!(read_conversations(&conversations_path).unwrap(), conversations);
    }

    #[test]
    fn test_persist_writes_both_files() {
        let dir = TempDir::new().unwrap();
        let conversations_path = dir.path().join("convs.json");
        let stats_path = dir.path().join("stats.json");
        let report = stats_report(&[]);

        assert!(persist(&conversations_path, &[], Some((stats_path.as_path(), &report))).unwrap());
        assert!(conversations_path.exists());
        let stats: Value =
            serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();
        assert_eq!(stats["metadata"]["partial"], true);

        assert!(!persist(&conversations_path, &[], None).unwrap());
    }

    #[test]
    fn test_output_is_pretty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conversations.json");

        write_conversations(&path, &sample()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.starts_with("[\n  {"));
        assert!(text.contains("\"message_count\": 4"));
    }

    #[test]
    fn test_empty_list_writes_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");

        write_conversations(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(read_conversations(&path).unwrap().is_empty());
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.json");
        assert!(write_conversations(&path, &sample()).is_err());
    }
}
