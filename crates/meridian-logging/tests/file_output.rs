//! Global subscriber writing JSONL to a file
//!
//! Kept in its own test binary: the global subscriber can be set once per
//! process.

use std::fs;

use tempfile::TempDir;

use meridian_core::{NodeId, Role};
use meridian_logging::{
    FileConfig, LogConfig, MeridianSubscriberBuilder, NodeContext, RotationStrategy,
};

#[test]
fn test_jsonl_file_output() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().to_path_buf();
    let config = LogConfig {
        level: "debug".to_string(),
        ..LogConfig::recorded(dir.clone())
    };
    let guard = MeridianSubscriberBuilder::new()
        .with_config(config)
        .with_file_output(FileConfig {
            directory: dir.clone(),
            prefix: "run".to_string(),
            rotation: RotationStrategy::Never,
        })
        .try_init()
        .unwrap();
    assert!(guard.is_some());

    {
        let _entered = NodeContext::new(NodeId::host(9), Role::Anchor).span().entered();
        tracing::debug!(target_node = %NodeId::host(3), "Query issued");
    }
    tracing::trace!("Filtered out");

    // Dropping the guard flushes the writer
    drop(guard);

    let contents = fs::read_to_string(dir.join("run.log")).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "Query issued");
    assert_eq!(lines[0]["target_node"], "10.0.0.3");
    assert_eq!(lines[0]["span"]["node"], "10.0.0.9");
    assert_eq!(lines[0]["span"]["role"], "anchor");
    // Recorded runs keep the whole span stack
    assert_eq!(lines[0]["spans"][0]["name"], "node");
}
