use assert_cmd::cargo::cargo_bin_cmd;

fn help_text(args: &[&str]) -> String {
    let mut cmd = cargo_bin_cmd!("reelmarkctl");
    let output = cmd
        .args(args)
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8_lossy(&output).into_owned()
}

#[test]
fn top_level_help_lists_commands() {
    let text = help_text(&[]);
    for command in ["record", "lookup", "list", "prune", "repair", "telemetry", "key"] {
        assert!(text.contains(command), "help missing '{command}'");
    }
    assert!(text.contains("--store"), "help missing --store flag");
}

#[test]
fn telemetry_subcommands_present() {
    let text = help_text(&["telemetry"]);
    assert!(text.contains("record"), "telemetry help missing record");
    assert!(text.contains("clear"), "telemetry help missing clear");
    assert!(text.contains("retention"), "telemetry help missing retention");
}

#[test]
fn key_help_mentions_metadata_flags() {
    let text = help_text(&["key"]);
    assert!(text.contains("--series"), "key help missing --series");
    assert!(text.contains("--type"), "key help missing --type");
}
