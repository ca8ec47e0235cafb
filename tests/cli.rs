use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docchat_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docchat");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[index]
path = "{}/data/index"

[chunking]
chunk_size = 500
chunk_overlap = 50

[retrieval]
top_k = 2
"#,
        root.display()
    );

    let config_path = config_dir.join("docchat.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docchat(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docchat_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docchat binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_status_without_index() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_docchat(&config, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("no index"), "unexpected output: {}", stdout);
}

#[test]
fn test_status_json_without_index() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _stderr, success) = run_docchat(&config, &["status", "--json"]);
    assert!(success);
    assert_eq!(stdout.trim(), "null");
}

#[test]
fn test_ask_without_index_fails() {
    let (_tmp, config) = setup_test_env();
    let (_stdout, stderr, success) = run_docchat(
        &config,
        &["--api-key", "sk-dummy", "ask", "How long is the warranty?"],
    );
    assert!(!success);
    assert!(
        stderr.contains("No index found. Process documents first."),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_ask_without_index_reports_index_before_key() {
    let (_tmp, config) = setup_test_env();
    let (_stdout, stderr, success) = run_docchat(&config, &["ask", "Anything?"]);
    assert!(!success);
    assert!(stderr.contains("No index found"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_process_requires_key_for_openai() {
    let (_tmp, config) = setup_test_env();
    let (_stdout, stderr, success) =
        run_docchat(&config, &["process", "--company-info", "Acme sells anvils."]);
    assert!(!success);
    assert!(stderr.contains("requires an API key"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_too_many_faqs_rejected() {
    let (_tmp, config) = setup_test_env();
    let mut args = vec!["--api-key", "sk-dummy", "process"];
    for faq in ["a=1", "b=2", "c=3", "d=4", "e=5", "f=6"] {
        args.push("--faq");
        args.push(faq);
    }
    let (_stdout, stderr, success) = run_docchat(&config, &args);
    assert!(!success);
    assert!(stderr.contains("At most 5 FAQ pairs"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _config) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(&bad, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();

    let (_stdout, stderr, success) = run_docchat(&bad, &["status"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "unexpected stderr: {}", stderr);
}
