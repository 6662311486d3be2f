//! Integration tests for the contactdir command-line client

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Temporary config and session location for one test
struct TestEnv {
    temp_dir: TempDir,
    config_path: PathBuf,
    session_path: PathBuf,
}

impl TestEnv {
    fn new(api_url: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let session_path = temp_dir.path().join("session.json");
        let config = format!(
            r#"api_url = "{api_url}"
session_file = "{session}"

[auth]
endpoint = "http://127.0.0.1:9/"
client_id = "test-client"

[export]
directory = "{export_dir}"
"#,
            api_url = api_url,
            session = session_path.display(),
            export_dir = temp_dir.path().display(),
        );
        fs::write(&config_path, config).unwrap();
        Self {
            temp_dir,
            config_path,
            session_path,
        }
    }

    /// Store a session that stays valid for the length of the test run
    fn sign_in(&self) {
        let session = r#"{
  "username": "tester@example.org",
  "id_token": "id",
  "access_token": "access",
  "refresh_token": "refresh",
  "expires_at": 4102444800
}"#;
        fs::write(&self.session_path, session).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = contactdir_cmd();
        cmd.arg("--config").arg(&self.config_path);
        cmd
    }
}

/// Get the contactdir binary command with a clean environment
fn contactdir_cmd() -> Command {
    let mut cmd = Command::cargo_bin("contactdir").unwrap();
    for var in [
        "CONTACTDIR_API_URL",
        "CONTACTDIR_AUTH_REGION",
        "CONTACTDIR_USER_POOL_ID",
        "CONTACTDIR_CLIENT_ID",
        "RUST_LOG",
        "HTTP_PROXY",
        "http_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Serve `count` HTTP requests on a local port. Each request is answered with
/// the body of the first route whose prefix matches its path, or `[]`.
/// Returns the base URL and a handle yielding the request lines seen.
fn serve(routes: Vec<(&'static str, &'static str)>, count: usize) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..count {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if String::from_utf8_lossy(&buf).contains("\r\n\r\n") {
                    break;
                }
            }
            let request = String::from_utf8_lossy(&buf).into_owned();
            let line = request.lines().next().unwrap_or_default().to_string();
            let path = line.split_whitespace().nth(1).unwrap_or_default().to_string();
            let body = routes
                .iter()
                .find(|(prefix, _)| path.starts_with(prefix))
                .map(|(_, body)| *body)
                .unwrap_or("[]");
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            seen.push(line);
        }
        seen
    });
    (format!("http://{}/api", addr), handle)
}

const SEARCH_BODY: &str = r#"{"results": [
  {"id": 1, "full_name": "Alice Moreno", "email": "{alice@oas.org, a@home.net}", "phone_number": ["+17039397628"], "organization": "OAS", "org_type": "Intergovernmental"},
  {"id": 2, "full_name": "Bob Smith", "email": "bob@embassy.org", "phone_number": "+3444448888", "organization": "Embassy", "org_type": "Government"}
], "total": 2}"#;

const VIEW_BODY: &str = r#"[
  {"id": 1, "full_name": "Alice Moreno", "email": "alice@oas.org", "organization": "OAS"},
  {"id": 2, "full_name": "Bob Smith", "email": "bob@embassy.org", "organization": "Embassy"},
  {"id": 3, "full_name": 42, "phone_number": [7035551234]}
]"#;

// =============================================================================
// Setup
// =============================================================================

#[test]
fn test_help_lists_commands() {
    contactdir_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("login"));
}

#[test]
fn test_init_writes_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nested").join("config.toml");

    contactdir_cmd()
        .args(["init", "--config", config_path.to_str().unwrap()])
        .args(["--api-url", "https://dir.example.org/api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote configuration"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains(r#"api_url = "https://dir.example.org/api""#));
    assert!(contents.contains("[auth]"));
}

#[test]
fn test_init_refuses_to_overwrite_without_force() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "existing config").unwrap();

    contactdir_cmd()
        .args(["init", "--config", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(fs::read_to_string(&config_path).unwrap(), "existing config");

    contactdir_cmd()
        .args(["init", "--force", "--config", config_path.to_str().unwrap()])
        .assert()
        .success();
    assert!(fs::read_to_string(&config_path).unwrap().contains("[export]"));
}

#[test]
fn test_missing_config_suggests_init() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("missing.toml");

    contactdir_cmd()
        .args(["list", "--config", config_path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("contactdir init"));
}

#[test]
fn test_unknown_config_key_warns() {
    let env = TestEnv::new("http://127.0.0.1:9/api");
    let mut contents = fs::read_to_string(&env.config_path).unwrap();
    contents.insert_str(0, "colour = \"blue\"\n");
    fs::write(&env.config_path, contents).unwrap();

    env.cmd()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown configuration key `colour`"));
}

// =============================================================================
// Offline commands
// =============================================================================

#[test]
fn test_phone_canonical_and_display() {
    contactdir_cmd()
        .args(["phone", "canonical", "(703) 939-7628"])
        .assert()
        .success()
        .stdout("+17039397628\n");

    contactdir_cmd()
        .args(["phone", "display", "+17039397628"])
        .assert()
        .success()
        .stdout("(703) 939-7628\n");

    contactdir_cmd()
        .args(["phone", "display", "+3444448888"])
        .assert()
        .success()
        .stdout("+34 4444 8888\n");
}

// =============================================================================
// Session gate
// =============================================================================

#[test]
fn test_directory_commands_require_session() {
    let env = TestEnv::new("http://127.0.0.1:9/api");

    for args in [vec!["list"], vec!["show", "1"], vec!["delete", "1"], vec!["tags", "sectors"]] {
        env.cmd()
            .args(&args)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not signed in"));
    }
}

#[test]
fn test_whoami_reports_stored_session() {
    let env = TestEnv::new("http://127.0.0.1:9/api");
    env.sign_in();

    env.cmd()
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("tester@example.org"));
}

#[test]
fn test_logout_removes_session() {
    let env = TestEnv::new("http://127.0.0.1:9/api");
    env.sign_in();

    env.cmd().arg("logout").assert().success();
    assert!(!env.session_path.exists());

    env.cmd()
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not signed in"));
}

#[test]
fn test_signup_rejects_mismatched_passwords_offline() {
    let env = TestEnv::new("http://127.0.0.1:9/api");
    env.cmd()
        .args(["signup", "new@example.org", "--password", "hunter22", "--confirm-password", "hunter23"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("passwords do not match"));
}

#[test]
fn test_invalid_filter_is_rejected() {
    let env = TestEnv::new("http://127.0.0.1:9/api");
    env.sign_in();

    env.cmd()
        .args(["list", "--filter", "planet=Mars"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown contact field `planet`"));
}

// =============================================================================
// Against a local backend
// =============================================================================

#[test]
fn test_list_prints_page_with_display_phones() {
    let (api_url, server) = serve(vec![("/api/search", SEARCH_BODY)], 4);
    let env = TestEnv::new(&api_url);
    env.sign_in();

    env.cmd()
        .args(["list", "--filter", "organization=a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 contacts, page 1 of 1"))
        .stdout(predicate::str::contains("Alice Moreno\talice@oas.org, a@home.net\t(703) 939-7628"))
        .stdout(predicate::str::contains("Bob Smith\tbob@embassy.org\t+34 4444 8888"));

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /api/search?organization=a&page=1&pageSize=20 "));
    assert!(requests.iter().any(|r| r.starts_with("GET /api/get_sectors ")));
}

#[test]
fn test_list_search_narrows_page() {
    let (api_url, server) = serve(vec![("/api/search", SEARCH_BODY)], 4);
    let env = TestEnv::new(&api_url);
    env.sign_in();

    env.cmd()
        .args(["list", "--search", "EMBASSY"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bob Smith"))
        .stdout(predicate::str::contains("Alice Moreno").not());
    server.join().unwrap();
}

#[test]
fn test_export_writes_csv() {
    let (api_url, server) = serve(vec![("/api/search", SEARCH_BODY)], 4);
    let env = TestEnv::new(&api_url);
    env.sign_in();

    env.cmd()
        .arg("export")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 contacts"));
    server.join().unwrap();

    let csv = fs::read_to_string(env.temp_dir.path().join("contacts.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Full Name,Email,Phone,Organization,Organization Type,LinkedIn,Instagram,X,Sector,Country"
    );
    assert!(lines
        .next()
        .unwrap()
        .starts_with("Alice Moreno,\"alice@oas.org, a@home.net\",+17039397628,OAS"));
}

#[test]
fn test_export_all_reads_unpaginated_listing_and_applies_search() {
    let (api_url, server) = serve(vec![("/api/view", VIEW_BODY)], 1);
    let env = TestEnv::new(&api_url);
    env.sign_in();
    let output = env.temp_dir.path().join("out").join("all.csv");

    env.cmd()
        .args(["export", "--all", "--search", "moreno", "--output"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 contacts"));

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /api/view "));

    let csv = fs::read_to_string(&output).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("Alice Moreno"));
    assert!(!csv.contains("Bob Smith"));
}

#[test]
fn test_add_requires_name_before_contacting_backend() {
    let env = TestEnv::new("http://127.0.0.1:9/api");
    env.sign_in();

    env.cmd()
        .args(["add", "--email", "nobody@example.org"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("full name is required"));
}
