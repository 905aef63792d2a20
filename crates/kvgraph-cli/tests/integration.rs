//! Integration tests for the kvgraph CLI
//!
//! Each test runs the binary against a temporary workspace with `HOME`
//! pointed at the same directory, so no user configuration leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// Get a Command for the kvgraph binary bound to a workspace
#[allow(deprecated)]
fn kvgraph(workspace: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kvgraph").expect("Failed to find kvgraph binary");
    cmd.env("HOME", workspace.path())
        .env_remove("KVGRAPH_BACKEND")
        .env_remove("KVGRAPH_CONFIG")
        .arg("--workspace")
        .arg(workspace.path());
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("Failed to run kvgraph");
    assert!(
        output.status.success(),
        "kvgraph failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("Output is not JSON")
}

fn initialized() -> TempDir {
    let workspace = TempDir::new().expect("Failed to create temp dir");
    kvgraph(&workspace).args(["--quiet", "init"]).assert().success();
    workspace
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn test_init_creates_store_and_config() {
    let workspace = initialized();
    assert!(workspace.path().join(".kvgraph/kvgraph.db").exists());
    assert!(workspace.path().join(".kvgraph/config.toml").exists());
}

#[test]
fn test_init_twice_requires_force() {
    let workspace = initialized();

    kvgraph(&workspace)
        .args(["--quiet", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    kvgraph(&workspace)
        .args(["--quiet", "init", "--force", "--extra-employees", "5"])
        .assert()
        .success();

    let page = json_output(kvgraph(&workspace).args(["list", "Employee", "--first", "100"]));
    assert_eq!(page["totalCount"], 8);
}

#[test]
fn test_commands_require_init() {
    let workspace = TempDir::new().unwrap();
    kvgraph(&workspace)
        .args(["list", "Employee"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("kvgraph init"));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_schema_prints_sdl() {
    let workspace = TempDir::new().unwrap();
    kvgraph(&workspace)
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("interface Node {"))
        .stdout(predicate::str::contains("type HourlyEmployee implements Node {"))
        .stdout(predicate::str::contains("type EmployeeConnection {"));
}

#[test]
fn test_list_pages_with_cursor() {
    let workspace = initialized();

    let first = json_output(kvgraph(&workspace).args([
        "list",
        "Employee",
        "--first",
        "2",
        "--fields",
        "edges.node.name",
    ]));
    assert_eq!(first["edges"].as_array().unwrap().len(), 2);
    assert_eq!(first["pageInfo"]["hasNextPage"], true);

    let cursor = first["pageInfo"]["endCursor"].as_str().unwrap().to_string();
    let second = json_output(kvgraph(&workspace).args([
        "list",
        "Employee",
        "--first",
        "2",
        "--after",
        &cursor,
    ]));
    assert_eq!(second["edges"].as_array().unwrap().len(), 1);
    assert_eq!(second["pageInfo"]["hasPreviousPage"], true);
}

#[test]
fn test_list_variant_with_relationship_fields() {
    let workspace = initialized();

    let page = json_output(kvgraph(&workspace).args([
        "list",
        "HourlyEmployee",
        "--fields",
        "name,department.name,role.name",
    ]));
    assert_eq!(
        page["edges"][0]["node"],
        serde_json::json!({
            "name": "Tracy",
            "department": { "name": "Human Resources" },
            "role": { "name": "engineer" },
        })
    );
}

#[test]
fn test_node_by_global_id() {
    let workspace = initialized();

    let departments = json_output(kvgraph(&workspace).args([
        "list",
        "Department",
        "--where",
        "name=Engineering",
        "--fields",
        "id",
    ]));
    let id = departments["edges"][0]["node"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let node = json_output(kvgraph(&workspace).args(["node", &id, "--fields", "id,name"]));
    assert_eq!(node["id"], id.as_str());
    assert_eq!(node["name"], "Engineering");
}

#[test]
fn test_node_rejects_bad_id() {
    let workspace = initialized();
    kvgraph(&workspace)
        .args(["node", "not base64!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid global id"));
}

#[test]
fn test_memory_backend_needs_no_init() {
    let workspace = TempDir::new().unwrap();
    let page = json_output(kvgraph(&workspace).args([
        "--backend",
        "memory",
        "list",
        "SalaryEmployee",
        "--fields",
        "name",
    ]));
    assert_eq!(page["totalCount"], 2);
    assert!(!workspace.path().join(".kvgraph").exists());
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_init_and_show() {
    let workspace = TempDir::new().unwrap();
    kvgraph(&workspace)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));

    std::fs::write(
        workspace.path().join(".kvgraph/config.toml"),
        "[pagination]\ndefault_page_size = 7\n",
    )
    .unwrap();

    let shown = json_output(kvgraph(&workspace).args(["config", "show", "--json"]));
    assert_eq!(shown["config"]["pagination"]["default_page_size"], 7);
    assert_eq!(shown["config"]["storage"]["backend"], "sqlite");
}
