//! Rule-layer verification scenarios against a real git repository.

use wrapper::core::state::Ledger;
use wrapper::io::store::load_json;
use wrapper::test_support::{ScriptedConsole, ScriptedLlm, TestRepo};
use wrapper::verify::VerifyOptions;
use wrapper::{accept, verify};

const STEP_ALLOWING_A: &str = "\
step_id: touch-only-a
type: implementation
goal: |
  Adjust a.txt only.
allowed_files:
  - a.txt
forbidden: []
success_criteria:
  - a.txt updated
";

fn unavailable() -> Result<&'static dyn wrapper::io::llm::LlmClient, String> {
    Err("no LLM API key configured".to_string())
}

fn seeded_repo() -> (TestRepo, wrapper::io::paths::WrapperPaths) {
    let repo = TestRepo::new().expect("repo");
    let paths = repo.paths();
    repo.write_file(".wrapper/architecture.md", "# Architecture\n")
        .expect("write architecture");
    repo.write_file(".wrapper/repo.yaml", "repo_name: demo\nmust_not: []\n")
        .expect("write repo.yaml");
    repo.write_file(".wrapper/step.yaml", STEP_ALLOWING_A)
        .expect("write step.yaml");
    repo.write_file("a.txt", "original a\n").expect("write a.txt");
    repo.write_file("b.txt", "original b\n").expect("write b.txt");
    repo.commit_all("seed working tree").expect("commit");
    (repo, paths)
}

/// Changing a file outside `allowed_files` fails verification, names the
/// offending path, records FAIL, and blocks the following accept.
#[test]
fn disallowed_change_fails_and_blocks_accept() {
    let (repo, paths) = seeded_repo();
    repo.write_file("b.txt", "tampered\n").expect("modify b.txt");

    let ok = verify::run(&paths, unavailable(), VerifyOptions::default()).expect("verify");
    assert!(!ok);

    let ledger: Ledger = load_json(&paths.ledger).expect("load").expect("ledger");
    assert_eq!(ledger.last_verify_status.as_deref(), Some("FAIL"));
    assert_eq!(ledger.last_verify_step.as_deref(), Some("touch-only-a"));

    assert!(paths.diff.exists(), "diff is persisted for inspection");
    let repair = std::fs::read_to_string(&paths.repair_prompt).expect("repair prompt");
    assert!(repair.contains("b.txt"));
    assert!(repair.contains("Revert changes to disallowed files"));

    // Accept is refused and the ledger gains no entry.
    let mut console = ScriptedConsole::new(vec![]);
    let ok = accept::run(&paths, unavailable(), &mut console).expect("accept");
    assert!(!ok, "accept must be blocked after FAIL");
    let ledger: Ledger = load_json(&paths.ledger).expect("load").expect("ledger");
    assert!(ledger.done_steps.is_empty());
}

/// A change set that is a subset of `allowed_files` passes the rule layer
/// even when the model is unavailable.
#[test]
fn allowed_subset_passes_without_model() {
    let (repo, paths) = seeded_repo();
    repo.write_file("a.txt", "updated a\n").expect("modify a.txt");

    let ok = verify::run(&paths, unavailable(), VerifyOptions::default()).expect("verify");
    assert!(ok);

    let ledger: Ledger = load_json(&paths.ledger).expect("load").expect("ledger");
    assert_eq!(ledger.last_verify_status.as_deref(), Some("PASS"));
}

/// A forbidden keyword match in the diff is an error naming both the
/// forbidden item and the matched token.
#[test]
fn forbidden_pattern_in_diff_fails() {
    let (repo, paths) = seeded_repo();
    repo.write_file(
        ".wrapper/step.yaml",
        "step_id: no-routes\ntype: implementation\ngoal: g\n\
         allowed_files:\n  - a.txt\nforbidden:\n  - add http routes\n",
    )
    .expect("write step.yaml");
    repo.write_file("a.txt", "app.get('/users', handler)\n")
        .expect("modify a.txt");

    let ok = verify::run(&paths, unavailable(), VerifyOptions::default()).expect("verify");
    assert!(!ok);

    let repair = std::fs::read_to_string(&paths.repair_prompt).expect("repair prompt");
    assert!(repair.contains("add http routes"));
    assert!(repair.contains("app.get("));
}

/// A failing model verdict alone (rules clean) fails verification.
#[test]
fn model_fail_verdict_is_unioned_with_rule_results() {
    let (repo, paths) = seeded_repo();
    repo.write_file("a.txt", "updated a\n").expect("modify a.txt");

    // First response feeds the first-run deviation scan; the second is the
    // review verdict.
    let reviewer = ScriptedLlm::new(vec![
        "[]",
        "VERDICT: FAIL\n\nSUMMARY:\nChange does not match the goal.",
    ]);
    let ok = verify::run(
        &paths,
        Ok(&reviewer as &dyn wrapper::io::llm::LlmClient),
        VerifyOptions::default(),
    )
    .expect("verify");
    assert!(!ok);

    let ledger: Ledger = load_json(&paths.ledger).expect("load").expect("ledger");
    assert_eq!(ledger.last_verify_status.as_deref(), Some("FAIL"));
    let repair = std::fs::read_to_string(&paths.repair_prompt).expect("repair prompt");
    assert!(repair.contains("LLM analysis found issues"));
}

/// Changes confined to the state directory never count against the step.
#[test]
fn state_directory_changes_are_ignored() {
    let (repo, paths) = seeded_repo();
    // Track a state file, then modify it so it shows in `git diff HEAD`.
    repo.write_file(".wrapper/notes.txt", "v1\n").expect("write");
    repo.commit_all("track state file").expect("commit");
    repo.write_file(".wrapper/notes.txt", "v2\n").expect("modify");

    let ok = verify::run(&paths, unavailable(), VerifyOptions::default()).expect("verify");
    assert!(ok, "state-directory-only changes must pass");
}
