mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::csv_body;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_malformed_csv_handling() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("robustness_test.csv");
    std::fs::write(
        &script,
        "method,path,body\n\
         POST,/borrowers,\"{\"\"name\"\":\"\"Grace\"\",\"\"email\"\":\"\"g@example.com\"\",\"\"phone\"\":\"\"1\"\"}\"\n\
         DELETE,/loans/1,\n\
         GET\n\
         POST,/borrowers,\"{\"\"name\"\":\"\"Alan\"\",\"\"email\"\":\"\"a@example.com\"\",\"\"phone\"\":\"\"2\"\"}\"\n",
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("billing-engine"));
    cmd.arg(&script);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading request"))
        .stdout(predicate::str::contains(format!(
            "POST,/borrowers,200,{}",
            csv_body(r#"{"borrower_id":1}"#)
        )))
        .stdout(predicate::str::contains(format!(
            "POST,/borrowers,200,{}",
            csv_body(r#"{"borrower_id":2}"#)
        )))
        .stdout(predicate::str::contains("DELETE").not());
}

#[test]
fn test_invalid_bodies_are_answered_not_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bodies.csv");
    common::write_requests(
        &script,
        &[
            ("POST", "/borrowers", common::BORROWER),
            ("POST", "/loans", "not json"),
            ("POST", "/loans", r#"{"borrower_id":1,"amount":"abc","interest_rate":5,"duration_weeks":5}"#),
            ("POST", "/loans", r#"{"borrower_id":1,"amount":-5,"interest_rate":5,"duration_weeks":5}"#),
            ("POST", "/loans", r#"{"borrower_id":1,"amount":100,"interest_rate":101,"duration_weeks":5}"#),
            ("POST", "/loans", r#"{"borrower_id":9,"amount":100,"interest_rate":5,"duration_weeks":5}"#),
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("billing-engine"));
    cmd.arg(&script);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "POST,/loans,400,{}",
            csv_body(r#"{"error":"invalid request"}"#)
        )))
        .stdout(predicate::str::contains(format!(
            "POST,/loans,400,{}",
            csv_body(r#"{"error":"validation error: loan amount must be positive"}"#)
        )))
        .stdout(predicate::str::contains(format!(
            "POST,/loans,400,{}",
            csv_body(r#"{"error":"validation error: interest rate must be between 0 and 100"}"#)
        )))
        .stdout(predicate::str::contains(format!(
            "POST,/loans,500,{}",
            csv_body(r#"{"error":"borrower 9 not found"}"#)
        )));
}
