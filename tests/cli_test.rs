use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/rides.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "id,passenger,driver,origin,destination,price,status,payment_status",
        ))
        // Completed ride is captured
        .stdout(predicate::str::contains(
            "1,1,1,Downtown,Airport,12.50,COMPLETED,CAPTURED",
        ))
        // Ride cancelled before pickup is never charged
        .stdout(predicate::str::contains("2,1,1,Uptown,Harbor,57.50,CANCELLED,PENDING"));

    Ok(())
}

#[test]
fn test_cli_drivers_report() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/rides.csv").arg("--report").arg("drivers");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("id,name,available"))
        .stdout(predicate::str::contains("1,Rick,true"))
        .stdout(predicate::str::contains("2,Morty,true"));

    Ok(())
}

#[test]
fn test_cli_passengers_report() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/rides.csv")
        .arg("--report")
        .arg("passengers");

    cmd.assert()
        .success()
        .stdout(predicate::str::diff("id,name\n1,Jerry\n"));

    Ok(())
}

#[test]
fn test_cli_reconciliation_report_is_empty_when_healthy() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!());
    cmd.arg("tests/fixtures/rides.csv")
        .arg("--report")
        .arg("reconciliation");

    // Nothing failed, so not even a header row is written.
    cmd.assert().success().stdout(predicate::str::is_empty());

    Ok(())
}
