use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn broker() -> Command {
    let mut cmd = Command::new(cargo_bin!("escrow-broker"));
    cmd.env_remove("ESCROW_DB_PATH").env_remove("ESCROW_CURRENCY");
    cmd
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = broker();
    cmd.arg("tests/fixtures/script.csv").env("ESCROW_ADMIN_IDS", "100");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "account,balance,reputation,locale,payout_address",
        ))
        // Seller of both paid deals
        .stdout(predicate::str::contains("1,50,2,ru,"))
        // Buyer who paid from balance
        .stdout(predicate::str::contains("2,50,0,ru,"))
        // Buyer who paid by code keeps an empty balance
        .stdout(predicate::str::contains("3,0,0,ru,"));

    Ok(())
}

#[test]
fn test_cli_stats_report() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = broker();
    cmd.arg("tests/fixtures/script.csv")
        .env("ESCROW_ADMIN_IDS", "100")
        .args(["--report", "stats", "--account", "2"]);

    cmd.assert()
        .success()
        .stdout(predicate::eq("count,total\n1,50\n"));

    Ok(())
}

#[test]
fn test_cli_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = broker();
    cmd.env_remove("ESCROW_ADMIN_IDS")
        .arg("tests/fixtures/script.csv")
        .args(["--config", "tests/fixtures/config.toml", "--report", "history"]);

    // history_limit = 1 keeps only the latest payment, the code-settled purchase.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("deal,paid_at,amount,currency,buyer,seller,running_total"))
        .stdout(predicate::str::contains(",30,USDT,3,1,30\n"))
        .stdout(predicate::str::contains(",50,USDT,").not());

    Ok(())
}

#[test]
fn test_cli_recent_report() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = broker();
    cmd.arg("tests/fixtures/script.csv")
        .env("ESCROW_ADMIN_IDS", "100")
        .args(["--report", "recent", "--limit", "1"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",canceled,5,TON,1,,spare parts,"))
        .stdout(predicate::str::contains("desk lamp").not());

    Ok(())
}

#[test]
fn test_cli_missing_input_fails() {
    broker().arg("tests/fixtures/does_not_exist.csv").assert().failure();
}
