#![cfg(feature = "storage-rocksdb")]

mod common;

use assert_cmd::cargo_bin;
use common::{ADMIN, balance, engine_over, fund, join, offer, run};
use escrow_broker::application::engine::Command;
use escrow_broker::domain::deal::DealStatus;
use escrow_broker::infrastructure::rocksdb::RocksDBStore;
use rust_decimal_macros::dec;
use std::io::Write;
use std::process::Command as Process;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: credit an account
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "command, actor, deal, target, amount, text").unwrap();
    writeln!(csv1, "adjust_balance, 100, , 1, 100.0,").unwrap();

    let mut cmd1 = Process::new(cargo_bin!("escrow-broker"));
    cmd1.arg(csv1.path())
        .arg("--db-path")
        .arg(&db_path)
        .env("ESCROW_ADMIN_IDS", "100");

    let output1 = cmd1.output().expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,100,0,ru,"));

    // 2. Second run: credit again using the same DB path
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "command, actor, deal, target, amount, text").unwrap();
    writeln!(csv2, "adjust_balance, 100, , 1, 50.0,").unwrap();

    let mut cmd2 = Process::new(cargo_bin!("escrow-broker"));
    cmd2.arg(csv2.path())
        .arg("--db-path")
        .arg(&db_path)
        .env("ESCROW_ADMIN_IDS", "100");

    let output2 = cmd2.output().expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // Should have recovered 100 and added 50 = 150
    assert!(stdout2.contains("1,150,0,ru,"));
}

#[tokio::test]
async fn test_settled_deal_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger");

    let deal_id = {
        let store = Arc::new(RocksDBStore::open(&path, true).unwrap());
        let engine = engine_over(store);
        let deal = offer(&engine, 1, dec!(20)).await;
        join(&engine, 2, &deal.id).await;
        fund(&engine, 2, dec!(50)).await;
        run(&engine, 2, Command::SettleBalance { deal: deal.id.clone() })
            .await
            .unwrap();
        run(&engine, ADMIN, Command::Ban { target: 9, reason: "spam".into() })
            .await
            .unwrap();
        deal.id
    };

    let store = Arc::new(RocksDBStore::open(&path, true).unwrap());
    let engine = engine_over(store);
    let deal = engine.deals().get(&deal_id).await.unwrap();
    assert_eq!(deal.status, DealStatus::Paid);
    assert_eq!(deal.buyer_id, Some(2));
    assert_eq!(balance(&engine, 1).await, dec!(20));
    assert_eq!(balance(&engine, 2).await, dec!(30));
    assert_eq!(engine.accounts().get(1).await.unwrap().reputation_count, 1);
    assert!(matches!(
        run(&engine, 9, Command::SetPayoutAddress { address: "x".into() }).await,
        Err(escrow_broker::error::EscrowError::Blacklisted(9))
    ));
}
