//! Integration tests for the covenant CLI
//!
//! These tests invoke the actual `covenant` binary and verify:
//! - Exit codes (0 = accepted, 1 = rejected, 2 = error)
//! - stdout/stderr output
//! - JSON output format
//! - All commands work end-to-end

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::process::Command;

use covenant_core::auth::testing as ecdsa;
use covenant_core::codec::{transfer_inscription, Addr, Outpoint, TokenId};
use covenant_core::covenant::Request;
use covenant_core::oracle::testing::RabinPrivateKey;
use covenant_core::order::{BuyOrder, BuySettle, SellOrder, SellSettle};
use covenant_core::turing::{parse_tape, TuringState};
use covenant_core::{Call, Covenant, Hash256, SpendContext, Utxo};

// ── Helpers ───────────────────────────────────────────────

fn covenant_bin() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_BIN_EXE_covenant"));
    if !path.exists() {
        path = PathBuf::from("target/debug/covenant");
    }
    path
}

fn run_covenant(args: &[&str]) -> std::process::Output {
    Command::new(covenant_bin())
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute covenant")
}

/// Request file in the temp dir, removed when dropped
struct TempFile(PathBuf);

impl TempFile {
    fn write(name: &str, contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "covenant-cli-{}-{}.json",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        TempFile(path)
    }
}

impl Deref for TempFile {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn write_request(name: &str, req: &Request) -> TempFile {
    TempFile::write(name, &req.to_json().unwrap())
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn token() -> TokenId {
    TokenId(format!("{}_0", "e1".repeat(32)))
}

fn token_outpoint() -> Outpoint {
    Outpoint {
        txid: [0x61; 32],
        vout: 2,
    }
}

fn buy_request(cleared: u64, attested: u64) -> Request {
    let contract = Outpoint {
        txid: [0x62; 32],
        vout: 0,
    };
    let mut prevouts = token_outpoint().encode().to_vec();
    prevouts.extend_from_slice(&contract.encode());

    let mut msg = token_outpoint().encode().to_vec();
    msg.extend_from_slice(&attested.to_le_bytes());
    msg.extend_from_slice(&transfer_inscription(&token(), attested));
    let oracle = RabinPrivateKey::fixture();

    Request {
        covenant: Covenant::BuyLimitOrder(BuyOrder {
            cleared_amount: cleared,
            ..BuyOrder::new(
                token(),
                50,
                oracle.public_key(),
                ecdsa::pubkey(4),
                vec![0x51, 0x87],
            )
        }),
        call: Call::BuySettle(BuySettle {
            oracle_sig: oracle.sign(&msg),
            oracle_msg: msg,
            seller_addr: Addr([0x63; 20]),
        }),
        context: SpendContext {
            prevouts,
            utxo: Utxo {
                value: 2_000,
                outpoint: contract,
            },
            hash_outputs: Hash256::of(b""),
            sighash: [0x64; 32],
            change: None,
        },
    }
}

fn sell_request(amount: u64) -> Request {
    let own = Outpoint {
        txid: [0x71; 32],
        vout: 1,
    };
    Request {
        covenant: Covenant::SellLimitOrder(SellOrder::new(
            token(),
            20,
            ecdsa::pubkey(5),
            30,
            vec![0x52],
        )),
        call: Call::SellSettle(SellSettle {
            amount,
            buyer_addr: Addr([0x72; 20]),
        }),
        context: SpendContext {
            prevouts: own.encode().to_vec(),
            utxo: Utxo {
                value: 1,
                outpoint: own,
            },
            hash_outputs: Hash256::of(b""),
            sighash: [0x73; 32],
            change: None,
        },
    }
}

fn transit_request(tape: &str) -> Request {
    let own = Outpoint {
        txid: [0x81; 32],
        vout: 0,
    };
    Request {
        covenant: Covenant::TuringMachine(
            TuringState::new(parse_tape(tape).unwrap(), 0, vec![0x00]).unwrap(),
        ),
        call: Call::Transit,
        context: SpendContext {
            prevouts: own.encode().to_vec(),
            utxo: Utxo {
                value: 1,
                outpoint: own,
            },
            hash_outputs: Hash256::of(b""),
            sighash: [0u8; 32],
            change: None,
        },
    }
}

/// Pin the digest reported by `covenant outputs`
fn pin_via_cli(name: &str, mut req: Request) -> Request {
    let file = write_request(&format!("{}-unpinned", name), &req);
    let output = run_covenant(&["outputs", file.to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "outputs should exit 0");
    let value: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    let digest = value["hash_outputs"].as_str().unwrap();
    req.context.hash_outputs = Hash256::from_hex(digest).unwrap();
    req
}

// ── Version ───────────────────────────────────────────────

#[test]
fn test_version_command() {
    let output = run_covenant(&["version"]);
    assert!(output.status.success(), "version should exit 0");
    let stdout = stdout_of(&output);
    assert!(stdout.contains("covenant"), "should contain 'covenant'");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "should contain version"
    );
}

#[test]
fn test_version_command_reports_core_version() {
    let output = run_covenant(&["version"]);
    let expected = format!("(covenant-core {})", covenant_core::VERSION);
    assert!(stdout_of(&output).contains(&expected), "should name the core crate version");
}

#[test]
fn test_version_flag() {
    let output = run_covenant(&["--version"]);
    assert!(output.status.success(), "--version should exit 0");
    assert!(stdout_of(&output).contains(env!("CARGO_PKG_VERSION")));
}

// ── Evaluate ──────────────────────────────────────────────

#[test]
fn test_evaluate_pinned_buy_is_accepted() {
    let req = pin_via_cli("buy-ok", buy_request(0, 20));
    let file = write_request("buy-ok", &req);
    let output = run_covenant(&["evaluate", file.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(0), "accepted spend should exit 0");

    let value: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(value["accepted"], true);
    // partial fill: buy side only re-commits once fully cleared
    assert_eq!(value["verdict"]["status"], "settled");
    assert_eq!(value["verdict"]["final_state"]["cleared_amount"], 20);
}

#[test]
fn test_evaluate_buy_completion_continues() {
    let req = pin_via_cli("buy-full", buy_request(30, 20));
    let file = write_request("buy-full", &req);
    let output = run_covenant(&["evaluate", file.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(value["verdict"]["status"], "continue");
    assert_eq!(value["verdict"]["next"]["cleared_amount"], 50);
}

#[test]
fn test_evaluate_over_clearing_is_rejected() {
    let file = write_request("buy-over", &buy_request(40, 20));
    let output = run_covenant(&["evaluate", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1), "rejected spend should exit 1");
    assert!(stdout_of(&output).contains("UTXO token amount exceeds total"));
}

#[test]
fn test_evaluate_unpinned_sell_reports_commitment() {
    let file = write_request("sell-unpinned", &sell_request(3));
    let output = run_covenant(&["evaluate", file.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(value["accepted"], false);
    assert_eq!(value["reason"], "hashOutputs mismatch");
    assert_eq!(value["kind"], "commitment");
}

#[test]
fn test_evaluate_pinned_sell_text_output() {
    let req = pin_via_cli("sell-ok", sell_request(3));
    let file = write_request("sell-ok", &req);
    let output = run_covenant(&["evaluate", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("accepted"));
    assert!(stdout.contains("continue"));
}

#[test]
fn test_evaluate_unsupported_method() {
    let mut req = transit_request("()");
    req.call = Call::Cancel { sig: vec![0x30] };
    let file = write_request("turing-cancel", &req);
    let output = run_covenant(&["evaluate", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).contains("method not supported by covenant"));
}

#[test]
fn test_evaluate_turing_transit() {
    let req = pin_via_cli("transit", transit_request("()"));
    let file = write_request("transit", &req);
    let output = run_covenant(&["evaluate", file.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(value["verdict"]["next"]["head_pos"], 1);
}

#[test]
fn test_request_files_removed_after_use() {
    let path = {
        let file = write_request("cleanup", &sell_request(2));
        let output = run_covenant(&["outputs", file.to_str().unwrap()]);
        assert!(output.status.success());
        file.to_path_buf()
    };
    assert!(!path.exists(), "request file should be removed on drop");
}

#[test]
fn test_evaluate_missing_file_exits_2() {
    let output = run_covenant(&["evaluate", "/nonexistent/request.json"]);
    assert_eq!(output.status.code(), Some(2), "missing file should exit 2");
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read"));
}

#[test]
fn test_evaluate_malformed_request_exits_2() {
    let file = TempFile::write("bad", r#"{"covenant": {"type": "escrow"}}"#);
    let output = run_covenant(&["evaluate", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

// ── Outputs ───────────────────────────────────────────────

#[test]
fn test_outputs_text() {
    let file = write_request("outputs-text", &sell_request(2));
    let output = run_covenant(&["outputs", file.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("hash_outputs: "));
    assert!(stdout.contains("outputs: "));
}

#[test]
fn test_outputs_rejected_call_exits_1() {
    let file = write_request("outputs-over", &sell_request(20));
    let output = run_covenant(&["outputs", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).contains("insufficient tokens left in the contract"));
}

// ── Run ───────────────────────────────────────────────────

#[test]
fn test_run_balanced_accepts() {
    let output = run_covenant(&["run", "--tape", "(())"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout_of(&output).contains("ACCEPT"));
}

#[test]
fn test_run_unbalanced_rejects() {
    let output = run_covenant(&["run", "--tape", "(()", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(value["outcome"]["outcome"], "rejected");
}

#[test]
fn test_run_budget_exhausted() {
    let output = run_covenant(&["run", "--tape", "((()))", "--max-steps", "2"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout_of(&output).contains("EXHAUSTED"));
}

#[test]
fn test_run_invalid_tape_exits_2() {
    let output = run_covenant(&["run", "--tape", "(a)"]);
    assert_eq!(output.status.code(), Some(2));
}

// ── Hash ──────────────────────────────────────────────────

#[test]
fn test_hash_empty_input() {
    let output = run_covenant(&["hash", ""]);
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output).trim(),
        "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
    );
}

#[test]
fn test_hash_invalid_hex_exits_2() {
    let output = run_covenant(&["hash", "zz"]);
    assert_eq!(output.status.code(), Some(2));
}

// ── Global flags ──────────────────────────────────────────

#[test]
fn test_verbose_logs_to_stderr() {
    let req = pin_via_cli("verbose", sell_request(1));
    let file = write_request("verbose", &req);
    let output = run_covenant(&["--verbose", "evaluate", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stderr).contains("call accepted"));
}

#[test]
fn test_quiet_suppresses_warnings() {
    let file = write_request("quiet", &sell_request(3));
    let output = run_covenant(&["--quiet", "evaluate", file.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("call rejected"));
}
