use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run the binary against a commands fixture with a fresh stock directory,
/// since a run consumes inventory lines in place.
fn run(commands_fixture: &str, stock: &[(&str, &str)]) -> (String, String, bool, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let stock_dir = dir.path().join("stock");
    fs::create_dir(&stock_dir).expect("failed to create stock dir");
    for (file, contents) in stock {
        fs::write(stock_dir.join(file), contents).expect("failed to write stock file");
    }

    let output = Command::new(env!("CARGO_BIN_EXE_shop-eng"))
        .arg("tests/fixtures/catalog.csv")
        .arg(format!("tests/fixtures/{commands_fixture}"))
        .arg(&stock_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success(), dir)
}

fn stock_lines(dir: &Path, file: &str) -> Vec<String> {
    fs::read_to_string(dir.join("stock").join(file))
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

#[test]
fn valid_commands() {
    let (stdout, stderr, success, dir) = run(
        "valid.csv",
        &[
            ("stock_1.txt", "wk-1\nwk-2\nwk-3\nwk-4\nwk-5\n"),
            ("stock_2.txt", "gk-1\ngk-2\n"),
        ],
    );

    assert!(success);
    assert!(stderr.is_empty());

    // Delivered payloads appear before the balance report.
    assert!(stdout.contains("# delivery to buyer 1 (PUR-"));
    assert!(stdout.contains("wk-1"));
    assert!(stdout.contains("wk-3"));
    assert!(stdout.contains("# delivery to buyer 2 (PUR-"));
    assert!(stdout.contains("gk-1"));

    let lines: Vec<&str> = stdout.lines().collect();
    let header = lines
        .iter()
        .position(|l| *l == "buyer,credits,blacklisted")
        .expect("balance header");
    assert_eq!(lines[header + 1], "1,70,false");
    assert_eq!(lines[header + 2], "2,25,false");

    // Delivered lines are gone from the stock files.
    assert_eq!(stock_lines(dir.path(), "stock_1.txt"), vec!["wk-4", "wk-5"]);
    assert_eq!(stock_lines(dir.path(), "stock_2.txt"), vec!["gk-2"]);
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success, dir) = run(
        "with_errors.csv",
        &[("stock_1.txt", "wk-1\nwk-2\nwk-3\n")],
    );

    assert!(success);
    assert!(stderr.contains("unrecognized command type"));
    assert!(stderr.contains("missing amount"));
    assert!(stderr.contains("command skipped"));

    // The oversized purchase was skipped; the valid one after it went
    // through, so buyer 1 ends at 100 - 20.
    let lines: Vec<&str> = stdout.lines().collect();
    let header = lines
        .iter()
        .position(|l| *l == "buyer,credits,blacklisted")
        .expect("balance header");
    assert_eq!(lines[header + 1], "1,80,false");
    assert_eq!(lines[header + 2], "2,0,true");

    assert_eq!(stock_lines(dir.path(), "stock_1.txt"), vec!["wk-3"]);
}
