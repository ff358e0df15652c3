use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::{contains, diff, is_empty};

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.assert().success();
}

#[test]
fn runs_straight_line_program() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("tests/files/sum.sasm").arg("--minimal");
    cmd.assert().success().stdout(diff("15"));
}

#[test]
fn shows_status_messages() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("tests/files/sum.sasm");
    cmd.assert()
        .success()
        .stdout(contains("15\n"))
        .stdout(contains("Running"))
        .stdout(contains("Halted"))
        .stdout(contains("Completed"));
}

#[test]
fn skips_with_conditional_jump() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("tests/files/skip.sasm").arg("--minimal");
    cmd.assert().success().stdout(is_empty());
}

#[test]
fn runs_loop() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("tests/files/count.sasm").arg("--minimal");
    cmd.assert().success().stdout(diff("3\n2\n1\n"));
}

#[test]
fn reads_memory_indirectly() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("tests/files/indirect.sasm").arg("--minimal");
    cmd.assert().success().stdout(diff("-7\n"));

    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("tests/files/store.sasm").arg("--minimal");
    cmd.assert().success().stdout(diff("1234"));
}

#[test]
fn prints_registers() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run")
        .arg("tests/files/overflow.sasm")
        .arg("--minimal")
        .arg("--registers");
    cmd.assert()
        .success()
        .stdout(is_empty())
        .stderr(diff("R1 32768\nR2 0\nA1 0\nA2 0\nPC 9\nZNO 011\n"));
}

#[test]
fn reports_undefined_label() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("check").arg("tests/files/undefined.sasm");
    cmd.assert()
        .failure()
        .stderr(contains("Undefined label `NOWHERE` on line 2"));
}

#[test]
fn checks_valid_file() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("check").arg("tests/files/count.sasm");
    cmd.assert().success().stdout(contains("no errors found!"));
}

#[test]
fn faults_exit_nonzero() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("tests/files/fault.sasm").arg("--minimal");
    cmd.assert()
        .failure()
        .stdout(diff("1"))
        .stderr(contains("Unknown opcode 0x00 at PC = 0x0004"));
}

#[test]
fn fault_status_names_pc() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("tests/files/fault.sasm");
    cmd.assert()
        .failure()
        .stdout(contains("Faulted"))
        .stdout(contains("machine stopped at PC 0x0004"));
}

#[test]
fn binary_images_are_loaded_not_assembled() {
    let dest = std::env::temp_dir().join(format!("svm-count-{}.svm", std::process::id()));

    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("compile").arg("tests/files/count.sasm").arg(&dest);
    cmd.assert().success();

    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg(&dest);
    cmd.assert()
        .success()
        .stdout(contains("Loading"))
        .stdout(contains("Assembling").not())
        .stdout(contains("3\n2\n1\n"));

    std::fs::remove_file(&dest).unwrap();
}

#[test]
fn compiles_then_runs_binary() {
    let dest = std::env::temp_dir().join(format!("svm-sum-{}.svm", std::process::id()));

    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("compile").arg("tests/files/sum.sasm").arg(&dest);
    cmd.assert().success().stdout(contains("Saved"));
    assert_eq!(
        std::fs::read(&dest).unwrap(),
        vec![0x60, 0x01, 0x00, 0x0A, 0x68, 0x01, 0x00, 0x05, 0x6E, 0x01, 0x31]
    );

    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg(&dest).arg("--minimal");
    cmd.assert().success().stdout(diff("15"));

    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("disasm").arg(&dest);
    cmd.assert()
        .success()
        .stdout(contains("0x0000  60 01 00 0a  LOAD R1, 10"))
        .stdout(contains("ADD R1, 5"))
        .stdout(contains("0x000a  31           HALT"));

    std::fs::remove_file(&dest).unwrap();
}

#[test]
fn disassembles_source() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("disasm").arg("tests/files/skip.sasm");
    cmd.assert()
        .success()
        .stdout(contains("JMPZ 0x000c"))
        .stdout(contains("OUT 99"));
}

#[test]
fn rejects_unknown_extension() {
    let mut cmd = Command::cargo_bin("svm").unwrap();
    cmd.arg("run").arg("Cargo.toml");
    cmd.assert().failure().stderr(contains("unknown extension"));
}
