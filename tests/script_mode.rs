//! Integration tests for script mode (-c/--command and script files)

use std::process::Command;

fn run_command(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_catalog-schema"))
        // Tests must not depend on a user's ~/.config/catalog-schema/config.toml.
        .arg("--no-config")
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

#[test]
fn test_show_default_schema() {
    let (stdout, _, code) = run_command(&["-c", "show"]);
    assert_eq!(
        stdout,
        "  1 Detail\n  2 Unit\n  3 Quantity\n  4 Unit Cost\n999 Total = Quantity × Unit Cost\n"
    );
    assert_eq!(code, 0);
}

#[test]
fn test_divide_by_custom_column() {
    let (stdout, _, code) = run_command(&[
        "-c", "add-custom rollos",
        "-c", "title rollos Rollos",
        "-c", "quantity rollos yes",
        "-c", "start total divide",
        "-c", "pick rollos",
        "-c", "show",
    ]);
    assert!(stdout.contains("Total = Quantity × Unit Cost ÷ Rollos"), "{stdout}");
    assert!(!stdout.contains("selecting"));
    assert_eq!(code, 0);
}

#[test]
fn test_submit_prints_payload() {
    let (stdout, _, code) = run_command(&["-c", "remove unit", "-c", "submit Tuberías"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(json["titulo"], "Tuberías");
    assert_eq!(json["headers_base_active"], serde_json::json!([2]));
    assert_eq!(
        json["headers_base_calculations"][0]["id_header_base"],
        serde_json::json!(5)
    );
}

#[test]
fn test_rejected_pick_reports_line() {
    let (_, stderr, code) = run_command(&["-c", "start total divide", "-c", "pick detail"]);
    assert_eq!(stderr.trim(), "error: line 2: \"Detail\" cannot be used as an operand");
    assert_eq!(code, 1);
}

#[test]
fn test_incomplete_formula_blocks_submit() {
    let (stdout, stderr, code) =
        run_command(&["-c", "start total multiply", "-c", "submit Tabla"]);
    assert_eq!(stdout, "");
    assert_eq!(
        stderr.trim(),
        "error: line 2: Complete the calculation of header \"Total\""
    );
    assert_eq!(code, 1);
}

#[test]
fn test_unknown_command() {
    let (_, stderr, code) = run_command(&["-c", "# setup", "-c", "frobnicate"]);
    assert_eq!(stderr.trim(), "error: line 2: unknown command 'frobnicate'");
    assert_eq!(code, 1);
}

#[test]
fn test_output_file_written() {
    let mut path = std::env::temp_dir();
    path.push(format!("catalog-schema-out-{}.json", std::process::id()));
    let path_arg = path.to_string_lossy().to_string();

    let (_, _, code) = run_command(&["-c", "submit Tabla", "-o", &path_arg]);
    let written = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(json["titulo"], "Tabla");
}
