use std::fs;
use std::process::Command;

use assert_cmd::cargo::CommandCargoExt;
use tempfile::tempdir;

fn run_on(source: &str) -> std::process::Output {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let input_path = temp_dir.path().join("program.ir");
    fs::write(&input_path, source).expect("Failed to write input file");

    Command::cargo_bin(env!("CARGO_PKG_NAME"))
        .expect("binary should build")
        .arg(&input_path)
        .output()
        .expect("Failed to run lowerer")
}

#[test]
fn straight_line_program() {
    let output = run_on(
        "func main()\n\
         x = 5\n\
         y = 6\n\
         z = x + y\n\
         print z\n\
         return z\n",
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "func main()\n\
         \x20 t2 = 5\n\
         \x20 t3 = 6\n\
         \x20 t4 = t2 + t3\n\
         \x20 print t4\n\
         \x20 z = t4\n\
         \x20 return z\n"
    );
}

#[test]
fn call_with_register_argument() {
    let output = run_on(
        "func main()\n\
         f = @id\n\
         x = 7\n\
         r = call f(x)\n\
         print r\n\
         return r\n\
         func id(a)\n\
         return a\n",
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "func main()\n\
         \x20 t2 = @id\n\
         \x20 t3 = 7\n\
         \x20 save_t4 = t4\n\
         \x20 t0 = t2\n\
         \x20 a2 = t3\n\
         \x20 t0 = call t0()\n\
         \x20 t4 = save_t4\n\
         \x20 t4 = t0\n\
         \x20 print t4\n\
         \x20 r = t4\n\
         \x20 return r\n\
         func id()\n\
         \x20 a = a2\n\
         \x20 return a\n"
    );
}

#[test]
fn output_is_deterministic() {
    let source = "func main(p)\n\
                  a = 1\n\
                  b = 2\n\
                  c = a + b\n\
                  d = c * p\n\
                  print d\n\
                  return d\n";
    let first = run_on(source);
    let second = run_on(source);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn tight_register_budget_still_lowers() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let input_path = temp_dir.path().join("program.ir");
    fs::write(
        &input_path,
        "func main()\n\
         a = 1\n\
         b = 2\n\
         c = a + b\n\
         print c\n\
         return c\n",
    )
    .expect("Failed to write input file");

    let output = Command::cargo_bin(env!("CARGO_PKG_NAME"))
        .expect("binary should build")
        .arg(&input_path)
        .args(["--registers", "1"])
        .output()
        .expect("Failed to run lowerer");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    // b and c lose the only register and live in their slots.
    assert!(stdout.contains("b = t0"), "stdout: {stdout}");
    assert!(stdout.contains("c = t0"), "stdout: {stdout}");
}

#[test]
fn undefined_variable_fails() {
    let output = run_on(
        "func main()\n\
         x = 1\n\
         print q\n\
         return x\n",
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("`q`"), "stderr: {stderr}");
}

#[test]
fn parse_error_fails() {
    let output = run_on("func main()\nx = = 1\nreturn x\n");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}
