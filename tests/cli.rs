use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn generate(args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_eip-generator"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("cannot start eip-generator");
    // the generator may exit before reading everything on bad input
    let _ = child.stdin.take().unwrap().write_all(input.as_bytes());
    child.wait_with_output().unwrap()
}

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("test-data/{name}")).unwrap()
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8(output.stdout.clone())
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_generates_addresses() {
    let output = generate(&["-N", "10"], &fixture("two-vertex.eip"));
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 10);
    for line in &lines {
        assert_eq!(line.len(), 32, "{line}");
        assert!(line.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }
}

#[test]
fn test_passthrough_precedes_addresses() {
    let input = fixture("two-vertex.eip");
    let output = generate(&["-N", "10", "-p"], &input);
    assert_eq!(output.status.code(), Some(0), "{output:?}");

    let header: Vec<&str> = input
        .lines()
        .filter(|l| matches!(l.as_bytes().first(), Some(b'/' | b'>' | b'=')))
        .collect();
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), header.len() + 10);
    assert_eq!(&lines[..header.len()], header.as_slice());
    assert!(lines[header.len()..].iter().all(|l| l.len() == 32));
}

#[test]
fn test_malformed_segment_fails() {
    let output = generate(&[], ">A: 0-x\n");
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(
        stderr.starts_with("eip-generator: invalid segment on line 1"),
        "{stderr}"
    );
}

#[test]
fn test_echoed_lines_flushed_before_error() {
    let input = "/32  : 0.0\n>A:  0-3  (bits   1-16 )\n=A0  convert\n";
    let output = generate(&["-p"], input);
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    assert_eq!(
        stdout_lines(&output),
        vec!["/32  : 0.0", ">A:  0-3  (bits   1-16 )"]
    );

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(
        stderr.starts_with("eip-generator: invalid segment value on line 3"),
        "{stderr}"
    );
}

#[test]
fn test_malformed_network_fails() {
    let input = fixture("two-vertex.eip");
    let output = generate(&[], &input[..input.len() - 3]);
    assert_eq!(output.status.code(), Some(1), "{output:?}");

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(
        stderr.starts_with("eip-generator: malformed network description"),
        "{stderr}"
    );
}

#[test]
fn test_negative_threshold_is_accepted() {
    let output = generate(&["-N", "10", "-S", "-1"], &fixture("two-vertex.eip"));
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    assert_eq!(stdout_lines(&output).len(), 10);
}
