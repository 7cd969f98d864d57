// tests/config_errors.rs

use std::io::Write;

use perfrun::config::load_and_validate;
use perfrun::errors::{EXIT_NO_VALID_CASES, PerfrunError};
use perfrun_test_utils::builders::ConfigBuilder;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{text}").unwrap();
    file
}

#[test]
fn valid_file_keeps_case_order() {
    let text = ConfigBuilder::new()
        .case("z:b:c:d:e")
        .case("a:b:c:d:e")
        .to_toml();
    let file = write_config(&text);

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.case_names(), vec!["z:b:c:d:e", "a:b:c:d:e"]);
    assert_eq!(cfg.hosts, vec!["127.0.0.1"]);
}

#[test]
fn missing_cases_exits_with_no_valid_cases() {
    let file = write_config(
        r#"
vendor = "nvidia"
deploy_path = "/opt/perf"
log_path = "result"
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();

    assert!(matches!(err, PerfrunError::NoValidCases(_)), "{err:?}");
    assert_eq!(err.exit_code(), EXIT_NO_VALID_CASES);
}

#[test]
fn cases_must_be_a_table() {
    let file = write_config(
        r#"
vendor = "nvidia"
deploy_path = "/opt/perf"
log_path = "result"
cases = ["mm:FP32:312:nativetorch:A100"]
"#,
    );

    let err = load_and_validate(file.path()).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_NO_VALID_CASES);
}

#[test]
fn malformed_case_is_rejected_before_anything_runs() {
    let text = ConfigBuilder::new()
        .case("mm:FP32:312:nativetorch:A100")
        .case("mm:FP32")
        .to_toml();
    let file = write_config(&text);

    match load_and_validate(file.path()) {
        Err(PerfrunError::InvalidCase { case, .. }) => assert_eq!(case, "mm:FP32"),
        other => panic!("expected InvalidCase, got {other:?}"),
    }
}

#[test]
fn unparsable_toml_exits_with_one() {
    let file = write_config("vendor = \n");

    let err = load_and_validate(file.path()).unwrap_err();

    assert!(matches!(err, PerfrunError::TomlError(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, PerfrunError::IoError(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn empty_host_list_is_a_config_error() {
    let err = ConfigBuilder::new()
        .hosts(&[])
        .case("a:b:c:d:e")
        .try_build()
        .unwrap_err();
    assert!(matches!(err, PerfrunError::ConfigError(_)));
}
