//! End-to-end scenarios expressed in the JSON fixture format, exercising
//! the same surface the `cinder-run` binary drives.

use cinder_evm::fixture;

#[test]
fn test_bundled_cases_pass() {
    let text = include_str!("data/cases.json");
    let fixtures = fixture::load(text).expect("valid fixture JSON");
    assert!(!fixtures.is_empty());
    for f in &fixtures {
        if let Err(why) = f.check() {
            panic!("{}: {why}", f.name.as_deref().unwrap_or("<unnamed>"));
        }
    }
}

#[test]
fn test_fixture_failure_is_reported() {
    let text = r#"[{
        "name": "deliberately wrong expectation",
        "code": { "bin": "600160020100" },
        "expect": { "success": true, "stack": ["0x9"] }
    }]"#;
    let fixtures = fixture::load(text).unwrap();
    assert!(fixtures[0].check().is_err());
}
