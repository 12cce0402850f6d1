use std::fs;

use erp_migrate::logging;
use tempfile::tempdir;

#[test]
fn env_file_log_level_applies_to_the_subscriber() {
    let dir = tempdir().unwrap();
    let env_file = dir.path().join(".env");
    fs::write(&env_file, "RUST_LOG=debug\n").unwrap();
    std::env::remove_var("RUST_LOG");

    logging::init(Some(&env_file));

    assert_eq!(std::env::var("RUST_LOG").as_deref(), Ok("debug"));
    assert!(tracing::enabled!(tracing::Level::DEBUG));
}
