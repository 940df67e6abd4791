use super::*;

#[test]
fn trace_macros_compile() {
    trace!(rule = 1, "rule_failed");
    debug!("debug message");
    info!(states = 3, steps = 2, "search_done");
    warn!("warn message");

    let _entered = debug_span!("step", depth = 0).entered();
    let _outer = info_span!("search").entered();
}

#[test]
fn init_subscriber_is_idempotent() {
    init_subscriber();
    init_subscriber();
}

#[test]
fn log_env_is_crate_specific() {
    assert_eq!(LOG_ENV, "SYMRW_LOG");
}
