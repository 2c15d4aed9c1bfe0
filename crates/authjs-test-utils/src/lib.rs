// authjs-test-utils: adapter conformance tooling.
//
// - `TestDatabase` gives the suite a raw view of the backing store, so writes
//   are checked independently of the adapter's own read path
// - `run_basic_tests` walks the framework's basic adapter scenario
// - generators produce unique, valid records for each entity

pub mod basic;
pub mod database;
pub mod generators;
pub mod logger;

pub use basic::{run_basic_tests, CheckRecord, SuiteStats};
pub use database::TestDatabase;
pub use generators::{
    generate_test_account, generate_test_session, generate_test_user,
    generate_test_verification_token,
};
pub use logger::init_test_logging;
