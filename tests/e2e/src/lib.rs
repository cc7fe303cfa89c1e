//! Ingress Per Unit End-to-End Test Suite
//!
//! Simulates a provider application and a requirer application sharing one
//! relation on an in-memory databag bus, and drives both through the hook
//! events a real deployment would see.
//!
//! Each test file can be run independently:
//!
//! ```bash
//! cargo test -p ingress-per-unit-e2e-tests --test ingress_lifecycle -- --nocapture
//! cargo test -p ingress-per-unit-e2e-tests --test leadership -- --nocapture
//! cargo test -p ingress-per-unit-e2e-tests --test relation_teardown -- --nocapture
//! cargo test -p ingress-per-unit-e2e-tests --test data_consistency -- --nocapture
//! ```
