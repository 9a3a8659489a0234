//! Helpers for setting up throwaway databases in tests. Only compiled with the `test_utils`
//! feature, which the dev-dependency on this crate switches on for its own test builds.
pub mod prepare_env;
