//! Integration tests for the yarrboard-release binary

mod helpers;
mod test_release;
