/*!
# Sysdash DevKit - harness for end-to-end tests

- Master and agent nodes started on ephemeral loopback ports
- Polling helpers that wait for registrations to land
- Raw HTTP helpers for checking the RPC and read API surfaces
*/

pub mod test_utils;

pub use test_utils::{SpawnedNode, TestHarness};
