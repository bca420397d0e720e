//! Integration tests for Pawprint checkout.
//!
//! These tests exercise the `pawprint-checkout` crate as a library: the tax
//! calculator over realistic zone sets, the circuit breaker's fast-fail
//! guarantee, and the fulfillment dispatcher's retry state machine against
//! the in-memory stores. No live database or network access is required.
//!
//! # Test Categories
//!
//! - `tax_scenarios` - end-to-end tax math over zones and rates
//! - `circuit_breaker` - breaker threshold/reset behaviour
//! - `fulfillment_dispatch` - dispatcher submit/retry/webhook flows
