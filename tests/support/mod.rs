pub mod gateway_harness;
