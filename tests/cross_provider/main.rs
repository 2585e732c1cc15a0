//! The same streaming scenarios run against every cloud vendor's wire format.

mod providers;
mod streaming_e2e;
