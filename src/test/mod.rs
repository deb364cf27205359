//! Test-only submodules, mirroring the one-file-per-concern layout of `bgpsim/src/test/mod.rs`.

mod test_accounting;
mod test_engine;
mod test_router;
mod test_schedule;
