/// Version of the software, as recorded in @PG records and logged at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
