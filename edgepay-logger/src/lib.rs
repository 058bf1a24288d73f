//! Process logger for the edge: a thin `env_logger` wrapper with a
//! `once_cell`-guarded global handle, set up once at process start.

use once_cell::sync::OnceCell;
use std::io::Write;
use time::OffsetDateTime;

static GUARD: OnceCell<()> = OnceCell::new();

/// Initializes the process-wide logger exactly once. Subsequent calls are
/// no-ops, so tests and the binary can both call it without coordinating.
pub fn init() {
    GUARD.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        );
        builder.format(|buf, record| {
            let now = OffsetDateTime::now_utc();
            writeln!(
                buf,
                "{} {:<5} {}  {}",
                now,
                record.level(),
                record.target(),
                record.args()
            )
        });
        builder.init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
