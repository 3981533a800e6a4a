use std::{
    path::Path,
    sync::{Mutex, MutexGuard, OnceLock},
};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

const GUARDED_VARS: [&str; 4] = [
    "DATABASE_URL",
    "HK_ASSET_DIR",
    "HK_JWT_SECRET",
    "HK_WEBHOOK_SECRET",
];

pub fn test_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Points the process environment at a throwaway asset dir and database,
/// restoring the previous values on drop.
pub struct TestEnvGuard {
    _lock: MutexGuard<'static, ()>,
    previous: Vec<(&'static str, Option<String>)>,
}

impl TestEnvGuard {
    pub fn new(temp_root: &Path, db_url: String) -> Self {
        let lock = test_lock().lock().unwrap_or_else(|err| err.into_inner());
        let previous = GUARDED_VARS
            .iter()
            .map(|name| (*name, std::env::var(name).ok()))
            .collect();

        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            std::env::set_var("HK_ASSET_DIR", temp_root);
            std::env::set_var("DATABASE_URL", db_url);
            std::env::set_var("HK_JWT_SECRET", TEST_JWT_SECRET);
            std::env::set_var("HK_WEBHOOK_SECRET", TEST_WEBHOOK_SECRET);
        }

        Self {
            _lock: lock,
            previous,
        }
    }
}

impl Drop for TestEnvGuard {
    fn drop(&mut self) {
        // SAFETY: tests using TestEnvGuard are serialized by test_lock.
        unsafe {
            for (name, value) in &self.previous {
                match value {
                    Some(value) => std::env::set_var(name, value),
                    None => std::env::remove_var(name),
                }
            }
        }
    }
}
