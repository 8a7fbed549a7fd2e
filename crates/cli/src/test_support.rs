//! Environment isolation for tests that exercise `Config` overrides.

use std::sync::{Mutex, MutexGuard};

/// Every variable `Config::load` and `resolve_api_key` consult.
const CONFIG_ENV_VARS: &[&str] = &[
    "MARIA_API_KEY",
    "MARIA_MODEL",
    "MARIA_BASE_URL",
    "MARIA_MAX_ROUNDS",
    "OPENAI_API_KEY",
];

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Exclusive, initially clean view of the config environment.
///
/// The process-wide lock is held until drop, and the variables are cleared
/// again on drop so a failing test never leaks overrides into the next one.
pub(crate) struct ConfigEnv {
    _lock: MutexGuard<'static, ()>,
}

impl ConfigEnv {
    pub(crate) fn clean() -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        clear_config_vars();
        Self { _lock: lock }
    }

    pub(crate) fn set(&self, key: &str, value: &str) {
        assert!(
            CONFIG_ENV_VARS.contains(&key),
            "{key} is not read by the config loader"
        );
        // SAFETY: every test touching these variables holds ENV_LOCK.
        unsafe {
            std::env::set_var(key, value);
        }
    }
}

impl Drop for ConfigEnv {
    fn drop(&mut self) {
        clear_config_vars();
    }
}

fn clear_config_vars() {
    for key in CONFIG_ENV_VARS {
        // SAFETY: only called while ENV_LOCK is held.
        unsafe {
            std::env::remove_var(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_do_not_outlive_the_guard() {
        {
            let env = ConfigEnv::clean();
            env.set("MARIA_MODEL", "gpt-4o-mini");
            assert_eq!(std::env::var("MARIA_MODEL").as_deref(), Ok("gpt-4o-mini"));
        }
        let _env = ConfigEnv::clean();
        assert!(std::env::var("MARIA_MODEL").is_err());
    }

    #[test]
    #[should_panic(expected = "not read by the config loader")]
    fn rejects_unrelated_variables() {
        ConfigEnv::clean().set("PATH", "/tmp");
    }
}
