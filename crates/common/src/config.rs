use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn from_env() -> Self {
        Self::parse(&env_string("ENVIRONMENT", "development"))
    }

    /// Anything that is not recognisably production falls back to development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Read `key` and parse it, falling back to `default` when the variable is
/// unset or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

pub fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read `key`, treating an empty value the same as an unset one.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert_eq!(Environment::parse(" Production "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
        assert_eq!(Environment::Production.as_str(), "production");
    }

    #[test]
    #[serial]
    fn test_env_or_parses_and_falls_back() {
        unsafe {
            env::set_var("COMMON_TEST_THREADS", "8");
            env::set_var("COMMON_TEST_BAD", "eight");
        }

        assert_eq!(env_or("COMMON_TEST_THREADS", 4usize), 8);
        assert_eq!(env_or("COMMON_TEST_BAD", 4usize), 4);
        assert_eq!(env_or("COMMON_TEST_MISSING", 640u32), 640);

        unsafe {
            env::remove_var("COMMON_TEST_THREADS");
            env::remove_var("COMMON_TEST_BAD");
        }
    }

    #[test]
    #[serial]
    fn test_env_opt_ignores_blank_values() {
        unsafe {
            env::set_var("COMMON_TEST_ENDPOINT", "  ");
        }
        assert_eq!(env_opt("COMMON_TEST_ENDPOINT"), None);

        unsafe {
            env::set_var("COMMON_TEST_ENDPOINT", "http://localhost:4317");
        }
        assert_eq!(
            env_opt("COMMON_TEST_ENDPOINT").as_deref(),
            Some("http://localhost:4317")
        );

        unsafe {
            env::remove_var("COMMON_TEST_ENDPOINT");
        }
    }

    #[test]
    #[serial]
    fn test_environment_from_env() {
        unsafe {
            env::set_var("ENVIRONMENT", "prod");
        }
        assert_eq!(Environment::from_env(), Environment::Production);

        unsafe {
            env::remove_var("ENVIRONMENT");
        }
        assert_eq!(Environment::from_env(), Environment::Development);
    }
}
