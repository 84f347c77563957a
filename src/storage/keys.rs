//! Coordination store key layout.
//!
//! Keys are deliberately flat so that gateways sharing one store agree on
//! them without any negotiation:
//! - `<functionName>`: list of worker addresses registered for a function
//! - `<address>_mailboxSize`: load counter of one worker
//! - `<processId>`: address of the worker owning an in-flight process
//! - `cached:<processId>`: finalized result in the shared cache tier

/// Suffix appended to a worker address to form its load counter key.
pub const LOAD_COUNTER_SUFFIX: &str = "_mailboxSize";

/// Prefix of cached result keys.
pub const CACHE_PREFIX: &str = "cached:";

/// List key holding the workers of a function.
pub fn function_key(function_name: &str) -> String {
    function_name.to_string()
}

/// Load counter key for a worker address.
pub fn load_counter_key(address: &str) -> String {
    format!("{}{}", address, LOAD_COUNTER_SUFFIX)
}

/// Correlation key for a process.
pub fn process_key(process_id: &str) -> String {
    process_id.to_string()
}

/// Cache key for a finalized process.
pub fn cache_key(process_id: &str) -> String {
    format!("{}{}", CACHE_PREFIX, process_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_counter_key() {
        assert_eq!(
            load_counter_key("http://w1:9100/"),
            "http://w1:9100/_mailboxSize"
        );
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("7"), "cached:7");
    }

    #[test]
    fn test_function_and_process_keys_are_verbatim() {
        assert_eq!(function_key("convert"), "convert");
        assert_eq!(process_key("42"), "42");
    }
}
