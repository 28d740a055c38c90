use core::fmt;

use crate::Config;

const TEMPLATE: &str = include_str!("../../lua/reserve.lua");

/// Key namespace used when none is given.
pub const DEFAULT_KEY_PREFIX: &str = "shardflake";

/// The reservation script with one configuration's constants baked in.
///
/// ```
/// use shardflake::{Config, Layout, ReservationScript};
///
/// let config = Config::new(0, Layout::new(40, 3, 9, 11).unwrap()).unwrap();
/// let script = ReservationScript::render(&config, "ids");
/// assert!(script.source().contains("local max_sequence = 2047"));
/// assert!(!script.source().contains("{{"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationScript {
    source: String,
    key_prefix: String,
}

impl ReservationScript {
    pub fn render(config: &Config, key_prefix: &str) -> Self {
        let range = config.logical_shard_id_range();
        let values = [
            ("key_prefix", lua_string(key_prefix)),
            ("max_sequence", config.layout().max_sequence().to_string()),
            ("logical_shard_id_min", range.start().to_string()),
            ("logical_shard_id_max", range.end().to_string()),
            (
                "sequence_retention_ms",
                config.sequence_retention_ms().to_string(),
            ),
        ];
        let source = values
            .iter()
            .fold(TEMPLATE.to_owned(), |source, (name, value)| {
                source.replace(&format!("{{{{{name}}}}}"), value)
            });
        Self {
            source,
            key_prefix: key_prefix.to_owned(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

impl fmt::Display for ReservationScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Quotes `value` as a Lua string literal.
fn lua_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\0' => quoted.push_str("\\0"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
