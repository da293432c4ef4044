//! Declarative spy configuration.
//!
//! A [`SpyConfig`] describes a tree of spies in JSON, and builds it:
//!
//! ```rust
//! use matchspy::spy::SpyConfig;
//!
//! # fn main() -> matchspy::Result<()> {
//! let spy = SpyConfig::from_json(
//!     r#"{
//!         "multiple": [
//!             { "value_count": { "slots": [{ "slot": 1 }, { "slot": 2, "multi_valued": true }] } },
//!             { "term_count": { "prefixes": ["XCOLOR"] } }
//!         ]
//!     }"#,
//! )?
//! .build();
//! assert_eq!(
//!     spy.description(),
//!     "MultipleSpy(ValueCountSpy(0 docs seen, looking in 2 slots), \
//!      TermCountSpy(0 docs seen, 0 terms seen, looking in 1 prefixes))"
//! );
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use super::{CategorySelectSpy, MatchSpy, MultipleSpy, TermCountSpy, ValueCountSpy};
use crate::ValueSlot;

/// A watched value slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotConfig {
    /// The slot number.
    pub slot: ValueSlot,
    /// Whether the slot holds a list of values.
    #[serde(default)]
    pub multi_valued: bool,
}

/// Configuration of a [`ValueCountSpy`], or of a [`CategorySelectSpy`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueCountConfig {
    /// The watched slots.
    pub slots: Vec<SlotConfig>,
}

impl ValueCountConfig {
    fn build(&self) -> ValueCountSpy {
        let mut spy = ValueCountSpy::new();
        for slot_config in &self.slots {
            spy.add_slot(slot_config.slot, slot_config.multi_valued);
        }
        spy
    }
}

/// Configuration of a [`TermCountSpy`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermCountConfig {
    /// The watched term prefixes.
    pub prefixes: Vec<String>,
}

/// Describes a spy and its configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpyConfig {
    /// Builds a [`ValueCountSpy`].
    #[serde(rename = "value_count")]
    ValueCount(ValueCountConfig),
    /// Builds a [`TermCountSpy`].
    #[serde(rename = "term_count")]
    TermCount(TermCountConfig),
    /// Builds a [`CategorySelectSpy`].
    #[serde(rename = "category_select")]
    CategorySelect(ValueCountConfig),
    /// Builds a [`MultipleSpy`] holding the given spies, in order.
    #[serde(rename = "multiple")]
    Multiple(Vec<SpyConfig>),
}

impl SpyConfig {
    /// Parses a JSON configuration.
    ///
    /// Fails with [`SpyError::InvalidArgument`](crate::SpyError::InvalidArgument)
    /// if the JSON does not describe a spy.
    pub fn from_json(json: &str) -> crate::Result<SpyConfig> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the configuration to JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Builds the configured spy, with empty results.
    pub fn build(&self) -> Box<dyn MatchSpy> {
        match self {
            SpyConfig::ValueCount(config) => Box::new(config.build()),
            SpyConfig::TermCount(config) => {
                let mut spy = TermCountSpy::new();
                for prefix in &config.prefixes {
                    spy.add_prefix(prefix);
                }
                Box::new(spy)
            }
            SpyConfig::CategorySelect(config) => Box::new(CategorySelectSpy::from(config.build())),
            SpyConfig::Multiple(configs) => {
                let mut multiple_spy = MultipleSpy::new();
                for config in configs {
                    multiple_spy.push(config.build());
                }
                Box::new(multiple_spy)
            }
        }
    }
}
