//! Information set keys.
//!
//! Two on-disk shapes are understood:
//!
//! ```text
//! versioned:  v2:FLOP:523:C-B75-C/C
//! legacy:     FLOP:523:C-B75-C-C
//! ```
//!
//! The versioned form segments the history by street with `/`; the legacy
//! form is a flat history without a version tag. A table must use one shape
//! throughout, and [`KeyFormat::detect_all`] refuses anything else.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::action::{encode_action_history, AbstractAction};
use crate::cards::Street;

/// Current key version written by [`encode_infoset`].
pub const KEY_VERSION: u32 = 2;

/// Errors raised while parsing keys or action tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key does not have the expected `:`-separated fields.
    #[error("malformed infoset key {0:?}")]
    Malformed(String),
    /// The street field is not a known street name.
    #[error("unknown street {street:?} in key {key:?}")]
    UnknownStreet {
        /// Offending street text.
        street: String,
        /// Full key.
        key: String,
    },
    /// The bucket field is not an unsigned integer.
    #[error("unparseable bucket {bucket:?} in key {key:?}")]
    BadBucket {
        /// Offending bucket text.
        bucket: String,
        /// Full key.
        key: String,
    },
    /// A history token is not a known action code.
    #[error("unknown action {0:?}")]
    BadAction(String),
    /// A table mixes versioned and legacy keys (or several versions).
    #[error("ambiguous key table: found both {first} and {second} keys")]
    MixedFormats {
        /// First format seen.
        first: KeyFormat,
        /// Conflicting format.
        second: KeyFormat,
    },
}

/// Key layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyFormat {
    /// `v{N}:STREET:bucket:history` with street-segmented history.
    Versioned(u32),
    /// `STREET:bucket:history` with a flat history.
    Legacy,
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Versioned(v) => write!(f, "v{v}"),
            KeyFormat::Legacy => write!(f, "legacy"),
        }
    }
}

impl KeyFormat {
    /// Format of a single key, without validating the rest of it.
    pub fn of(key: &str) -> KeyFormat {
        match key.split(':').next().and_then(parse_version_tag) {
            Some(v) => KeyFormat::Versioned(v),
            None => KeyFormat::Legacy,
        }
    }

    /// Parse every key and return the single format they share.
    ///
    /// Returns `Ok(None)` for an empty table. Any malformed key or any mix
    /// of formats is an error.
    pub fn detect_all<'a, I>(keys: I) -> Result<Option<KeyFormat>, KeyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: Option<KeyFormat> = None;
        for key in keys {
            let parsed = InfosetKey::parse(key)?;
            match seen {
                None => seen = Some(parsed.format),
                Some(first) if first != parsed.format => {
                    return Err(KeyError::MixedFormats {
                        first,
                        second: parsed.format,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(seen)
    }
}

fn parse_version_tag(field: &str) -> Option<u32> {
    let digits = field.strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A parsed or freshly encoded information set key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InfosetKey {
    /// Layout the key was written in.
    pub format: KeyFormat,
    /// Betting round.
    pub street: Street,
    /// Opaque hand bucket.
    pub bucket: u32,
    /// Encoded action history.
    pub history: String,
}

impl InfosetKey {
    /// Parse a key in either format.
    pub fn parse(key: &str) -> Result<InfosetKey, KeyError> {
        let fields: Vec<&str> = key.split(':').collect();
        let (format, street, bucket, history) = match fields.as_slice() {
            [tag, street, bucket, history] => {
                let version =
                    parse_version_tag(tag).ok_or_else(|| KeyError::Malformed(key.to_string()))?;
                (KeyFormat::Versioned(version), *street, *bucket, *history)
            }
            [street, bucket, history] => {
                // A street separator only exists in versioned keys.
                if history.contains('/') {
                    return Err(KeyError::Malformed(key.to_string()));
                }
                (KeyFormat::Legacy, *street, *bucket, *history)
            }
            _ => return Err(KeyError::Malformed(key.to_string())),
        };

        let street = Street::from_name(street).ok_or_else(|| KeyError::UnknownStreet {
            street: street.to_string(),
            key: key.to_string(),
        })?;
        let bucket = bucket.parse::<u32>().map_err(|_| KeyError::BadBucket {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;

        for token in history.split(['/', '-']).filter(|t| !t.is_empty()) {
            if AbstractAction::from_code(token).is_none() {
                return Err(KeyError::BadAction(token.to_string()));
            }
        }

        Ok(InfosetKey {
            format,
            street,
            bucket,
            history: history.to_string(),
        })
    }

    /// Decode the history back into per-street action lists.
    ///
    /// Legacy keys have no street boundaries, so their actions come back as a
    /// single segment.
    pub fn actions(&self) -> Vec<Vec<AbstractAction>> {
        self.history
            .split('/')
            .map(|segment| {
                segment
                    .split('-')
                    .filter_map(AbstractAction::from_code)
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for InfosetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            KeyFormat::Versioned(v) => {
                write!(f, "v{}:{}:{}:{}", v, self.street, self.bucket, self.history)
            }
            KeyFormat::Legacy => write!(f, "{}:{}:{}", self.street, self.bucket, self.history),
        }
    }
}

/// Build the key for a decision point.
///
/// `history` holds the abstract actions of each street so far, the last
/// entry being the current street. With `segmented` the streets are joined
/// by `/` under the current version tag; otherwise a flat legacy key is
/// produced.
pub fn encode_infoset(
    bucket: u32,
    street: Street,
    history: &[Vec<AbstractAction>],
    segmented: bool,
) -> (InfosetKey, Street) {
    let key = if segmented {
        InfosetKey {
            format: KeyFormat::Versioned(KEY_VERSION),
            street,
            bucket,
            history: history
                .iter()
                .map(|s| encode_action_history(s))
                .collect::<Vec<_>>()
                .join("/"),
        }
    } else {
        let flat: Vec<AbstractAction> = history.iter().flatten().copied().collect();
        InfosetKey {
            format: KeyFormat::Legacy,
            street,
            bucket,
            history: encode_action_history(&flat),
        }
    };
    (key, street)
}
