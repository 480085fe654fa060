//! Composite key encoding
//!
//! Index entries live in the same keyspace as account records. A composite
//! key is `\0 object_type \0 attr_1 \0 ... attr_n \0`, so:
//!
//! - composite keys never collide with simple keys (account ids), which may
//!   not contain `\0`
//! - a key built from the first `k` attributes is a prefix of every key that
//!   shares them, which is what partial lookups scan for

use crate::{Error, Result};

/// Reserved separator; not permitted inside any key field
pub const SEPARATOR: char = '\u{0}';

/// Index: `(accountId, txId, op, amount)`, settled balance deltas
pub const DELTA_INDEX: &str = "Account~TxID~Op~Tok";

/// Index: `(txId, sender, recipient, amount)`, settled participant records
pub const SETTLED_TX_INDEX: &str = "TxID~Sender~Recipient~Tok";

/// Index: `(txId, sender, recipient, amount)`, pending participant records
pub const PENDING_TX_INDEX: &str = "PendingTxID~Sender~Recipient~Tok";

/// Index: `(name, accountId)`
pub const NAME_INDEX: &str = "Name~AccountID";

/// Reject fields containing the separator
pub fn validate_field(field: &str) -> Result<()> {
    if field.contains(SEPARATOR) {
        return Err(Error::InvalidKey(format!(
            "field {:?} contains the reserved separator",
            field
        )));
    }
    Ok(())
}

/// Build a (possibly partial) composite key
pub fn composite_key(object_type: &str, attributes: &[&str]) -> Result<String> {
    validate_field(object_type)?;
    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push(SEPARATOR);
    key.push_str(object_type);
    key.push(SEPARATOR);
    for attribute in attributes {
        validate_field(attribute)?;
        key.push_str(attribute);
        key.push(SEPARATOR);
    }
    Ok(key)
}

/// Split a composite key into object type and attributes
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>)> {
    let body = key
        .strip_prefix(SEPARATOR)
        .and_then(|rest| rest.strip_suffix(SEPARATOR))
        .ok_or_else(|| Error::InvalidKey(format!("not a composite key: {:?}", key)))?;

    let mut parts = body.split(SEPARATOR).map(str::to_string);
    let object_type = parts
        .next()
        .ok_or_else(|| Error::InvalidKey(format!("missing object type: {:?}", key)))?;
    Ok((object_type, parts.collect()))
}

/// Whether a key is a composite (index) key
pub fn is_composite(key: &str) -> bool {
    key.starts_with(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let key = composite_key(DELTA_INDEX, &["acc1", "tx9", "+", "15"]).unwrap();
        let (object_type, attrs) = split_composite_key(&key).unwrap();
        assert_eq!(object_type, DELTA_INDEX);
        assert_eq!(attrs, vec!["acc1", "tx9", "+", "15"]);
        assert!(is_composite(&key));
    }

    #[test]
    fn test_partial_key_is_prefix_without_sibling_collision() {
        let partial = composite_key(DELTA_INDEX, &["1"]).unwrap();
        let own = composite_key(DELTA_INDEX, &["1", "tx", "+", "5"]).unwrap();
        let sibling = composite_key(DELTA_INDEX, &["10", "tx", "+", "5"]).unwrap();
        assert!(own.starts_with(&partial));
        assert!(!sibling.starts_with(&partial));
    }

    #[test]
    fn test_separator_rejected() {
        let result = composite_key(NAME_INDEX, &["bad\u{0}name", "1"]);
        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_split_rejects_simple_key() {
        assert!(split_composite_key("account-1").is_err());
        assert!(!is_composite("account-1"));
    }

    #[test]
    fn test_empty_object_type_only() {
        let key = composite_key(NAME_INDEX, &[]).unwrap();
        let (object_type, attrs) = split_composite_key(&key).unwrap();
        assert_eq!(object_type, NAME_INDEX);
        assert!(attrs.is_empty());
    }
}
