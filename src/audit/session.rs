//! Session identity derivation.
//!
//! A log line carries no session id, so one is derived from what the line
//! does carry: the account, the process id, and time. The canonical form
//! `"<ms-offset>_<account_id>_<pid>"` is hashed with SHA-256 and base64
//! encoded, giving a compact key that cannot collide across distinct
//! (account, pid, time) triples except with negligible probability.
//!
//! All time values are expressed as millisecond offsets from a fixed epoch
//! anchor (2000-01-01T00:00:00) rather than wall-clock timestamps, which
//! keeps the canonical form and the persisted model on small comparable
//! integers.
//!
//! Sessions are keyed at *date* granularity: every line of a session
//! hashes the midnight of its calendar day. A session that spans midnight
//! would therefore compute a different key on each side of the rollover,
//! so resolution probes the current date and a bounded number of preceding
//! days ([`probe_keys`]), most recent first.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Days, NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};

/// Default number of calendar days probed when resolving a session,
/// including the line's own date. Two days bridges a single midnight
/// rollover, which is how the log files rotate.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 2;

/// Fixed reference instant for all millisecond offsets.
pub fn epoch_anchor() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .expect("valid anchor date")
        .and_hms_opt(0, 0, 0)
        .expect("valid anchor time")
}

/// Millisecond offset of `ts` from the epoch anchor.
pub fn millis_since_anchor(ts: NaiveDateTime) -> i64 {
    (ts - epoch_anchor()).num_milliseconds()
}

/// Derive the session identity key for an (account, pid, time) triple.
///
/// `anchor_time` is either an exact session-start timestamp or a
/// date-at-midnight probe value; both hash through the same canonical
/// form, so keys from either granularity are comparable.
pub fn derive_key(account_id: u32, pid: u32, anchor_time: NaiveDateTime) -> String {
    let canonical = format!(
        "{}_{}_{}",
        millis_since_anchor(anchor_time),
        account_id,
        pid
    );
    let digest = Sha256::digest(canonical.as_bytes());
    BASE64.encode(digest)
}

/// Candidate keys for resolving a line to a session, most recent first.
///
/// Yields the key for `date` and each of the `lookback_days - 1` preceding
/// calendar days. The first candidate found in a session registry is the
/// match; this is what bridges sessions across the midnight log rollover.
pub fn probe_keys(
    account_id: u32,
    pid: u32,
    date: NaiveDate,
    lookback_days: u32,
) -> impl Iterator<Item = String> {
    (0..lookback_days.max(1)).filter_map(move |days_back| {
        let day = date.checked_sub_days(Days::new(u64::from(days_back)))?;
        let midnight = day.and_hms_opt(0, 0, 0)?;
        Some(derive_key(account_id, pid, midnight))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_millis_since_anchor() {
        assert_eq!(millis_since_anchor(epoch_anchor()), 0);
        let one_day_in = date(2000, 1, 2).and_hms_opt(0, 0, 1).unwrap();
        assert_eq!(millis_since_anchor(one_day_in), 86_400_000 + 1000);
    }

    #[test]
    fn test_derive_key_is_stable() {
        let t = date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(derive_key(1, 100, t), derive_key(1, 100, t));
    }

    #[test]
    fn test_derive_key_separates_triples() {
        let t = date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap();
        let base = derive_key(1, 100, t);
        assert_ne!(base, derive_key(2, 100, t));
        assert_ne!(base, derive_key(1, 101, t));
        assert_ne!(
            base,
            derive_key(1, 100, date(2024, 3, 2).and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_exact_and_date_granularity_agree() {
        // A midnight timestamp and its date-probe form are the same key.
        let midnight = date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap();
        let probed: Vec<String> = probe_keys(1, 100, date(2024, 3, 1), 1).collect();
        assert_eq!(probed, vec![derive_key(1, 100, midnight)]);
    }

    #[test]
    fn test_probe_keys_most_recent_first() {
        let keys: Vec<String> = probe_keys(4, 555, date(2024, 3, 2), 2).collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys[0],
            derive_key(4, 555, date(2024, 3, 2).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            keys[1],
            derive_key(4, 555, date(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_probe_keys_zero_lookback_still_probes_today() {
        let keys: Vec<String> = probe_keys(1, 1, date(2024, 3, 1), 0).collect();
        assert_eq!(keys.len(), 1);
    }
}
