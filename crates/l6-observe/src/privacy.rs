//! Minimal PII guard for label/attribute maps emitted by the observe layer.
//!
//! Known-sensitive keys are dropped outright; remaining string values that
//! look like an email address are replaced with a stable hash so duplicate
//! values still correlate without leaking the raw text.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const DROPPED_KEYS: &[&str] = &["user", "email", "password", "token", "authorization", "cookie"];

fn looks_like_email(value: &str) -> bool {
    value.contains('@') && value.contains('.')
}

fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("sha256:{digest:x}")
}

pub fn host_only(url: &str) -> String {
    url.parse::<url::Url>()
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

pub fn sanitize_labels(kv: BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in kv {
        if DROPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if key == "origin" {
            out.insert(key, host_only(&value));
            continue;
        }
        if looks_like_email(&value) {
            out.insert(key, hash_value(&value));
        } else {
            out.insert(key, value);
        }
    }
    out
}
