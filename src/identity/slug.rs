//! Deterministic, source-aware slugs

use sha2::{Digest, Sha256};

/// Upper bound for [`slug_base`] output
pub const MAX_BASE_LEN: usize = 200;
/// Upper bound for [`source_aware_slug`] output
pub const MAX_SLUG_LEN: usize = 255;
/// Hex characters of the identity hash appended to each slug
pub const SUFFIX_LEN: usize = 12;

const FALLBACK_BASE: &str = "untitled";

/// Lowercase, dash-separated ASCII slug of free text.
///
/// Runs of anything outside `[a-z0-9]` collapse to a single `-`; leading
/// and trailing dashes are trimmed. Text with no usable characters becomes
/// `"untitled"`.
pub fn slug_base(title: &str) -> String {
    let mut slug = String::with_capacity(title.len().min(MAX_BASE_LEN));
    let mut pending_dash = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                if slug.len() + 1 >= MAX_BASE_LEN {
                    break;
                }
                slug.push('-');
            }
            pending_dash = false;
            if slug.len() >= MAX_BASE_LEN {
                break;
            }
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_BASE.to_string()
    } else {
        slug
    }
}

/// First `len` hex chars of SHA-256 over `input`
pub fn short_hash(input: &str, len: usize) -> String {
    let digest = format!("{:x}", Sha256::digest(input.as_bytes()));
    digest[..len.min(digest.len())].to_string()
}

/// `slug_base(title)` plus a hash of `source_key:external_id`.
///
/// The same triple always yields the same slug; changing the source key or
/// the external id changes the suffix even when titles collide.
pub fn source_aware_slug(title: &str, source_key: &str, external_id: &str) -> String {
    let suffix = short_hash(&format!("{source_key}:{external_id}"), SUFFIX_LEN);
    let max_base = MAX_SLUG_LEN - SUFFIX_LEN - 1;

    let mut base = slug_base(title);
    if base.len() > max_base {
        base.truncate(max_base);
        let trimmed = base.trim_end_matches('-').len();
        base.truncate(trimmed);
    }
    format!("{base}-{suffix}")
}
