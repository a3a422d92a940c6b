//! Record identity: content hashes and source-aware slugs

mod hash;
mod slug;

pub use hash::{canonical_string, content_hash, ContentHash};
pub use slug::{short_hash, slug_base, source_aware_slug, MAX_BASE_LEN, MAX_SLUG_LEN, SUFFIX_LEN};
