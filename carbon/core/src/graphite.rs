// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The graphite dotted naming convention: segment separators, canonical
//! per-index tag labels, and the character set legal inside segment bodies.

use bytes::{Bytes, BytesMut};
use carbon_config::RewriteParameters;
use once_cell::sync::Lazy;

/// Separator between the segments of a dotted metric name.
pub(crate) const SEPARATOR: u8 = b'.';

/// Rule pattern that matches every metric without going through the regex
/// engine.
pub const MATCH_ALL_PATTERN: &str = "**";

/// Tag labels are needed for every segment of every ingested name, so the
/// common depths are precomputed once.
const PRECOMPUTED_TAG_LABELS: usize = 128;

static TAG_LABELS: Lazy<Vec<Bytes>> = Lazy::new(|| {
    (0..PRECOMPUTED_TAG_LABELS)
        .map(|index| Bytes::from(format!("__g{index}__")))
        .collect()
});

/// Canonical tag label for the `index`-th segment of a dotted name:
/// `__g0__`, `__g1__`, ...
pub(crate) fn tag_label(index: usize) -> Bytes {
    TAG_LABELS
        .get(index)
        .cloned()
        .unwrap_or_else(|| Bytes::from(format!("__g{index}__")))
}

fn is_legal_segment_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | SEPARATOR)
}

/// Copies `src` into `dst`, rewriting graphite-illegal bytes to `_` when
/// cleanup is enabled. Separators always pass through unchanged.
pub(crate) fn copy_and_rewrite(dst: &mut BytesMut, src: &[u8], rewrite: &RewriteParameters) {
    dst.clear();
    dst.reserve(src.len());
    if rewrite.cleanup {
        dst.extend(
            src.iter()
                .map(|&byte| if is_legal_segment_byte(byte) { byte } else { b'_' }),
        );
    } else {
        dst.extend_from_slice(src);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tag_labels_are_indexed() {
        assert_eq!(tag_label(0).as_ref(), b"__g0__");
        assert_eq!(tag_label(1).as_ref(), b"__g1__");
        assert_eq!(tag_label(99).as_ref(), b"__g99__");
        // Beyond the precomputed table.
        assert_eq!(tag_label(5000).as_ref(), b"__g5000__");
    }

    #[test]
    fn copy_without_cleanup_is_verbatim() {
        let mut dst = BytesMut::new();
        let rewrite = RewriteParameters { cleanup: false };
        copy_and_rewrite(&mut dst, b"foo.b@r baz", &rewrite);
        assert_eq!(dst.as_ref(), b"foo.b@r baz");
    }

    #[test]
    fn cleanup_rewrites_illegal_bytes() {
        let mut dst = BytesMut::new();
        let rewrite = RewriteParameters { cleanup: true };
        copy_and_rewrite(&mut dst, b"foo.b@r/baz-01_x", &rewrite);
        assert_eq!(dst.as_ref(), b"foo.b_r_baz-01_x");
    }

    #[test]
    fn copy_reuses_the_destination_buffer() {
        let mut dst = BytesMut::new();
        let rewrite = RewriteParameters::default();
        copy_and_rewrite(&mut dst, b"first.name", &rewrite);
        copy_and_rewrite(&mut dst, b"x", &rewrite);
        assert_eq!(dst.as_ref(), b"x");
    }
}
