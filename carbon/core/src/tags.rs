// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;

use crate::error::{IngestError, IngestResult};
use crate::graphite;
use crate::writer::Tag;

/// Splits a dotted graphite name into ordered, numbered tag pairs:
/// `foo.bar` becomes `[__g0__: foo, __g1__: bar]`.
///
/// `sink` is truncated and refilled so its capacity carries over between
/// metrics. Tag values are zero-copy slices of `name`. A trailing separator
/// is permitted and produces no extra tag; consecutive separators (which
/// would produce an empty segment) fail the whole name.
pub(crate) fn generate_tags(name: &Bytes, sink: &mut Vec<Tag>) -> IngestResult<()> {
    sink.clear();
    if name.is_empty() {
        return Err(IngestError::EmptyName);
    }

    let mut start = 0;
    let mut index = 0;
    for (pos, &byte) in name.iter().enumerate() {
        if byte != graphite::SEPARATOR {
            continue;
        }
        if pos == start {
            return Err(IngestError::DuplicateSeparator(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }
        sink.push(Tag {
            name: graphite::tag_label(index),
            value: name.slice(start..pos),
        });
        index += 1;
        start = pos + 1;
    }
    if start < name.len() {
        sink.push(Tag {
            name: graphite::tag_label(index),
            value: name.slice(start..),
        });
    }
    Ok(())
}
