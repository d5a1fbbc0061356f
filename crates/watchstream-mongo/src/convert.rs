//! Change stream document conversion.

use bson::{Bson, Document};
use watchstream_core::RawChangeRecord;

/// Convert a change stream document into a raw record.
///
/// Uses relaxed extended JSON: numbers stay plain JSON numbers, while
/// timestamps, object ids and dates keep their `$`-tagged wrappers.
pub fn to_raw_record(document: Document) -> RawChangeRecord {
    RawChangeRecord::new(Bson::Document(document).into_relaxed_extjson())
}
