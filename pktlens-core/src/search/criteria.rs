//! Search criteria value objects.

use compact_str::CompactString;

use crate::decode::DecodedPacket;
use crate::packet::{Direction, PacketRecord};

/// Raw byte content to look for, anywhere in a packet.
///
/// Integer forms are matched as their little-endian byte encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentMatcher {
    Byte(u8),
    UInt16(u16),
    UInt32(u32),
    Bytes(Vec<u8>),
}

impl ContentMatcher {
    /// Byte sequence searched for.
    pub fn needle(&self) -> Vec<u8> {
        match self {
            ContentMatcher::Byte(b) => vec![*b],
            ContentMatcher::UInt16(v) => v.to_le_bytes().to_vec(),
            ContentMatcher::UInt32(v) => v.to_le_bytes().to_vec(),
            ContentMatcher::Bytes(bytes) => bytes.clone(),
        }
    }

    pub fn matches(&self, record: &PacketRecord) -> bool {
        record.contains_bytes(&self.needle())
    }
}

/// Decoded field to look for.
///
/// The name compares without ASCII case; an empty name matches any field.
/// The value is compared with [`FieldValue::matches_text`].
///
/// [`FieldValue::matches_text`]: crate::decode::FieldValue::matches_text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatcher {
    pub name: CompactString,
    pub value: String,
}

impl FieldMatcher {
    pub fn matches(&self, packet: &DecodedPacket) -> bool {
        packet.fields.iter().any(|field| {
            (self.name.is_empty() || field.name.eq_ignore_ascii_case(&self.name))
                && field.value.matches_text(&self.value)
        })
    }
}

/// What a search looks for. Every criterion set must hold; the two
/// direction flags are OR-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub match_incoming: bool,
    pub match_outgoing: bool,
    pub packet_type: Option<u16>,
    pub sync_id: Option<u16>,
    pub content: Option<ContentMatcher>,
    /// Decode visited records and apply `field`
    pub by_decoded_field: bool,
    pub field: Option<FieldMatcher>,
}

impl SearchCriteria {
    /// Criteria matching every packet in both directions.
    pub fn any_direction() -> Self {
        Self {
            match_incoming: true,
            match_outgoing: true,
            ..Self::default()
        }
    }

    pub fn incoming() -> Self {
        Self {
            match_incoming: true,
            ..Self::default()
        }
    }

    pub fn outgoing() -> Self {
        Self {
            match_outgoing: true,
            ..Self::default()
        }
    }

    pub fn with_packet_type(mut self, packet_type: u16) -> Self {
        self.packet_type = Some(packet_type);
        self
    }

    pub fn with_sync(mut self, sync_id: u16) -> Self {
        self.sync_id = Some(sync_id);
        self
    }

    pub fn with_content(mut self, content: ContentMatcher) -> Self {
        self.content = Some(content);
        self
    }

    /// Match a decoded field by name and value. Enables decoding.
    pub fn with_field(mut self, name: impl Into<CompactString>, value: impl Into<String>) -> Self {
        self.by_decoded_field = true;
        self.field = Some(FieldMatcher {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Whether any direction is selected. Without one nothing can match.
    pub fn has_direction(&self) -> bool {
        self.match_incoming || self.match_outgoing
    }

    /// Whether matching needs a decoded packet.
    pub fn needs_decode(&self) -> bool {
        self.by_decoded_field && self.field.is_some()
    }

    /// Criteria that only need the record's metadata and raw bytes.
    pub fn matches_raw(&self, record: &PacketRecord) -> bool {
        let direction = match record.direction() {
            Direction::Incoming => self.match_incoming,
            Direction::Outgoing => self.match_outgoing,
        };
        direction
            && self.packet_type.map_or(true, |t| t == record.packet_type())
            && self.sync_id.map_or(true, |s| record.sync_id() == Some(s))
            && self.content.as_ref().map_or(true, |c| c.matches(record))
    }

    /// Criteria that need the decoded packet.
    pub fn matches_decoded(&self, packet: &DecodedPacket) -> bool {
        match &self.field {
            Some(field) if self.by_decoded_field => field.matches(packet),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::rules::{compile, LogType};
    use crate::test_utils::PacketBuilder;

    #[test]
    fn test_content_needles() {
        assert_eq!(ContentMatcher::Byte(7).needle(), vec![7]);
        assert_eq!(ContentMatcher::UInt16(0x000A).needle(), vec![0x0A, 0x00]);
        assert_eq!(
            ContentMatcher::UInt32(0x0403_0201).needle(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_matches_raw() {
        let record = PacketBuilder::outgoing(0x15)
            .sync(9)
            .raw(&[0x0A, 0x00, 0x01])
            .build();

        assert!(SearchCriteria::any_direction().matches_raw(&record));
        assert!(SearchCriteria::outgoing().matches_raw(&record));
        assert!(!SearchCriteria::incoming().matches_raw(&record));
        assert!(!SearchCriteria::default().matches_raw(&record));

        let criteria = SearchCriteria::outgoing()
            .with_packet_type(0x15)
            .with_sync(9)
            .with_content(ContentMatcher::UInt16(10));
        assert!(criteria.matches_raw(&record));
        assert!(!criteria.clone().with_sync(8).matches_raw(&record));
        assert!(!criteria
            .with_content(ContentMatcher::Bytes(vec![0x01, 0x0A]))
            .matches_raw(&record));
    }

    #[test]
    fn test_has_direction() {
        assert!(!SearchCriteria::default().has_direction());
        assert!(SearchCriteria::incoming().has_direction());
    }

    #[test]
    fn test_matches_decoded() {
        let rules = compile("field;opcode;u16\nfield;name;string;4\n", 1, LogType::Incoming)
            .unwrap();
        let packet = decode(&rules, &[0x0A, 0x00, b'A', b'b', 0, 0], None);

        let by_name = SearchCriteria::any_direction().with_field("NAME", "ab");
        assert!(by_name.needs_decode());
        assert!(by_name.matches_decoded(&packet));

        let by_number = SearchCriteria::any_direction().with_field("opcode", "0x0a");
        assert!(by_number.matches_decoded(&packet));

        let any_field = SearchCriteria::any_direction().with_field("", "10");
        assert!(any_field.matches_decoded(&packet));

        let miss = SearchCriteria::any_direction().with_field("opcode", "11");
        assert!(!miss.matches_decoded(&packet));

        // Decoded criteria are ignored unless enabled.
        let mut disabled = miss.clone();
        disabled.by_decoded_field = false;
        assert!(!disabled.needs_decode());
        assert!(disabled.matches_decoded(&packet));
    }
}
