//! CSV export of decoded fields.

use std::io::Write;

use super::PacketStore;
use crate::error::{Result, StoreError};

const CSV_HEADER: &str =
    "packet,direction,packet_type,sync,field_index,field,offset,length,value,partial";

/// Write one CSV row per decoded field of every active record.
///
/// The store must be pre-parsed. Returns the number of rows written
/// (excluding the header).
pub fn write_csv<W: Write>(store: &PacketStore, writer: &mut W) -> Result<usize> {
    if !store.is_pre_parsed() {
        return Err(StoreError::NotPreParsed.into());
    }

    writeln!(writer, "{CSV_HEADER}")?;

    let mut rows = 0;
    for (packet_index, record) in store.active().iter().enumerate() {
        let Some(decoded) = record.decoded() else {
            continue;
        };
        let sync = record
            .sync_id()
            .map(|s| s.to_string())
            .unwrap_or_default();

        for field in &decoded.fields {
            let values = [
                packet_index.to_string(),
                record.direction().to_string(),
                format!("0x{:03X}", record.packet_type()),
                sync.clone(),
                field.index.to_string(),
                field.name.to_string(),
                field.offset.to_string(),
                field.length.to_string(),
                field.value.to_string(),
                field.partial.to_string(),
            ];
            let escaped: Vec<String> = values.iter().map(|v| escape(v)).collect();
            writeln!(writer, "{}", escaped.join(","))?;
            rows += 1;
        }
    }

    writer.flush()?;
    Ok(rows)
}

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;
    use crate::packet::StoreConfig;
    use crate::rules::{LogType, MemoryRuleSource, RuleCache, RuleKey};
    use crate::task::{CancellationToken, NoProgress};
    use crate::test_utils::PacketBuilder;

    fn store() -> PacketStore {
        PacketStore::from_records(
            vec![Arc::new(
                PacketBuilder::incoming(0x15)
                    .sync(4)
                    .raw(&[0x0A, 0x00, b'h', b'i', b',', 0])
                    .build(),
            )],
            StoreConfig::default(),
        )
    }

    #[test]
    fn test_export_requires_pre_parse() {
        let mut out = Vec::new();
        let err = write_csv(&store(), &mut out).unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::NotPreParsed)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_export_rows() {
        let key = RuleKey::new(0x15, LogType::Incoming);
        let cache = RuleCache::new(
            MemoryRuleSource::new().with(key, "field;opcode;u16\nfield;text;string;4\n"),
        );
        let store = store();
        store.pre_parse(&cache, &CancellationToken::new(), &NoProgress);

        let mut out = Vec::new();
        let rows = write_csv(&store, &mut out).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "0,in,0x015,4,0,opcode,0,2,10,false");
        assert_eq!(lines[2], "0,in,0x015,4,1,text,2,4,\"hi,\",false");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
