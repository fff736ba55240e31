//! Rule files on disk.
//!
//! Rules for one key live at `<root>/<in|out|unknown>/0x<TYPE>.txt`, with the
//! type id as three or more hex digits (`0x015.txt`, `0x01A.txt`). Lowercase
//! digits are accepted too.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use pktlens_core::{LogType, RuleKey, RuleSource};

use super::hexlog::parse_packet_type;

const LOG_TYPES: [LogType; 3] = [LogType::Incoming, LogType::Outgoing, LogType::Unknown];

/// [`RuleSource`] reading one text file per rule key.
#[derive(Debug, Clone)]
pub struct DirectoryRuleSource {
    root: PathBuf,
}

impl DirectoryRuleSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a key's rules are read from first.
    pub fn path_for(&self, key: RuleKey) -> PathBuf {
        self.root
            .join(key.log_type.as_str())
            .join(format!("0x{:03X}.txt", key.packet_type))
    }

    /// Every key with a rule file, sorted.
    pub fn keys(&self) -> io::Result<Vec<RuleKey>> {
        let mut keys = Vec::new();
        for log_type in LOG_TYPES {
            let dir = self.root.join(log_type.as_str());
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
                    continue;
                }
                let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                    continue;
                };
                if !stem.starts_with("0x") {
                    debug!("Skipping {}", path.display());
                    continue;
                }
                match parse_packet_type(stem) {
                    Ok(packet_type) if file_names(packet_type).contains(&stem.to_string()) => {
                        keys.push(RuleKey::new(packet_type, log_type))
                    }
                    Ok(packet_type) => warn!(
                        "Ignoring {}: rules for this type are read from {}.txt",
                        path.display(),
                        file_names(packet_type)[0]
                    ),
                    Err(_) => debug!("Skipping {}", path.display()),
                }
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

impl RuleSource for DirectoryRuleSource {
    fn rule_text(&self, key: RuleKey) -> Option<String> {
        let dir = self.root.join(key.log_type.as_str());

        for name in file_names(key.packet_type) {
            let path = dir.join(format!("{name}.txt"));
            match fs::read_to_string(&path) {
                Ok(text) => {
                    debug!("Read rules for {} from {}", key, path.display());
                    return Some(text);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!("Cannot read {}: {}", path.display(), err);
                    return None;
                }
            }
        }
        None
    }
}

/// File stems a packet type's rules may be stored under, in lookup order.
fn file_names(packet_type: u16) -> [String; 2] {
    [
        format!("0x{packet_type:03X}"),
        format!("0x{packet_type:03x}"),
    ]
}
