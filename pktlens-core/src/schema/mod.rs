//! Value type schema shared by the rule compiler and the decoder.
//!
//! # Example
//!
//! ```rust
//! use pktlens_core::schema::{LookupTable, ValueKind};
//!
//! let kind = ValueKind::from_token("u16be").unwrap();
//! assert_eq!(kind.fixed_size(), Some(2));
//!
//! let mut zones = LookupTable::new("zones");
//! zones.insert(0x0F, "Valkurm Dunes");
//! assert_eq!(zones.get(0x0F), Some("Valkurm Dunes"));
//! ```

mod kind;
mod lookup;

pub use kind::{Endian, ValueKind};
pub use lookup::LookupTable;
