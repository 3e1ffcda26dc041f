//! Fuzz testing for B+ tree operations.
//!
//! This fuzz target replays arbitrary insert/search sequences against a
//! real table file and checks every outcome against a BTreeMap model:
//! inserts must succeed exactly when the key is new, and searches must
//! return exactly what the model holds.

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tempfile::tempdir;

use wrendb::config::MAX_KEY_SIZE;
use wrendb::TableHandle;

#[derive(Debug, Arbitrary)]
enum TreeOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Search { key: Vec<u8> },
}

fuzz_target!(|ops: Vec<TreeOp>| {
    let dir = tempdir().unwrap();
    let mut table = TableHandle::create(dir.path(), "fuzz").unwrap();
    let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

    for op in ops {
        match op {
            TreeOp::Insert { key, value } => {
                if key.len() > MAX_KEY_SIZE || value.len() > 4096 {
                    continue;
                }
                let inserted = table.insert(&key, &value).unwrap();
                assert_eq!(inserted, !model.contains_key(&key));
                if inserted {
                    model.insert(key, value);
                }
            }
            TreeOp::Search { key } => {
                let found = table.search(&key).unwrap();
                assert_eq!(found.as_deref(), model.get(&key).map(Vec::as_slice));
            }
        }
    }
});
