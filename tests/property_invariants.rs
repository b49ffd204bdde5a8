//! Property-based tests for basket invariants
//!
//! Drives a warehouse with random add/delete/read/compact sequences and
//! checks the space, slot, hash and index invariants after every step.

use basket_rs::{
    BasketHeader, ContainerKind, ErrorKind, MemoryStore, PhysicalStore, RandomTagGenerator,
    Sha256Hasher, Tag, Warehouse, WarehouseConfig, BASKET_DEFAULT_SIZE, HEADER_SIZE,
};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    Add { size: usize, fill: u8 },
    Delete { pick: usize },
    Read { pick: usize },
    Compact,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1usize..40_000, any::<u8>()).prop_map(|(size, fill)| Op::Add { size, fill }),
        2 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
        2 => any::<usize>().prop_map(|pick| Op::Read { pick }),
        1 => Just(Op::Compact),
    ]
}

/// Load the persisted header straight from the store, bypassing the warehouse
fn load_header(store: &MemoryStore, offset: u64) -> BasketHeader {
    let mut store = store.clone();
    let bytes = store.read(0, offset, HEADER_SIZE).unwrap();
    BasketHeader::from_bytes(&bytes).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..60), seed in any::<u64>()) {
        let store = MemoryStore::new();
        let mut wh = Warehouse::builder(WarehouseConfig::default())
            .store(store.clone())
            .tag_generator(RandomTagGenerator::with_seed(seed))
            .build()
            .unwrap();
        wh.mount().unwrap();

        let basket = wh.create_basket(0).unwrap();
        let offset = wh.index().lookup(&basket).unwrap().physical_offset;
        let mut live: Vec<Tag> = Vec::new();
        let mut contents: HashMap<Tag, Vec<u8>> = HashMap::new();

        for (step, op) in ops.into_iter().enumerate() {
            match op {
                Op::Add { size, fill } => {
                    let data = vec![fill; size];
                    match wh.add_file(&basket, &format!("f{}.bin", step), &data) {
                        Ok(tag) => {
                            live.push(tag);
                            contents.insert(tag, data);
                        }
                        Err(e) => prop_assert_eq!(e.kind(), ErrorKind::BasketFull),
                    }
                }
                Op::Delete { pick } if !live.is_empty() => {
                    let tag = live.remove(pick % live.len());
                    wh.delete_file(&tag).unwrap();
                    contents.remove(&tag);
                    prop_assert!(wh.index().lookup(&tag).is_none());
                }
                Op::Read { pick } if !live.is_empty() => {
                    let tag = live[pick % live.len()];
                    prop_assert_eq!(&wh.read_file_to_vec(&tag).unwrap(), &contents[&tag]);
                }
                Op::Compact => {
                    wh.compact_basket(&basket).unwrap();
                    // A second pass in a row changes nothing
                    prop_assert!(wh.compact_basket(&basket).unwrap().is_noop());
                }
                _ => {}
            }

            let header = load_header(&store, offset);
            prop_assert!(header.verify(&Sha256Hasher));
            prop_assert_eq!(header.used_space + header.free_space, BASKET_DEFAULT_SIZE);
            prop_assert_eq!(header.file_count as usize, header.live_slots().count());
            prop_assert_eq!(header.deleted_count as usize, header.deleted_with_data());
            prop_assert!(header.data_end >= header.used_space);
            prop_assert!(header.data_end <= BASKET_DEFAULT_SIZE);

            let used: u64 = header.live_slots().map(|s| s.size as u64).sum();
            prop_assert_eq!(header.used_space, HEADER_SIZE as u64 + used);

            for slot in header.live_slots() {
                let entry = wh.index().lookup(&slot.tag).unwrap();
                prop_assert_eq!(entry.kind, ContainerKind::BasketFile);
                prop_assert_eq!(entry.internal_offset, slot.data_offset);
            }
            let indexed_files = wh
                .index()
                .entries()
                .iter()
                .filter(|e| e.kind == ContainerKind::BasketFile)
                .count();
            prop_assert_eq!(indexed_files, live.len());
        }

        prop_assert!(wh.check_integrity().unwrap().is_clean());
    }

    #[test]
    fn prop_index_remove_preserves_order(count in 2usize..20, victim in any::<usize>()) {
        let mut wh = Warehouse::new(WarehouseConfig::default()).unwrap();
        wh.mount().unwrap();
        let basket = wh.create_basket(0).unwrap();

        let files: Vec<Tag> = (0..count)
            .map(|i| wh.add_file(&basket, &format!("{}", i), &[i as u8]).unwrap())
            .collect();
        let victim = files[victim % count];
        wh.delete_file(&victim).unwrap();

        let expected: Vec<Tag> = std::iter::once(basket)
            .chain(files.iter().copied().filter(|t| *t != victim))
            .collect();
        let actual: Vec<Tag> = wh.index().entries().iter().map(|e| e.tag).collect();
        prop_assert_eq!(actual, expected);
    }
}
