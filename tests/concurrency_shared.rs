//! Shared-warehouse tests
//!
//! A warehouse is not internally synchronized; callers share it behind a
//! mutex, which serializes every read-modify-write cycle.

use basket_rs::{ErrorKind, Tag, Warehouse, WarehouseConfig};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_writers_on_separate_baskets() {
    let wh = Arc::new(Mutex::new(Warehouse::new(WarehouseConfig::default()).unwrap()));
    wh.lock().mount().unwrap();

    let handles: Vec<_> = (0..4u8)
        .map(|thread_id| {
            let wh = wh.clone();
            std::thread::spawn(move || {
                let basket = wh.lock().create_basket(0).unwrap();
                let mut written = Vec::new();
                for i in 0..32u8 {
                    let data = vec![thread_id ^ i; 64 + i as usize];
                    let tag = wh
                        .lock()
                        .add_file(&basket, &format!("t{}-{}.bin", thread_id, i), &data)
                        .unwrap();
                    written.push((tag, data));
                }
                (basket, written)
            })
        })
        .collect();

    let results: Vec<(Tag, Vec<(Tag, Vec<u8>)>)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let mut wh = wh.lock();
    for (basket, files) in &results {
        assert_eq!(wh.basket_stats(basket).unwrap().file_count, 32);
        for (tag, data) in files {
            assert_eq!(&wh.read_file_to_vec(tag).unwrap(), data);
        }
    }
    assert_eq!(wh.stats().file_count, 4 * 32);
    assert!(wh.check_integrity().unwrap().is_clean());
}

#[test]
fn test_concurrent_readers_and_deleter() {
    let wh = Arc::new(Mutex::new(Warehouse::new(WarehouseConfig::default()).unwrap()));
    let files: Vec<Tag> = {
        let mut guard = wh.lock();
        guard.mount().unwrap();
        let basket = guard.create_basket(0).unwrap();
        (0..40u8)
            .map(|i| guard.add_file(&basket, &format!("{}.txt", i), &[i; 100]).unwrap())
            .collect()
    };
    let files = Arc::new(files);

    let deleter = {
        let wh = wh.clone();
        let files = files.clone();
        std::thread::spawn(move || {
            for tag in files.iter().step_by(2) {
                wh.lock().delete_file(tag).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let wh = wh.clone();
            let files = files.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let pick = rand::random::<usize>() % files.len();
                    match wh.lock().read_file_to_vec(&files[pick]) {
                        Ok(data) => assert_eq!(data, vec![pick as u8; 100]),
                        Err(e) => assert_eq!(e.kind(), ErrorKind::FileNotFound),
                    }
                }
            })
        })
        .collect();

    deleter.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    let mut wh = wh.lock();
    assert_eq!(wh.stats().file_count, 20);
    assert_eq!(wh.quarantine().len(), 20);
    assert!(wh.check_integrity().unwrap().is_clean());
}
