#![no_main]
use arbitrary::Arbitrary;
use basket_rs::{Tag, Warehouse, WarehouseConfig};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Add { name: String, data: Vec<u8> },
    Read { pick: u8, buf_len: u16 },
    Delete { pick: u8 },
    Compact,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut wh = match Warehouse::new(WarehouseConfig::default()) {
        Ok(wh) => wh,
        Err(_) => return,
    };
    if wh.mount().is_err() {
        return;
    }
    let basket = match wh.create_basket(0) {
        Ok(tag) => tag,
        Err(_) => return,
    };
    let mut files: Vec<Tag> = Vec::new();

    for op in ops.into_iter().take(256) {
        match op {
            Op::Add { name, data } => {
                if let Ok(tag) = wh.add_file(&basket, &name, &data) {
                    files.push(tag);
                }
            }
            Op::Read { pick, buf_len } if !files.is_empty() => {
                let tag = files[pick as usize % files.len()];
                let mut buf = vec![0u8; buf_len as usize];
                let _ = wh.read_file(&tag, &mut buf);
            }
            Op::Delete { pick } if !files.is_empty() => {
                let tag = files.remove(pick as usize % files.len());
                let _ = wh.delete_file(&tag);
            }
            Op::Compact => {
                let _ = wh.compact_basket(&basket);
            }
            _ => {}
        }
    }

    let report = wh.check_integrity().expect("integrity walk runs");
    assert!(report.is_clean(), "{:?}", report.violations);
});
