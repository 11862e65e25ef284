use std::collections::{HashMap, HashSet};

use page_ftl::{Error, Ftl, FtlConfig, Lba};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Write(Lba, u8),
    Trim(Lba),
    Read(Lba),
}

fn op(max_lba: Lba) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..max_lba, any::<u8>()).prop_map(|(lba, b)| Op::Write(lba, b)),
        1 => (0..max_lba).prop_map(Op::Trim),
        1 => (0..max_lba).prop_map(Op::Read),
    ]
}

fn check(ftl: &Ftl, model: &HashMap<Lba, Vec<u8>>, max_lba: Lba) {
    let stats = ftl.stats().unwrap();
    assert_eq!(stats.valid_pages, stats.live_lbas);
    assert_eq!(stats.live_lbas, model.len());
    assert_eq!(
        stats.free_pages + stats.valid_pages + stats.stale_pages,
        ftl.config().total_pages()
    );

    let mut seen = HashSet::new();
    for lba in 0..max_lba {
        match model.get(&lba) {
            Some(data) => {
                assert!(seen.insert(ftl.lookup(lba).unwrap()));
                assert_eq!(&ftl.read(lba).unwrap(), data);
            }
            None => assert_eq!(ftl.read(lba), Err(Error::NotFound(lba))),
        }
    }
}

proptest! {
    #[test]
    fn mapping_matches_model(ops in prop::collection::vec(op(12), 1..300)) {
        let ftl = Ftl::new(FtlConfig::new(4, 4, 3, 8)).unwrap();
        let mut model = HashMap::new();

        for op in ops {
            match op {
                Op::Write(lba, b) => {
                    ftl.write(lba, &[b, b]).unwrap();
                    model.insert(lba, vec![b, b]);
                }
                Op::Trim(lba) => {
                    let expected = model.remove(&lba).map(|_| ()).ok_or(Error::NotFound(lba));
                    prop_assert_eq!(ftl.trim(lba), expected);
                }
                Op::Read(lba) => {
                    let expected = model.get(&lba).cloned().ok_or(Error::NotFound(lba));
                    prop_assert_eq!(ftl.read(lba), expected);
                }
            }
            check(&ftl, &model, 12);
        }
    }

    #[test]
    fn device_full_never_loses_data(ops in prop::collection::vec(op(5), 1..120)) {
        let ftl = Ftl::new(FtlConfig::new(2, 2, 1, 4)).unwrap();
        let mut model = HashMap::new();

        for op in ops {
            match op {
                Op::Write(lba, b) => match ftl.write(lba, &[b]) {
                    Ok(()) => {
                        model.insert(lba, vec![b]);
                    }
                    Err(e) => {
                        prop_assert_eq!(e, Error::DeviceFull);
                    }
                },
                Op::Trim(lba) => {
                    let expected = model.remove(&lba).map(|_| ()).ok_or(Error::NotFound(lba));
                    prop_assert_eq!(ftl.trim(lba), expected);
                }
                Op::Read(_) => {}
            }
            check(&ftl, &model, 5);
        }
    }
}
