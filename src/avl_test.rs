use std::time::{SystemTime, UNIX_EPOCH};

use rand::prelude::random;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::avl::Avl;
use crate::empty::Empty;
use crate::error::Error;

#[test]
fn test_id() {
    let index: Avl<i64, i64> = Avl::new("test-avl");
    assert_eq!(index.id(), "test-avl".to_string());
}

#[test]
fn test_len() {
    let index: Avl<i64, i64> = Avl::new("test-avl");
    assert_eq!(index.len(), 0);
    assert!(index.is_empty());
}

#[test]
fn test_insert() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    let mut refns = RefNodes::new(10);

    assert!(index.insert(2, 10).is_ok());
    refns.create(2, 10);
    assert!(index.insert(1, 10).is_ok());
    refns.create(1, 10);
    assert!(index.insert(3, 10).is_ok());
    refns.create(3, 10);
    assert!(index.insert(6, 10).is_ok());
    refns.create(6, 10);
    assert!(index.insert(5, 10).is_ok());
    refns.create(5, 10);
    assert!(index.insert(4, 10).is_ok());
    refns.create(4, 10);
    assert!(index.insert(8, 10).is_ok());
    refns.create(8, 10);
    assert!(index.insert(0, 10).is_ok());
    refns.create(0, 10);
    assert!(index.insert(9, 10).is_ok());
    refns.create(9, 10);
    assert!(index.insert(7, 10).is_ok());
    refns.create(7, 10);

    assert_eq!(index.len(), 10);
    assert!(index.validate().is_ok());

    // error case
    assert_eq!(index.insert(7, 20), Err(Error::DuplicateKey(7)));
    assert_eq!(index.len(), 10);
    assert_eq!(index.get(&7), Some(10));

    // test get
    for i in 0..10 {
        let val = index.get(&i);
        let refval = refns.get(i);
        assert_eq!(val, refval);
    }
    // test iter
    let (mut iter, mut iter_ref) = (index.iter(), refns.iter());
    loop {
        match (iter.next(), iter_ref.next()) {
            (Some(item), Some(ref_item)) => {
                assert_eq!(item.0, ref_item.0);
                assert_eq!(item.1, ref_item.1);
            }
            (None, None) => break,
            (_, _) => panic!("invalid"),
        }
    }
}

#[test]
fn test_insert_counts() {
    // ascending run, the third insert needs a promotion and a single
    // rotation pulling 20 up as the new root.
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    assert_eq!(index.insert(10, 100), Ok(0));
    assert_eq!(index.insert(20, 200), Ok(1));
    assert_eq!(index.insert(30, 300), Ok(3));

    let root = index.root_node().unwrap();
    assert_eq!(*root.key(), 20);
    assert_eq!(root.height(), 1);
    assert_eq!(root.size(), 3);
    assert_eq!(*root.left_node().unwrap().key(), 10);
    assert_eq!(*root.right_node().unwrap().key(), 30);
    assert!(index.validate().is_ok());

    // descending run mirrors the counts.
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    assert_eq!(index.insert(30, 300), Ok(0));
    assert_eq!(index.insert(20, 200), Ok(1));
    assert_eq!(index.insert(10, 100), Ok(3));
    assert_eq!(*index.root_node().unwrap().key(), 20);
    assert!(index.validate().is_ok());

    // zig-zag run, a promotion followed by a double rotation.
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    assert_eq!(index.insert(10, 100), Ok(0));
    assert_eq!(index.insert(30, 300), Ok(1));
    assert_eq!(index.insert(20, 200), Ok(6));
    assert_eq!(*index.root_node().unwrap().key(), 20);
    assert!(index.validate().is_ok());
}

#[test]
fn test_delete_counts() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    for key in [4, 2, 6, 1, 3, 5, 7].iter() {
        index.insert(*key, key * 100).unwrap();
    }

    // deleting the root of a perfect tree lifts the successor without
    // any re-balancing.
    assert_eq!(index.delete(&4), Ok(0));
    assert_eq!(index.len(), 6);
    assert_eq!(*index.root_node().unwrap().key(), 5);
    let keys: Vec<i64> = index.keys().collect();
    assert_eq!(keys, vec![1, 2, 3, 5, 6, 7]);
    assert!(index.validate().is_ok());

    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    for key in [4, 2, 6, 1, 3, 5, 7].iter() {
        index.insert(*key, key * 100).unwrap();
    }
    assert_eq!(index.delete(&1), Ok(0));
    // node 2 loses both children, one demotion.
    assert_eq!(index.delete(&3), Ok(1));
    // node 4 goes lopsided, one single rotation.
    assert_eq!(index.delete(&2), Ok(3));
    assert_eq!(index.len(), 4);
    assert_eq!(*index.root_node().unwrap().key(), 6);
    assert!(index.validate().is_ok());
}

#[test]
fn test_delete() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    let mut refns = RefNodes::new(11);

    for key in 0..10 {
        assert!(index.insert(key, 100).is_ok());
        refns.create(key, 100);
    }

    // delete a missing node.
    assert_eq!(index.delete(&10), Err(Error::KeyNotFound));
    assert!(refns.delete(10).is_none());

    assert_eq!(index.len(), 10);
    assert!(index.validate().is_ok());

    // test iter
    {
        let (mut iter, mut iter_ref) = (index.iter(), refns.iter());
        loop {
            match (iter.next(), iter_ref.next()) {
                (Some(item), Some(ref_item)) => {
                    assert_eq!(item.0, ref_item.0);
                    assert_eq!(item.1, ref_item.1);
                }
                (None, None) => break,
                (_, _) => panic!("invalid"),
            }
        }
    }

    // delete all entries.
    for i in 0..10 {
        assert!(index.delete(&i).is_ok());
        assert!(refns.delete(i).is_some());
        assert!(index.validate().is_ok());
    }
    assert_eq!(index.len(), 0);
    assert!(index.is_empty());
    assert!(index.validate().is_ok());
    // test iter
    assert!(index.iter().next().is_none());
}

#[test]
fn test_min_max() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    assert_eq!(index.min(), None);
    assert_eq!(index.max(), None);
    assert_eq!(index.min_entry(), None);
    assert_eq!(index.max_entry(), None);

    for i in 0..100 {
        let key = ((i * 7) % 100) * 3;
        index.insert(key, key * 10).unwrap();
    }
    assert_eq!(index.min_entry(), Some((0, 0)));
    assert_eq!(index.max_entry(), Some((297, 2970)));
    assert_eq!(index.min(), Some(0));
    assert_eq!(index.max(), Some(2970));

    // extremes track deletions at both ends.
    index.delete(&0).unwrap();
    index.delete(&297).unwrap();
    assert_eq!(index.min_entry(), Some((3, 30)));
    assert_eq!(index.max_entry(), Some((294, 2940)));
    assert!(index.validate().is_ok());
}

#[test]
fn test_select_rank() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    for i in 0..500 {
        let key = ((i * 7) % 500) * 2;
        index.insert(key, key * 10).unwrap();
    }

    let keys: Vec<i64> = index.keys().collect();
    for (rank, key) in keys.iter().enumerate() {
        assert_eq!(index.rank(key), Some(rank));
        let (k, v) = index.select(rank).unwrap();
        assert_eq!(k, *key);
        assert_eq!(v, *key * 10);
    }
    assert_eq!(index.select(index.len()), None);
    assert_eq!(index.rank(&1), None);
    assert_eq!(index.rank(&-1), None);
}

#[test]
fn test_random() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    let mut rng = SmallRng::from_seed(make_seed().to_le_bytes());

    assert_eq!(index.random(&mut rng), None);

    index.insert(0, 0).unwrap();
    assert_eq!(index.random(&mut rng), Some((0, 0)));
    assert_eq!(index.random(&mut rng), Some((0, 0)));

    for key in 1..10_000 {
        index.insert(key, key * 10).unwrap();
    }
    for _i in 0..20_000 {
        let (key, value) = index.random(&mut rng).unwrap();
        assert!(key >= 0 && key < 10_000);
        assert_eq!(value, key * 10);
    }
}

#[test]
fn test_split() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    for i in 0..100 {
        let key = (i * 7) % 100;
        index.insert(key, key * 10).unwrap();
    }

    let (lesser, greater) = index.split(&40);
    assert_eq!(lesser.len(), 40);
    assert_eq!(greater.len(), 59);
    let keys: Vec<i64> = lesser.keys().collect();
    assert_eq!(keys, (0..40).collect::<Vec<i64>>());
    let keys: Vec<i64> = greater.keys().collect();
    assert_eq!(keys, (41..100).collect::<Vec<i64>>());
    assert_eq!(lesser.min_entry(), Some((0, 0)));
    assert_eq!(lesser.max_entry(), Some((39, 390)));
    assert_eq!(greater.min_entry(), Some((41, 410)));
    assert_eq!(greater.max_entry(), Some((99, 990)));
    assert!(lesser.validate().is_ok());
    assert!(greater.validate().is_ok());

    // splitting at an extreme leaves one side empty.
    let (lesser, rest) = lesser.split(&0);
    assert_eq!(lesser.len(), 0);
    assert!(lesser.validate().is_ok());
    assert_eq!(rest.len(), 39);
    assert!(rest.validate().is_ok());

    let (rest, empty) = rest.split(&39);
    assert_eq!(rest.len(), 38);
    assert_eq!(empty.len(), 0);
    assert!(rest.validate().is_ok());
    assert!(empty.validate().is_ok());
}

#[test]
fn test_join() {
    let mut left: Avl<i64, i64> = Avl::new("left");
    for key in 0..100 {
        left.insert(key, key * 10).unwrap();
    }
    let mut right: Avl<i64, i64> = Avl::new("right");
    for key in 101..140 {
        right.insert(key, key * 10).unwrap();
    }

    let lh = left.validate().unwrap().height().unwrap();
    let rh = right.validate().unwrap().height().unwrap();
    let cost = left.join(100, 1000, right);
    assert_eq!(cost, ((lh - rh).abs() + 1) as usize);

    assert_eq!(left.len(), 140);
    let keys: Vec<i64> = left.keys().collect();
    assert_eq!(keys, (0..140).collect::<Vec<i64>>());
    assert_eq!(left.min_entry(), Some((0, 0)));
    assert_eq!(left.max_entry(), Some((139, 1390)));
    assert!(left.validate().is_ok());

    // pivot's key range may equally sit below the receiver.
    let mut low: Avl<i64, i64> = Avl::new("low");
    for key in -10..-1 {
        low.insert(key, key * 10).unwrap();
    }
    let cost = left.join(-1, -10, low);
    assert!(cost >= 1);
    assert_eq!(left.len(), 150);
    assert_eq!(left.min_entry(), Some((-10, -100)));
    assert!(left.validate().is_ok());
}

#[test]
fn test_join_empty() {
    // both sides empty.
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    let other: Avl<i64, i64> = Avl::new("other");
    assert_eq!(index.join(5, 50, other), 1);
    assert_eq!(index.len(), 1);
    assert_eq!(index.min_entry(), Some((5, 50)));
    assert_eq!(index.max_entry(), Some((5, 50)));
    assert!(index.validate().is_ok());

    // other side empty.
    let other: Avl<i64, i64> = Avl::new("other");
    assert_eq!(index.join(6, 60, other), 2);
    assert_eq!(index.len(), 2);
    assert!(index.validate().is_ok());

    // this side empty.
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    let mut other: Avl<i64, i64> = Avl::new("other");
    for key in 10..20 {
        other.insert(key, key * 10).unwrap();
    }
    let oh = other.validate().unwrap().height().unwrap();
    let cost = index.join(5, 50, other);
    assert_eq!(cost, (oh + 1 + 1) as usize);
    assert_eq!(index.len(), 11);
    assert_eq!(index.min_entry(), Some((5, 50)));
    let keys: Vec<i64> = index.keys().collect();
    let mut expected = vec![5];
    expected.extend(10..20);
    assert_eq!(keys, expected);
    assert!(index.validate().is_ok());
}

#[test]
fn test_join_sparse_flank() {
    // the taller side's flank runs out at a one-child node; the pivot
    // takes the empty link as its inner child.
    let mut left: Avl<i64, i64> = Avl::new("left");
    left.insert(5, 50).unwrap();
    let mut right: Avl<i64, i64> = Avl::new("right");
    right.insert(10, 100).unwrap();
    right.insert(20, 200).unwrap();

    let cost = left.join(7, 70, right);
    assert_eq!(cost, 2);
    assert_eq!(left.len(), 4);
    let keys: Vec<i64> = left.keys().collect();
    assert_eq!(keys, vec![5, 7, 10, 20]);
    assert!(left.validate().is_ok());

    // mirrored, descending the taller tree's missing right flank.
    let mut left: Avl<i64, i64> = Avl::new("left");
    left.insert(10, 100).unwrap();
    left.insert(5, 50).unwrap();
    let mut right: Avl<i64, i64> = Avl::new("right");
    right.insert(20, 200).unwrap();

    let cost = left.join(15, 150, right);
    assert_eq!(cost, 2);
    assert_eq!(left.len(), 4);
    let keys: Vec<i64> = left.keys().collect();
    assert_eq!(keys, vec![5, 10, 15, 20]);
    assert!(left.validate().is_ok());
}

#[test]
fn test_join_shapes() {
    // joins across a spread of small shapes: skewed flanks, one-child
    // roots, empty right side.
    for n in 1..=12_i64 {
        for m in 0..=n {
            let mut left: Avl<i64, i64> = Avl::new("left");
            for key in (0..n).rev() {
                left.insert(key, key * 10).unwrap();
            }
            let mut right: Avl<i64, i64> = Avl::new("right");
            for key in (n + 1)..(n + 1 + m) {
                right.insert(key, key * 10).unwrap();
            }

            let lh = left.validate().unwrap().height().unwrap();
            let rh = right.validate().unwrap().height().unwrap();
            let cost = left.join(n, n * 10, right);
            assert_eq!(cost, ((lh - rh).abs() + 1) as usize);
            assert_eq!(left.len(), (n + m + 1) as usize);
            let keys: Vec<i64> = left.keys().collect();
            assert_eq!(keys, (0..=(n + m)).collect::<Vec<i64>>());
            assert!(left.validate().is_ok());
        }
    }
}

#[test]
fn test_split_join() {
    let mut rng = SmallRng::from_seed(make_seed().to_le_bytes());
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    for key in 0..1000 {
        index.insert(key, key * 10).unwrap();
    }
    let full: Vec<i64> = index.keys().collect();

    for _i in 0..10 {
        let keys: Vec<i64> = index.keys().collect();
        let pivot = keys[rng.gen_range(0, keys.len())];
        let value = index.get(&pivot).unwrap();
        let n = index.len();

        let (mut lesser, greater) = index.split(&pivot);
        assert_eq!(lesser.len() + greater.len() + 1, n);
        if let Some((max, _)) = lesser.max_entry() {
            assert!(max < pivot);
        }
        if let Some((min, _)) = greater.min_entry() {
            assert!(min > pivot);
        }
        assert!(lesser.validate().is_ok());
        assert!(greater.validate().is_ok());

        let cost = lesser.join(pivot, value, greater);
        assert!(cost >= 1);
        assert!(lesser.validate().is_ok());
        index = lesser;
        assert_eq!(index.len(), n);
    }

    let keys: Vec<i64> = index.keys().collect();
    assert_eq!(keys, full);
    for key in keys.iter() {
        assert_eq!(index.get(key), Some(key * 10));
    }
}

#[test]
fn test_crud() {
    let size = 1000;
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    let mut refns = RefNodes::new(size);

    for _ in 0..20_000 {
        let key: i64 = (random::<i64>() % (size as i64)).abs();
        let value: i64 = random();
        let op: i64 = (random::<i64>() % 3).abs();
        //println!("key {} value {} op {}", key, value, op);
        match op {
            0 => {
                let ok = index.get(&key).is_none();
                match index.insert(key, value) {
                    Ok(_) => {
                        assert!(ok);
                        assert!(refns.create(key, value));
                    }
                    Err(Error::DuplicateKey(k)) => {
                        assert!(!ok);
                        assert_eq!(k, key);
                        assert!(!refns.create(key, value));
                    }
                    Err(err) => panic!("unexpected error {:?}", err),
                }
            }
            1 => {
                let refval = refns.delete(key);
                match index.delete(&key) {
                    Ok(_) => assert!(refval.is_some()),
                    Err(Error::KeyNotFound) => assert!(refval.is_none()),
                    Err(err) => panic!("unexpected error {:?}", err),
                }
            }
            2 => {
                let val = index.get(&key);
                let refval = refns.get(key);
                assert_eq!(val, refval);
            }
            op => panic!("unreachable {}", op),
        };

        assert!(index.validate().is_ok());
    }

    println!("index-length {}", index.len());

    // test iter
    let (mut iter, mut iter_ref) = (index.iter(), refns.iter());
    loop {
        match (iter.next(), iter_ref.next()) {
            (Some(item), Some(ref_item)) => {
                assert_eq!(item.0, ref_item.0);
                assert_eq!(item.1, ref_item.1);
            }
            (None, None) => break,
            (_, _) => panic!("invalid"),
        }
    }
}

#[test]
fn test_iter_views() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    for i in 0..50 {
        let key = (i * 13) % 50;
        index.insert(key, key * 10).unwrap();
    }
    let entries: Vec<(i64, i64)> = index.iter().collect();
    let keys: Vec<i64> = index.keys().collect();
    let values: Vec<i64> = index.values().collect();
    assert_eq!(keys, (0..50).collect::<Vec<i64>>());
    for (i, (key, value)) in entries.into_iter().enumerate() {
        assert_eq!(key, keys[i]);
        assert_eq!(value, values[i]);
        assert_eq!(value, key * 10);
    }
}

#[test]
fn test_stats() {
    let mut index: Avl<i64, i64> = Avl::new("test-avl");
    for key in 0..10 {
        index.insert(key, key * 10).unwrap();
    }
    assert_eq!(index.stats().entries(), 10);
    assert!(index.stats().node_size() > 0);
    assert_eq!(index.stats().height(), None);

    let stats = index.validate().unwrap();
    assert_eq!(stats.entries(), 10);
    let height = stats.height().unwrap();
    assert!(height >= 3 && height <= 4, "height {}", height);
    let depths = stats.depths().unwrap();
    assert_eq!(depths.samples(), 11);
    assert!(depths.max() as i32 <= height + 1);
    assert!(depths.json().contains("mean:"));
}

#[test]
fn test_load_from() {
    let index = Avl::load_from("test-avl", (0..10).map(|k| (k, k * 10))).unwrap();
    assert_eq!(index.len(), 10);
    for key in 0..10 {
        assert_eq!(index.get(&key), Some(key * 10));
    }
    assert!(index.validate().is_ok());

    let iter = vec![(1, 10), (1, 20)].into_iter();
    match Avl::<i64, i64>::load_from("test-avl", iter) {
        Err(Error::DuplicateKey(1)) => (),
        _ => panic!("expected duplicate key"),
    }
}

#[test]
fn test_empty_value() {
    let mut index: Avl<i64, Empty> = Avl::new("test-avl");
    for key in 0..10 {
        index.insert(key, Empty {}).unwrap();
    }
    assert_eq!(index.len(), 10);
    assert_eq!(index.get(&5), Some(Empty {}));
    assert_eq!(index.get(&10), None);
    assert!(index.validate().is_ok());
}

fn make_seed() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

include!("./ref_test.rs");
