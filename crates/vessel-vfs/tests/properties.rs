//! Property-based tests for the VFS and tar codec

#[cfg(feature = "proptest")]
mod proptest_suite {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use vessel_vfs::{Vfs, tar};

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z0-9_]{1,12}", 1..5).prop_map(|parts| parts.join("/"))
    }

    fn tree_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
        prop::collection::btree_map(
            path_strategy(),
            prop::collection::vec(any::<u8>(), 0..512),
            0..24,
        )
    }

    fn build(tree: &BTreeMap<String, Vec<u8>>) -> Vfs {
        let mut vfs = Vfs::new();
        for (path, content) in tree {
            vfs.add(path, content.clone());
        }
        vfs
    }

    proptest! {
        /// Property: from_tar(to_tar(v)) has the same paths and bytes as v
        #[test]
        fn prop_tar_roundtrip(tree in tree_strategy()) {
            let vfs = build(&tree);
            let restored = tar::from_tar(&tar::to_tar(&vfs).unwrap()).unwrap();
            prop_assert_eq!(
                restored.paths().collect::<Vec<_>>(),
                vfs.paths().collect::<Vec<_>>()
            );
            for file in &vfs {
                prop_assert_eq!(restored.read(&file.name).unwrap(), file.content.as_slice());
            }
        }

        /// Property: read_dir output is sorted and free of duplicates
        #[test]
        fn prop_read_dir_sorted_unique(tree in tree_strategy()) {
            let vfs = build(&tree);
            let names: Vec<String> = vfs.read_dir("").unwrap().into_iter().map(|e| e.name).collect();
            let mut expected = names.clone();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(names, expected);
        }
    }
}
