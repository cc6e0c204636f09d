//! Property-based tests for the locked-path table.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::locking::LockedPaths;
    use proptest::prelude::*;

    proptest! {
        /// Property: once a directory prefix is locked, every path nested
        /// under it is locked, regardless of depth or file name.
        #[test]
        fn locked_directory_covers_all_nested_paths(
            dir in "[a-z]{1,8}(/[a-z]{1,8}){0,2}",
            nested in "[a-z]{1,8}(/[a-z]{1,8}){0,3}",
        ) {
            let locked = LockedPaths::new([format!("{}/", dir)]);
            let path = format!("{}/{}", dir, nested);
            prop_assert!(
                locked.is_locked(&path),
                "'{}/' should lock '{}'",
                dir,
                path
            );
        }

        /// Property: is_locked is deterministic (same input = same output)
        #[test]
        fn is_locked_is_deterministic(
            entry in "[a-z/]{1,16}",
            path in "[a-z/]{1,16}",
        ) {
            let locked = LockedPaths::new([entry]);
            prop_assert_eq!(locked.is_locked(&path), locked.is_locked(&path));
        }

        /// Property: a sibling path that merely shares a string prefix
        /// with a locked directory is never locked by it.
        #[test]
        fn locked_directory_never_matches_string_prefix_siblings(
            dir in "[a-z]{1,8}",
            tail in "[a-z]{1,8}",
        ) {
            // "{dir}{tail}.txt" shares the leading characters of "{dir}/"
            // but sits outside the directory boundary.
            let locked = LockedPaths::new([format!("{}/", dir)]);
            let sibling = format!("{}{}.txt", dir, tail);
            prop_assert!(
                !locked.is_locked(&sibling),
                "'{}/' must not lock sibling '{}'",
                dir,
                sibling
            );
        }

        /// Property: an exact entry locks exactly itself among extensions
        #[test]
        fn exact_entry_does_not_lock_descendants(path in "[a-z]{1,8}(/[a-z]{1,8}){0,2}") {
            let locked = LockedPaths::new([path.clone()]);
            let child = format!("{}/child.txt", path);
            prop_assert!(locked.is_locked(&path));
            prop_assert!(!locked.is_locked(&child));
        }

        /// Property: the empty table locks nothing
        #[test]
        fn empty_table_locks_nothing(path in "[a-z/.]{1,24}") {
            let locked = LockedPaths::default();
            prop_assert!(!locked.is_locked(&path));
        }
    }
}
