//! Property tests for the pure parts of rule evaluation

use invsync_rules::{Operator, format_folder_path, match_str};
use proptest::prelude::*;

fn operator() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::ALL.to_vec())
}

proptest! {
    #[test]
    fn negate_inverts_everything_but_match_all(
        value in "[a-zA-Z0-9 ,_-]{0,16}",
        needle in "[a-zA-Z0-9_-]{0,8}",
        op in operator(),
    ) {
        let plain = match_str(&value, &needle, op, false).unwrap();
        let negated = match_str(&value, &needle, op, true).unwrap();
        if op == Operator::MatchAll {
            prop_assert!(plain);
            prop_assert!(!negated);
        } else {
            prop_assert_eq!(plain, !negated);
        }
    }

    #[test]
    fn string_operators_ignore_case(
        value in "[a-zA-Z]{0,12}",
        needle in "[a-zA-Z]{0,6}",
    ) {
        for op in [Operator::Equal, Operator::Contains, Operator::StartsWith, Operator::EndsWith] {
            prop_assert_eq!(
                match_str(&value, &needle, op, false).unwrap(),
                match_str(&value.to_uppercase(), &needle.to_lowercase(), op, false).unwrap()
            );
        }
    }

    #[test]
    fn folder_format_is_idempotent(path in "[a-zA-Z0-9/_ -]{0,24}") {
        let once = format_folder_path(&path);
        prop_assert_eq!(format_folder_path(&once), once.clone());
        prop_assert!(once.starts_with('/'));
        prop_assert!(once == "/" || !once.ends_with('/'));
    }
}
