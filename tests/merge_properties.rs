//! Property tests for splicing one transaction into another

use ledger_tx::tx_builder::{Argument, Command, Input, ObjectArg, TransactionBuilder};
use ledger_tx::types::Address;
use proptest::prelude::*;
use proptest::sample::Index;

/// A chain of splits where each command splits the previous result
fn chain(values: &[u64]) -> TransactionBuilder {
    let mut tx = TransactionBuilder::new();
    let mut coin = Argument::FeeObject;
    for value in values {
        let amount = tx.pure(value).unwrap();
        coin = tx.split_coins(coin, vec![amount]).unwrap();
    }
    tx
}

fn split_parts(command: &Command) -> (Argument, Argument) {
    match command {
        Command::SplitCoins { coin, amounts } => (*coin, amounts[0]),
        other => panic!("unexpected command {other:?}"),
    }
}

fn pure_value(tx: &TransactionBuilder, argument: Argument) -> u64 {
    let Argument::Input(slot) = argument else {
        panic!("amount is not an input: {argument:?}");
    };
    match &tx.inputs()[usize::from(slot)] {
        Input::Pure(bytes) => u64::from_le_bytes(bytes.as_slice().try_into().unwrap()),
        other => panic!("unexpected input {other:?}"),
    }
}

proptest! {
    #[test]
    fn merge_preserves_every_reference(
        host in prop::collection::vec(0u64..16, 0..8),
        other in prop::collection::vec(0u64..16, 0..8),
        position in any::<Index>(),
    ) {
        let at = position.index(host.len() + 1);
        let mut tx = chain(&host);
        tx.merge(at, chain(&other).into_data()).unwrap();

        let n = host.len();
        let m = other.len();
        prop_assert_eq!(tx.commands().len(), n + m);

        for (k, value) in other.iter().enumerate() {
            let (coin, amount) = split_parts(&tx.commands()[at + k]);
            let expected = if k == 0 { Argument::FeeObject } else { Argument::Result((at + k - 1) as u16) };
            prop_assert_eq!(coin, expected);
            prop_assert_eq!(pure_value(&tx, amount), *value);
        }

        for (i, value) in host.iter().enumerate() {
            let position = if i < at { i } else { i + m };
            let (coin, amount) = split_parts(&tx.commands()[position]);
            let expected = match i {
                0 => Argument::FeeObject,
                i if i - 1 < at => Argument::Result((i - 1) as u16),
                i => Argument::Result((i - 1 + m) as u16),
            };
            prop_assert_eq!(coin, expected);
            prop_assert_eq!(pure_value(&tx, amount), *value);
        }
    }

    #[test]
    fn merge_dedups_equal_inputs(
        host in prop::collection::vec(0u64..6, 0..8),
        other in prop::collection::vec(0u64..6, 0..8),
    ) {
        let mut tx = chain(&host);
        tx.merge(host.len(), chain(&other).into_data()).unwrap();

        let mut distinct: Vec<u64> = host.iter().chain(other.iter()).copied().collect();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(tx.inputs().len(), distinct.len());
    }

    #[test]
    fn merge_ors_shared_mutability(a in any::<bool>(), b in any::<bool>()) {
        let object_id = Address::from_u64(0x5AED);

        let mut tx = TransactionBuilder::new();
        let shared = tx.shared_object(object_id, 3, a).unwrap();
        tx.move_call("0x2::clock::touch", &[], vec![shared]).unwrap();

        let mut other = TransactionBuilder::new();
        let shared = other.shared_object(object_id, 3, b).unwrap();
        other.move_call("0x2::clock::touch", &[], vec![shared]).unwrap();

        tx.merge(0, other.into_data()).unwrap();
        prop_assert_eq!(tx.inputs().len(), 1);
        prop_assert_eq!(
            &tx.inputs()[0],
            &Input::Object(ObjectArg::Shared { object_id, initial_shared_version: 3, mutable: a || b })
        );
    }

    #[test]
    fn merge_out_of_range_leaves_builder_unchanged(
        host in prop::collection::vec(0u64..16, 0..6),
        extra in 1usize..4,
    ) {
        let mut tx = chain(&host);
        let before = tx.data().clone();
        prop_assert!(tx.merge(host.len() + extra, chain(&[1]).into_data()).is_err());
        prop_assert_eq!(tx.data(), &before);
    }
}

#[test]
fn merge_rejects_dangling_result_without_side_effects() {
    let mut tx = chain(&[1, 2]);
    let before = tx.data().clone();

    let mut other = chain(&[5]).into_data();
    // refers to a command past the end of the merged list
    other.commands.push(Command::TransferObjects {
        objects: vec![Argument::Result(40)],
        recipient: Argument::FeeObject,
    });

    assert!(tx.merge(1, other).is_err());
    assert_eq!(tx.data(), &before);
}
