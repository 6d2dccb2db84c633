//! End-to-end codec checks through the public API

use ledger_tx::codec::{
    decode_effects, decode_transaction, decode_transaction_kind, encode_effects,
    encode_transaction, encode_transaction_kind, simple_effects, status_of, transaction_digest,
    DecodeError, EncodeError, ExecutionFailure, ExecutionStatus, StatusSummary,
};
use ledger_tx::config::ResolverConfig;
use ledger_tx::resolve::{BuildOptions, IntentRegistry, Pipeline};
use ledger_tx::tx_builder::{
    Argument, Command, Expiration, GasData, Input, MoveCall, ObjectArg, PackageRef,
    TransactionBuilder, TransactionData,
};
use ledger_tx::types::{normalize_type, Address, Digest, ObjectRef};
use proptest::prelude::*;

fn pipeline() -> Pipeline {
    Pipeline::standard(&ResolverConfig::default(), IntentRegistry::with_defaults())
}

fn fee_coin() -> ObjectRef {
    ObjectRef::new(Address::from_u64(0xFEE), 12, Digest::new([3; 32]))
}

/// Split 100 from the fee object and send it to `recipient`
fn transfer(recipient: Address) -> TransactionBuilder {
    let mut tx = TransactionBuilder::new();
    let amount = tx.pure(&100u64).unwrap();
    let coin = tx.split_coins(Argument::FeeObject, vec![amount]).unwrap();
    let to = tx.pure(&recipient).unwrap();
    tx.transfer_objects(vec![coin], to).unwrap();
    tx
}

#[tokio::test]
async fn test_offline_build_decodes_to_same_transaction() {
    let sender = Address::from_u64(0xA11CE);
    let mut tx = transfer(Address::from_u64(0xB0B));
    tx.set_sender(sender)
        .set_gas_price(1_000)
        .set_gas_payment(vec![fee_coin()]);

    let options = BuildOptions::new().with_default_budget(5_000_000);
    let bytes = tx.build(&pipeline(), &options).await.unwrap();

    let decoded = decode_transaction(&bytes).unwrap();
    assert_eq!(decoded.sender, Some(sender));
    assert_eq!(decoded.gas.owner, Some(sender));
    assert_eq!(decoded.gas.budget, Some(5_000_000));
    assert_eq!(decoded.gas.payment, Some(vec![fee_coin()]));
    assert_eq!(decoded.inputs, tx.data().inputs);
    assert_eq!(decoded.commands, tx.data().commands);

    let rebuilt = TransactionBuilder::from_data(decoded).unwrap();
    assert_eq!(rebuilt.data(), tx.data());
    assert_ne!(transaction_digest(&bytes), Digest::new([0; 32]));
}

#[test]
fn test_fee_object_transfer_roundtrip() {
    let sender = Address::from_u64(0xA11CE);
    let mut tx = TransactionBuilder::new();
    let recipient = tx.pure(&Address::from_u64(0xB0B)).unwrap();
    tx.transfer_objects(vec![Argument::FeeObject], recipient).unwrap();
    tx.set_sender(sender)
        .set_gas_owner(sender)
        .set_gas_price(1_000)
        .set_gas_budget(1_000_000)
        .set_gas_payment(vec![fee_coin()]);

    let bytes = encode_transaction(tx.data()).unwrap();
    let decoded = decode_transaction(&bytes).unwrap();

    assert_eq!(decoded.sender, Some(sender));
    assert_eq!(decoded.inputs.len(), 1);
    assert_eq!(decoded.inputs, tx.data().inputs);
    assert_eq!(decoded.commands.len(), 1);
    assert!(matches!(
        &decoded.commands[0],
        Command::TransferObjects { objects, recipient: Argument::Input(0) }
            if objects == &vec![Argument::FeeObject]
    ));
}

#[tokio::test]
async fn test_kind_only_build_needs_no_gas() {
    let mut tx = transfer(Address::from_u64(0xB0B));
    let bytes = tx
        .build(&pipeline(), &BuildOptions::new().kind_only())
        .await
        .unwrap();

    let kind = decode_transaction_kind(&bytes).unwrap();
    assert_eq!(kind.inputs, tx.data().inputs);
    assert_eq!(kind.commands, tx.data().commands);
    assert!(decode_transaction(&bytes).is_err());
}

#[tokio::test]
async fn test_full_build_without_sender_fails_untouched() {
    let mut tx = transfer(Address::from_u64(0xB0B));
    let before = tx.data().clone();

    let options = BuildOptions::new().with_default_budget(1);
    assert!(tx.build(&pipeline(), &options).await.is_err());
    assert_eq!(tx.data(), &before);
}

#[test]
fn test_effects_status_tiers() {
    let digest = Digest::new([8; 32]);
    let owner = Address::from_u64(1);
    let mut effects = simple_effects(digest, fee_coin(), Digest::new([4; 32]), owner, 13);

    let success = encode_effects(&effects);
    assert_eq!(status_of(&success).unwrap(), StatusSummary::success());
    assert_eq!(decode_effects(&success).unwrap(), effects);

    effects.status = ExecutionStatus::Failure {
        error: ExecutionFailure::InsufficientGas,
        command: None,
    };
    let failed = encode_effects(&effects);
    let status = status_of(&failed).unwrap();
    assert!(!status.success);
    assert_eq!(status.error.as_deref(), Some("InsufficientGas"));

    // V2 effects, failure status, failure kind 200 (not known to this build)
    let unknown = [0x01, 0x01, 0xC8, 0x01];
    assert_eq!(status_of(&unknown).unwrap(), StatusSummary::opaque_failure());
    assert!(decode_effects(&unknown).is_err());

    // unknown effects version is not retried
    assert!(matches!(
        status_of(&[0x07, 0x00]),
        Err(DecodeError::UnknownVariant { .. })
    ));
}

#[test]
fn test_unset_gas_owner_is_not_encoded() {
    let sender = Address::from_u64(0xA11CE);
    let mut tx = transfer(Address::from_u64(0xB0B));
    tx.set_sender(sender)
        .set_gas_price(1_000)
        .set_gas_budget(1_000_000)
        .set_gas_payment(vec![fee_coin()]);

    assert_eq!(
        encode_transaction(tx.data()),
        Err(EncodeError::MissingField("gas owner"))
    );

    tx.set_gas_owner(sender);
    let bytes = encode_transaction(tx.data()).unwrap();
    assert_eq!(&decode_transaction(&bytes).unwrap(), tx.data());
}

fn arb_address() -> impl Strategy<Value = Address> + Clone {
    any::<[u8; 32]>().prop_map(Address::new)
}

fn arb_object_ref() -> impl Strategy<Value = ObjectRef> {
    (arb_address(), any::<u64>(), any::<[u8; 32]>())
        .prop_map(|(id, version, digest)| ObjectRef::new(id, version, Digest::new(digest)))
}

fn arb_input() -> impl Strategy<Value = Input> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..24).prop_map(Input::Pure),
        arb_object_ref().prop_map(|r| Input::Object(ObjectArg::Owned(r))),
        (arb_address(), any::<u64>(), any::<bool>()).prop_map(|(object_id, version, mutable)| {
            Input::Object(ObjectArg::Shared {
                object_id,
                initial_shared_version: version,
                mutable,
            })
        }),
        arb_object_ref().prop_map(|r| Input::Object(ObjectArg::Receiving(r))),
    ]
}

fn arb_argument() -> impl Strategy<Value = Argument> {
    prop_oneof![
        Just(Argument::FeeObject),
        any::<u16>().prop_map(Argument::Input),
        any::<u16>().prop_map(Argument::Result),
        (any::<u16>(), any::<u16>()).prop_map(|(i, j)| Argument::NestedResult(i, j)),
    ]
}

/// Type strings in their canonical form, as the builder stores them
fn arb_type() -> impl Strategy<Value = String> {
    let types: Vec<String> = [
        "u8",
        "u64",
        "u256",
        "vector<address>",
        "0x2::sui::SUI",
        "0x2::coin::Coin<0x2::sui::SUI>",
        "0xabc::pool::Pool<u64, vector<bool>>",
    ]
    .iter()
    .map(|t| normalize_type(t).unwrap())
    .collect();
    prop::sample::select(types)
}

fn arb_args(max: usize) -> impl Strategy<Value = Vec<Argument>> {
    prop::collection::vec(arb_argument(), 0..max)
}

fn arb_command() -> impl Strategy<Value = Command> {
    let modules = prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..3);
    let dependencies = prop::collection::vec(arb_address(), 0..3);
    prop_oneof![
        (
            arb_address(),
            "[a-z_][a-z0-9_]{0,8}",
            "[a-z_][a-z0-9_]{0,8}",
            prop::collection::vec(arb_type(), 0..3),
            arb_args(4),
        )
            .prop_map(|(package, module, function, type_arguments, arguments)| {
                Command::MoveCall(Box::new(MoveCall {
                    package: PackageRef::Address(package),
                    module,
                    function,
                    type_arguments,
                    arguments,
                }))
            }),
        (arb_args(4), arb_argument())
            .prop_map(|(objects, recipient)| Command::TransferObjects { objects, recipient }),
        (arb_argument(), arb_args(4)).prop_map(|(coin, amounts)| Command::SplitCoins { coin, amounts }),
        (arb_argument(), arb_args(4)).prop_map(|(destination, sources)| Command::MergeCoins {
            destination,
            sources
        }),
        (modules.clone(), dependencies.clone())
            .prop_map(|(modules, dependencies)| Command::Publish { modules, dependencies }),
        (prop::option::of(arb_type()), arb_args(4)).prop_map(|(element_type, elements)| {
            Command::MakeMoveVec {
                element_type,
                elements,
            }
        }),
        (modules, dependencies, arb_address(), arb_argument()).prop_map(
            |(modules, dependencies, package, ticket)| Command::Upgrade {
                modules,
                dependencies,
                package,
                ticket,
            }
        ),
    ]
}

fn arb_transaction() -> impl Strategy<Value = TransactionData> {
    (
        arb_address(),
        arb_address(),
        prop::collection::vec(arb_object_ref(), 0..3),
        any::<u64>(),
        any::<u64>(),
        prop::option::of(any::<u64>()),
        prop::collection::vec(arb_input(), 0..6),
        prop::collection::vec(arb_command(), 0..6),
    )
        .prop_map(
            |(sender, owner, payment, price, budget, epoch, inputs, commands)| TransactionData {
                sender: Some(sender),
                expiration: epoch.map_or(Expiration::None, Expiration::Epoch),
                gas: GasData {
                    payment: Some(payment),
                    owner: Some(owner),
                    price: Some(price),
                    budget: Some(budget),
                },
                inputs,
                commands,
            },
        )
}

proptest! {
    #[test]
    fn resolved_transaction_roundtrips(tx in arb_transaction()) {
        let bytes = encode_transaction(&tx).unwrap();
        prop_assert_eq!(decode_transaction(&bytes).unwrap(), tx.clone());

        let kind = encode_transaction_kind(&tx).unwrap();
        let decoded = decode_transaction_kind(&kind).unwrap();
        prop_assert_eq!(decoded.inputs, tx.inputs);
        prop_assert_eq!(decoded.commands, tx.commands);
    }

    #[test]
    fn truncated_transaction_is_rejected(
        tx in arb_transaction(),
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = encode_transaction(&tx).unwrap();
        let len = cut.index(bytes.len());
        prop_assert!(decode_transaction(&bytes[..len]).is_err());
    }
}
