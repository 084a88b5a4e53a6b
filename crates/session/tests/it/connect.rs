use crate::utils::*;
use alloy_primitives::{Address, U256, utils::parse_ether};
use bluecarbon_session::{
    CallError, ConnectionStatus, SessionConfig, SessionError, Variant, short_address,
};

#[tokio::test]
async fn unset_contract_address_requires_setup() {
    let h = Harness::with(
        SessionConfig::new(None, unit_price()),
        ALICE,
        ALICE,
        U256::ZERO,
    );

    let err = h.manager.connect().await.unwrap_err();
    assert_eq!(err, SessionError::SetupRequired);
    assert_eq!(h.sink.titles(), ["Setup Required"]);
    assert!(h.sink.all()[0].is_destructive());

    // no provider call attempted
    assert_eq!(h.wallet.requests(), 0);
    assert_eq!(h.state().connection, ConnectionStatus::Disconnected);
    assert!(h.chain.bindings.lock().is_empty());
}

#[tokio::test]
async fn connect_binds_contract_and_reads_data() {
    let h = Harness::new();

    let address = h.manager.connect().await.unwrap();
    assert_eq!(address, ALICE);

    let state = h.state();
    assert!(state.is_connected());
    assert_eq!(state.address(), Some(ALICE));
    assert!(state.is_owner());
    assert!(!state.refreshing);
    assert_eq!(state.balance(), parse_ether("1.5").unwrap());
    assert_eq!(state.snapshot.display_balance(), "1.500000");
    assert_eq!(state.snapshot.owner, Some(ALICE));
    assert!(state.can_withdraw());

    assert_eq!(*h.chain.bindings.lock(), [(CONTRACT, ALICE)]);

    let notifications = h.sink.all();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].variant, Variant::Success);
    assert_eq!(notifications[0].title, "Wallet Connected");
    assert_eq!(notifications[0].description, format!("Address: {}", short_address(&ALICE)));
}

#[tokio::test]
async fn owner_comparison_ignores_hex_case() {
    let session: Address = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
    let owner: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
    let h = Harness::with(configured(), session, owner, U256::ZERO);

    h.manager.connect().await.unwrap();
    assert!(h.state().is_owner());
}

#[tokio::test]
async fn other_account_is_not_owner() {
    let h = Harness::with(configured(), ALICE, BOB, U256::ZERO);

    h.manager.connect().await.unwrap();
    let state = h.state();
    assert!(state.is_connected());
    assert!(!state.is_owner());
    assert!(!state.can_withdraw());
    assert!(state.can_purchase(1));
}

#[tokio::test]
async fn rejected_connection_returns_to_disconnected() {
    let h = Harness::new();
    h.wallet.fail_requests(Some(SessionError::UserRejected));

    let err = h.manager.connect().await.unwrap_err();
    assert_eq!(err, SessionError::UserRejected);

    let destructive = h.sink.destructive();
    assert_eq!(destructive.len(), 1);
    assert_eq!(destructive[0].title, "Connection Failed");
    assert_eq!(destructive[0].description, "The request was rejected in the wallet.");

    let state = h.state();
    assert_eq!(state.connection, ConnectionStatus::Disconnected);
    assert_eq!(state.address(), None);
    assert!(h.chain.bindings.lock().is_empty());
}

#[tokio::test]
async fn missing_wallet_is_reported() {
    let h = Harness::new();
    h.wallet.fail_requests(Some(SessionError::ProviderNotFound));

    let err = h.manager.connect().await.unwrap_err();
    assert_eq!(err, SessionError::ProviderNotFound);
    assert_eq!(h.sink.titles(), ["Wallet Not Found"]);
}

#[tokio::test]
async fn wallet_without_accounts_fails() {
    let h = Harness::new();
    *h.wallet.accounts.lock() = vec![];

    let err = h.manager.connect().await.unwrap_err();
    assert_eq!(err, SessionError::NoAccounts);
    assert_eq!(h.sink.titles(), ["Connection Failed"]);
    assert_eq!(h.wallet.signer_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_network_fails_connect() {
    let h = Harness::new();
    *h.wallet.chain_id.lock() = 1;

    let err = h.manager.connect().await.unwrap_err();
    assert_eq!(err, SessionError::WrongNetwork { expected: SEPOLIA, actual: 1 });
    assert_eq!(h.sink.titles(), ["Wrong Network"]);
    assert!(!h.state().is_connected());
    assert!(h.chain.bindings.lock().is_empty());
}

#[tokio::test]
async fn network_is_not_checked_without_chain_id() {
    let h =
        Harness::with(SessionConfig::new(Some(CONTRACT), unit_price()), ALICE, ALICE, U256::ZERO);
    *h.wallet.chain_id.lock() = 31337;

    h.manager.connect().await.unwrap();
    assert!(h.state().is_connected());
}

#[tokio::test]
async fn refresh_failure_keeps_connection() {
    let h = Harness::new();
    *h.chain.read_error.lock() = Some(SessionError::call("header not found"));

    h.manager.connect().await.unwrap();

    // the read failure is reported, the connection itself still succeeds
    assert_eq!(h.sink.titles(), ["Contract Error", "Wallet Connected"]);
    assert_eq!(h.sink.destructive()[0].description, "header not found");
    let state = h.state();
    assert!(state.is_connected());
    assert!(!state.is_owner());
    assert!(!state.refreshing);
}

#[tokio::test]
async fn refresh_failure_without_message_uses_fallback() {
    let h = Harness::connected().await;
    *h.chain.read_error.lock() = Some(SessionError::Contract(CallError::default()));

    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, SessionError::Contract(_)));
    let destructive = h.sink.destructive();
    assert_eq!(destructive.len(), 1);
    assert_eq!(destructive[0].description, "Could not fetch data from the smart contract.");

    // session untouched
    let state = h.state();
    assert!(state.is_connected());
    assert!(state.is_owner());
    assert_eq!(state.balance(), parse_ether("1.5").unwrap());
}

#[tokio::test]
async fn refresh_reads_latest_contract_data() {
    let h = Harness::connected().await;
    *h.chain.balance.lock() = parse_ether("4").unwrap();
    *h.chain.owner.lock() = BOB;

    let snapshot = h.manager.refresh().await.unwrap();
    assert_eq!(snapshot.balance, parse_ether("4").unwrap());
    assert_eq!(snapshot.owner, Some(BOB));
    assert!(!h.state().is_owner());
    // refreshes are passive
    assert!(h.sink.all().is_empty());
}

#[tokio::test]
async fn refresh_requires_connection() {
    let h = Harness::new();

    let err = h.manager.refresh().await.unwrap_err();
    assert_eq!(err, SessionError::WalletNotConnected);
    assert_eq!(h.sink.titles(), ["Wallet Not Connected"]);
    assert_eq!(h.chain.balance_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sequential_connects_follow_last_attempt() {
    let h = Harness::new();

    assert_eq!(h.manager.connect().await.unwrap(), ALICE);
    h.wallet.select(BOB);
    assert_eq!(h.manager.connect().await.unwrap(), BOB);
    let state = h.state();
    assert_eq!(state.address(), Some(BOB));
    assert!(!state.is_owner());

    h.wallet.fail_requests(Some(SessionError::UserRejected));
    h.manager.connect().await.unwrap_err();
    let state = h.state();
    assert_eq!(state.connection, ConnectionStatus::Disconnected);
    assert_eq!(state.address(), None);
    assert_eq!(state.balance(), U256::ZERO);
}

#[tokio::test]
async fn later_connect_supersedes_pending_attempt() {
    let h = Harness::new();
    let release = h.wallet.gate_signer();

    let first = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.connect().await }
    });
    wait_until(|| h.wallet.signer_calls.load(std::sync::atomic::Ordering::SeqCst) == 1).await;
    assert_eq!(h.state().connection, ConnectionStatus::Connecting);

    h.wallet.select(BOB);
    assert_eq!(h.manager.connect().await.unwrap(), BOB);

    // the stale attempt resolves late with the previous account
    release.send(ALICE).unwrap();
    assert_eq!(first.await.unwrap(), Err(SessionError::Superseded));

    let state = h.state();
    assert!(state.is_connected());
    assert_eq!(state.address(), Some(BOB));
    assert_eq!(*h.chain.bindings.lock(), [(CONTRACT, BOB)]);
    assert_eq!(h.sink.titles(), ["Wallet Connected"]);
}

#[tokio::test]
async fn disconnect_clears_session() {
    let h = Harness::connected().await;

    h.manager.disconnect();
    let state = h.state();
    assert_eq!(state.connection, ConnectionStatus::Disconnected);
    assert_eq!(state.address(), None);
    assert_eq!(state.balance(), U256::ZERO);
    assert!(!state.is_owner());
    assert!(h.sink.all().is_empty());

    // the contract binding is gone
    assert_eq!(h.manager.withdraw().await.unwrap_err(), SessionError::NotOwner);
    assert_eq!(h.chain.writes(), 0);
}
