//! End-to-end conversation flow against the in-process reference backend:
//! two sessions, invite handshake, sealed exchange, live events, and the
//! degraded ciphertext-only mode.

use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use sb_channel::{
    ChannelError, ChannelEvent, ChannelSession, InviteError, InviteTransport, LocalNetwork,
    MessageBody, Relay,
};
use sb_crypto::KeyPair;
use sb_proto::invite::{InviteDecision, InviteState};
use sb_store::CustodyStore;

type Session = ChannelSession<LocalNetwork, LocalNetwork, LocalNetwork>;

/// Run with RUST_LOG=sb_channel=debug to watch the session events.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

struct TestUser {
    custody_path: PathBuf,
    session: Session,
}

impl TestUser {
    async fn finish(self) {
        self.session.shutdown().await;
        let _ = std::fs::remove_file(&self.custody_path);
        let _ = std::fs::remove_file(self.custody_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.custody_path.with_extension("db-shm"));
    }
}

/// Enrol a user: fresh keypair, private half into local custody, public
/// half published to the directory, live channel connected.
async fn provision(network: &Arc<LocalNetwork>, user_id: &str) -> TestUser {
    init_tracing();
    let custody_path = PathBuf::from(format!("/tmp/sb-flow-test-{}.db", Uuid::new_v4()));
    let custody = CustodyStore::open(&custody_path).await.expect("open custody");

    let pair = KeyPair::generate().expect("keygen");
    custody
        .store_private_key(user_id, &pair.private.to_pkcs8_der().unwrap())
        .await
        .expect("store key");
    network
        .register_user(user_id, &pair.public.to_b64().unwrap())
        .await;

    let events = network.connect(user_id).await;
    let session = ChannelSession::start(
        user_id,
        Arc::clone(network),
        Arc::clone(network),
        Arc::clone(network),
        custody,
        events,
    )
    .await;

    TestUser {
        custody_path,
        session,
    }
}

#[tokio::test]
async fn invite_then_message_roundtrip() {
    let network = Arc::new(LocalNetwork::new());
    let mut alice = provision(&network, "alice").await;
    let mut bob = provision(&network, "bob").await;

    // Before any invite: no history, no sending.
    let status = alice.session.select_peer("bob").await.unwrap();
    assert_eq!(status.state, InviteState::None);
    assert!(alice.session.transcript().is_empty());
    assert!(matches!(
        alice.session.send("too early", None).await,
        Err(ChannelError::NotAccepted(_))
    ));

    // Alice invites Bob; re-sending stays a single pending record.
    alice.session.send_invite().await.unwrap();
    let again = alice.session.send_invite().await.unwrap();
    assert_eq!(again.state, InviteState::Pending);
    assert_eq!(alice.session.invite_state(), InviteState::Pending);

    // Bob sees the pending invite, with Alice as initiator, and accepts.
    let seen = bob.session.select_peer("alice").await.unwrap();
    assert_eq!(seen.state, InviteState::Pending);
    assert_eq!(seen.initiated_by.as_deref(), Some("alice"));
    let record = bob
        .session
        .respond_invite(InviteDecision::Accepted)
        .await
        .unwrap();
    assert_eq!(record.state, InviteState::Accepted);

    // Alice's end unlocks via the live InviteAccepted push.
    assert!(alice.session.pump().await.unwrap());
    assert_eq!(alice.session.invite_state(), InviteState::Accepted);

    // Alice sends; the local echo comes from the sender-wrapped copy.
    let sent = alice.session.send("hi", None).await.unwrap();
    assert!(sent.outgoing);
    assert_eq!(sent.body, MessageBody::Text("hi".into()));
    assert_eq!(alice.session.transcript().len(), 1);

    // Bob receives the live push and decrypts it.
    assert!(bob.session.pump().await.unwrap());
    let received = &bob.session.transcript()[0];
    assert!(!received.outgoing);
    assert_eq!(received.body, MessageBody::Text("hi".into()));

    // The incoming append marked the envelope read on the relay.
    let history = network.fetch_history("bob", "alice").await.unwrap();
    assert!(history[0].read);

    // A fresh fetch reproduces the same transcript on both ends —
    // Alice reads her own history through the sender-wrapped key.
    alice.session.select_peer("bob").await.unwrap();
    assert_eq!(alice.session.transcript().len(), 1);
    assert_eq!(
        alice.session.transcript()[0].body,
        MessageBody::Text("hi".into())
    );
    bob.session.select_peer("alice").await.unwrap();
    assert_eq!(
        bob.session.transcript()[0].body,
        MessageBody::Text("hi".into())
    );

    alice.finish().await;
    bob.finish().await;
}

#[tokio::test]
async fn self_invite_and_unsolicited_respond_fail() {
    let network = Arc::new(LocalNetwork::new());
    let mut alice = provision(&network, "alice").await;

    alice.session.select_peer("alice").await.unwrap();
    assert!(matches!(
        alice.session.send_invite().await,
        Err(ChannelError::Invite(InviteError::SelfInvite))
    ));

    // Responding with no prior invite.
    assert!(matches!(
        network
            .respond("bob", "alice", InviteDecision::Accepted)
            .await,
        Err(InviteError::NotFound { .. })
    ));

    alice.finish().await;
}

#[tokio::test]
async fn duplicate_and_foreign_events_are_dropped() {
    let network = Arc::new(LocalNetwork::new());
    let mut alice = provision(&network, "alice").await;
    let mut bob = provision(&network, "bob").await;
    let mut carol = provision(&network, "carol").await;

    alice.session.select_peer("bob").await.unwrap();
    alice.session.send_invite().await.unwrap();
    bob.session.select_peer("alice").await.unwrap();
    bob.session
        .respond_invite(InviteDecision::Accepted)
        .await
        .unwrap();
    alice.session.pump().await.unwrap();

    alice.session.send("only once", None).await.unwrap();
    assert_eq!(alice.session.transcript().len(), 1);

    // Relay redelivery of the same envelope must not duplicate the echo.
    let history = network.fetch_history("alice", "bob").await.unwrap();
    alice
        .session
        .apply_event(ChannelEvent::NewMessage(history[0].clone()))
        .await
        .unwrap();
    assert_eq!(alice.session.transcript().len(), 1);

    // An envelope for a conversation Bob is not looking at is dropped.
    bob.session.pump().await.unwrap();
    assert_eq!(bob.session.transcript().len(), 1);
    bob.session.select_peer("carol").await.unwrap();
    bob.session
        .apply_event(ChannelEvent::NewMessage(history[0].clone()))
        .await
        .unwrap();
    assert!(bob.session.transcript().is_empty());

    alice.finish().await;
    bob.finish().await;
    carol.finish().await;
}

#[tokio::test]
async fn corrupted_custody_key_degrades_per_message() {
    let network = Arc::new(LocalNetwork::new());
    let mut alice = provision(&network, "alice").await;

    // Bob's published key is fine, but his stored private key is garbage.
    let bob_custody_path = PathBuf::from(format!("/tmp/sb-flow-test-{}.db", Uuid::new_v4()));
    let bob_custody = CustodyStore::open(&bob_custody_path).await.unwrap();
    let bob_pair = KeyPair::generate().unwrap();
    bob_custody
        .store_private_key("bob", b"these are not the DER bytes you are looking for")
        .await
        .unwrap();
    network
        .register_user("bob", &bob_pair.public.to_b64().unwrap())
        .await;
    let bob_events = network.connect("bob").await;
    let mut bob_session: Session = ChannelSession::start(
        "bob",
        Arc::clone(&network),
        Arc::clone(&network),
        Arc::clone(&network),
        bob_custody,
        bob_events,
    )
    .await;
    assert!(!bob_session.can_decrypt());

    alice.session.select_peer("bob").await.unwrap();
    alice.session.send_invite().await.unwrap();
    bob_session.select_peer("alice").await.unwrap();
    bob_session
        .respond_invite(InviteDecision::Accepted)
        .await
        .unwrap();
    alice.session.pump().await.unwrap();

    alice.session.send("can you read this?", None).await.unwrap();

    // Bob's fetch survives: the shell is rendered, the content is not.
    bob_session.select_peer("alice").await.unwrap();
    let transcript = bob_session.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].body, MessageBody::Unreadable);
    assert_eq!(transcript[0].sender_id, "alice");

    // Alice's perspective is unaffected.
    alice.session.select_peer("bob").await.unwrap();
    assert_eq!(
        alice.session.transcript()[0].body,
        MessageBody::Text("can you read this?".into())
    );

    alice.finish().await;
    bob_session.shutdown().await;
    let _ = std::fs::remove_file(&bob_custody_path);
    let _ = std::fs::remove_file(bob_custody_path.with_extension("db-wal"));
    let _ = std::fs::remove_file(bob_custody_path.with_extension("db-shm"));
}

#[tokio::test]
async fn attachment_passes_through_opaquely() {
    let network = Arc::new(LocalNetwork::new());
    let mut alice = provision(&network, "alice").await;
    let mut bob = provision(&network, "bob").await;

    alice.session.select_peer("bob").await.unwrap();
    alice.session.send_invite().await.unwrap();
    bob.session.select_peer("alice").await.unwrap();
    bob.session
        .respond_invite(InviteDecision::Accepted)
        .await
        .unwrap();
    alice.session.pump().await.unwrap();

    let sent = alice
        .session
        .send("see attached", Some("b64-blob".into()))
        .await
        .unwrap();
    assert_eq!(sent.attachment.as_deref(), Some("b64-blob"));

    bob.session.pump().await.unwrap();
    assert_eq!(
        bob.session.transcript()[0].attachment.as_deref(),
        Some("b64-blob")
    );

    alice.finish().await;
    bob.finish().await;
}

#[tokio::test]
async fn rejected_invite_keeps_the_pair_locked() {
    let network = Arc::new(LocalNetwork::new());
    let mut alice = provision(&network, "alice").await;
    let mut bob = provision(&network, "bob").await;

    alice.session.select_peer("bob").await.unwrap();
    alice.session.send_invite().await.unwrap();
    bob.session.select_peer("alice").await.unwrap();
    bob.session
        .respond_invite(InviteDecision::Rejected)
        .await
        .unwrap();

    // Terminal: re-inviting does not reopen the pair, sending stays blocked.
    let after = alice.session.send_invite().await.unwrap();
    assert_eq!(after.state, InviteState::Rejected);
    assert!(matches!(
        alice.session.send("hello?", None).await,
        Err(ChannelError::NotAccepted(_))
    ));

    alice.finish().await;
    bob.finish().await;
}
