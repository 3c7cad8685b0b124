//! Full protocol scenario against an in-memory server double.
//!
//! Exercises the client side of the draw exactly as deployed: three
//! members register wrapped keys, the organizer runs the blind shuffle,
//! the fake server realigns and encrypts, and every member resolves
//! their recipient locally.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;

use santa_client::draw::{self, DrawTransport};
use santa_client::error::{GroupError, SantaError};
use santa_client::identity::IdentityContext;
use santa_core::MemoryStorage;
use santa_crypto::{result_token, PakeEngine, PakeParams, PublicKey, SecretKey};

const TEST_ITERS: u32 = 1_000;

fn engine() -> PakeEngine {
    PakeEngine::new(PakeParams {
        iterations: TEST_ITERS,
    })
}

struct Member {
    name: &'static str,
    identity: IdentityContext,
    wrapped_public_key: String,
}

async fn register_member(name: &'static str, group_key: &SecretKey) -> Member {
    let mut identity = IdentityContext::new(engine(), Arc::new(MemoryStorage::new()));
    identity.install_secret_key(group_key.clone());
    let registration = identity
        .create_user_keys(SecretString::from(format!("{name}-password")))
        .await
        .unwrap();
    Member {
        name,
        identity,
        wrapped_public_key: registration.public_key_secret,
    }
}

/// Server double: hands out wrapped keys in a fixed order, retains the
/// parallel identifier list and realigns on submission.
struct FakeServer {
    members: Vec<(String, String)>,
    retained_order: Mutex<Option<Vec<String>>>,
    results: Mutex<Vec<String>>,
}

impl FakeServer {
    fn new(members: &[&Member]) -> Self {
        Self {
            members: members
                .iter()
                .map(|m| (m.name.to_string(), m.wrapped_public_key.clone()))
                .collect(),
            retained_order: Mutex::new(None),
            results: Mutex::new(Vec::new()),
        }
    }

    fn results(&self) -> Vec<String> {
        self.results.lock().clone()
    }
}

#[async_trait]
impl DrawTransport for FakeServer {
    async fn fetch_wrapped_keys(&self) -> Result<Vec<String>, GroupError> {
        if self.members.len() < 3 {
            return Err(GroupError::NotEnoughParticipants);
        }
        let (ids, keys): (Vec<String>, Vec<String>) = self.members.iter().cloned().unzip();
        *self.retained_order.lock() = Some(ids);
        Ok(keys)
    }

    async fn submit_shuffled_keys(&self, public_keys: Vec<String>) -> Result<(), GroupError> {
        let ids = self
            .retained_order
            .lock()
            .take()
            .ok_or(GroupError::DrawSessionExpired)?;
        assert_eq!(public_keys.len(), ids.len());

        let mut results = Vec::with_capacity(ids.len());
        for (id, jwk) in ids.iter().zip(&public_keys) {
            let key = PublicKey::from_jwk(jwk).map_err(|e| GroupError::Unknown(e.into()))?;
            results.push(result_token::encrypt(&key, id.as_bytes()).unwrap());
        }
        *self.results.lock() = results;
        Ok(())
    }
}

fn resolve(member: &Member, results: &[String]) -> String {
    draw::parse_result(&member.identity, results)
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn test_three_member_draw_with_shift_one() {
    let group_key = engine()
        .derive_verifier(&SecretString::from("S"))
        .wrap_key;

    let a = register_member("A", &group_key).await;
    let b = register_member("B", &group_key).await;
    let c = register_member("C", &group_key).await;
    let server = FakeServer::new(&[&a, &b, &c]);

    // organizer side with a pinned shift of 1
    let wrapped = server.fetch_wrapped_keys().await.unwrap();
    let keys: Vec<String> = wrapped
        .iter()
        .map(|t| a.identity.decrypt_public_key(t).unwrap().to_jwk())
        .collect();
    server
        .submit_shuffled_keys(draw::rotate(keys, 1))
        .await
        .unwrap();

    let results = server.results();
    assert_eq!(results.len(), 3);

    // shift 1 over [A, B, C] is the cycle A->B, B->C, C->A
    assert_eq!(resolve(&a, &results), "B");
    assert_eq!(resolve(&b, &results), "C");
    assert_eq!(resolve(&c, &results), "A");

    // exactly one ciphertext resolves per member, and never their own
    for member in [&a, &b, &c] {
        let decrypted: Vec<String> = results
            .iter()
            .filter_map(|ct| member.identity.try_decrypt_result(ct).unwrap())
            .collect();
        assert_eq!(decrypted.len(), 1);
        assert_ne!(decrypted[0], member.name);
    }
}

#[tokio::test]
async fn test_run_draw_produces_valid_assignment() {
    let group_key = engine()
        .derive_verifier(&SecretString::from("S"))
        .wrap_key;

    let a = register_member("A", &group_key).await;
    let b = register_member("B", &group_key).await;
    let c = register_member("C", &group_key).await;
    let server = FakeServer::new(&[&a, &b, &c]);

    draw::run_draw(&server, &a.identity).await.unwrap();
    let results = server.results();

    let mut recipients = Vec::new();
    for member in [&a, &b, &c] {
        let recipient = resolve(member, &results);
        assert_ne!(recipient, member.name, "self-assignment");
        recipients.push(recipient);
    }

    // every member is somebody's recipient exactly once
    recipients.sort();
    assert_eq!(recipients, ["A", "B", "C"]);
}

#[tokio::test]
async fn test_run_draw_aborts_on_foreign_wrapped_key() {
    let group_key = engine()
        .derive_verifier(&SecretString::from("S"))
        .wrap_key;
    let stale_key = engine()
        .derive_verifier(&SecretString::from("old-S"))
        .wrap_key;

    let a = register_member("A", &group_key).await;
    let b = register_member("B", &group_key).await;
    // C registered while holding a stale group key
    let c = register_member("C", &stale_key).await;
    let server = FakeServer::new(&[&a, &b, &c]);

    let err = draw::run_draw(&server, &a.identity).await.unwrap_err();
    assert!(matches!(err, SantaError::BadDraw(_)));
    assert!(server.results().is_empty());
}

#[tokio::test]
async fn test_draw_requires_three_participants() {
    let group_key = engine()
        .derive_verifier(&SecretString::from("S"))
        .wrap_key;

    let a = register_member("A", &group_key).await;
    let b = register_member("B", &group_key).await;
    let server = FakeServer::new(&[&a, &b]);

    let err = draw::run_draw(&server, &a.identity).await.unwrap_err();
    assert!(matches!(
        err,
        SantaError::Group(GroupError::NotEnoughParticipants)
    ));
}

#[tokio::test]
async fn test_no_result_while_draw_pending() {
    let group_key = engine()
        .derive_verifier(&SecretString::from("S"))
        .wrap_key;
    let a = register_member("A", &group_key).await;

    assert!(draw::parse_result(&a.identity, &[]).unwrap().is_none());
}
