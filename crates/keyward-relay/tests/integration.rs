//! Integration Tests for the Relay
//!
//! Drive the router end to end:
//! - health and readiness
//! - team creation, appends and paged reads over `/v1/chain`
//! - error envelopes and status codes

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use keyward_core::{
    AppendBlock, Block, EmptyResponse, InviteKey, KeyPair, MemberIdentity, Operation, Payload,
    ReadBlock, ReadResponse, ServerResponse, TeamPointer,
};
use keyward_relay::{create_router, AppState, MemoryBlockStore, Relay, RelayConfig};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::ServiceExt;

// =============================================================================
// Test Helpers
// =============================================================================

fn router(page_size: usize) -> Router {
    let relay = Relay::new(
        Arc::new(MemoryBlockStore::new()),
        RelayConfig::default().with_page_size(page_size),
    );
    create_router(Arc::new(AppState { relay }))
}

fn add_member(last: &[u8], signer: &KeyPair, email: &str) -> Block {
    Block::sign(
        &Payload::Append(AppendBlock {
            last_block_hash: last.to_vec(),
            operation: Operation::AddMember(MemberIdentity {
                public_key: KeyPair::generate().public_key_bytes(),
                email: email.into(),
                ssh_public_key: vec![1; 32],
                pgp_public_key: vec![2; 32],
            }),
        }),
        signer,
    )
    .expect("Failed to sign block")
}

fn read(pointer: TeamPointer, signer: &KeyPair) -> Block {
    Block::sign(
        &Payload::Read(ReadBlock {
            team_pointer: pointer,
            nonce: vec![7; 32],
            unix_seconds: 1_700_000_000,
        }),
        signer,
    )
    .expect("Failed to sign read")
}

async fn post<T: DeserializeOwned>(app: &Router, block: &Block) -> (StatusCode, ServerResponse<T>) {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chain")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(block).unwrap()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

// =============================================================================
// Health Tests
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = router(10);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_ready_counts_teams() {
    let app = router(10);
    let admin = KeyPair::generate();
    let (status, _) = post::<EmptyResponse>(&app, &add_member(&admin.public_key_bytes(), &admin, "a")).await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ready"], true);
    assert_eq!(json["team_count"], 1);
}

// =============================================================================
// Chain Tests
// =============================================================================

#[tokio::test]
async fn test_append_then_read_pages() {
    let app = router(2);
    let admin = KeyPair::generate();
    let team = admin.public_key_bytes();

    let mut last = team.clone();
    let mut chain = Vec::new();
    for i in 0..5 {
        let block = add_member(&last, &admin, &format!("m{}@example.com", i));
        let (status, reply) = post::<EmptyResponse>(&app, &block).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, ServerResponse::Success(EmptyResponse {}));
        last = block.hash();
        chain.push(block);
    }

    let mut fetched = Vec::new();
    let mut pointer = TeamPointer::PublicKey(team);
    let mut pages = 0;
    loop {
        let (status, reply) = post::<ReadResponse>(&app, &read(pointer.clone(), &admin)).await;
        assert_eq!(status, StatusCode::OK);
        let page = reply.into_result().unwrap();
        pages += 1;
        if let Some(tail) = page.blocks.last() {
            pointer = TeamPointer::LastBlockHash(tail.hash());
        }
        fetched.extend(page.blocks);
        if !page.has_more {
            break;
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(fetched, chain);
}

#[tokio::test]
async fn test_fork_is_conflict() {
    let app = router(10);
    let admin = KeyPair::generate();
    let team = admin.public_key_bytes();

    let b0 = add_member(&team, &admin, "a");
    post::<EmptyResponse>(&app, &b0).await;
    post::<EmptyResponse>(&app, &add_member(&b0.hash(), &admin, "b")).await;

    let (status, reply) = post::<EmptyResponse>(&app, &add_member(&b0.hash(), &admin, "c")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(matches!(reply, ServerResponse::Error(_)));
}

#[tokio::test]
async fn test_tampered_block_unauthorized() {
    let app = router(10);
    let admin = KeyPair::generate();

    let mut block = add_member(&admin.public_key_bytes(), &admin, "a");
    block.payload = block.payload.replace("\"a\"", "\"z\"");

    let (status, reply) = post::<EmptyResponse>(&app, &block).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(matches!(reply, ServerResponse::Error(_)));
}

#[tokio::test]
async fn test_bad_nonce_rejected() {
    let app = router(10);
    let reader = KeyPair::generate();
    let block = Block::sign(
        &Payload::Read(ReadBlock {
            team_pointer: TeamPointer::PublicKey(reader.public_key_bytes()),
            nonce: vec![1; 4],
            unix_seconds: 0,
        }),
        &reader,
    )
    .unwrap();

    let (status, _) = post::<ReadResponse>(&app, &block).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_pointer_not_found() {
    let app = router(10);
    let reader = KeyPair::generate();

    let (status, reply) =
        post::<ReadResponse>(&app, &read(TeamPointer::LastBlockHash(vec![3; 32]), &reader)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(reply.into_result().is_err());

    // an unknown team is simply empty
    let (status, reply) =
        post::<ReadResponse>(&app, &read(TeamPointer::PublicKey(vec![3; 32]), &reader)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply.into_result().unwrap(), ReadResponse::default());
}

#[tokio::test]
async fn test_invite_block_accepted_without_membership_checks() {
    let app = router(10);
    let admin = KeyPair::generate();
    let b0 = add_member(&admin.public_key_bytes(), &admin, "a");
    post::<EmptyResponse>(&app, &b0).await;

    // the relay only links blocks; a non-admin invite is stored and left to readers
    let outsider = KeyPair::generate();
    let invite = Block::sign(
        &Payload::Append(AppendBlock {
            last_block_hash: b0.hash(),
            operation: Operation::Invite(InviteKey {
                public_key: vec![4; 32],
            }),
        }),
        &outsider,
    )
    .unwrap();
    let (status, _) = post::<EmptyResponse>(&app, &invite).await;
    assert_eq!(status, StatusCode::OK);
}
