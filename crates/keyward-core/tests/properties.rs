//! Property-based tests for chain verification
//!
//! 1. LINKAGE: a tampered link rejects its batch and everything after it
//! 2. ATOMICITY: a rejected batch leaves the accepted prefix unchanged
//! 3. DETERMINISM: block hashes depend only on block contents

use keyward_core::{
    AppendBlock, Block, KeyPair, KeywardError, MemberIdentity, Operation, Payload, TeamIdentity,
};
use proptest::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

fn member(email: &str) -> MemberIdentity {
    MemberIdentity {
        public_key: KeyPair::generate().public_key_bytes(),
        email: email.to_string(),
        ssh_public_key: vec![1; 32],
        pgp_public_key: vec![2; 32],
    }
}

fn append(last: &[u8], signer: &KeyPair, email: &str) -> Block {
    Block::sign(
        &Payload::Append(AppendBlock {
            last_block_hash: last.to_vec(),
            operation: Operation::AddMember(member(email)),
        }),
        signer,
    )
    .unwrap()
}

/// Build `n` valid blocks signed by `admin`, optionally tampering the link of block `tamper`
fn build_chain(admin: &KeyPair, n: usize, tamper: Option<usize>) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(n);
    let mut last = admin.public_key_bytes();
    for i in 0..n {
        let link = if Some(i) == tamper {
            let mut bad = last.clone();
            bad[0] ^= 0xFF;
            bad
        } else {
            last.clone()
        };
        let block = append(&link, admin, &format!("member{}@example.com", i));
        last = block.hash();
        blocks.push(block);
    }
    blocks
}

// =============================================================================
// LINKAGE
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Valid chains of any length are accepted in full
    #[test]
    fn prop_valid_chain_accepted(n in 1usize..12) {
        let admin = KeyPair::generate();
        let blocks = build_chain(&admin, n, None);

        let mut team = TeamIdentity::new_admin(admin, "admin@example.com");
        prop_assert_eq!(team.apply(&blocks).unwrap(), n);
        prop_assert_eq!(team.blocks().len(), n);
        let expected_hash = blocks[n - 1].hash();
        prop_assert_eq!(team.last_block_hash(), Some(expected_hash.as_slice()));
    }

    /// Tampering block k leaves exactly the k blocks before it
    #[test]
    fn prop_tampered_link_keeps_prefix(n in 2usize..12, k_seed in any::<usize>()) {
        let k = 1 + k_seed % (n - 1);
        let admin = KeyPair::generate();
        let blocks = build_chain(&admin, n, Some(k));

        let mut team = TeamIdentity::new_admin(admin, "admin@example.com");
        team.apply(&blocks[..k]).unwrap();

        let err = team.apply(&blocks[k..]).unwrap_err();
        let is_linkage = matches!(err, KeywardError::LinkageMismatch { index, .. } if index == k);
        prop_assert!(is_linkage);
        prop_assert_eq!(team.blocks().len(), k);
        let expected_hash = blocks[k - 1].hash();
        prop_assert_eq!(team.last_block_hash(), Some(expected_hash.as_slice()));
    }

    /// A batch containing a bad link anywhere is rejected as a whole
    #[test]
    fn prop_bad_batch_is_all_or_nothing(n in 1usize..10, k_seed in any::<usize>()) {
        let k = k_seed % n;
        let admin = KeyPair::generate();
        let blocks = build_chain(&admin, n, Some(k));

        let mut team = TeamIdentity::new_admin(admin, "admin@example.com");
        prop_assert!(team.apply(&blocks).is_err());
        prop_assert!(team.blocks().is_empty());
        prop_assert!(team.members().is_empty());
    }
}

// =============================================================================
// DETERMINISM
// =============================================================================

proptest! {
    /// Hashes are a pure function of the block contents
    #[test]
    fn prop_hash_is_content_addressed(
        public_key in proptest::collection::vec(any::<u8>(), 32),
        payload in "[ -~]{0,64}",
        signature in proptest::collection::vec(any::<u8>(), 64),
    ) {
        let a = Block { public_key: public_key.clone(), payload: payload.clone(), signature: signature.clone() };
        let b = Block { public_key, payload, signature };
        prop_assert_eq!(a.hash(), b.hash());

        let mut c = b.clone();
        c.payload.push('x');
        prop_assert_ne!(a.hash(), c.hash());
    }
}
