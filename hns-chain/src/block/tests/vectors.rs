//! Structural checks on the two-phase header hash.

use crate::serialization::blake2b;
use crate::work::difficulty::CompactDifficulty;

use super::super::*;

fn sample_header() -> Header {
    Header::new(
        0x01020304,
        0x0504030201,
        Hash([0xaa; 32]),
        [0x55; 32],
        [0x11; 24],
        [0x22; 32],
        merkle::Root([0x33; 32]),
        merkle::Root([0x44; 32]),
        7,
        CompactDifficulty(0x207f_ffff),
        [0; 32],
    )
}

#[test]
fn header_halves_are_one_hash_block_each() {
    hns_test::init();

    let header = sample_header();
    assert_eq!(header.pre_head().len(), 128);
    assert_eq!(header.sub_head().len(), 128);
    // The wire encoding carries everything the two halves commit to.
    assert_eq!(Header::len(), 236);
}

#[test]
fn padding_is_prev_xor_tree() {
    hns_test::init();

    let header = sample_header();
    // prev is 0xaa, tree is 0x55: the padding is all ones, cycled.
    let pre = header.pre_head();
    assert!(pre[12..32].iter().all(|&b| b == 0xff));
}

#[test]
fn commit_hash_composition() {
    hns_test::init();

    let header = sample_header();
    let expected = blake2b::multi256(&[&header.sub_hash(), &header.mask_hash()]);
    assert_eq!(header.commit_hash(), expected);
}

#[test]
fn zero_mask_means_pow_equals_share() {
    hns_test::init();

    let header = sample_header();
    assert_eq!(header.pow_hash(), header.share_hash());
}

#[test]
fn mask_xors_the_share_hash() {
    hns_test::init();

    let mut header = sample_header();
    let share = header.share_hash();
    header.mask = [0xff; 32];

    // The mask changes the commit hash (through mask_hash), so the share
    // hash moves too; but the xor relation always holds.
    let masked_share = header.share_hash();
    let pow = header.pow_hash();
    for i in 0..32 {
        assert_eq!(pow[i], masked_share[i] ^ 0xff);
    }
    // And a pool that knows only the preheader data sees a share hash,
    // not the block hash.
    assert_ne!(share, masked_share);
}

#[test]
fn nonce_only_affects_preheader() {
    hns_test::init();

    let header = sample_header();
    let mut rolled = header;
    rolled.nonce += 1;

    assert_eq!(header.sub_hash(), rolled.sub_hash());
    assert_eq!(header.commit_hash(), rolled.commit_hash());
    assert_ne!(header.hash(), rolled.hash());
}

#[test]
fn subheader_fields_move_the_commit_hash() {
    hns_test::init();

    let header = sample_header();
    let mut changed = header;
    changed.merkle_root = merkle::Root([0x99; 32]);

    assert_ne!(header.sub_hash(), changed.sub_hash());
    assert_ne!(header.commit_hash(), changed.commit_hash());
    assert_ne!(header.hash(), changed.hash());
}

#[test]
fn trivial_target_accepts_mined_header() {
    hns_test::init();

    // With the local-network limit, about half of all nonces pass; a
    // few dozen attempts make failure astronomically unlikely.
    let mut header = sample_header();
    let solved = (0..1000u32).any(|nonce| {
        header.nonce = nonce;
        header.verify_pow()
    });
    assert!(solved);
}

#[test]
fn invalid_bits_fail_pow() {
    hns_test::init();

    let mut header = sample_header();
    // Negative compact encoding is never a valid target.
    header.bits = CompactDifficulty(0x0480_0001);
    assert!(!header.verify_pow());
}
