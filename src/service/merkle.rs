//! RFC 6962 Merkle tree over an append-only leaf list.
//!
//! Every complete subtree hash is kept, indexed by height, so tile hashes are
//! direct lookups and roots and proofs only recompute the ragged right edge.

use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];

/// `SHA-256(0x00 || data)`
pub fn leaf_hash(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x00u8]);
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(0x01 || left || right)`
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x01u8]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Root of the empty tree.
pub fn empty_root() -> Hash {
    Sha256::digest(b"").into()
}

#[derive(Debug, Default, Clone)]
pub struct MerkleTree {
    /// `levels[h][i]` is the root of the complete subtree of height `h`
    /// covering leaves `[i << h, (i + 1) << h)`.
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> u64 {
        self.levels.first().map_or(0, |leaves| leaves.len() as u64)
    }

    /// Append a leaf and return its index.
    pub fn push(&mut self, data: &[u8]) -> u64 {
        let index = self.size();
        let mut hash = leaf_hash(data);
        let mut height = 0;
        loop {
            if self.levels.len() == height {
                self.levels.push(Vec::new());
            }
            let level = &mut self.levels[height];
            level.push(hash);
            if level.len() % 2 == 1 {
                break;
            }
            hash = node_hash(&level[level.len() - 2], &level[level.len() - 1]);
            height += 1;
        }
        index
    }

    /// Hash of the complete subtree of the given height at `index`, if it
    /// exists yet.
    pub fn node(&self, height: usize, index: u64) -> Option<Hash> {
        let level = self.levels.get(height)?;
        usize::try_from(index)
            .ok()
            .and_then(|index| level.get(index))
            .copied()
    }

    /// Number of complete subtrees at the given height.
    pub fn width(&self, height: usize) -> u64 {
        self.levels.get(height).map_or(0, |level| level.len() as u64)
    }

    pub fn root(&self) -> Hash {
        self.root_at(self.size())
    }

    /// Root of the tree's first `size` leaves. `size` must not exceed the
    /// current size.
    pub fn root_at(&self, size: u64) -> Hash {
        if size == 0 {
            return empty_root();
        }
        self.range(0, size)
    }

    /// Audit path for leaf `index` in the tree of `size` leaves, ordered from
    /// the leaf upwards.
    pub fn inclusion_proof(&self, index: u64, size: u64) -> Option<Vec<Hash>> {
        if index >= size || size > self.size() {
            return None;
        }
        let mut proof = Vec::new();
        self.path(index, 0, size, &mut proof);
        Some(proof)
    }

    fn path(&self, index: u64, lo: u64, hi: u64, proof: &mut Vec<Hash>) {
        if hi - lo == 1 {
            return;
        }
        let split = lo + split_point(hi - lo);
        if index < split {
            self.path(index, lo, split, proof);
            proof.push(self.range(split, hi));
        } else {
            self.path(index, split, hi, proof);
            proof.push(self.range(lo, split));
        }
    }

    /// Hash of leaves `[lo, hi)`, following the RFC 6962 split.
    fn range(&self, lo: u64, hi: u64) -> Hash {
        let len = hi - lo;
        if len.is_power_of_two() && lo % len == 0 {
            let height = len.trailing_zeros() as usize;
            if let Some(hash) = self.node(height, lo >> height) {
                return hash;
            }
        }
        let split = lo + split_point(len);
        node_hash(&self.range(lo, split), &self.range(split, hi))
    }
}

/// Largest power of two strictly below `len` (`len > 1`).
fn split_point(len: u64) -> u64 {
    1 << (63 - (len - 1).leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference MTH straight from RFC 6962.
    fn mth(leaves: &[&[u8]]) -> Hash {
        match leaves.len() {
            0 => empty_root(),
            1 => leaf_hash(leaves[0]),
            n => {
                let k = split_point(n as u64) as usize;
                node_hash(&mth(&leaves[..k]), &mth(&leaves[k..]))
            }
        }
    }

    /// RFC 9162 inclusion verification.
    fn verify(index: u64, size: u64, leaf: Hash, proof: &[Hash], root: Hash) -> bool {
        let (mut f, mut s) = (index, size - 1);
        let mut r = leaf;
        for p in proof {
            if s == 0 {
                return false;
            }
            if f & 1 == 1 || f == s {
                r = node_hash(p, &r);
                while f & 1 == 0 && f != 0 {
                    f >>= 1;
                    s >>= 1;
                }
            } else {
                r = node_hash(&r, p);
            }
            f >>= 1;
            s >>= 1;
        }
        s == 0 && r == root
    }

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("leaf-{i}").into_bytes()).collect()
    }

    #[test]
    fn split_point_is_largest_smaller_power() {
        assert_eq!(split_point(2), 1);
        assert_eq!(split_point(3), 2);
        assert_eq!(split_point(4), 2);
        assert_eq!(split_point(5), 4);
        assert_eq!(split_point(257), 256);
    }

    #[test]
    fn empty_root_is_hash_of_nothing() {
        let tree = MerkleTree::new();
        assert_eq!(tree.size(), 0);
        assert_eq!(
            hex(&tree.root()),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn roots_match_reference_at_every_size() {
        let data = leaves(40);
        let mut tree = MerkleTree::new();
        for (i, leaf) in data.iter().enumerate() {
            assert_eq!(tree.push(leaf), i as u64);
            let refs: Vec<&[u8]> = data[..=i].iter().map(Vec::as_slice).collect();
            assert_eq!(tree.root(), mth(&refs), "size {}", i + 1);
        }
    }

    #[test]
    fn complete_nodes_are_indexed_by_height() {
        let data = leaves(6);
        let mut tree = MerkleTree::new();
        for leaf in &data {
            tree.push(leaf);
        }
        assert_eq!(tree.width(0), 6);
        assert_eq!(tree.width(1), 3);
        assert_eq!(tree.width(2), 1);
        assert_eq!(tree.width(3), 0);
        let first: Vec<&[u8]> = data[..4].iter().map(Vec::as_slice).collect();
        assert_eq!(tree.node(2, 0), Some(mth(&first)));
        assert_eq!(tree.node(2, 1), None);
    }

    #[test]
    fn proofs_verify_for_every_leaf_and_size() {
        let data = leaves(19);
        let mut tree = MerkleTree::new();
        for leaf in &data {
            tree.push(leaf);
        }
        for size in 1..=19 {
            let root = tree.root_at(size);
            for index in 0..size {
                let proof = tree.inclusion_proof(index, size).unwrap();
                let leaf = leaf_hash(&data[index as usize]);
                assert!(verify(index, size, leaf, &proof, root), "{index}/{size}");
            }
        }
    }

    #[test]
    fn proof_out_of_range_is_none() {
        let mut tree = MerkleTree::new();
        tree.push(b"a");
        assert!(tree.inclusion_proof(1, 1).is_none());
        assert!(tree.inclusion_proof(0, 2).is_none());
        assert_eq!(tree.inclusion_proof(0, 1), Some(Vec::new()));
    }

    fn hex(hash: &Hash) -> String {
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}
