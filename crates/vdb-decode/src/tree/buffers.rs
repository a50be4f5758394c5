//! Leaf value pass, run once per grid after the topology.

use crate::error::{DecodeResult, DecodeWarning};

use super::leaf::{LeafBuffer, LeafNode};
use super::values::is_known_encoding;
use super::{NodeReader, SparseTree};

/// Counts from one buffer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub decoded: usize,
    pub mask_fallback: usize,
}

/// Decode the value buffers of every leaf under the first root child.
///
/// Leaves are visited L2 slot by L2 slot, L3 slot by L3 slot. Once a leaf with
/// an unknown encoding id is met, that leaf and every later leaf in the pass
/// take their values from their occupancy mask and nothing more is read from
/// the stream for them.
pub fn decode_buffers(
    tree: &mut SparseTree,
    reader: &mut NodeReader<'_, '_>,
) -> DecodeResult<BufferStats> {
    let mut stats = BufferStats::default();
    let children = tree.root.children_mut();
    if children.len() > 1 {
        reader.diagnostics.report(DecodeWarning::UnvisitedRootChildren {
            count: children.len() - 1,
        })?;
    }
    let Some(upper) = children.first_mut() else {
        return Ok(stats);
    };

    let mut mask_fallback = false;
    let mut leaf_index = 0;
    for lower in upper.children_mut() {
        for leaf in lower.children_mut() {
            let index = leaf_index;
            leaf_index += 1;

            if mask_fallback {
                use_mask_values(leaf);
                stats.mask_fallback += 1;
                continue;
            }

            // Duplicate of the value mask already read with the topology.
            reader.cursor.skip(LeafNode::SIZE / 8)?;
            let encoding = reader.cursor.read_u8()?;

            if is_known_encoding(encoding) {
                let values = reader.decode_values(encoding, LeafNode::SIZE, leaf.value_mask())?;
                leaf.set_buffer(LeafBuffer::Decoded(values));
                stats.decoded += 1;
            } else {
                reader
                    .diagnostics
                    .report(DecodeWarning::UnsupportedLeafEncoding {
                        leaf: index,
                        encoding,
                    })?;
                mask_fallback = true;
                use_mask_values(leaf);
                stats.mask_fallback += 1;
            }
        }
    }

    tracing::debug!(
        decoded = stats.decoded,
        mask_fallback = stats.mask_fallback,
        "decoded leaf buffers"
    );
    Ok(stats)
}

fn use_mask_values(leaf: &mut LeafNode) {
    let values = leaf.value_mask().to_values();
    leaf.set_buffer(LeafBuffer::MaskFallback(values));
}
